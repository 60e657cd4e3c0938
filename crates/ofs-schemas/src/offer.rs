use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// OfferDocument
// ---------------------------------------------------------------------------

/// The projected entity stored in the offers index.
///
/// `offer` is the primary key and never changes after creation. `buyer` is
/// only non-null while `bought` is true.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferDocument {
    pub offer: String,
    pub seller: String,
    pub title: String,
    /// Canonical decimal price (native ledger units already converted).
    pub price: f64,
    pub category: String,
    pub ships_from: String,
    pub bought: bool,
    pub buyer: Option<String>,
    pub attached_files: String,
}

// ---------------------------------------------------------------------------
// OfferPatch
// ---------------------------------------------------------------------------

/// Sparse update of an [`OfferDocument`].
///
/// Absent fields are omitted from the serialized patch so the store leaves
/// them untouched. `buyer` is doubly optional: `None` means "not part of the
/// patch", `Some(None)` serializes to an explicit `null`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferPatch {
    pub offer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seller: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ships_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attached_files: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bought: Option<bool>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "explicit_null"
    )]
    pub buyer: Option<Option<String>>,
}

impl OfferPatch {
    pub fn new(offer: impl Into<String>) -> Self {
        Self {
            offer: offer.into(),
            ..Self::default()
        }
    }

    /// `true` if the patch touches at least one field besides `offer`.
    pub fn has_data_fields(&self) -> bool {
        self.seller.is_some()
            || self.title.is_some()
            || self.price.is_some()
            || self.category.is_some()
            || self.ships_from.is_some()
            || self.attached_files.is_some()
            || self.bought.is_some()
            || self.buyer.is_some()
    }

    /// Fold a later patch for the same offer into this one. Fields present on
    /// `later` win; fields it omits keep their current value.
    pub fn merge(&mut self, later: OfferPatch) {
        debug_assert_eq!(self.offer, later.offer);
        if later.seller.is_some() {
            self.seller = later.seller;
        }
        if later.title.is_some() {
            self.title = later.title;
        }
        if later.price.is_some() {
            self.price = later.price;
        }
        if later.category.is_some() {
            self.category = later.category;
        }
        if later.ships_from.is_some() {
            self.ships_from = later.ships_from;
        }
        if later.attached_files.is_some() {
            self.attached_files = later.attached_files;
        }
        if later.bought.is_some() {
            self.bought = later.bought;
        }
        if later.buyer.is_some() {
            self.buyer = later.buyer;
        }
    }
}

/// Present-but-null deserializes to `Some(None)`; a missing key falls back to
/// the field default (`None`).
fn explicit_null<'de, D>(de: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(de).map(Some)
}
