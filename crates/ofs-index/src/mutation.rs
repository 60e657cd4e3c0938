use std::fmt;

use ofs_schemas::{OfferDocument, OfferPatch};
use serde_json::Value;

use crate::store::{BulkAction, BulkOp, StoreError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MutationOp {
    Upsert,
    Patch,
    Delete,
}

impl fmt::Display for MutationOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MutationOp::Upsert => "upsert",
            MutationOp::Patch => "patch",
            MutationOp::Delete => "delete",
        })
    }
}

/// One typed change to the offers index, keyed by offer id.
#[derive(Clone, Debug, PartialEq)]
pub enum Mutation {
    Upsert(OfferDocument),
    Patch(OfferPatch),
    Delete { offer: String },
}

impl Mutation {
    pub fn delete(offer: impl Into<String>) -> Self {
        Mutation::Delete {
            offer: offer.into(),
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Mutation::Upsert(doc) => &doc.offer,
            Mutation::Patch(patch) => &patch.offer,
            Mutation::Delete { offer } => offer,
        }
    }

    pub fn op(&self) -> MutationOp {
        match self {
            Mutation::Upsert(_) => MutationOp::Upsert,
            Mutation::Patch(_) => MutationOp::Patch,
            Mutation::Delete { .. } => MutationOp::Delete,
        }
    }

    /// JSON body sent to the store; `None` for deletes.
    pub fn payload(&self) -> Result<Option<Value>, StoreError> {
        let encode = |r: serde_json::Result<Value>| r.map_err(|e| StoreError::Encode(e.to_string()));
        match self {
            Mutation::Upsert(doc) => encode(serde_json::to_value(doc)).map(Some),
            Mutation::Patch(patch) => encode(serde_json::to_value(patch)).map(Some),
            Mutation::Delete { .. } => Ok(None),
        }
    }

    pub fn to_bulk_op(&self, collection: &str) -> Result<BulkOp, StoreError> {
        let action = match (self.op(), self.payload()?) {
            (MutationOp::Upsert, Some(body)) => BulkAction::Index(body),
            (MutationOp::Patch, Some(body)) => BulkAction::Update(body),
            _ => BulkAction::Delete,
        };
        Ok(BulkOp {
            collection: collection.to_string(),
            id: self.key().to_string(),
            action,
        })
    }
}
