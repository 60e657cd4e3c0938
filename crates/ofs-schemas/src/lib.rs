//! ofs-schemas
//!
//! Shared shapes for the offer syncer: the indexed offer document, partial
//! patches, ledger events and the replay window. No IO, no conversion logic;
//! price conversion lives in `ofs-codec`.

mod event;
mod offer;

pub use event::*;
pub use offer::*;

/// Ledger position. Totally ordered; the checkpoint unit.
pub type BlockNumber = u64;
