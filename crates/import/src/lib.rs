//! `gridport-import` — Bulk-import reconciliation and selective-commit engine.
//!
//! Pure engine crate: receives parsed records plus their persisted
//! counterparts, classifies each pairing as new/modified/unmodified/faulty,
//! aggregates sheet-level statistics behind a guarded status state machine,
//! and hands a caller-selected subset to a commit collaborator. No parsing,
//! persistence, or rendering lives here.

pub mod diff;
pub mod element;
pub mod error;
pub mod memo;
pub mod merge;
pub mod sheet;
pub mod storage;
pub mod value;

pub use diff::{DiffEngine, PropertyDelta, PropertyKind, PropertyRegistry};
pub use element::ImportedElement;
pub use error::ImportError;
pub use merge::{merge_by_position, ListMergeOps, ModificationStatus};
pub use sheet::{CommitSink, ImportStatistics, ImportStatus, ImportedSheet, PersistedLookup};
pub use storage::ImportStorage;
pub use value::FieldValue;
