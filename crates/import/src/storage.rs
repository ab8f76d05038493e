use serde::{Deserialize, Serialize};

use crate::sheet::ImportedSheet;

/// Container for all sheets of one import run.
///
/// Serializable as a whole so a host can park an in-progress import under a
/// caller-chosen session key and pick it up on the next request; element
/// indices handed out by `next_index` stay stable across that round trip,
/// which is the one format guarantee the engine makes. Discarding the
/// storage is the only way to cancel a run.
///
/// Not internally locked: all mutation is `&mut self`. A host that shares
/// one in-progress import across threads wraps the storage in its own
/// mutex.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportStorage<T> {
    id: String,
    sheets: Vec<ImportedSheet<T>>,
    filename: Option<String>,
    /// Next element index to hand out. Monotonically increasing, never
    /// reused for the lifetime of the storage.
    next_index: u64,
}

impl<T: Clone + PartialEq> ImportStorage<T> {
    pub fn new(id: impl Into<String>) -> Self {
        ImportStorage {
            id: id.into(),
            sheets: Vec::new(),
            filename: None,
            next_index: 0,
        }
    }

    /// Opaque caller-supplied key for this run.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Add a sheet. Sheet names must be unique within the storage; adding a
    /// duplicate is a caller error and is not deduplicated.
    pub fn add_sheet(&mut self, sheet: ImportedSheet<T>) {
        debug_assert!(
            !self.sheets.iter().any(|s| s.name() == sheet.name()),
            "duplicate sheet name '{}'",
            sheet.name()
        );
        self.sheets.push(sheet);
    }

    /// Look up a sheet by name. Absence is a valid outcome for a caller
    /// probing for prior state, not an error.
    pub fn sheet(&self, name: &str) -> Option<&ImportedSheet<T>> {
        self.sheets.iter().find(|s| s.name() == name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut ImportedSheet<T>> {
        self.sheets.iter_mut().find(|s| s.name() == name)
    }

    pub fn sheets(&self) -> &[ImportedSheet<T>] {
        &self.sheets
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name()).collect()
    }

    /// Hand out the next stable element index and advance the sequence.
    pub fn next_index(&mut self) -> u64 {
        let index = self.next_index;
        self.next_index += 1;
        index
    }

    /// Current sequence value without advancing (diagnostic).
    pub fn last_index(&self) -> u64 {
        self.next_index
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn set_filename(&mut self, filename: Option<String>) {
        self.filename = filename;
    }

    /// Drop all sheets. The sequence keeps running so indices are never
    /// reused within this storage.
    pub fn clear(&mut self) {
        self.sheets.clear();
    }
}
