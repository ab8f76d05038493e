use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::diff::{DiffEngine, PropertyDelta};
use crate::memo::Memo;

/// One incoming record paired with its optional persisted counterpart.
///
/// Classification (`is_new`/`is_modified`/`is_unmodified`) is meaningless
/// until the element has been reconciled; all three return `false` before
/// that. `index` is the element's stable identity within its sheet, assigned
/// from the storage's sequence so the element can be located again after the
/// host reloads a serialized storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportedElement<T> {
    index: u64,
    value: T,
    old_value: Option<T>,
    reconciled: bool,
    selected: bool,
    /// property name -> offending value, for records that could not be
    /// fully resolved (e.g. an unresolved foreign reference).
    error_properties: BTreeMap<String, String>,
    #[serde(skip)]
    deltas: Memo<Vec<PropertyDelta>>,
}

impl<T: Clone + PartialEq> ImportedElement<T> {
    pub fn new(index: u64, value: T) -> Self {
        ImportedElement {
            index,
            value,
            old_value: None,
            reconciled: false,
            selected: false,
            error_properties: BTreeMap::new(),
            deltas: Memo::new(),
        }
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn old_value(&self) -> Option<&T> {
        self.old_value.as_ref()
    }

    pub fn set_value(&mut self, value: T) {
        self.value = value;
        self.deltas.invalidate();
    }

    pub fn set_old_value(&mut self, old_value: Option<T>) {
        self.old_value = old_value;
        self.deltas.invalidate();
    }

    pub fn is_reconciled(&self) -> bool {
        self.reconciled
    }

    pub fn mark_reconciled(&mut self, reconciled: bool) {
        self.reconciled = reconciled;
    }

    /// Record an unresolvable property. Faulty elements can never be
    /// selected, so the stored flag drops immediately.
    pub fn add_error_property(
        &mut self,
        property: impl Into<String>,
        offending_value: impl Into<String>,
    ) {
        self.error_properties
            .insert(property.into(), offending_value.into());
        self.selected = false;
    }

    pub fn error_properties(&self) -> &BTreeMap<String, String> {
        &self.error_properties
    }

    /// No persisted counterpart was found.
    pub fn is_new(&self) -> bool {
        self.reconciled && self.old_value.is_none()
    }

    /// A persisted counterpart exists and at least one configured property
    /// differs. Fine-grained: consults the per-property diff.
    pub fn is_modified(&mut self, engine: &DiffEngine<T>) -> bool {
        if !self.reconciled || self.old_value.is_none() {
            return false;
        }
        !self.property_changes(engine).is_empty()
    }

    /// A persisted counterpart exists and equals the incoming record as a
    /// whole object. Deliberately coarser than `is_modified`'s per-property
    /// diff: an element can be neither modified nor unmodified when the
    /// configured properties all match but the full records differ.
    pub fn is_unmodified(&self) -> bool {
        self.reconciled && self.old_value.as_ref() == Some(&self.value)
    }

    /// Error properties exist; independent of reconciliation state.
    pub fn is_faulty(&self) -> bool {
        !self.error_properties.is_empty()
    }

    /// A faulty element never reports as selected, whatever the stored flag
    /// says.
    pub fn is_selected(&self) -> bool {
        self.selected && !self.is_faulty()
    }

    pub fn set_selected(&mut self, selected: bool) {
        self.selected = if self.is_faulty() { false } else { selected };
    }

    /// Memoized per-property deltas against the persisted counterpart;
    /// empty when there is none. Invalidated whenever `value` or
    /// `old_value` is reassigned.
    pub fn property_changes(&mut self, engine: &DiffEngine<T>) -> &[PropertyDelta] {
        let value = &self.value;
        let old_value = &self.old_value;
        self.deltas.get_or_insert_with(|| match old_value {
            Some(old) => engine.deltas(value, old),
            None => Vec::new(),
        })
    }
}
