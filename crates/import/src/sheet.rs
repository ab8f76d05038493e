use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::diff::DiffEngine;
use crate::element::ImportedElement;
use crate::error::ImportError;
use crate::memo::Memo;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Sheet-level import status.
///
/// `HasErrors` and `NothingTodo` are derived: a nonzero faulty count forces
/// `HasErrors` over whatever was requested, and a statistics pass over a
/// `Reconciled` sheet with no new or modified elements downgrades to
/// `NothingTodo`. `Imported` is terminal and caller-set after a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    NotReconciled,
    Reconciled,
    HasErrors,
    Imported,
    NothingTodo,
}

impl std::fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotReconciled => write!(f, "not_reconciled"),
            Self::Reconciled => write!(f, "reconciled"),
            Self::HasErrors => write!(f, "has_errors"),
            Self::Imported => write!(f, "imported"),
            Self::NothingTodo => write!(f, "nothing_todo"),
        }
    }
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Aggregate element counts for one sheet. `new`, `modified` and
/// `unmodified` only accumulate once the sheet is reconciled; `faulty` is
/// independent of reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportStatistics {
    pub total: usize,
    pub new: usize,
    pub modified: usize,
    pub unmodified: usize,
    pub faulty: usize,
}

// ---------------------------------------------------------------------------
// Boundary contracts
// ---------------------------------------------------------------------------

/// Persistence collaborator: find the persisted counterpart of an incoming
/// record, if any.
pub trait PersistedLookup<T> {
    fn find_existing(&self, incoming: &T) -> Option<T>;
}

/// Persistence collaborator: persist the selected, non-faulty elements of a
/// sheet and report how many were actually committed. The engine stores the
/// count without re-validating it.
pub trait CommitSink<T> {
    fn commit(&mut self, selected: &[&ImportedElement<T>]) -> Result<usize, ImportError>;
}

// ---------------------------------------------------------------------------
// Sheet
// ---------------------------------------------------------------------------

/// An ordered, named collection of imported elements: one spreadsheet tab's
/// worth of records moving through reconcile -> select -> commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportedSheet<T> {
    name: String,
    elements: Vec<ImportedElement<T>>,
    /// Caller-controlled display flag; not consulted by any logic here.
    open: bool,
    reconciled: bool,
    status: ImportStatus,
    committed_count: Option<usize>,
    #[serde(skip)]
    stats: Memo<ImportStatistics>,
}

impl<T: Clone + PartialEq> ImportedSheet<T> {
    pub fn new(name: impl Into<String>) -> Self {
        ImportedSheet {
            name: name.into(),
            elements: Vec::new(),
            open: false,
            reconciled: false,
            status: ImportStatus::NotReconciled,
            committed_count: None,
            stats: Memo::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn push_element(&mut self, element: ImportedElement<T>) {
        self.elements.push(element);
        self.stats.invalidate();
    }

    pub fn elements(&self) -> &[ImportedElement<T>] {
        &self.elements
    }

    /// Mutable element access. Any mutation may change the statistics, so
    /// the cache drops.
    pub fn elements_mut(&mut self) -> &mut [ImportedElement<T>] {
        self.stats.invalidate();
        &mut self.elements
    }

    /// Re-fetch an element by its stable index, e.g. after the host
    /// reloaded a serialized storage.
    pub fn element_by_index(&self, index: u64) -> Option<&ImportedElement<T>> {
        self.elements.iter().find(|e| e.index() == index)
    }

    pub fn element_by_index_mut(&mut self, index: u64) -> Option<&mut ImportedElement<T>> {
        self.stats.invalidate();
        self.elements.iter_mut().find(|e| e.index() == index)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn set_open(&mut self, open: bool) {
        self.open = open;
    }

    pub fn is_reconciled(&self) -> bool {
        self.reconciled
    }

    pub fn status(&self) -> ImportStatus {
        self.status
    }

    /// Guarded status transition.
    ///
    /// From `NotReconciled` the caller may not jump straight to `Imported`
    /// or `NothingTodo`; both derive from a reconciled sheet and requesting
    /// them earlier is a programming error, refused loudly. From
    /// `Reconciled` any status is settable. Setting `Reconciled` marks the
    /// sheet reconciled, setting `NotReconciled` clears the mark. A nonzero
    /// faulty count overrides whatever was written with `HasErrors`.
    pub fn set_status(&mut self, status: ImportStatus) -> Result<(), ImportError> {
        if self.status == ImportStatus::NotReconciled
            && matches!(status, ImportStatus::Imported | ImportStatus::NothingTodo)
        {
            return Err(ImportError::IllegalTransition {
                from: self.status,
                to: status,
            });
        }

        match status {
            ImportStatus::Reconciled => self.reconciled = true,
            ImportStatus::NotReconciled => self.reconciled = false,
            _ => {}
        }

        self.status = status;
        if self.faulty_count() > 0 {
            self.status = ImportStatus::HasErrors;
        }
        self.stats.invalidate();
        Ok(())
    }

    fn faulty_count(&self) -> usize {
        self.elements.iter().filter(|e| e.is_faulty()).count()
    }

    /// Pair every element with its persisted counterpart and mark the sheet
    /// reconciled.
    pub fn reconcile(&mut self, lookup: &impl PersistedLookup<T>) -> Result<(), ImportError> {
        for element in &mut self.elements {
            let existing = lookup.find_existing(element.value());
            element.set_old_value(existing);
        }
        self.set_status(ImportStatus::Reconciled)
    }

    /// Current statistics, recomputed when stale.
    ///
    /// The recompute walks the elements once: every element counts into
    /// `total`; under a reconciled sheet each element is marked reconciled
    /// and classified as exactly one of new/modified/unmodified; faulty
    /// counts regardless of reconciliation. A `Reconciled` sheet without
    /// any new or modified element downgrades to `NothingTodo`, and any
    /// faulty element forces `HasErrors`.
    pub fn statistics(&mut self, engine: &DiffEngine<T>) -> ImportStatistics {
        if let Some(stats) = self.stats.get() {
            return *stats;
        }

        let mut stats = ImportStatistics::default();
        let mut any_changes = false;
        let sheet_reconciled = self.reconciled;

        for element in &mut self.elements {
            stats.total += 1;
            if sheet_reconciled {
                element.mark_reconciled(true);
                if element.is_new() {
                    stats.new += 1;
                    any_changes = true;
                } else if element.is_modified(engine) {
                    stats.modified += 1;
                    any_changes = true;
                } else if element.is_unmodified() {
                    stats.unmodified += 1;
                }
            }
            if element.is_faulty() {
                stats.faulty += 1;
            }
        }

        if self.status == ImportStatus::Reconciled && !any_changes {
            self.status = ImportStatus::NothingTodo;
        }
        if stats.faulty > 0 {
            self.status = ImportStatus::HasErrors;
        }

        *self.stats.get_or_insert_with(|| stats)
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    /// Bulk selection. Without the filter every element receives `select`;
    /// with it, only new-or-modified elements do and the rest are pushed to
    /// the opposite value. Faulty elements stay deselected either way.
    pub fn select_all(
        &mut self,
        engine: &DiffEngine<T>,
        select: bool,
        only_modified_or_new: bool,
    ) {
        let sheet_reconciled = self.reconciled;
        for element in &mut self.elements {
            if sheet_reconciled {
                element.mark_reconciled(true);
            }
            let qualifies =
                !only_modified_or_new || element.is_new() || element.is_modified(engine);
            element.set_selected(if qualifies { select } else { !select });
        }
    }

    /// Like `select_all` but only the first `n` qualifying elements receive
    /// `select`; later qualifying elements and all non-qualifying ones
    /// receive the opposite.
    pub fn select_top_n(
        &mut self,
        engine: &DiffEngine<T>,
        select: bool,
        only_modified_or_new: bool,
        n: usize,
    ) {
        let sheet_reconciled = self.reconciled;
        let mut taken = 0usize;
        for element in &mut self.elements {
            if sheet_reconciled {
                element.mark_reconciled(true);
            }
            let qualifies =
                !only_modified_or_new || element.is_new() || element.is_modified(engine);
            if qualifies && taken < n {
                taken += 1;
                element.set_selected(select);
            } else {
                element.set_selected(!select);
            }
        }
    }

    pub fn deselect_all(&mut self) {
        for element in &mut self.elements {
            element.set_selected(false);
        }
    }

    /// The selected, non-faulty elements in sheet order.
    pub fn selected_elements(&self) -> Vec<&ImportedElement<T>> {
        self.elements.iter().filter(|e| e.is_selected()).collect()
    }

    // -----------------------------------------------------------------------
    // Errors and commit
    // -----------------------------------------------------------------------

    /// Sheet-wide view of element errors: property name -> distinct
    /// offending values, deduplicated and sorted for stable display.
    pub fn error_summary(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut summary: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for element in self.elements.iter().filter(|e| e.is_faulty()) {
            for (property, value) in element.error_properties() {
                summary
                    .entry(property.clone())
                    .or_default()
                    .insert(value.clone());
            }
        }
        summary
    }

    /// Hand the selected elements to the persistence collaborator and
    /// record how many it committed. The caller moves the sheet to
    /// `Imported` afterwards.
    pub fn commit_selected(
        &mut self,
        sink: &mut impl CommitSink<T>,
    ) -> Result<usize, ImportError> {
        let selected = self.selected_elements();
        let count = sink.commit(&selected)?;
        self.committed_count = Some(count);
        Ok(count)
    }

    /// `None` until a commit has happened.
    pub fn committed_count(&self) -> Option<usize> {
        self.committed_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{PropertyKind, PropertyRegistry};
    use crate::value::FieldValue;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Booking {
        code: String,
        amount: String,
        /// Outside the diffed property set on purpose.
        note: String,
    }

    fn booking(code: &str, amount: &str) -> Booking {
        Booking {
            code: code.into(),
            amount: amount.into(),
            note: String::new(),
        }
    }

    fn engine() -> DiffEngine<Booking> {
        DiffEngine::for_registry(
            PropertyRegistry::new()
                .register("code", PropertyKind::Text, |b: &Booking| {
                    FieldValue::text(b.code.clone())
                })
                .register("amount", PropertyKind::Decimal, |b: &Booking| {
                    FieldValue::parse_decimal(&b.amount).unwrap_or(FieldValue::Empty)
                }),
        )
    }

    fn elem(index: u64, value: Booking, old: Option<Booking>) -> ImportedElement<Booking> {
        let mut el = ImportedElement::new(index, value);
        el.set_old_value(old);
        el
    }

    /// In-memory lookup keyed by booking code.
    struct CodeLookup(Vec<Booking>);

    impl PersistedLookup<Booking> for CodeLookup {
        fn find_existing(&self, incoming: &Booking) -> Option<Booking> {
            self.0.iter().find(|b| b.code == incoming.code).cloned()
        }
    }

    struct CountingSink {
        committed: Vec<String>,
    }

    impl CommitSink<Booking> for CountingSink {
        fn commit(
            &mut self,
            selected: &[&ImportedElement<Booking>],
        ) -> Result<usize, ImportError> {
            for el in selected {
                self.committed.push(el.value().code.clone());
            }
            Ok(selected.len())
        }
    }

    #[test]
    fn illegal_transition_from_not_reconciled() {
        let mut sheet: ImportedSheet<Booking> = ImportedSheet::new("tab1");
        let err = sheet.set_status(ImportStatus::Imported).unwrap_err();
        assert!(matches!(err, ImportError::IllegalTransition { .. }));
        let err = sheet.set_status(ImportStatus::NothingTodo).unwrap_err();
        assert!(matches!(err, ImportError::IllegalTransition { .. }));
        assert_eq!(sheet.status(), ImportStatus::NotReconciled);
    }

    #[test]
    fn imported_reachable_from_reconciled() {
        let mut sheet: ImportedSheet<Booking> = ImportedSheet::new("tab1");
        sheet.set_status(ImportStatus::Reconciled).unwrap();
        assert!(sheet.is_reconciled());
        sheet.set_status(ImportStatus::Imported).unwrap();
        assert_eq!(sheet.status(), ImportStatus::Imported);
    }

    #[test]
    fn not_reconciled_clears_the_flag() {
        let mut sheet: ImportedSheet<Booking> = ImportedSheet::new("tab1");
        sheet.set_status(ImportStatus::Reconciled).unwrap();
        sheet.set_status(ImportStatus::NotReconciled).unwrap();
        assert!(!sheet.is_reconciled());
    }

    #[test]
    fn faulty_element_forces_has_errors() {
        let mut sheet = ImportedSheet::new("tab1");
        let mut el = elem(0, booking("b1", "10.00"), None);
        el.add_error_property("owner", "nobody");
        sheet.push_element(el);
        sheet.set_status(ImportStatus::Reconciled).unwrap();
        assert_eq!(sheet.status(), ImportStatus::HasErrors);
        // Still reconciled under the override.
        assert!(sheet.is_reconciled());
    }

    #[test]
    fn statistics_classify_mutually_exclusively() {
        let mut sheet = ImportedSheet::new("tab1");
        sheet.push_element(elem(0, booking("b1", "10.00"), None));
        sheet.push_element(elem(
            1,
            booking("b2", "20.00"),
            Some(booking("b2", "21.00")),
        ));
        sheet.push_element(elem(
            2,
            booking("b3", "30.00"),
            Some(booking("b3", "30.00")),
        ));
        sheet.set_status(ImportStatus::Reconciled).unwrap();

        let stats = sheet.statistics(&engine());
        assert_eq!(stats.total, 3);
        assert_eq!(stats.new, 1);
        assert_eq!(stats.modified, 1);
        assert_eq!(stats.unmodified, 1);
        assert_eq!(stats.total, stats.new + stats.modified + stats.unmodified);
        assert_eq!(sheet.status(), ImportStatus::Reconciled);
    }

    #[test]
    fn unreconciled_elements_only_count_into_total() {
        let mut sheet = ImportedSheet::new("tab1");
        sheet.push_element(elem(0, booking("b1", "10.00"), None));
        let stats = sheet.statistics(&engine());
        assert_eq!(stats.total, 1);
        assert_eq!(stats.new + stats.modified + stats.unmodified, 0);
    }

    #[test]
    fn no_changes_downgrades_to_nothing_todo() {
        let mut sheet = ImportedSheet::new("tab1");
        sheet.push_element(elem(
            0,
            booking("b1", "10.00"),
            Some(booking("b1", "10.00")),
        ));
        sheet.set_status(ImportStatus::Reconciled).unwrap();
        sheet.statistics(&engine());
        assert_eq!(sheet.status(), ImportStatus::NothingTodo);
    }

    #[test]
    fn end_to_end_statistics_scenario() {
        // 3 new, 2 modified, 5 unmodified, 1 faulty.
        let mut sheet = ImportedSheet::new("tab1");
        let mut index = 0u64;
        for _ in 0..3 {
            sheet.push_element(elem(index, booking(&format!("n{index}"), "1.00"), None));
            index += 1;
        }
        for _ in 0..2 {
            sheet.push_element(elem(
                index,
                booking(&format!("m{index}"), "2.00"),
                Some(booking(&format!("m{index}"), "2.50")),
            ));
            index += 1;
        }
        for _ in 0..5 {
            sheet.push_element(elem(
                index,
                booking(&format!("u{index}"), "3.00"),
                Some(booking(&format!("u{index}"), "3.00")),
            ));
            index += 1;
        }
        // The faulty element pairs with an old value that matches every
        // diffed property but not the whole record, so it classifies as
        // neither new nor modified nor unmodified.
        let mut unresolved = booking("f1", "4.00");
        unresolved.note = "owner could not be resolved".into();
        let mut faulty = elem(index, unresolved, Some(booking("f1", "4.00")));
        faulty.add_error_property("owner", "ghost");
        sheet.push_element(faulty);

        sheet.set_status(ImportStatus::Reconciled).unwrap();
        assert_eq!(sheet.status(), ImportStatus::HasErrors);

        let stats = sheet.statistics(&engine());
        assert_eq!(stats.total, 11);
        assert_eq!(stats.new, 3);
        assert_eq!(stats.modified, 2);
        assert_eq!(stats.unmodified, 5);
        assert_eq!(stats.faulty, 1);
        assert_eq!(sheet.status(), ImportStatus::HasErrors);
    }

    #[test]
    fn select_all_unfiltered_selects_everything_healthy() {
        let mut sheet = ImportedSheet::new("tab1");
        sheet.push_element(elem(0, booking("b1", "1.00"), None));
        let mut faulty = elem(1, booking("b2", "2.00"), None);
        faulty.add_error_property("owner", "ghost");
        sheet.push_element(faulty);
        sheet.set_status(ImportStatus::Reconciled).unwrap();

        sheet.select_all(&engine(), true, false);
        assert!(sheet.elements()[0].is_selected());
        assert!(!sheet.elements()[1].is_selected());
    }

    #[test]
    fn filtered_select_all_pushes_unqualified_to_opposite() {
        let mut sheet = ImportedSheet::new("tab1");
        sheet.push_element(elem(0, booking("b1", "1.00"), None)); // new
        sheet.push_element(elem(
            1,
            booking("b2", "2.00"),
            Some(booking("b2", "2.00")),
        )); // unmodified
        sheet.set_status(ImportStatus::Reconciled).unwrap();
        sheet.statistics(&engine());

        sheet.select_all(&engine(), true, true);
        assert!(sheet.elements()[0].is_selected());
        assert!(!sheet.elements()[1].is_selected());

        // Deselecting only-changed pushes the unmodified one to selected.
        sheet.select_all(&engine(), false, true);
        assert!(!sheet.elements()[0].is_selected());
        assert!(sheet.elements()[1].is_selected());
    }

    #[test]
    fn select_top_n_takes_min_of_n_and_qualifying() {
        let mut sheet = ImportedSheet::new("tab1");
        for i in 0..4u64 {
            sheet.push_element(elem(i, booking(&format!("b{i}"), "1.00"), None));
        }
        sheet.push_element(elem(
            4,
            booking("b4", "2.00"),
            Some(booking("b4", "2.00")),
        ));
        sheet.set_status(ImportStatus::Reconciled).unwrap();
        sheet.statistics(&engine());

        sheet.select_top_n(&engine(), true, true, 2);
        let selected: Vec<u64> = sheet
            .selected_elements()
            .iter()
            .map(|e| e.index())
            .collect();
        assert_eq!(selected, vec![0, 1]);

        // n larger than the qualifying count selects them all.
        sheet.select_top_n(&engine(), true, true, 10);
        assert_eq!(sheet.selected_elements().len(), 4);
    }

    #[test]
    fn deselect_all_clears_selection() {
        let mut sheet = ImportedSheet::new("tab1");
        sheet.push_element(elem(0, booking("b1", "1.00"), None));
        sheet.set_status(ImportStatus::Reconciled).unwrap();
        sheet.select_all(&engine(), true, false);
        sheet.deselect_all();
        assert!(sheet.selected_elements().is_empty());
    }

    #[test]
    fn error_summary_deduplicates_and_sorts() {
        let mut sheet: ImportedSheet<Booking> = ImportedSheet::new("tab1");
        let mut a = elem(0, booking("b1", "1.00"), None);
        a.add_error_property("owner", "ghost");
        let mut b = elem(1, booking("b2", "1.00"), None);
        b.add_error_property("owner", "ghost");
        b.add_error_property("room", "Z-99");
        sheet.push_element(a);
        sheet.push_element(b);

        let summary = sheet.error_summary();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary["owner"].len(), 1);
        assert!(summary["owner"].contains("ghost"));
        assert!(summary["room"].contains("Z-99"));
    }

    #[test]
    fn reconcile_pairs_elements_and_sets_status() {
        let mut sheet = ImportedSheet::new("tab1");
        sheet.push_element(elem(0, booking("b1", "1.00"), None));
        sheet.push_element(elem(1, booking("b2", "2.00"), None));
        let lookup = CodeLookup(vec![booking("b2", "2.50")]);

        sheet.reconcile(&lookup).unwrap();
        assert_eq!(sheet.status(), ImportStatus::Reconciled);
        assert!(sheet.elements()[0].old_value().is_none());
        assert_eq!(
            sheet.elements()[1].old_value().map(|b| b.amount.as_str()),
            Some("2.50")
        );

        let stats = sheet.statistics(&engine());
        assert_eq!(stats.new, 1);
        assert_eq!(stats.modified, 1);
    }

    #[test]
    fn commit_stores_count_without_revalidating() {
        let mut sheet = ImportedSheet::new("tab1");
        sheet.push_element(elem(0, booking("b1", "1.00"), None));
        sheet.push_element(elem(1, booking("b2", "2.00"), None));
        sheet.set_status(ImportStatus::Reconciled).unwrap();
        sheet.select_all(&engine(), true, false);

        let mut sink = CountingSink {
            committed: Vec::new(),
        };
        assert_eq!(sheet.committed_count(), None);
        let count = sheet.commit_selected(&mut sink).unwrap();
        assert_eq!(count, 2);
        assert_eq!(sheet.committed_count(), Some(2));
        assert_eq!(sink.committed, vec!["b1", "b2"]);

        sheet.set_status(ImportStatus::Imported).unwrap();
        assert_eq!(sheet.status(), ImportStatus::Imported);
    }
}
