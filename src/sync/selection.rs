// ABOUTME: Per-table operation selection state for the sync workflow
// ABOUTME: Rebuilt wholesale from analyzer defaults, refined by the operator

use std::collections::{BTreeSet, HashMap};

use crate::models::{OperationClass, TableDiffSummary, TableOperationSelection};

/// Operator-owned apply choices, one record per eligible table. Each analyze
/// run replaces the whole map so tables dropped by a re-analyze cannot leak
/// stale entries.
#[derive(Debug, Default)]
pub struct SelectionModel {
    selections: HashMap<String, TableOperationSelection>,
}

impl SelectionModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a fresh analyze result, discarding every prior edit.
    pub fn rebuild(&mut self, summaries: &[TableDiffSummary]) {
        self.selections = summaries
            .iter()
            .map(|s| (s.table.clone(), TableOperationSelection::from_summary(s)))
            .collect();
    }

    /// Toggle one operation class for one table. Unknown tables are a
    /// no-op; the operator may race a stale table reference after a
    /// re-analyze and that must not error.
    pub fn set_operation_enabled(&mut self, table: &str, class: OperationClass, enabled: bool) {
        if let Some(selection) = self.selections.get_mut(table) {
            match class {
                OperationClass::Insert => selection.insert = enabled,
                OperationClass::Update => selection.update = enabled,
                OperationClass::Delete => selection.delete = enabled,
            }
        }
    }

    /// Replace the row-level key allow-list for one class. An empty set
    /// means "apply every differing row of the class". Unknown tables are
    /// a no-op.
    pub fn set_selected_keys(&mut self, table: &str, class: OperationClass, keys: BTreeSet<String>) {
        if let Some(selection) = self.selections.get_mut(table) {
            match class {
                OperationClass::Insert => selection.insert_keys = keys,
                OperationClass::Update => selection.update_keys = keys,
                OperationClass::Delete => selection.delete_keys = keys,
            }
        }
    }

    pub fn get(&self, table: &str) -> Option<&TableOperationSelection> {
        self.selections.get(table)
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    /// Tables with at least one operation class enabled, in no particular
    /// order.
    pub fn enabled_tables(&self) -> Vec<String> {
        self.selections
            .iter()
            .filter(|(_, s)| s.any_enabled())
            .map(|(table, _)| table.clone())
            .collect()
    }

    /// Deep copy for request freezing; later edits to the live model must
    /// not reach an in-flight job.
    pub fn snapshot(&self) -> HashMap<String, TableOperationSelection> {
        self.selections.clone()
    }
}
