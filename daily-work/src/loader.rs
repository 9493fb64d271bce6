//! Reconciling fetched server state into the editor
//!
//! A date change replaces the slots outright. A refresh of the date already
//! shown merges slot by slot so that nothing the user typed is lost, and is
//! skipped entirely while the user is typing or has unsaved changes.

use shared::models::{default_work_items, pad_work_items};
use shared::{DailyReport, WorkItem};

use crate::state::{SaveStatus, WorkSession, serialize_payload};
use crate::validate::invalid_links;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadKind {
    /// The selected date differs from the one last loaded
    DateChanged,
    /// Same date, fetched again
    Refresh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Slots were replaced with server state
    Replaced,
    /// Server state was merged under local edits
    Merged,
    /// Local edits are in progress; nothing changed
    Skipped,
}

/// Slot-wise merge: a slot with local content keeps it, otherwise takes the server's
fn merge_slots(local: &[WorkItem], server: &[WorkItem]) -> Vec<WorkItem> {
    let server = pad_work_items(server);
    server
        .into_iter()
        .enumerate()
        .map(|(slot, remote)| match local.get(slot) {
            Some(mine) if !mine.is_empty() => mine.clone(),
            _ => remote,
        })
        .collect()
}

impl WorkSession {
    pub fn reload_kind(&self) -> ReloadKind {
        if self.is_loaded() {
            ReloadKind::Refresh
        } else {
            ReloadKind::DateChanged
        }
    }

    /// A refresh now would be discarded by the typing guard
    pub fn refresh_blocked(&self) -> bool {
        self.reload_kind() == ReloadKind::Refresh && (self.typing || self.dirty)
    }

    /// Fold the fetched record for the selected date into the editor
    pub fn reconcile(&mut self, fetched: Option<DailyReport>) -> ReconcileOutcome {
        if self.refresh_blocked() {
            return ReconcileOutcome::Skipped;
        }

        let kind = self.reload_kind();
        let fetched = fetched.filter(|r| r.report_date == self.selected_date);
        let outcome = match (kind, fetched) {
            (ReloadKind::DateChanged, Some(record)) => {
                self.items = pad_work_items(&record.items);
                self.record = Some(record);
                ReconcileOutcome::Replaced
            }
            (ReloadKind::DateChanged, None) => {
                self.items = default_work_items();
                self.record = None;
                ReconcileOutcome::Replaced
            }
            (ReloadKind::Refresh, Some(record)) => {
                self.items = merge_slots(&self.items, &record.items);
                self.record = Some(record);
                ReconcileOutcome::Merged
            }
            (ReloadKind::Refresh, None) => {
                if self.items.iter().all(WorkItem::is_empty) {
                    self.items = default_work_items();
                }
                self.record = None;
                ReconcileOutcome::Merged
            }
        };

        self.baseline = serialize_payload(&self.payload());
        self.dirty = false;
        self.status = SaveStatus::Idle;
        self.loaded_date = Some(self.selected_date);
        self.link_errors = invalid_links(&self.items);
        outcome
    }

    /// Fetch failed. A new date starts blank and stays unloaded, so no save
    /// can overwrite a record that was never read.
    pub fn mark_load_failed(&mut self) {
        if self.reload_kind() == ReloadKind::DateChanged {
            self.items = default_work_items();
            self.record = None;
            self.baseline = serialize_payload(&[]);
            self.dirty = false;
            self.link_errors.clear();
        }
    }
}
