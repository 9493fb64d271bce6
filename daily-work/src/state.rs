//! Session state for one employee's daily report
//!
//! All coordination flags live in one `WorkSession` owned by the worker task.
//! The in-progress save is an enum variant rather than a set of booleans, so
//! a session can never be "saving" and "blur-saving" at the same time.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use shared::models::{default_work_items, filter_work_items};
use shared::{DailyReport, EmployeeProfile, WorkItem};

/// What triggered a save
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveOrigin {
    /// Quiet period elapsed after editing
    Auto,
    /// An input lost focus
    Blur,
    /// The user is leaving the editor
    Navigation,
    /// The user asked to save
    Explicit,
    /// Saving before switching to another date
    DateChange,
}

impl SaveOrigin {
    /// Silent saves never raise success notices
    pub fn is_silent(self) -> bool {
        !matches!(self, Self::Explicit)
    }

    /// Forced saves supersede a save already in flight
    pub fn is_forced(self) -> bool {
        matches!(self, Self::Navigation | Self::DateChange)
    }
}

/// Items written by the save in flight, kept until the server answers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    pub items: Vec<WorkItem>,
    pub payload: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveActivity {
    Idle,
    Saving {
        origin: SaveOrigin,
        pending: PendingWrite,
    },
}

/// Display status: `idle → saving → saved | error → idle`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving,
    Saved,
    Error,
}

/// Address of one link field: `(slot index, link index)`, both 0-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct LinkKey {
    pub item: usize,
    pub link: usize,
}

impl LinkKey {
    pub fn new(item: usize, link: usize) -> Self {
        Self { item, link }
    }
}

impl std::fmt::Display for LinkKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.item, self.link)
    }
}

/// Save counters for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SaveMetrics {
    pub total: u32,
    pub successful: u32,
    pub failed: u32,
    pub retries: u32,
}

/// Serialized form of a filtered item list, used for change detection
pub fn serialize_payload(items: &[WorkItem]) -> String {
    serde_json::to_string(items).unwrap_or_default()
}

/// Editing state for one employee
#[derive(Debug, Clone)]
pub struct WorkSession {
    pub(crate) employee: EmployeeProfile,
    pub(crate) selected_date: NaiveDate,
    /// Date whose server state was last reconciled into `items`
    pub(crate) loaded_date: Option<NaiveDate>,
    /// Local mirror of the server record
    pub(crate) record: Option<DailyReport>,
    /// Always `WORK_ITEM_SLOTS` slots
    pub(crate) items: Vec<WorkItem>,
    /// Serialized payload last known to be persisted
    pub(crate) baseline: String,
    pub(crate) activity: SaveActivity,
    pub(crate) typing: bool,
    pub(crate) dirty: bool,
    pub(crate) status: SaveStatus,
    pub(crate) last_saved_at: Option<DateTime<Utc>>,
    pub(crate) consecutive_errors: u32,
    pub(crate) link_errors: BTreeSet<LinkKey>,
    pub(crate) metrics: SaveMetrics,
}

impl WorkSession {
    pub fn new(employee: EmployeeProfile, selected_date: NaiveDate) -> Self {
        Self {
            employee,
            selected_date,
            loaded_date: None,
            record: None,
            items: default_work_items(),
            baseline: serialize_payload(&[]),
            activity: SaveActivity::Idle,
            typing: false,
            dirty: false,
            status: SaveStatus::Idle,
            last_saved_at: None,
            consecutive_errors: 0,
            link_errors: BTreeSet::new(),
            metrics: SaveMetrics::default(),
        }
    }

    pub fn employee(&self) -> &EmployeeProfile {
        &self.employee
    }

    pub fn selected_date(&self) -> NaiveDate {
        self.selected_date
    }

    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    pub fn record(&self) -> Option<&DailyReport> {
        self.record.as_ref()
    }

    pub fn baseline(&self) -> &str {
        &self.baseline
    }

    pub fn activity(&self) -> &SaveActivity {
        &self.activity
    }

    pub fn status(&self) -> SaveStatus {
        self.status
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_typing(&self) -> bool {
        self.typing
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    pub fn link_errors(&self) -> &BTreeSet<LinkKey> {
        &self.link_errors
    }

    pub fn metrics(&self) -> SaveMetrics {
        self.metrics
    }

    /// Server state for the selected date has been reconciled
    pub fn is_loaded(&self) -> bool {
        self.loaded_date == Some(self.selected_date)
    }

    pub fn set_typing(&mut self, typing: bool) {
        self.typing = typing;
    }

    pub fn set_status(&mut self, status: SaveStatus) {
        self.status = status;
    }

    /// The user intervened explicitly; auto-save may try again
    pub fn reset_error_count(&mut self) {
        self.consecutive_errors = 0;
    }

    /// Non-empty items as they would be persisted
    pub fn payload(&self) -> Vec<WorkItem> {
        filter_work_items(&self.items)
    }

    pub fn payload_json(&self) -> String {
        serialize_payload(&self.payload())
    }

    /// Something non-empty differs from what was last persisted
    pub fn has_data_to_save(&self) -> bool {
        let payload = self.payload();
        !payload.is_empty() && serialize_payload(&payload) != self.baseline
    }

    /// Recompute the dirty flag against the baseline
    pub fn refresh_dirty(&mut self) -> bool {
        self.dirty = self.payload_json() != self.baseline;
        self.dirty
    }

    /// Record id to update, only if the mirror belongs to the selected date
    pub fn record_id_for_selected_date(&self) -> Option<i64> {
        self.record
            .as_ref()
            .filter(|r| r.report_date == self.selected_date)
            .map(|r| r.id)
    }

    pub(crate) fn begin_save(&mut self, origin: SaveOrigin, items: Vec<WorkItem>, payload: String) {
        self.activity = SaveActivity::Saving {
            origin,
            pending: PendingWrite { items, payload },
        };
        self.status = SaveStatus::Saving;
        self.metrics.total += 1;
    }

    /// The server confirmed `payload`; `record` is what it returned, if anything
    pub(crate) fn finish_save(
        &mut self,
        record: Option<DailyReport>,
        payload: String,
        at: DateTime<Utc>,
    ) {
        if let Some(record) = record {
            self.record = Some(record);
        }
        self.baseline = payload;
        self.activity = SaveActivity::Idle;
        self.consecutive_errors = 0;
        self.metrics.successful += 1;
        self.status = SaveStatus::Saved;
        self.last_saved_at = Some(at);
        self.refresh_dirty();
    }

    /// A save for a date that is no longer selected came back
    pub(crate) fn finish_stale_save(&mut self) {
        self.activity = SaveActivity::Idle;
        if self.status == SaveStatus::Saving {
            self.status = SaveStatus::Idle;
        }
    }

    pub(crate) fn abort_save(&mut self) {
        self.finish_stale_save();
    }

    pub(crate) fn fail_save(&mut self, failures: u32) {
        self.activity = SaveActivity::Idle;
        self.consecutive_errors += failures;
        self.metrics.failed += failures;
        self.dirty = true;
    }

    pub(crate) fn record_retries(&mut self, retries: u32) {
        self.metrics.retries += retries;
    }

    /// Switch the selected date; items stay until the next reconcile
    pub fn select_date(&mut self, date: NaiveDate) {
        self.selected_date = date;
        self.typing = false;
    }

    /// The mirrored record with the in-flight items applied
    pub fn optimistic_record(&self) -> Option<DailyReport> {
        let pending = match &self.activity {
            SaveActivity::Saving { pending, .. } => pending,
            SaveActivity::Idle => return self.record.clone(),
        };
        match &self.record {
            Some(record) if record.report_date == self.selected_date => Some(DailyReport {
                items: pending.items.clone(),
                ..record.clone()
            }),
            _ if pending.items.is_empty() => None,
            _ => Some(DailyReport {
                id: 0,
                employee_id: self.employee.employee_id,
                report_date: self.selected_date,
                items: pending.items.clone(),
                department_id: self.employee.department_id,
                department_code: self.employee.department_code.clone(),
                group_code: self.employee.group_code.clone(),
                created_at: None,
                updated_at: None,
            }),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            employee_id: self.employee.employee_id,
            date: self.selected_date,
            loaded: self.is_loaded(),
            record_id: self.record_id_for_selected_date(),
            items: self.items.clone(),
            dirty: self.dirty,
            typing: self.typing,
            saving: match &self.activity {
                SaveActivity::Saving { origin, .. } => Some(*origin),
                SaveActivity::Idle => None,
            },
            status: self.status,
            last_saved_at: self.last_saved_at,
            consecutive_errors: self.consecutive_errors,
            link_errors: self.link_errors.iter().copied().collect(),
            metrics: self.metrics,
            optimistic: self.optimistic_record(),
        }
    }
}

/// Read-only view of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub employee_id: i64,
    pub date: NaiveDate,
    pub loaded: bool,
    pub record_id: Option<i64>,
    pub items: Vec<WorkItem>,
    pub dirty: bool,
    pub typing: bool,
    pub saving: Option<SaveOrigin>,
    pub status: SaveStatus,
    pub last_saved_at: Option<DateTime<Utc>>,
    pub consecutive_errors: u32,
    pub link_errors: Vec<LinkKey>,
    pub metrics: SaveMetrics,
    pub optimistic: Option<DailyReport>,
}
