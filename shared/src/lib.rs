//! Shared types for the daily work report workspace
//!
//! Data model used by the remote store client and the auto-save engine:
//! work item slots, the per-(employee, date) report record and its payloads.

pub mod models;
pub mod util;

// Re-exports
pub use models::{
    DailyReport, DailyReportPatch, EmployeeProfile, MAX_LINKS_PER_ITEM, NewDailyReport,
    WORK_ITEM_SLOTS, WorkItem,
};
pub use serde::{Deserialize, Serialize};
