//! Events broadcast by the engine

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::state::{LinkKey, SaveStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// User-facing message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Display status changed
    Status { status: SaveStatus },
    /// Unsaved-changes flag changed
    Dirty { dirty: bool },
    /// Server state for `date` was reconciled into the editor
    Loaded {
        date: NaiveDate,
        record_id: Option<i64>,
    },
    /// A save was confirmed by the store
    Saved {
        record_id: Option<i64>,
        at: DateTime<Utc>,
    },
    Notice(Notice),
    /// Move focus to this link field
    FocusLink { key: LinkKey },
}
