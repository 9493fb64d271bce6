//! Engine error types

use thiserror::Error;

use crate::state::LinkKey;

/// Why a requested save did not persist
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SaveError {
    /// Links failed validation; nothing was sent
    #[error("Invalid links: links must start with http:// or https://")]
    InvalidLinks(Vec<LinkKey>),

    /// The store rejected or failed the write
    #[error("Save failed: {0}")]
    Store(String),

    /// Failures reached the consecutive limit; auto-save is paused
    #[error("Save failed {0} times in a row")]
    GaveUp(u32),

    /// A newer save superseded this one
    #[error("Save superseded by a newer request")]
    Aborted,

    /// The selected date has not been loaded from the store
    #[error("Report not loaded")]
    NotLoaded,

    /// The engine task is no longer running
    #[error("Auto-save engine stopped")]
    Closed,
}

pub type SaveResult<T> = Result<T, SaveError>;
