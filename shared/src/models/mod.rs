//! Data models
//!
//! Shared between the store client and the auto-save engine.
//! Field names on the wire follow the hosted table's columns.

pub mod daily_report;
pub mod employee;
pub mod work_item;

mod lenient;

// Re-exports
pub use daily_report::*;
pub use employee::*;
pub use work_item::*;
