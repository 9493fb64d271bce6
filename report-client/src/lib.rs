//! Report Client - access to the hosted daily report table
//!
//! Provides the `ReportStore` abstraction consumed by the auto-save engine,
//! a REST implementation over the hosted query API and an in-memory
//! implementation for local runs and tests.

pub mod config;
pub mod error;
pub mod memory;
pub mod rest;
pub mod store;

pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use memory::{FailureMode, InMemoryReportStore, StoreCalls};
pub use rest::RestReportStore;
pub use store::ReportStore;

// Re-export shared types for convenience
pub use shared::{DailyReport, DailyReportPatch, EmployeeProfile, NewDailyReport, WorkItem};
