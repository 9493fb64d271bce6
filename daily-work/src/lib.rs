//! Daily Work - auto-saving editor for a daily work plan
//!
//! Keeps ten plan/result slots for one employee and one date in sync with the
//! hosted report table: debounced auto-save, immediate saves on blur and
//! navigation, link validation and safe reconciliation of server state.

pub mod config;
pub mod console;
pub mod editor;
pub mod engine;
pub mod error;
pub mod events;
pub mod loader;
pub mod logger;
pub mod saver;
pub mod state;
pub mod timer;
pub mod validate;

pub use config::AutoSaveConfig;
pub use editor::{DateTarget, Edit};
pub use engine::{AutoSaveEngine, AutoSaveWorker, DateSwitch, EngineHandle};
pub use error::{SaveError, SaveResult};
pub use events::{EngineEvent, Notice, NoticeLevel};
pub use loader::{ReconcileOutcome, ReloadKind};
pub use state::{
    LinkKey, SaveActivity, SaveMetrics, SaveOrigin, SaveStatus, SessionSnapshot, WorkSession,
};
pub use validate::is_valid_link;
