//! Edit quiet-period timer
//!
//! One timer covers both the typing guard and the debounce: every edit pushes
//! the deadline out, and the flush fires once the user has been quiet for the
//! longer of the two windows.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct EditTimer {
    flush_delay: Duration,
    typing_grace: Duration,
    last_edit: Option<Instant>,
}

impl EditTimer {
    pub fn new(flush_delay: Duration, typing_grace: Duration) -> Self {
        Self {
            flush_delay,
            typing_grace,
            last_edit: None,
        }
    }

    /// Register an edit, restarting the quiet period
    pub fn touch(&mut self, now: Instant) {
        self.last_edit = Some(now);
    }

    pub fn cancel(&mut self) {
        self.last_edit = None;
    }

    /// The user edited within the typing grace window
    pub fn is_typing(&self, now: Instant) -> bool {
        self.last_edit
            .is_some_and(|at| now < at + self.typing_grace)
    }

    /// When the pending flush is due, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.last_edit
            .map(|at| at + self.flush_delay.max(self.typing_grace))
    }
}
