//! Inactivity tracking and idle-timeout enforcement.
//!
//! The [`monitor::ActivityMonitor`] arms itself whenever the session
//! manager publishes an activity config (i.e. while authenticated), resets
//! an idle timer on every recorded interaction, and walks the warning
//! dialog / forced logout sequence when the timer fires.

pub mod monitor;

pub use monitor::{ActivityHandle, ActivityMonitor, ActivitySnapshot};

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::session::SessionError;

/// User interaction kinds that reset the idle timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    PointerMove,
    PointerDown,
    KeyDown,
    Scroll,
    Touch,
}

/// The user's answer to the inactivity warning dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningChoice {
    StayLoggedIn,
    Logout,
}

/// Remaining-time view over a fixed countdown deadline.
///
/// The deadline is set once when the warning opens; every read derives the
/// remaining time from it, so a slow or suspended consumer can never see
/// the countdown drift.
#[derive(Debug, Clone, Copy)]
pub struct Countdown {
    deadline: Instant,
}

impl Countdown {
    /// A countdown ending `duration` from now.
    pub fn after(duration: Duration) -> Self {
        Self {
            deadline: Instant::now() + duration,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left; zero once the deadline has passed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Whole seconds left, rounded up so the display never shows `0` while
    /// time actually remains.
    pub fn remaining_seconds(&self) -> u64 {
        let left = self.remaining();
        left.as_secs() + u64::from(left.subsec_nanos() > 0)
    }
}

/// Seam to the warning dialog. The future resolves when the user answers;
/// the monitor races it against the countdown deadline.
#[async_trait]
pub trait WarningPrompt: Send + Sync {
    async fn show_warning(&self, countdown: Countdown) -> Result<WarningChoice, SessionError>;
}
