//! Terminal implementations of the session layer's UI seams.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tracing::debug;

use skylark_core::activity::{Countdown, WarningChoice, WarningPrompt};
use skylark_core::session::SessionError;
use skylark_core::session::manager::Navigator;

/// Prints navigation requests; the CLI has no router to drive.
pub struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn navigate(&self, path: &str) {
        debug!(path, "navigation requested");
        println!("-> {path}");
    }
}

/// Warning dialog over stdin/stdout.
///
/// The watch loop owns stdin; while [`TerminalWarningPrompt::waiting`] is
/// set it routes lines here instead of treating them as activity.
pub struct TerminalWarningPrompt {
    responses: Mutex<mpsc::UnboundedReceiver<String>>,
    waiting: Arc<AtomicBool>,
}

impl TerminalWarningPrompt {
    pub fn new(responses: mpsc::UnboundedReceiver<String>) -> Self {
        Self {
            responses: Mutex::new(responses),
            waiting: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag the watch loop reads to decide where stdin lines go.
    pub fn waiting_flag(&self) -> Arc<AtomicBool> {
        self.waiting.clone()
    }
}

/// Clears the waiting flag even when the prompt future is dropped
/// because the countdown deadline won the race.
struct WaitingGuard(Arc<AtomicBool>);

impl Drop for WaitingGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl WarningPrompt for TerminalWarningPrompt {
    async fn show_warning(&self, countdown: Countdown) -> Result<WarningChoice, SessionError> {
        self.waiting.store(true, Ordering::SeqCst);
        let _guard = WaitingGuard(self.waiting.clone());
        println!(
            "! You have been inactive. Logging out in {}s.",
            countdown.remaining_seconds()
        );
        println!("  Type 'logout' to log out now, anything else to stay logged in.");

        let mut responses = self.responses.lock().await;
        match responses.recv().await {
            Some(line) if line.trim().eq_ignore_ascii_case("logout") => {
                Ok(WarningChoice::Logout)
            }
            Some(_) => Ok(WarningChoice::StayLoggedIn),
            None => Err(SessionError::Dialog("stdin closed".into())),
        }
    }
}
