//! The activity monitor task.
//!
//! Runs as a single spawned task driven by three inputs: the session
//! manager's activity-config channel (arms and disarms monitoring),
//! the interaction channel fed by [`ActivityHandle::record_activity`],
//! and the idle timer. All timer state lives inside the task; the handle
//! only observes it through atomic flags.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::activity::{Countdown, Interaction, WarningChoice, WarningPrompt};
use crate::models::auth::ActivityConfig;
use crate::session::manager::SessionManager;

/// Interactions arrive at pointer-move rates; log at most one per window.
const ACTIVITY_LOG_THROTTLE: Duration = Duration::from_secs(30);

/// Flags and timing info shared between the monitor task and its handles.
#[derive(Default)]
struct MonitorShared {
    armed: AtomicBool,
    warning_shown: AtomicBool,
    timing: std::sync::Mutex<Timing>,
}

#[derive(Default, Clone, Copy)]
struct Timing {
    last_activity: Option<Instant>,
    warning_deadline: Option<Instant>,
}

impl MonitorShared {
    fn timing(&self) -> Timing {
        match self.timing.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn set_timing(&self, timing: Timing) {
        match self.timing.lock() {
            Ok(mut guard) => *guard = timing,
            Err(poisoned) => *poisoned.into_inner() = timing,
        }
    }
}

/// Point-in-time view of the monitor, for diagnostics and tests.
#[derive(Debug, Clone, Copy)]
pub struct ActivitySnapshot {
    pub armed: bool,
    pub warning_shown: bool,
    pub config: Option<ActivityConfig>,
    /// Elapsed time since the last recorded interaction (or since arming).
    pub time_since_last_activity: Option<Duration>,
    /// Time left until the idle warning fires; `None` while disarmed or
    /// while the warning dialog is already open.
    pub time_until_warning: Option<Duration>,
}

/// Cheap, cloneable front half of the monitor.
#[derive(Clone)]
pub struct ActivityHandle {
    events: mpsc::UnboundedSender<Interaction>,
    shutdown: watch::Sender<bool>,
    shared: Arc<MonitorShared>,
    config_rx: watch::Receiver<Option<ActivityConfig>>,
}

impl ActivityHandle {
    /// Report a user interaction. A send failure means the monitor task is
    /// gone and there is no timer left to reset.
    pub fn record_activity(&self, kind: Interaction) {
        let _ = self.events.send(kind);
    }

    /// Whether the inactivity warning dialog is currently open. The
    /// request guard checks this before auto-refreshing a token so the
    /// warning flow stays the only decision point.
    pub fn warning_shown(&self) -> bool {
        self.shared.warning_shown.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> ActivitySnapshot {
        let timing = self.shared.timing();
        let now = Instant::now();
        ActivitySnapshot {
            armed: self.shared.armed.load(Ordering::SeqCst),
            warning_shown: self.shared.warning_shown.load(Ordering::SeqCst),
            config: *self.config_rx.borrow(),
            time_since_last_activity: timing
                .last_activity
                .map(|at| now.saturating_duration_since(at)),
            time_until_warning: timing
                .warning_deadline
                .map(|at| at.saturating_duration_since(now)),
        }
    }

    /// Ask the monitor task to exit.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }
}

enum Step {
    Shutdown,
    ConfigChanged,
    Interaction(Interaction),
    WarningDue,
    EventsClosed,
}

enum WarningOutcome {
    Stay,
    Logout,
}

pub struct ActivityMonitor {
    session: Arc<SessionManager>,
    prompt: Arc<dyn WarningPrompt>,
    config_rx: watch::Receiver<Option<ActivityConfig>>,
    events: mpsc::UnboundedReceiver<Interaction>,
    events_open: bool,
    shutdown_rx: watch::Receiver<bool>,
    shared: Arc<MonitorShared>,
    deadline: Option<Instant>,
    last_activity_log: Option<Instant>,
}

impl ActivityMonitor {
    pub fn new(
        session: Arc<SessionManager>,
        prompt: Arc<dyn WarningPrompt>,
    ) -> (Self, ActivityHandle) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shared = Arc::new(MonitorShared::default());
        let config_rx = session.activity_config();

        let handle = ActivityHandle {
            events: events_tx,
            shutdown: shutdown_tx,
            shared: shared.clone(),
            config_rx: config_rx.clone(),
        };
        let monitor = Self {
            session,
            prompt,
            config_rx,
            events: events_rx,
            events_open: true,
            shutdown_rx,
            shared,
            deadline: None,
            last_activity_log: None,
        };
        (monitor, handle)
    }

    /// Run until shutdown. The monitor also exits when every handle has
    /// been dropped, since nothing could reach it anymore.
    pub async fn run(mut self) {
        // a session restored before spawn already carries a config
        self.apply_config();
        loop {
            match self.next_step().await {
                Step::Shutdown => break,
                Step::ConfigChanged => self.apply_config(),
                Step::Interaction(kind) => self.on_interaction(kind),
                Step::WarningDue => self.on_warning_due().await,
                Step::EventsClosed => self.events_open = false,
            }
        }
        debug!("activity monitor stopped");
    }

    async fn next_step(&mut self) -> Step {
        let deadline = self.deadline;
        tokio::select! {
            res = self.shutdown_rx.wait_for(|stop| *stop) => {
                // Err means every handle is gone; either way we exit
                let _ = res;
                Step::Shutdown
            }
            res = self.config_rx.changed() => match res {
                Ok(()) => Step::ConfigChanged,
                Err(_) => Step::Shutdown,
            },
            event = self.events.recv(), if self.events_open => match event {
                Some(kind) => Step::Interaction(kind),
                None => Step::EventsClosed,
            },
            () = idle_timer(deadline) => Step::WarningDue,
        }
    }

    fn apply_config(&mut self) {
        let config = *self.config_rx.borrow_and_update();
        match config {
            Some(config) => {
                self.reset_timer(config);
                if !self.shared.armed.swap(true, Ordering::SeqCst) {
                    debug!(
                        inactivity_secs = config.inactivity_warning_seconds,
                        countdown_secs = config.warning_countdown_seconds,
                        "activity monitoring armed"
                    );
                }
            }
            None => self.disarm(),
        }
    }

    /// Restart the idle timer; now counts as the last activity instant.
    fn reset_timer(&mut self, config: ActivityConfig) {
        let now = Instant::now();
        self.deadline = Some(now + Duration::from_secs(config.inactivity_warning_seconds));
        self.shared.set_timing(Timing {
            last_activity: Some(now),
            warning_deadline: self.deadline,
        });
    }

    fn disarm(&mut self) {
        self.deadline = None;
        self.shared.set_timing(Timing::default());
        if self.shared.armed.swap(false, Ordering::SeqCst) {
            debug!("activity monitoring disarmed");
        }
    }

    fn on_interaction(&mut self, kind: Interaction) {
        if self.deadline.is_none() {
            return;
        }
        let Some(config) = *self.config_rx.borrow() else {
            return;
        };
        self.reset_timer(config);
        let now = Instant::now();
        if self
            .last_activity_log
            .is_none_or(|last| now.saturating_duration_since(last) >= ACTIVITY_LOG_THROTTLE)
        {
            debug!(?kind, "user activity, idle timer reset");
            self.last_activity_log = Some(now);
        }
    }

    async fn on_warning_due(&mut self) {
        self.deadline = None;
        let mut timing = self.shared.timing();
        timing.warning_deadline = None;
        self.shared.set_timing(timing);

        let Some(config) = *self.config_rx.borrow() else {
            self.disarm();
            return;
        };
        match self.warn(config).await {
            WarningOutcome::Stay => self.reset_timer(config),
            WarningOutcome::Logout => {
                self.session.logout();
                self.disarm();
            }
        }
    }

    /// Show the warning dialog and race it against the countdown deadline.
    async fn warn(&self, config: ActivityConfig) -> WarningOutcome {
        // the token can outrun the idle timer, e.g. after a suspend
        if self.session.is_token_expired(0) {
            info!("token already expired at warning time, logging out");
            return WarningOutcome::Logout;
        }

        let countdown = Countdown::after(Duration::from_secs(config.warning_countdown_seconds));
        self.shared.warning_shown.store(true, Ordering::SeqCst);
        info!(
            countdown_secs = config.warning_countdown_seconds,
            "showing inactivity warning"
        );
        let choice = tokio::select! {
            choice = self.prompt.show_warning(countdown) => choice,
            () = tokio::time::sleep_until(countdown.deadline()) => {
                info!("warning countdown elapsed without a response");
                Ok(WarningChoice::Logout)
            }
        };
        self.shared.warning_shown.store(false, Ordering::SeqCst);

        match choice {
            Ok(WarningChoice::StayLoggedIn) => {
                // extending is a pure timer reset; an expiring token is the
                // request guard's problem, not grounds for logout
                info!("session extended after inactivity warning");
                WarningOutcome::Stay
            }
            Ok(WarningChoice::Logout) => {
                info!("user chose to log out from inactivity warning");
                WarningOutcome::Logout
            }
            Err(e) => {
                warn!(error = %e, "warning dialog failed, logging out");
                WarningOutcome::Logout
            }
        }
    }
}

async fn idle_timer(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
