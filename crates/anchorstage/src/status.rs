//! Status message overlay
//!
//! The controller owns the overlay on its own task: every show, schedule
//! and cancel goes through its channel, so messages are never interleaved.
//! Shown messages hide themselves after the display duration; scheduled
//! messages are keyed by [`MessageKind`] and a new one replaces any pending
//! message of the same kind.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::error::{Result, StageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    TrackingStateEscalation,
    ContentPlacement,
    PlaneEstimation,
    FocusSquare,
}

/// Where status text ends up
pub trait StatusOverlay: Send + 'static {
    fn show(&mut self, text: &str);
    fn hide(&mut self);
}

#[derive(Debug)]
enum StatusCommand {
    Show { text: String, auto_hide: bool },
    Schedule {
        text: String,
        delay: Duration,
        kind: MessageKind,
    },
    Cancel(MessageKind),
    CancelAll,
}

/// Sending half of the status controller
#[derive(Debug, Clone)]
pub struct StatusHandle {
    tx: mpsc::Sender<StatusCommand>,
}

impl StatusHandle {
    async fn send(&self, command: StatusCommand) -> Result<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| StageError::StatusClosed)
    }

    pub async fn show(&self, text: impl Into<String>, auto_hide: bool) -> Result<()> {
        self.send(StatusCommand::Show {
            text: text.into(),
            auto_hide,
        })
        .await
    }

    pub async fn schedule(
        &self,
        text: impl Into<String>,
        delay: Duration,
        kind: MessageKind,
    ) -> Result<()> {
        self.send(StatusCommand::Schedule {
            text: text.into(),
            delay,
            kind,
        })
        .await
    }

    pub async fn cancel_scheduled(&self, kind: MessageKind) -> Result<()> {
        self.send(StatusCommand::Cancel(kind)).await
    }

    pub async fn cancel_all_scheduled(&self) -> Result<()> {
        self.send(StatusCommand::CancelAll).await
    }
}

pub struct StatusController {
    overlay: Box<dyn StatusOverlay>,
    display: Duration,
    scheduled: HashMap<MessageKind, (Instant, String)>,
    hide_at: Option<Instant>,
}

impl StatusController {
    pub fn new(overlay: Box<dyn StatusOverlay>, display: Duration) -> Self {
        Self {
            overlay,
            display,
            scheduled: HashMap::new(),
            hide_at: None,
        }
    }

    /// Start the controller task
    pub fn spawn(self, capacity: usize) -> (StatusHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let task = tokio::spawn(self.run(rx));
        (StatusHandle { tx }, task)
    }

    async fn run(mut self, mut rx: mpsc::Receiver<StatusCommand>) {
        loop {
            let deadline = self.next_deadline();
            tokio::select! {
                command = rx.recv() => match command {
                    Some(command) => self.apply(command),
                    None => break,
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.fire_due(Instant::now());
                }
            }
        }
        tracing::debug!("Status controller stopped");
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.scheduled
            .values()
            .map(|(at, _)| *at)
            .chain(self.hide_at)
            .min()
    }

    fn apply(&mut self, command: StatusCommand) {
        match command {
            StatusCommand::Show { text, auto_hide } => self.show(&text, auto_hide),
            StatusCommand::Schedule { text, delay, kind } => {
                if self
                    .scheduled
                    .insert(kind, (Instant::now() + delay, text))
                    .is_some()
                {
                    tracing::trace!("Replaced pending {:?} message", kind);
                }
            }
            StatusCommand::Cancel(kind) => {
                self.scheduled.remove(&kind);
            }
            StatusCommand::CancelAll => self.scheduled.clear(),
        }
    }

    fn show(&mut self, text: &str, auto_hide: bool) {
        self.overlay.show(text);
        self.hide_at = auto_hide.then(|| Instant::now() + self.display);
    }

    fn fire_due(&mut self, now: Instant) {
        if self.hide_at.is_some_and(|at| at <= now) {
            self.hide_at = None;
            self.overlay.hide();
        }

        let mut due: Vec<(Instant, MessageKind)> = self
            .scheduled
            .iter()
            .filter(|(_, (at, _))| *at <= now)
            .map(|(kind, (at, _))| (*at, *kind))
            .collect();
        due.sort_by_key(|(at, _)| *at);

        for (_, kind) in due {
            if let Some((_, text)) = self.scheduled.remove(&kind) {
                self.show(&text, true);
            }
        }
    }
}

#[derive(Debug, Default)]
struct MessageLogState {
    current: Option<String>,
    history: Vec<String>,
}

/// Overlay that records messages and mirrors them to the log
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    state: Arc<Mutex<MessageLogState>>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MessageLogState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Text currently on screen
    pub fn current(&self) -> Option<String> {
        self.state().current.clone()
    }

    /// Every message shown so far, oldest first
    pub fn history(&self) -> Vec<String> {
        self.state().history.clone()
    }
}

impl StatusOverlay for MessageLog {
    fn show(&mut self, text: &str) {
        tracing::info!("Status: {}", text);
        let mut state = self.state();
        state.current = Some(text.to_string());
        state.history.push(text.to_string());
    }

    fn hide(&mut self) {
        tracing::trace!("Status hidden");
        self.state().current = None;
    }
}
