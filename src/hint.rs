//! Hint timer: one-shot idle countdown per question.
//!
//! Arming while armed resets the countdown, so at most one fire is
//! pending at any time. Fires are delivered through the session event
//! queue rather than a callback, which keeps timer handling serialized
//! with everything else the session does.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::session::SessionEvent;

pub struct HintTimer {
    interval: Duration,
    events: mpsc::Sender<SessionEvent>,
    pending: Option<JoinHandle<()>>,
}

impl HintTimer {
    pub fn new(interval: Duration, events: mpsc::Sender<SessionEvent>) -> Self {
        Self {
            interval,
            events,
            pending: None,
        }
    }

    /// Starts (or restarts) the countdown for the current question.
    pub fn arm(&mut self) {
        self.disarm();
        let interval = self.interval;
        let events = self.events.clone();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            // The session may already be tearing down; a closed queue
            // just means the fire has nowhere to go.
            let _ = events.send(SessionEvent::HintTimerFired).await;
        }));
    }

    /// Cancels any pending fire. Idempotent.
    pub fn disarm(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.pending
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for HintTimer {
    fn drop(&mut self) {
        self.disarm();
    }
}
