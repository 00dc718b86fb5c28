//! Cooperative poll loop: receive, handle, delete, sleep.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::traits::QueueClient;
use super::types::Message;
use crate::error::Result;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Counters reported when a listener stops.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ListenerStats {
    pub polls: u64,
    pub handled: u64,
    pub failed: u64,
}

/// Single-consumer listener over one queue.
///
/// A message is deleted only after the handler returns `Ok`. Handler errors
/// are logged and the message is left for backend redelivery.
pub struct QueueListener {
    queue: Arc<dyn QueueClient>,
    interval: Duration,
    max_polls: Option<u64>,
    shutdown: Arc<AtomicBool>,
}

impl QueueListener {
    pub fn new(queue: Arc<dyn QueueClient>) -> Self {
        QueueListener {
            queue,
            interval: DEFAULT_POLL_INTERVAL,
            max_polls: None,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Stop after this many polls.
    pub fn with_max_polls(mut self, max_polls: u64) -> Self {
        self.max_polls = Some(max_polls);
        self
    }

    /// Flag that stops the loop at its next iteration when set.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Run until shut down or the poll budget is spent.
    ///
    /// # Errors
    ///
    /// Backend errors from receive or delete stop the loop and are returned.
    pub fn run<F>(&self, mut handler: F) -> Result<ListenerStats>
    where
        F: FnMut(&Message) -> Result<()>,
    {
        let mut stats = ListenerStats::default();
        tracing::info!(
            queue = self.queue.name(),
            interval_ms = self.interval.as_millis() as u64,
            "listener started"
        );

        while !self.shutdown.load(Ordering::SeqCst) {
            if self.max_polls.is_some_and(|max| stats.polls >= max) {
                break;
            }
            stats.polls += 1;

            if let Some(message) = self.queue.receive_message()? {
                match handler(&message) {
                    Ok(()) => {
                        self.queue.delete_message(&message.handle)?;
                        stats.handled += 1;
                    }
                    Err(err) => {
                        stats.failed += 1;
                        tracing::error!(handle = %message.handle, error = %err, "message handler failed");
                    }
                }
            }

            if !self.interval.is_zero() {
                thread::sleep(self.interval);
            }
        }

        tracing::info!(?stats, "listener stopped");
        Ok(stats)
    }
}
