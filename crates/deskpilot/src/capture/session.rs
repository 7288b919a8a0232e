//! Scoped "native window + event loop on a dedicated thread" sessions.
//!
//! The call that starts a session owns it. The body publishes at most one
//! result; the owner waits with a timeout. Every exit path (result, body
//! returning early, timeout, drop) cancels the token and reaps the thread.

use crate::errors::{AutomationError, Result};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::thread;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long teardown waits for the session thread before detaching it.
const JOIN_GRACE: Duration = Duration::from_secs(2);

/// Handed to the session body on its own thread.
pub struct SessionContext<T> {
    cancel: CancellationToken,
    result: SyncSender<T>,
}

impl<T> SessionContext<T> {
    /// Loops should poll this at least every ~50 ms.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Publish the session result. Only the first value is kept.
    pub fn publish(&self, value: T) -> bool {
        self.result.try_send(value).is_ok()
    }
}

pub struct CaptureSession<T> {
    name: &'static str,
    cancel: CancellationToken,
    result: Receiver<T>,
    handle: Option<thread::JoinHandle<()>>,
}

impl<T: Send + 'static> CaptureSession<T> {
    pub fn start<F>(name: &'static str, body: F) -> Result<Self>
    where
        F: FnOnce(&SessionContext<T>) + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::sync_channel(1);
        let ctx = SessionContext {
            cancel: cancel.clone(),
            result: tx,
        };

        let handle = thread::Builder::new()
            .name(format!("deskpilot-{name}"))
            .spawn(move || {
                body(&ctx);
                // Dropping ctx closes the channel, waking a waiter with no result.
            })
            .map_err(|e| {
                AutomationError::PlatformError(format!("failed to start {name} session: {e}"))
            })?;

        debug!("{} session started", name);
        Ok(Self {
            name,
            cancel,
            result: rx,
            handle: Some(handle),
        })
    }
}

impl<T> CaptureSession<T> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Block until the body publishes, exits, or `timeout` passes. The
    /// session is torn down in every case.
    pub fn wait(self, timeout: Duration) -> Option<T> {
        match self.result.recv_timeout(timeout) {
            Ok(value) => {
                debug!("{} session produced a result", self.name);
                Some(value)
            }
            Err(RecvTimeoutError::Timeout) => {
                info!("{} session timed out after {:?}", self.name, timeout);
                None
            }
            Err(RecvTimeoutError::Disconnected) => {
                debug!("{} session ended without a result", self.name);
                None
            }
        }
    }

    /// Like [`wait`](Self::wait) but bounded by an absolute deadline.
    pub fn wait_until(self, deadline: Instant) -> Option<T> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        self.wait(remaining)
    }
}

impl<T> Drop for CaptureSession<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
        let Some(handle) = self.handle.take() else {
            return;
        };
        let started = Instant::now();
        while !handle.is_finished() && started.elapsed() < JOIN_GRACE {
            thread::sleep(Duration::from_millis(10));
        }
        if handle.is_finished() {
            let _ = handle.join();
            debug!("{} session torn down", self.name);
        } else {
            warn!(
                "{} session did not stop within {:?}; detaching",
                self.name, JOIN_GRACE
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn result_is_delivered_once() {
        let session = CaptureSession::start("test-publish", |ctx| {
            assert!(ctx.publish(7));
            assert!(!ctx.publish(8));
        })
        .unwrap();
        assert_eq!(session.wait(Duration::from_secs(5)), Some(7));
    }

    #[test]
    fn timeout_cancels_and_joins_the_body() {
        let stopped = Arc::new(AtomicBool::new(false));
        let flag = stopped.clone();
        let session = CaptureSession::<u32>::start("test-timeout", move |ctx| {
            while !ctx.is_cancelled() {
                thread::sleep(Duration::from_millis(5));
            }
            flag.store(true, Ordering::SeqCst);
        })
        .unwrap();

        let started = Instant::now();
        assert_eq!(session.wait(Duration::from_millis(50)), None);
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[test]
    fn body_exiting_without_result_wakes_waiter() {
        let session = CaptureSession::<String>::start("test-empty", |_ctx| {}).unwrap();
        let started = Instant::now();
        assert_eq!(session.wait(Duration::from_secs(30)), None);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn dropping_the_session_cancels_it() {
        let stopped = Arc::new(AtomicBool::new(false));
        let flag = stopped.clone();
        let session = CaptureSession::<()>::start("test-drop", move |ctx| {
            while !ctx.is_cancelled() {
                thread::sleep(Duration::from_millis(5));
            }
            flag.store(true, Ordering::SeqCst);
        })
        .unwrap();
        assert!(!session.is_finished());
        drop(session);
        assert!(stopped.load(Ordering::SeqCst));
    }
}
