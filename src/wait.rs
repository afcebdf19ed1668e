use std::sync::Mutex;
use std::time::{Duration, Instant};

use crossbeam::channel::{Receiver, Sender, TryRecvError, bounded, never, select};
use log::debug;

use crate::backoff::RetryBackoff;
use crate::error::{Result, SwitchoverError};

/// Observes cancellation. Cancellation is a disconnected channel, so every
/// clone of a token sees it and it cannot be missed once it has happened.
#[derive(Clone, Debug)]
pub struct CancelToken {
    rx: Receiver<()>,
}

/// Fires the paired tokens. Dropping it cancels as well.
#[derive(Debug)]
pub struct Canceller {
    tx: Mutex<Option<Sender<()>>>,
}

pub fn cancel_pair() -> (Canceller, CancelToken) {
    let (tx, rx) = bounded(1);
    (
        Canceller {
            tx: Mutex::new(Some(tx)),
        },
        CancelToken { rx },
    )
}

impl Canceller {
    pub fn cancel(&self) {
        if let Ok(mut tx) = self.tx.lock() {
            tx.take();
        }
    }
}

impl CancelToken {
    pub fn never() -> Self {
        Self { rx: never() }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    // Sleep for the given duration, returning true if cancelled in the meantime.
    fn sleep(&self, duration: Duration) -> bool {
        select! {
            recv(self.rx) -> _ => true,
            default(duration) => false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

/// Call `check` until it yields a value, the timeout elapses or the token is
/// cancelled. It is always called at least once.
pub fn poll_until<T>(
    what: &str,
    policy: WaitPolicy,
    cancel: &CancelToken,
    mut check: impl FnMut() -> Option<T>,
) -> Result<T> {
    let start = Instant::now();
    let mut backoff = RetryBackoff::new(policy.interval);
    loop {
        if cancel.is_cancelled() {
            return Err(SwitchoverError::Cancelled { what: what.into() });
        }
        if let Some(value) = check() {
            return Ok(value);
        }
        let elapsed = start.elapsed();
        if elapsed >= policy.timeout {
            return Err(SwitchoverError::Timeout {
                what: what.into(),
                timeout: policy.timeout,
            });
        }
        let delay = backoff.next_delay().min(policy.timeout - elapsed);
        debug!("waiting {:?} for {}", delay, what);
        if cancel.sleep(delay) {
            return Err(SwitchoverError::Cancelled { what: what.into() });
        }
    }
}
