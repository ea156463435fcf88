//! Cancellation for timed pipeline stages.
//!
//! A [`CancelHandle`] flips a watch channel; every [`CancelToken`] cloned from
//! it observes the flip at its next suspension point. Dropping the handle
//! without cancelling leaves the tokens running to completion.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, sleep_until};

use crate::error::{ComposerError, Result};

#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx })
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Re-arms the channel so tokens handed out afterwards run again.
    pub fn reset(&self) {
        self.tx.send_replace(false);
    }

    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }
}

impl CancelToken {
    /// A token nobody can cancel.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(ComposerError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sleeps for `duration` unless cancelled first.
    pub async fn pause(&mut self, duration: Duration) -> Result<()> {
        self.check()?;
        if duration.is_zero() {
            return Ok(());
        }
        let deadline = Instant::now() + duration;
        loop {
            tokio::select! {
                _ = sleep_until(deadline) => return Ok(()),
                changed = self.rx.changed() => match changed {
                    Ok(()) => self.check()?,
                    Err(_) => {
                        sleep_until(deadline).await;
                        return Ok(());
                    }
                },
            }
        }
    }
}
