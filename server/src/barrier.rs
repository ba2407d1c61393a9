//! One-shot start signal shared by every waiting session

use crate::error::{Result, ServerError};
use log::info;
use tokio::sync::watch;

/// Shared "exam started" flag with a broadcast wake-up
///
/// Waiters check the flag and park on the same watch channel, so a trigger
/// that lands between the check and the park is never missed. Once set the
/// flag is never cleared.
#[derive(Debug)]
pub struct StartBarrier {
    started: watch::Sender<bool>,
}

impl Default for StartBarrier {
    fn default() -> Self {
        Self::new()
    }
}

impl StartBarrier {
    pub fn new() -> Self {
        let (started, _) = watch::channel(false);
        Self { started }
    }

    /// Parks the caller until [`StartBarrier::trigger_start`] has fired.
    /// Returns immediately if it already has.
    pub async fn await_start(&self) {
        let mut rx = self.started.subscribe();
        // The sender lives as long as `self`, so the wait cannot fail.
        let _ = rx.wait_for(|started| *started).await;
    }

    /// Sets the flag and wakes every waiter. Fires at most once per run.
    pub fn trigger_start(&self) -> Result<()> {
        let fired = self.started.send_if_modified(|started| {
            if *started {
                false
            } else {
                *started = true;
                true
            }
        });

        if fired {
            info!("Start barrier released");
            Ok(())
        } else {
            Err(ServerError::AlreadyStarted)
        }
    }

    pub fn is_started(&self) -> bool {
        *self.started.borrow()
    }
}
