//! Poll loop driver
//!
//! Keeps the substrate's run loop serviced while a query is live. A tokio
//! task ticks at a fixed cadence; each tick drains the run loop until a
//! service call reports that no source was handled, then waits for the next
//! tick. Notification latency is therefore bounded by one interval.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use spotlight_core::PollConfig;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::{QueryError, QueryResult};
use crate::traits::{RunLoopMode, Substrate};

struct ActiveLoop {
    token: CancellationToken,
    task: JoinHandle<()>,
}

/// One recurring poll timer
pub struct PollDriver {
    substrate: Arc<dyn Substrate>,
    config: PollConfig,
    active: Mutex<Option<ActiveLoop>>,
    ticks: Arc<AtomicU64>,
}

impl PollDriver {
    pub fn new(substrate: Arc<dyn Substrate>, config: PollConfig) -> Self {
        Self {
            substrate,
            config,
            active: Mutex::new(None),
            ticks: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Start ticking. Returns `Ok(false)` if a loop is already running.
    pub fn start(&self) -> QueryResult<bool> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(running) = active.as_ref() {
            if !running.task.is_finished() {
                return Ok(false);
            }
        }

        let handle = Handle::try_current().map_err(|_| QueryError::NoRuntime)?;
        let token = CancellationToken::new();
        let task = handle.spawn(run(
            self.substrate.clone(),
            self.config.clone(),
            token.clone(),
            self.ticks.clone(),
        ));
        tracing::debug!("Poll loop started ({}ms)", self.config.interval_ms);

        *active = Some(ActiveLoop { token, task });
        Ok(true)
    }

    /// Cancel the timer. Returns whether a loop was running.
    ///
    /// Safe to call from a handler running on the loop itself: the current
    /// tick stops draining and no further tick fires.
    pub fn stop(&self) -> bool {
        let stopped = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match stopped {
            Some(running) => {
                running.token.cancel();
                tracing::debug!("Poll loop stopped after {} ticks", self.ticks());
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|running| !running.task.is_finished())
    }

    /// Ticks serviced over the driver's lifetime
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }
}

impl Drop for PollDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run(
    substrate: Arc<dyn Substrate>,
    config: PollConfig,
    token: CancellationToken,
    ticks: Arc<AtomicU64>,
) {
    let mut interval = tokio::time::interval(config.interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = interval.tick() => {}
        }

        ticks.fetch_add(1, Ordering::SeqCst);
        let handled = drain(substrate.as_ref(), config.run_timeout(), &token);
        if handled > 0 {
            tracing::trace!("Poll tick handled {} sources", handled);
        }
    }
}

/// Service the run loop until nothing is handled or the loop is cancelled.
///
/// Returns the number of sources handled.
pub fn drain(substrate: &dyn Substrate, timeout: Duration, token: &CancellationToken) -> usize {
    let mut handled = 0;
    while !token.is_cancelled() {
        let status = substrate.run_once(RunLoopMode::Default, timeout, true);
        if !status.handled_source() {
            break;
        }
        handled += 1;
    }
    handled
}
