//! Runs a task repeatedly until cancelled.
//!
//! Task failures are logged and never stop the schedule. Cancellation is
//! observed between iterations only; a task that is already running is never
//! interrupted.

use std::future::Future;
use tokio::{
    task::JoinHandle,
    time::{self, Duration, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// A unit of work that is invoked once per iteration of a schedule.
#[async_trait::async_trait]
pub trait Task: Send + 'static {
    async fn run(&mut self) -> anyhow::Result<()>;
}

pub trait Schedule {
    /// Spawns `task` onto the runtime, in the current span, and returns
    /// immediately.
    fn schedule<T: Task>(self, task: T) -> JoinHandle<()>;
}

/// Invokes a task once per period.
///
/// The task runs inline in the timer loop, so ticks that elapse while it is
/// still running are skipped rather than queued. The first tick completes
/// immediately.
#[derive(Clone, Debug)]
pub struct TickerScheduler {
    period: Duration,
    cancel: CancellationToken,
}

/// Invokes a task back-to-back with no delay.
///
/// Intended for tasks that block on their own input, e.g. a channel or a
/// watch stream.
#[derive(Clone, Debug)]
pub struct LoopScheduler {
    cancel: CancellationToken,
}

/// Adapts a closure that returns a future into a [`Task`].
#[derive(Clone, Debug)]
pub struct FnTask<F>(F);

pub fn task_fn<F, Fut>(f: F) -> FnTask<F>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    FnTask(f)
}

#[async_trait::async_trait]
impl<F, Fut> Task for FnTask<F>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn run(&mut self) -> anyhow::Result<()> {
        (self.0)().await
    }
}

// === impl TickerScheduler ===

impl TickerScheduler {
    pub fn new(period: Duration, cancel: CancellationToken) -> Self {
        Self { period, cancel }
    }
}

impl Schedule for TickerScheduler {
    fn schedule<T: Task>(self, mut task: T) -> JoinHandle<()> {
        let Self { period, cancel } = self;
        tokio::spawn(
            async move {
                let mut timer = time::interval(period);
                timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = timer.tick() => {}
                    }
                    if let Err(error) = task.run().await {
                        tracing::warn!(%error, "Scheduled task failed");
                    }
                }
                tracing::debug!("Ticker schedule cancelled");
            }
            .in_current_span(),
        )
    }
}

// === impl LoopScheduler ===

impl LoopScheduler {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    /// The token that stops this schedule, for tasks that must also stop
    /// waiting on their input when it fires.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl Schedule for LoopScheduler {
    fn schedule<T: Task>(self, mut task: T) -> JoinHandle<()> {
        let Self { cancel } = self;
        tokio::spawn(
            async move {
                while !cancel.is_cancelled() {
                    if let Err(error) = task.run().await {
                        tracing::warn!(%error, "Scheduled task failed");
                    }
                    // Yield so a task that never blocks cannot starve the runtime.
                    tokio::task::yield_now().await;
                }
                tracing::debug!("Loop schedule cancelled");
            }
            .in_current_span(),
        )
    }
}
