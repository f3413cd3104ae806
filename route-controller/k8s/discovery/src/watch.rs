use crate::{WorkloadEvent, WorkloadUpdates};
use anyhow::Result;
use futures::{prelude::*, stream::BoxStream};
use route_controller_core::{LoopScheduler, Schedule, Task};
use route_controller_k8s_api::{watcher, ResourceExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Reacts to the transitions of one workload kind.
#[async_trait::async_trait]
pub(crate) trait HandleEvent<K>: Send + Sync + 'static {
    async fn handle(&self, event: WorkloadEvent<K>);
}

/// Handles one transition per iteration.
struct WatchTask<H, K> {
    handler: H,
    updates: WorkloadUpdates<K, BoxStream<'static, watcher::Event<K>>>,
    cancel: CancellationToken,
}

/// Feeds `events` to `handler` until the scheduler is cancelled.
///
/// Waiting for the next event stops as soon as the schedule is cancelled; a
/// transition that is already being handled is finished first.
pub(crate) fn spawn<H, K, S>(handler: H, events: S, scheduler: LoopScheduler) -> JoinHandle<()>
where
    H: HandleEvent<K>,
    K: ResourceExt + Clone + Send + Sync + 'static,
    S: Stream<Item = watcher::Event<K>> + Send + 'static,
{
    let cancel = scheduler.cancel_token().clone();
    let events = events.take_until(cancel.clone().cancelled_owned()).boxed();
    scheduler.schedule(WatchTask {
        handler,
        updates: WorkloadUpdates::new(events),
        cancel,
    })
}

#[async_trait::async_trait]
impl<H, K> Task for WatchTask<H, K>
where
    H: HandleEvent<K>,
    K: ResourceExt + Clone + Send + Sync + 'static,
{
    async fn run(&mut self) -> Result<()> {
        if let Some(event) = self.updates.next().await {
            self.handler.handle(event).await;
            return Ok(());
        }

        if !self.cancel.is_cancelled() {
            // A terminated watch never yields again. Wait for shutdown instead
            // of letting the schedule spin.
            tracing::error!("Watch terminated");
            self.cancel.cancelled().await;
        }
        Ok(())
    }
}
