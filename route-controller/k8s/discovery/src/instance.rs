use crate::{collector::declared_routes, watch, StatefulSetLister, WorkloadEvent};
use futures::prelude::*;
use route_controller_core::{queue, LoopScheduler, Message, RouteSet};
use route_controller_k8s_api::{pod, watcher, Pod, ResourceExt};
use tokio::task::JoinHandle;
use tracing::{debug, info_span, trace, warn, Instrument};

/// Reacts to pods starting and stopping to serve traffic.
///
/// A pod's routes are registered as soon as it becomes ready and unregistered
/// as soon as it stops being ready, is marked for deletion, or is deleted, so
/// instances do not wait for the next collection pass.
pub struct InstanceChangeInformer<S> {
    statefulsets: S,
    default_port: i32,
    queue: queue::Sender,
}

// === impl InstanceChangeInformer ===

impl<S: StatefulSetLister> InstanceChangeInformer<S> {
    pub fn new(statefulsets: S, default_port: u16, queue: queue::Sender) -> Self {
        Self {
            statefulsets,
            default_port: default_port.into(),
            queue,
        }
    }

    /// Handles pod watch events until the scheduler is cancelled.
    pub fn start<E>(self, events: E, scheduler: LoopScheduler) -> JoinHandle<()>
    where
        E: Stream<Item = watcher::Event<Pod>> + Send + 'static,
    {
        watch::spawn(self, events, scheduler)
    }

    pub async fn handle(&self, event: WorkloadEvent<Pod>) {
        match event {
            WorkloadEvent::Updated { old, new } => {
                let span = info_span!("update", ns = ?new.namespace(), pod = %new.name_any());
                self.on_update(&old, &new).instrument(span).await
            }
            WorkloadEvent::Deleted(old) => {
                let span = info_span!("delete", ns = ?old.namespace(), pod = %old.name_any());
                self.on_delete(&old).instrument(span).await
            }
        }
    }

    async fn on_update(&self, old: &Pod, new: &Pod) {
        if pod::is_serving(new) {
            let Some(routes) = self.routes(new).await else {
                return;
            };
            self.emit(new, pod::ip(new), &routes, &RouteSet::default()).await;
            return;
        }

        if !pod::is_serving(old) {
            trace!("Pod is not serving");
            return;
        }

        debug!(
            terminating = pod::is_terminating(new),
            ready = pod::is_ready(new),
            "Pod stopped serving"
        );
        let Some(routes) = self.routes(new).await else {
            return;
        };
        // The address may already be released; unregister the one the pod
        // was serving on.
        let ip = pod::ip(new).or_else(|| pod::ip(old));
        self.emit(new, ip, &RouteSet::default(), &routes).await;
    }

    async fn on_delete(&self, old: &Pod) {
        let Some(routes) = self.routes(old).await else {
            return;
        };
        self.emit(old, pod::ip(old), &RouteSet::default(), &routes).await;
    }

    /// The routes declared by the pod's StatefulSet, if it has any.
    async fn routes(&self, pod: &Pod) -> Option<RouteSet> {
        let Some(owner) = pod::statefulset_owner(pod) else {
            debug!("Skipping pod without a StatefulSet owner");
            return None;
        };
        let ns = pod.namespace().unwrap_or_default();
        let sts = match self.statefulsets.get_statefulset(&ns, &owner.name).await {
            Ok(Some(sts)) => sts,
            Ok(None) => {
                debug!(statefulset = %owner.name, "Skipping pod; StatefulSet not found");
                return None;
            }
            Err(error) => {
                warn!(statefulset = %owner.name, %error, "Failed to get StatefulSet");
                return None;
            }
        };
        let routes = declared_routes(&sts);
        if routes.is_empty() {
            trace!(statefulset = %owner.name, "StatefulSet declares no routes");
            return None;
        }
        Some(routes)
    }

    async fn emit(&self, pod: &Pod, ip: Option<&str>, current: &RouteSet, removed: &RouteSet) {
        let Some(ip) = ip else {
            debug!("Skipping pod without an IP");
            return;
        };
        let name = pod.name_any();
        let port = pod::first_container_port(pod).unwrap_or(self.default_port);
        let msg = match Message::new(&name, pod::app_name(pod), ip, port) {
            Ok(msg) => msg.with_routes(current, removed),
            Err(error) => {
                warn!(%error, "Failed to construct route message");
                return;
            }
        };
        if self.queue.push(msg).await.is_err() {
            warn!("Work queue closed");
        }
    }
}

#[async_trait::async_trait]
impl<S: StatefulSetLister> watch::HandleEvent<Pod> for InstanceChangeInformer<S> {
    async fn handle(&self, event: WorkloadEvent<Pod>) {
        InstanceChangeInformer::handle(self, event).await
    }
}
