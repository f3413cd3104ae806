use crate::{collector::declared_routes, watch, PodLister, Scope, WorkloadEvent};
use futures::prelude::*;
use route_controller_core::{diff, queue, LoopScheduler, Message, RouteSet, ROUTES_ANNOTATION};
use route_controller_k8s_api::{pod, watcher, ResourceExt, Selector, StatefulSet};
use tokio::task::JoinHandle;
use tracing::{debug, info_span, trace, warn, Instrument};

/// Reacts to changes of a workload's declared routes.
///
/// When routes are removed from a StatefulSet, each of its pods is sent a
/// message that carries its current routes along with the removed ones so
/// they are unregistered without waiting for the next collection pass.
pub struct UriChangeInformer<P> {
    pods: P,
    default_port: i32,
    queue: queue::Sender,
}

/// Which child pods receive a message.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Targets {
    /// Pods that serve traffic: ready and not terminating.
    Serving,
    /// Every pod with an address, including terminating ones.
    All,
}

// === impl UriChangeInformer ===

impl<P: PodLister> UriChangeInformer<P> {
    pub fn new(pods: P, default_port: u16, queue: queue::Sender) -> Self {
        Self {
            pods,
            default_port: default_port.into(),
            queue,
        }
    }

    /// Handles StatefulSet watch events until the scheduler is cancelled.
    pub fn start<S>(self, events: S, scheduler: LoopScheduler) -> JoinHandle<()>
    where
        S: Stream<Item = watcher::Event<StatefulSet>> + Send + 'static,
    {
        watch::spawn(self, events, scheduler)
    }

    pub async fn handle(&self, event: WorkloadEvent<StatefulSet>) {
        match event {
            WorkloadEvent::Updated { old, new } => self.on_update(&old, &new).await,
            WorkloadEvent::Deleted(old) => self.on_delete(&old).await,
        }
    }

    async fn on_update(&self, old: &StatefulSet, new: &StatefulSet) {
        let span = info_span!("update", ns = ?new.namespace(), name = %new.name_any());
        async {
            if old.annotations().get(ROUTES_ANNOTATION) == new.annotations().get(ROUTES_ANNOTATION)
            {
                trace!("Declared routes unchanged");
                return;
            }

            let current = declared_routes(new);
            let removed = diff(&declared_routes(old), &current);
            debug!(routes = current.len(), removed = removed.len(), "Declared routes changed");
            self.emit(new, &current, &removed, Targets::Serving).await;
        }
        .instrument(span)
        .await
    }

    async fn on_delete(&self, old: &StatefulSet) {
        let span = info_span!("delete", ns = ?old.namespace(), name = %old.name_any());
        async {
            let removed = declared_routes(old);
            if removed.is_empty() {
                return;
            }
            debug!(removed = removed.len(), "Unregistering routes of deleted StatefulSet");
            self.emit(old, &RouteSet::default(), &removed, Targets::All).await;
        }
        .instrument(span)
        .await
    }

    /// Sends one message to each of the workload's child pods. If the pods
    /// cannot be listed, nothing is sent.
    async fn emit(
        &self,
        sts: &StatefulSet,
        current: &RouteSet,
        removed: &RouteSet,
        targets: Targets,
    ) {
        if current.is_empty() && removed.is_empty() {
            return;
        }

        let selector = sts
            .spec
            .as_ref()
            .map(|spec| Selector::try_from(spec.selector.clone()));
        let selector = match selector {
            Some(Ok(selector)) if !selector.selects_all() => selector,
            Some(Err(error)) => {
                warn!(%error, "Failed to read StatefulSet selector");
                return;
            }
            _ => {
                warn!("StatefulSet does not select any pods");
                return;
            }
        };

        let scope = Scope::Namespace(sts.namespace().unwrap_or_default());
        let pods = match self.pods.list_pods(&scope, &selector).await {
            Ok(pods) => pods,
            Err(error) => {
                warn!(%error, "Failed to list child pods");
                return;
            }
        };

        for pod in pods.iter() {
            let name = pod.name_any();
            if targets == Targets::Serving && !pod::is_serving(pod) {
                debug!(pod = %name, "Skipping pod that is not serving");
                continue;
            }
            let Some(ip) = pod::ip(pod) else {
                debug!(pod = %name, "Skipping pod without an IP");
                continue;
            };

            let port = pod::first_container_port(pod).unwrap_or(self.default_port);
            let msg = match Message::new(&name, pod::app_name(pod), ip, port) {
                Ok(msg) => msg.with_routes(current, removed),
                Err(error) => {
                    warn!(pod = %name, %error, "Failed to construct route message");
                    continue;
                }
            };
            if self.queue.push(msg).await.is_err() {
                warn!("Work queue closed");
                return;
            }
        }
    }
}

#[async_trait::async_trait]
impl<P: PodLister> watch::HandleEvent<StatefulSet> for UriChangeInformer<P> {
    async fn handle(&self, event: WorkloadEvent<StatefulSet>) {
        UriChangeInformer::handle(self, event).await
    }
}
