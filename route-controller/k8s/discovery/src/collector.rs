use crate::{PodLister, Scope, StatefulSetLister};
use ahash::AHashMap as HashMap;
use anyhow::{Context, Result};
use route_controller_core::{
    decode, queue, Message, RouteSet, Schedule, Task, TickerScheduler, ROUTES_ANNOTATION,
};
use route_controller_k8s_api::{pod, Pod, ResourceExt, Selector, StatefulSet};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

/// Periodically derives the full route set of every running instance.
///
/// Each pass starts from scratch: nothing is carried between passes, so a pass
/// over an unchanged cluster produces the same messages again.
pub struct RouteCollector<P, S> {
    pods: P,
    statefulsets: S,
    scope: Scope,
    selector: Selector,
    default_port: i32,
    queue: queue::Sender,
}

// === impl RouteCollector ===

impl<P: PodLister, S: StatefulSetLister> RouteCollector<P, S> {
    pub fn new(
        pods: P,
        statefulsets: S,
        scope: Scope,
        selector: Selector,
        default_port: u16,
        queue: queue::Sender,
    ) -> Self {
        Self {
            pods,
            statefulsets,
            scope,
            selector,
            default_port: default_port.into(),
            queue,
        }
    }

    /// Runs a collection pass on every tick until the scheduler is cancelled.
    pub fn start(self, scheduler: TickerScheduler) -> JoinHandle<()> {
        scheduler.schedule(self)
    }

    /// Runs one collection pass, pushing one message per routable pod.
    pub async fn collect(&self) -> Result<()> {
        for msg in self.messages().await? {
            if self.queue.push(msg).await.is_err() {
                anyhow::bail!("work queue closed");
            }
        }
        Ok(())
    }

    #[instrument(skip(self), fields(scope = ?self.scope))]
    pub async fn messages(&self) -> Result<Vec<Message>> {
        let pods = self
            .pods
            .list_pods(&self.scope, &self.selector)
            .await
            .context("failed to list pods")?;
        let statefulsets = self
            .statefulsets
            .list_statefulsets(&self.scope, &self.selector)
            .await
            .context("failed to list statefulsets")?;

        let routes = statefulsets
            .iter()
            .map(|sts| (key(sts.namespace(), sts.name_any()), declared_routes(sts)))
            .collect::<HashMap<_, _>>();

        let msgs = pods
            .iter()
            .filter_map(|pod| self.message(pod, &routes))
            .collect::<Vec<_>>();
        debug!(pods = pods.len(), messages = msgs.len(), "Collected routes");
        Ok(msgs)
    }

    fn message(&self, pod: &Pod, routes: &HashMap<(String, String), RouteSet>) -> Option<Message> {
        let name = pod.name_any();
        let Some(owner) = pod::statefulset_owner(pod) else {
            debug!(pod = %name, "Skipping pod without a StatefulSet owner");
            return None;
        };
        let Some(routes) = routes.get(&key(pod.namespace(), owner.name.clone())) else {
            debug!(pod = %name, statefulset = %owner.name, "Skipping pod; StatefulSet not found");
            return None;
        };
        if routes.is_empty() {
            return None;
        }
        if pod::is_terminating(pod) || !pod::is_ready(pod) {
            debug!(pod = %name, "Skipping pod that is not ready");
            return None;
        }
        let Some(ip) = pod::ip(pod) else {
            debug!(pod = %name, "Skipping pod without an IP");
            return None;
        };

        // Pods that declare no container port are routed to the configured
        // default port.
        let port = pod::first_container_port(pod).unwrap_or(self.default_port);
        match Message::new(&name, pod::app_name(pod), ip, port) {
            Ok(msg) => Some(msg.with_routes(routes, &RouteSet::default())),
            Err(error) => {
                warn!(pod = %name, %error, "Failed to construct route message");
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl<P: PodLister, S: StatefulSetLister> Task for RouteCollector<P, S> {
    async fn run(&mut self) -> Result<()> {
        self.collect().await
    }
}

fn key(namespace: Option<String>, name: String) -> (String, String) {
    (namespace.unwrap_or_default(), name)
}

/// Decodes a workload's declared routes. A malformed annotation is logged and
/// treated as declaring no routes.
pub(crate) fn declared_routes(sts: &StatefulSet) -> RouteSet {
    let value = sts.annotations().get(ROUTES_ANNOTATION);
    decode(value.map(String::as_str)).unwrap_or_else(|error| {
        warn!(ns = ?sts.namespace(), name = %sts.name_any(), %error, "Ignoring malformed routes");
        RouteSet::default()
    })
}
