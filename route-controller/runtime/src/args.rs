use crate::{
    core::{queue, LoopScheduler, TickerScheduler},
    discovery::{
        InstanceChangeInformer, KubeLister, NamespaceResolver, RouteCollector, Scope,
        UriChangeInformer,
    },
    k8s::{self, watcher, Selector},
    nats::{Emitter, EmitterMetrics, NatsPublisher},
};
use anyhow::{bail, Context, Result};
use clap::Parser;
use futures::prelude::*;
use prometheus_client::registry::Registry;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(name = "route-controller", about = "Publishes workload routes to the router")]
pub struct Args {
    #[clap(
        long,
        default_value = "route_controller=info,warn",
        env = "ROUTE_CONTROLLER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// The namespace to watch. Defaults to the namespace the controller runs
    /// in.
    #[clap(long, env = "POD_NAMESPACE", default_value = "")]
    namespace: String,

    /// Watches workloads in every namespace unless `--namespace` is set.
    #[clap(long)]
    multi_namespace: bool,

    /// Seconds between full collection passes.
    #[clap(long, default_value = "30")]
    sync_period_secs: u64,

    /// Restricts collection to pods and StatefulSets with these labels.
    #[clap(
        long,
        default_value = "cloudfoundry.org/source_type=APP",
        value_parser = k8s::parse_selector
    )]
    workload_selector: Selector,

    /// The port routed to for pods that declare no container port.
    #[clap(long, default_value = "8080")]
    default_container_port: u16,

    #[clap(long, default_value_t = queue::DEFAULT_CAPACITY)]
    queue_capacity: usize,

    #[clap(long, default_value = "nats://127.0.0.1:4222")]
    nats_addr: String,

    #[clap(long)]
    nats_user: Option<String>,

    #[clap(long, env = "ROUTE_CONTROLLER_NATS_PASSWORD", hide_env_values = true)]
    nats_password: Option<String>,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            namespace,
            multi_namespace,
            sync_period_secs,
            workload_selector,
            default_container_port,
            queue_capacity,
            nats_addr,
            nats_user,
            nats_password,
        } = self;

        if sync_period_secs == 0 {
            bail!("--sync-period-secs must be positive");
        }
        if default_container_port == 0 {
            bail!("--default-container-port must be positive");
        }
        if queue_capacity == 0 {
            bail!("--queue-capacity must be positive");
        }

        // Without a namespace, multi-namespace mode spans the whole cluster.
        let resolver = if multi_namespace {
            NamespaceResolver::multi(&namespace)
        } else {
            NamespaceResolver::single(&namespace)
                .context("--namespace is required unless --multi-namespace is set")?
        };
        let scope = resolver.scope(None)?;

        let mut prom = <Registry>::default();
        let emitter_metrics =
            EmitterMetrics::register(prom.sub_registry_with_prefix("route_emitter"));
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let mut runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        let publisher = NatsPublisher::connect(
            &nats_addr,
            nats_user.as_deref(),
            nats_password.as_deref(),
        )
        .await?;

        let cancel = CancellationToken::new();
        let (queue_tx, queue_rx) = queue::channel(queue_capacity);
        let lister = KubeLister::new(runtime.client());
        let watch_config = if workload_selector.selects_all() {
            watcher::Config::default()
        } else {
            watcher::Config::default().labels(&workload_selector.to_string())
        };

        // Periodically publish the routes of every running instance.
        let collector = RouteCollector::new(
            lister.clone(),
            lister.clone(),
            scope.clone(),
            workload_selector,
            default_container_port,
            queue_tx.clone(),
        );
        let period = Duration::from_secs(sync_period_secs);
        info_span!("collector")
            .in_scope(|| collector.start(TickerScheduler::new(period, cancel.clone())));

        // Unregister routes as soon as they are removed from a workload.
        let statefulsets = match &scope {
            Scope::All => runtime
                .watch_all::<k8s::StatefulSet>(watch_config.clone())
                .boxed(),
            Scope::Namespace(ns) => runtime
                .watch_namespaced::<k8s::StatefulSet>(ns.clone(), watch_config.clone())
                .boxed(),
        };
        let informer =
            UriChangeInformer::new(lister.clone(), default_container_port, queue_tx.clone());
        info_span!("informer")
            .in_scope(|| informer.start(statefulsets, LoopScheduler::new(cancel.clone())));

        // Register and unregister instances as they start and stop serving.
        let pods = match &scope {
            Scope::All => runtime.watch_all::<k8s::Pod>(watch_config).boxed(),
            Scope::Namespace(ns) => runtime.watch_namespaced::<k8s::Pod>(ns.clone(), watch_config).boxed(),
        };
        let instances = InstanceChangeInformer::new(lister, default_container_port, queue_tx);
        info_span!("instances")
            .in_scope(|| instances.start(pods, LoopScheduler::new(cancel.clone())));

        tokio::spawn(
            Emitter::new(publisher, queue_rx, emitter_metrics)
                .run()
                .instrument(info_span!("emitter")),
        );

        let shutdown = runtime.shutdown_handle();
        tokio::spawn(async move {
            let _release = shutdown.signaled().await;
            info!("Shutting down");
            cancel.cancel();
        });

        info!(?scope, "Route controller started");

        // Block the main thread on the shutdown signal.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}
