use super::*;
use crate::{UriChangeInformer, WorkloadEvent};
use route_controller_core::{queue, LoopScheduler};
use route_controller_k8s_api::watcher::Event;
use tokio::{sync::mpsc, time};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

const DEFAULT_PORT: u16 = 8080;

fn mk_informer(cluster: &FakeCluster) -> (UriChangeInformer<FakeCluster>, queue::Receiver) {
    let (tx, rx) = queue::channel(16);
    (UriChangeInformer::new(cluster.clone(), DEFAULT_PORT, tx), rx)
}

fn drain(rx: &mut queue::Receiver) -> Vec<Message> {
    std::iter::from_fn(|| rx.try_recv()).collect()
}

fn update(old: &[&str], new: &[&str]) -> WorkloadEvent<k8s::StatefulSet> {
    WorkloadEvent::Updated {
        old: mk_statefulset("web", Some(routes_json(old))),
        new: mk_statefulset("web", Some(routes_json(new))),
    }
}

fn two_pods() -> Vec<k8s::Pod> {
    vec![
        mk_pod("p1", "web", "10.0.0.1", &[8080]),
        mk_pod("p2", "web", "10.0.0.2", &[8080]),
    ]
}

#[tokio::test]
async fn removed_routes_are_unregistered_on_every_pod() {
    init_tracing();
    let cluster = FakeCluster::with(two_pods(), vec![]);
    let (informer, mut rx) = mk_informer(&cluster);

    informer.handle(update(&["a", "b", "c"], &["b", "c", "d"])).await;

    let msgs = drain(&mut rx);
    assert_eq!(
        msgs.iter().map(|m| m.instance_id.as_str()).collect::<Vec<_>>(),
        vec!["p1", "p2"],
        "messages must be emitted in pod order"
    );
    for msg in &msgs {
        assert_eq!(routes(msg), vec!["b", "c", "d"]);
        assert_eq!(unregistered(msg), vec!["a"]);
    }
}

#[tokio::test]
async fn removing_every_route() {
    init_tracing();
    let cluster = FakeCluster::with(two_pods(), vec![]);
    let (informer, mut rx) = mk_informer(&cluster);

    informer.handle(update(&["foo.example.com"], &[])).await;

    let msgs = drain(&mut rx);
    assert_eq!(msgs.len(), 2);
    for msg in &msgs {
        assert!(routes(msg).is_empty());
        assert_eq!(unregistered(msg), vec!["foo.example.com"]);
    }
}

#[tokio::test]
async fn routes_are_never_both_registered_and_unregistered() {
    init_tracing();
    let cluster = FakeCluster::with(two_pods(), vec![]);
    let (informer, mut rx) = mk_informer(&cluster);

    informer.handle(update(&["a", "b"], &["b", "c"])).await;
    informer.handle(update(&["x"], &["x", "y"])).await;

    for msg in drain(&mut rx) {
        assert!(msg
            .unregistered_routes
            .iter()
            .all(|r| !msg.routes.contains(r)));
    }
}

#[tokio::test]
async fn unchanged_routes_are_ignored() {
    init_tracing();
    let cluster = FakeCluster::with(two_pods(), vec![]);
    let (informer, mut rx) = mk_informer(&cluster);

    let mut new = mk_statefulset("web", Some(routes_json(&["a"])));
    new.metadata.resource_version = Some("2".to_string());
    informer
        .handle(WorkloadEvent::Updated {
            old: mk_statefulset("web", Some(routes_json(&["a"]))),
            new,
        })
        .await;

    assert!(drain(&mut rx).is_empty());
    assert_eq!(cluster.pod_lists(), 0, "pods must not be listed");
}

#[tokio::test]
async fn malformed_old_routes_are_treated_as_empty() {
    init_tracing();
    let cluster = FakeCluster::with(two_pods(), vec![]);
    let (informer, mut rx) = mk_informer(&cluster);

    informer
        .handle(WorkloadEvent::Updated {
            old: mk_statefulset("web", Some("{invalid json".to_string())),
            new: mk_statefulset("web", Some(routes_json(&["a"]))),
        })
        .await;

    let msgs = drain(&mut rx);
    assert_eq!(msgs.len(), 2);
    for msg in &msgs {
        assert_eq!(routes(msg), vec!["a"]);
        assert!(unregistered(msg).is_empty());
    }
}

#[tokio::test]
async fn failing_to_list_pods_drops_the_update() {
    init_tracing();
    let cluster = FakeCluster::with(two_pods(), vec![]);
    let (informer, mut rx) = mk_informer(&cluster);

    cluster.fail_pods(true);
    informer.handle(update(&["a"], &["b"])).await;
    assert!(drain(&mut rx).is_empty());

    cluster.fail_pods(false);
    informer.handle(update(&["b"], &["c"])).await;
    assert_eq!(drain(&mut rx).len(), 2);
}

#[tokio::test]
async fn a_bad_pod_does_not_abort_the_batch() {
    init_tracing();
    let cluster = FakeCluster::with(
        vec![
            mk_pod("p1", "web", "10.0.0.1", &[-1]),
            mk_pod("p2", "web", "10.0.0.2", &[8080]),
            mk_pod("p3", "web", "", &[8080]),
            mk_pod("p4", "web", "10.0.0.4", &[]),
        ],
        vec![],
    );
    let (informer, mut rx) = mk_informer(&cluster);

    informer.handle(update(&["a"], &["b"])).await;

    let msgs = drain(&mut rx);
    assert_eq!(
        msgs.iter()
            .map(|m| (m.instance_id.as_str(), m.port))
            .collect::<Vec<_>>(),
        vec![("p2", 8080), ("p4", DEFAULT_PORT)]
    );
}

#[tokio::test]
async fn only_serving_pods_receive_updates() {
    init_tracing();
    let mut unready = mk_pod("p2", "web", "10.0.0.2", &[8080]);
    set_ready(&mut unready, false);
    let other = mk_pod("p3", "other", "10.0.0.3", &[8080]);
    let cluster = FakeCluster::with(
        vec![mk_pod("p1", "web", "10.0.0.1", &[8080]), unready, other],
        vec![],
    );
    let (informer, mut rx) = mk_informer(&cluster);

    informer.handle(update(&["a"], &["b"])).await;

    let msgs = drain(&mut rx);
    assert_eq!(msgs.len(), 1);
    assert_eq!(msgs[0].instance_id, "p1");
}

#[tokio::test]
async fn deleted_statefulset_unregisters_all_routes() {
    init_tracing();
    let mut terminating = mk_pod("p2", "web", "10.0.0.2", &[8080]);
    terminating.metadata.deletion_timestamp = Some(deletion_time());
    let cluster = FakeCluster::with(
        vec![mk_pod("p1", "web", "10.0.0.1", &[8080]), terminating],
        vec![],
    );
    let (informer, mut rx) = mk_informer(&cluster);

    informer
        .handle(WorkloadEvent::Deleted(mk_statefulset(
            "web",
            Some(routes_json(&["a", "b"])),
        )))
        .await;

    let msgs = drain(&mut rx);
    assert_eq!(msgs.len(), 2);
    for msg in &msgs {
        assert!(routes(msg).is_empty());
        assert_eq!(unregistered(msg), vec!["a", "b"]);
    }
}

#[tokio::test]
async fn watch_events_are_handled_until_cancelled() {
    init_tracing();
    let cluster = FakeCluster::with(two_pods(), vec![]);
    let (informer, mut rx) = mk_informer(&cluster);
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let task = informer.start(
        UnboundedReceiverStream::new(events_rx),
        LoopScheduler::new(cancel.clone()),
    );

    let mut sts = mk_statefulset("web", Some(routes_json(&["a"])));
    sts.metadata.resource_version = Some("1".to_string());
    events_tx.send(Event::Apply(sts)).unwrap();

    // A failed update is dropped and the informer keeps going.
    cluster.fail_pods(true);
    let mut updated = mk_statefulset("web", Some(routes_json(&["b"])));
    updated.metadata.resource_version = Some("2".to_string());
    events_tx.send(Event::Apply(updated)).unwrap();
    time::timeout(time::Duration::from_secs(5), async {
        while cluster.pod_lists() == 0 {
            time::sleep(time::Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("pods must be listed");
    assert!(rx.try_recv().is_none());

    cluster.fail_pods(false);
    let mut updated = mk_statefulset("web", Some(routes_json(&["c"])));
    updated.metadata.resource_version = Some("3".to_string());
    events_tx.send(Event::Apply(updated)).unwrap();

    for pod in ["p1", "p2"] {
        let msg = time::timeout(time::Duration::from_secs(5), rx.recv())
            .await
            .expect("message must be emitted")
            .expect("queue must be open");
        assert_eq!(msg.instance_id, pod);
        assert_eq!(routes(&msg), vec!["c"]);
        assert_eq!(unregistered(&msg), vec!["b"]);
    }

    cancel.cancel();
    time::timeout(time::Duration::from_secs(5), task)
        .await
        .expect("informer must stop")
        .expect("informer must not panic");
    drop(events_tx);
}

#[tokio::test(start_paused = true)]
async fn idle_informer_stops_when_cancelled() {
    init_tracing();
    let cluster = FakeCluster::with(two_pods(), vec![]);
    let (informer, _rx) = mk_informer(&cluster);
    let (events_tx, events_rx) = mpsc::unbounded_channel::<Event<k8s::StatefulSet>>();
    let cancel = CancellationToken::new();
    let task = informer.start(
        UnboundedReceiverStream::new(events_rx),
        LoopScheduler::new(cancel.clone()),
    );

    // Let the informer block on the watch.
    time::sleep(time::Duration::from_millis(10)).await;
    cancel.cancel();

    time::timeout(time::Duration::from_secs(2), task)
        .await
        .expect("informer must stop while waiting for events")
        .expect("informer must not panic");
    drop(events_tx);
}

#[tokio::test(start_paused = true)]
async fn terminated_watch_waits_for_cancellation() {
    init_tracing();
    let cluster = FakeCluster::with(two_pods(), vec![]);
    let (informer, _rx) = mk_informer(&cluster);
    let (events_tx, events_rx) = mpsc::unbounded_channel::<Event<k8s::StatefulSet>>();
    let cancel = CancellationToken::new();
    let mut task = informer.start(
        UnboundedReceiverStream::new(events_rx),
        LoopScheduler::new(cancel.clone()),
    );

    drop(events_tx);
    time::timeout(time::Duration::from_secs(60), &mut task)
        .await
        .expect_err("informer must wait for cancellation");

    cancel.cancel();
    time::timeout(time::Duration::from_secs(2), task)
        .await
        .expect("informer must stop")
        .expect("informer must not panic");
}
