use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use futures::prelude::*;
use route_controller_k8s_api::{watcher::Event, ResourceExt};
use std::collections::VecDeque;

/// A change to a workload, with the state it changed from.
#[derive(Clone, Debug, PartialEq)]
pub enum WorkloadEvent<K> {
    Updated { old: K, new: K },
    Deleted(K),
}

/// Turns a watch of one workload kind into a stream of typed transitions.
///
/// Watches only report an object's new state, so the last-seen state of each
/// object is cached to recover the prior state. Creations only populate the
/// cache. When the watch relists, objects that changed while disconnected are
/// reported as updated and objects that vanished as deleted.
pub struct WorkloadUpdates<K, S> {
    events: S,
    cache: HashMap<(String, String), K>,
    relisted: Option<HashSet<(String, String)>>,
    pending: VecDeque<WorkloadEvent<K>>,
}

// === impl WorkloadUpdates ===

impl<K, S> WorkloadUpdates<K, S>
where
    K: ResourceExt + Clone,
    S: Stream<Item = Event<K>> + Unpin,
{
    pub fn new(events: S) -> Self {
        Self {
            events,
            cache: HashMap::new(),
            relisted: None,
            pending: VecDeque::new(),
        }
    }

    /// Waits for the next workload transition.
    ///
    /// Returns `None` when the underlying watch terminates.
    pub async fn next(&mut self) -> Option<WorkloadEvent<K>> {
        loop {
            if let Some(ev) = self.pending.pop_front() {
                return Some(ev);
            }
            let event = self.events.next().await?;
            self.apply(event);
        }
    }

    fn apply(&mut self, event: Event<K>) {
        match event {
            Event::Init => {
                self.relisted = Some(HashSet::new());
            }
            Event::InitApply(obj) => {
                if let Some(relisted) = self.relisted.as_mut() {
                    relisted.insert(key(&obj));
                }
                self.apply_object(obj);
            }
            Event::InitDone => {
                let Some(relisted) = self.relisted.take() else {
                    return;
                };
                let removed = self
                    .cache
                    .keys()
                    .filter(|k| !relisted.contains(*k))
                    .cloned()
                    .collect::<Vec<_>>();
                for k in removed {
                    if let Some(old) = self.cache.remove(&k) {
                        self.pending.push_back(WorkloadEvent::Deleted(old));
                    }
                }
            }
            Event::Apply(obj) => self.apply_object(obj),
            Event::Delete(obj) => {
                self.cache.remove(&key(&obj));
                self.pending.push_back(WorkloadEvent::Deleted(obj));
            }
        }
    }

    fn apply_object(&mut self, new: K) {
        let Some(old) = self.cache.insert(key(&new), new.clone()) else {
            return;
        };
        if old.resource_version().is_some() && old.resource_version() == new.resource_version() {
            return;
        }
        self.pending.push_back(WorkloadEvent::Updated { old, new });
    }
}

fn key<K: ResourceExt>(obj: &K) -> (String, String) {
    (obj.namespace().unwrap_or_default(), obj.name_any())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use route_controller_k8s_api::{ObjectMeta, StatefulSet};

    fn mk_sts(name: &str, version: &str) -> StatefulSet {
        StatefulSet {
            metadata: ObjectMeta {
                namespace: Some("ns-0".to_string()),
                name: Some(name.to_string()),
                resource_version: Some(version.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    async fn collect(events: Vec<Event<StatefulSet>>) -> Vec<WorkloadEvent<StatefulSet>> {
        let mut updates = WorkloadUpdates::new(stream::iter(events));
        let mut out = Vec::new();
        while let Some(ev) = updates.next().await {
            out.push(ev);
        }
        out
    }

    #[tokio::test]
    async fn creation_is_not_an_update() {
        let out = collect(vec![Event::Apply(mk_sts("web", "1"))]).await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn update_carries_prior_state() {
        let out = collect(vec![
            Event::Apply(mk_sts("web", "1")),
            Event::Apply(mk_sts("web", "2")),
        ])
        .await;
        assert_eq!(
            out,
            vec![WorkloadEvent::Updated {
                old: mk_sts("web", "1"),
                new: mk_sts("web", "2"),
            }]
        );
    }

    #[tokio::test]
    async fn unchanged_relist_is_ignored() {
        let out = collect(vec![
            Event::Init,
            Event::InitApply(mk_sts("web", "1")),
            Event::InitDone,
            Event::Init,
            Event::InitApply(mk_sts("web", "1")),
            Event::InitDone,
        ])
        .await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn relist_reports_missed_changes() {
        let out = collect(vec![
            Event::Init,
            Event::InitApply(mk_sts("web", "1")),
            Event::InitApply(mk_sts("worker", "1")),
            Event::InitDone,
            Event::Init,
            Event::InitApply(mk_sts("web", "5")),
            Event::InitDone,
        ])
        .await;
        assert_eq!(
            out,
            vec![
                WorkloadEvent::Updated {
                    old: mk_sts("web", "1"),
                    new: mk_sts("web", "5"),
                },
                WorkloadEvent::Deleted(mk_sts("worker", "1")),
            ]
        );
    }

    #[tokio::test]
    async fn delete_is_reported() {
        let out = collect(vec![
            Event::Apply(mk_sts("web", "1")),
            Event::Delete(mk_sts("web", "2")),
            Event::Apply(mk_sts("web", "3")),
        ])
        .await;
        assert_eq!(out, vec![WorkloadEvent::Deleted(mk_sts("web", "2"))]);
    }
}
