use crate::Scope;
use anyhow::Result;
use route_controller_k8s_api::{self as k8s, Api, ListParams, Pod, Selector, StatefulSet};

/// Lists pods from the cluster.
#[async_trait::async_trait]
pub trait PodLister: Send + Sync + 'static {
    async fn list_pods(&self, scope: &Scope, selector: &Selector) -> Result<Vec<Pod>>;
}

/// Reads StatefulSets from the cluster.
#[async_trait::async_trait]
pub trait StatefulSetLister: Send + Sync + 'static {
    async fn list_statefulsets(&self, scope: &Scope, selector: &Selector)
        -> Result<Vec<StatefulSet>>;

    /// Looks up one StatefulSet, returning `None` when it does not exist.
    async fn get_statefulset(&self, namespace: &str, name: &str) -> Result<Option<StatefulSet>>;
}

/// Lists resources with the Kubernetes API.
#[derive(Clone)]
pub struct KubeLister(k8s::Client);

// === impl KubeLister ===

impl KubeLister {
    pub fn new(client: k8s::Client) -> Self {
        Self(client)
    }

    fn api<K>(&self, scope: &Scope) -> Api<K>
    where
        K: k8s::Resource<Scope = k8s::NamespaceResourceScope>,
        K::DynamicType: Default,
    {
        match scope {
            Scope::All => Api::all(self.0.clone()),
            Scope::Namespace(ns) => Api::namespaced(self.0.clone(), ns),
        }
    }
}

fn list_params(selector: &Selector) -> ListParams {
    let params = ListParams::default();
    if selector.selects_all() {
        return params;
    }
    params.labels_from(selector)
}

#[async_trait::async_trait]
impl PodLister for KubeLister {
    async fn list_pods(&self, scope: &Scope, selector: &Selector) -> Result<Vec<Pod>> {
        let pods = self.api::<Pod>(scope).list(&list_params(selector)).await?;
        Ok(pods.items)
    }
}

#[async_trait::async_trait]
impl StatefulSetLister for KubeLister {
    async fn list_statefulsets(
        &self,
        scope: &Scope,
        selector: &Selector,
    ) -> Result<Vec<StatefulSet>> {
        let statefulsets = self
            .api::<StatefulSet>(scope)
            .list(&list_params(selector))
            .await?;
        Ok(statefulsets.items)
    }

    async fn get_statefulset(&self, namespace: &str, name: &str) -> Result<Option<StatefulSet>> {
        let api = Api::<StatefulSet>::namespaced(self.0.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }
}
