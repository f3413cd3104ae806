//! Helpers for reading the pod state that route discovery depends on.

use crate::{OwnerReference, Pod, ResourceExt, GUID_LABEL};

/// Returns true when the pod's `Ready` condition is `True`.
pub fn is_ready(pod: &Pod) -> bool {
    pod.status
        .iter()
        .flat_map(|status| status.conditions.iter().flatten())
        .any(|c| c.type_ == "Ready" && c.status == "True")
}

pub fn is_terminating(pod: &Pod) -> bool {
    pod.metadata.deletion_timestamp.is_some()
}

/// A pod serves traffic while it is ready and not being deleted.
pub fn is_serving(pod: &Pod) -> bool {
    is_ready(pod) && !is_terminating(pod)
}

/// The pod's IP, once one has been assigned.
pub fn ip(pod: &Pod) -> Option<&str> {
    pod.status
        .as_ref()?
        .pod_ip
        .as_deref()
        .filter(|ip| !ip.is_empty())
}

/// The first port declared by any of the pod's containers.
pub fn first_container_port(pod: &Pod) -> Option<i32> {
    pod.spec
        .as_ref()?
        .containers
        .iter()
        .flat_map(|c| c.ports.iter().flatten())
        .map(|p| p.container_port)
        .next()
}

/// The owner reference of the StatefulSet that controls the pod, if any.
pub fn statefulset_owner(pod: &Pod) -> Option<&OwnerReference> {
    pod.owner_references()
        .iter()
        .find(|owner| owner.kind == "StatefulSet")
}

/// The identity the router registers the pod under: its app GUID label, or
/// its name when unlabeled.
pub fn app_name(pod: &Pod) -> String {
    pod.labels()
        .get(GUID_LABEL)
        .cloned()
        .unwrap_or_else(|| pod.name_any())
}
