#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod labels;
pub mod pod;

pub use self::labels::{parse_selector, ParseSelectorError};
pub use k8s_openapi::{
    api::{
        self,
        apps::v1::{StatefulSet, StatefulSetSpec},
        core::v1::{Container, ContainerPort, Pod, PodCondition, PodSpec, PodStatus},
    },
    apimachinery::pkg::apis::meta::v1::{
        LabelSelector, LabelSelectorRequirement, OwnerReference, Time,
    },
    NamespaceResourceScope,
};
pub use kube::{
    api::{Api, ListParams, ObjectMeta, Resource, ResourceExt},
    core::{Expression, ParseExpressionError, Selector, SelectorExt},
    runtime::watcher,
    Client, Error,
};

/// Labels pods with the GUID of the app instance they run.
pub const GUID_LABEL: &str = "cloudfoundry.org/guid";

/// Labels workloads and pods with the kind of workload that created them.
pub const SOURCE_TYPE_LABEL: &str = "cloudfoundry.org/source_type";

/// The source type of long-running app workloads.
pub const APP_SOURCE_TYPE: &str = "APP";
