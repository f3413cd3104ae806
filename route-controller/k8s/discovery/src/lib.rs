#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

mod client;
mod collector;
mod informer;
mod instance;
mod namespace;
mod watch;
mod workload;


pub use self::{
    client::{KubeLister, PodLister, StatefulSetLister},
    collector::RouteCollector,
    informer::UriChangeInformer,
    instance::InstanceChangeInformer,
    namespace::{NamespaceError, NamespaceResolver, Scope},
    workload::{WorkloadEvent, WorkloadUpdates},
};
