#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use route_controller_core as core;
pub use route_controller_k8s_api as k8s;
pub use route_controller_k8s_discovery as discovery;
pub use route_controller_nats as nats;

mod args;

pub use self::args::Args;
