#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

mod emitter;
mod metrics;
mod publisher;
mod registry;

pub use self::{
    emitter::Emitter,
    metrics::EmitterMetrics,
    publisher::{NatsPublisher, Publisher},
    registry::{RegistryMessage, REGISTER_SUBJECT, UNREGISTER_SUBJECT},
};
