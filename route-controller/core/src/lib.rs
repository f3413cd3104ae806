#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod message;
pub mod queue;
pub mod route;
pub mod scheduler;

pub use self::{
    message::{InvalidMessage, Message},
    route::{decode, diff, DecodeError, Route, RouteSet},
    scheduler::{task_fn, LoopScheduler, Schedule, Task, TickerScheduler},
};

/// The workload annotation that carries the routes its pods should expose.
pub const ROUTES_ANNOTATION: &str = "cloudfoundry.org/routes";
