use crate::route::{Route, RouteSet};
use std::net::IpAddr;

/// Describes the routes a single instance should currently answer for, and the
/// routes the router must stop sending to it.
///
/// Messages are built by discovery, consumed once by the emitter, and never
/// persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub instance_id: String,
    pub name: String,
    pub address: IpAddr,
    pub port: u16,
    pub tls_port: Option<u16>,
    pub routes: Vec<Route>,
    pub unregistered_routes: Vec<Route>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InvalidMessage {
    #[error("instance {0} has no address")]
    MissingAddress(String),

    #[error("instance {instance} has an invalid address {address:?}")]
    InvalidAddress { instance: String, address: String },

    #[error("instance {instance} has an invalid port {port}")]
    InvalidPort { instance: String, port: i32 },
}

// === impl Message ===

impl Message {
    pub fn new(
        instance_id: impl ToString,
        name: impl ToString,
        address: &str,
        port: i32,
    ) -> Result<Self, InvalidMessage> {
        let instance_id = instance_id.to_string();
        if address.is_empty() {
            return Err(InvalidMessage::MissingAddress(instance_id));
        }
        let address = match address.parse() {
            Ok(addr) => addr,
            Err(_) => {
                return Err(InvalidMessage::InvalidAddress {
                    instance: instance_id,
                    address: address.to_string(),
                })
            }
        };
        let port = match u16::try_from(port) {
            Ok(port) if port != 0 => port,
            _ => {
                return Err(InvalidMessage::InvalidPort {
                    instance: instance_id,
                    port,
                })
            }
        };

        Ok(Self {
            instance_id,
            name: name.to_string(),
            address,
            port,
            tls_port: None,
            routes: Vec::new(),
            unregistered_routes: Vec::new(),
        })
    }

    /// Sets the instance's current routes and the routes to unregister.
    ///
    /// A route is never both registered and unregistered by the same message:
    /// members of `current` are dropped from `removed`.
    pub fn with_routes(mut self, current: &RouteSet, removed: &RouteSet) -> Self {
        self.routes = current.to_list();
        self.unregistered_routes = removed
            .iter()
            .filter(|route| !current.contains(route))
            .cloned()
            .collect();
        self
    }
}
