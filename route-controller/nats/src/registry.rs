use route_controller_core::{Message, Route};
use serde::Serialize;

pub const REGISTER_SUBJECT: &str = "router.register";
pub const UNREGISTER_SUBJECT: &str = "router.unregister";

/// A route registration as understood by the router.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RegistryMessage {
    pub host: String,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_port: Option<u16>,
    pub uris: Vec<String>,
    pub app: String,
    pub private_instance_id: String,
}

impl RegistryMessage {
    fn new(msg: &Message, uris: &[Route]) -> Self {
        Self {
            host: msg.address.to_string(),
            port: msg.port,
            tls_port: msg.tls_port,
            uris: uris.iter().map(|r| r.as_str().to_string()).collect(),
            app: msg.name.clone(),
            private_instance_id: msg.instance_id.clone(),
        }
    }

    /// Splits a message into the registrations to publish, paired with
    /// their subjects. Empty route lists produce nothing.
    pub fn from_message(msg: &Message) -> Vec<(&'static str, Self)> {
        let mut out = Vec::with_capacity(2);
        if !msg.routes.is_empty() {
            out.push((REGISTER_SUBJECT, Self::new(msg, &msg.routes)));
        }
        if !msg.unregistered_routes.is_empty() {
            out.push((
                UNREGISTER_SUBJECT,
                Self::new(msg, &msg.unregistered_routes),
            ));
        }
        out
    }
}
