use anyhow::{Context, Result};
use bytes::Bytes;

/// Delivers encoded registrations to the router.
#[async_trait::async_trait]
pub trait Publisher: Send + Sync + 'static {
    async fn publish(&self, subject: &'static str, payload: Bytes) -> Result<()>;
}

/// Publishes over a NATS connection.
#[derive(Clone, Debug)]
pub struct NatsPublisher(async_nats::Client);

impl NatsPublisher {
    pub async fn connect(addr: &str, user: Option<&str>, password: Option<&str>) -> Result<Self> {
        let mut opts = async_nats::ConnectOptions::new().name("route-controller");
        if let Some(user) = user {
            let password = password.unwrap_or_default().to_string();
            opts = opts.user_and_password(user.to_string(), password);
        }
        let client = opts
            .connect(addr)
            .await
            .with_context(|| format!("failed to connect to NATS at {addr}"))?;
        tracing::info!(%addr, "Connected to NATS");
        Ok(Self(client))
    }
}

#[async_trait::async_trait]
impl Publisher for NatsPublisher {
    async fn publish(&self, subject: &'static str, payload: Bytes) -> Result<()> {
        self.0.publish(subject, payload).await?;
        Ok(())
    }
}
