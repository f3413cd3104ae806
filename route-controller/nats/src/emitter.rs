use crate::{EmitterMetrics, Publisher, RegistryMessage};
use route_controller_core::{queue, Message};
use tracing::{debug, warn};

/// Drains the work queue, publishing each message's registrations.
pub struct Emitter<P> {
    publisher: P,
    rx: queue::Receiver,
    metrics: EmitterMetrics,
}

impl<P: Publisher> Emitter<P> {
    pub fn new(publisher: P, rx: queue::Receiver, metrics: EmitterMetrics) -> Self {
        Self {
            publisher,
            rx,
            metrics,
        }
    }

    /// Runs until every producer has dropped its queue handle.
    pub async fn run(mut self) {
        while let Some(msg) = self.rx.recv().await {
            self.emit(&msg).await;
        }
        debug!("Work queue closed");
    }

    async fn emit(&self, msg: &Message) {
        for (subject, reg) in RegistryMessage::from_message(msg) {
            let payload = match serde_json::to_vec(&reg) {
                Ok(payload) => payload,
                Err(error) => {
                    warn!(%error, subject, pod = %msg.instance_id, "Failed to encode");
                    self.metrics.failed(subject);
                    continue;
                }
            };

            match self.publisher.publish(subject, payload.into()).await {
                Ok(()) => {
                    debug!(subject, pod = %msg.instance_id, uris = ?reg.uris, "Published");
                    self.metrics.published(subject);
                }
                Err(error) => {
                    warn!(
                        error = %format_args!("{error:#}"),
                        subject,
                        pod = %msg.instance_id,
                        "Failed to publish"
                    );
                    self.metrics.failed(subject);
                }
            }
        }
    }
}
