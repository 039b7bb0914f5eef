use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Outbound fan-out of domain events. Handlers hold this as an injected
/// capability; the transport behind it is out of scope here.
#[async_trait]
pub trait EventBroadcaster: Send + Sync {
    async fn broadcast(&self, event: &str, payload: Value) -> Result<()>;
}

/// Posts each event to a configured webhook endpoint.
pub struct WebhookBroadcaster {
    client: Client,
    url: String,
    bearer: Option<String>,
}

#[derive(Serialize)]
struct EventEnvelope<'a> {
    event: &'a str,
    payload: Value,
}

impl WebhookBroadcaster {
    pub fn new(client: Client, url: impl Into<String>, bearer: Option<String>) -> Self {
        Self {
            client,
            url: url.into(),
            bearer,
        }
    }
}

#[async_trait]
impl EventBroadcaster for WebhookBroadcaster {
    async fn broadcast(&self, event: &str, payload: Value) -> Result<()> {
        let envelope = EventEnvelope { event, payload };
        let mut request = self.client.post(&self.url).json(&envelope);
        if let Some(token) = &self.bearer {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "Event webhook returned status {}",
                response.status()
            ));
        }
        Ok(())
    }
}

/// Used when no webhook is configured; events are only logged.
pub struct NoopBroadcaster;

#[async_trait]
impl EventBroadcaster for NoopBroadcaster {
    async fn broadcast(&self, event: &str, _payload: Value) -> Result<()> {
        debug!(event, "dropping event, no broadcaster configured");
        Ok(())
    }
}

/// Emission is best-effort everywhere it is used: a failed broadcast never
/// fails the request that produced the event.
pub async fn emit(broadcaster: &dyn EventBroadcaster, event: &str, payload: Value) {
    if let Err(err) = broadcaster.broadcast(event, payload).await {
        warn!(event, error = ?err, "Failed to broadcast event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    pub struct CapturingBroadcaster {
        pub events: Mutex<Vec<(String, Value)>>,
    }

    #[async_trait]
    impl EventBroadcaster for CapturingBroadcaster {
        async fn broadcast(&self, event: &str, payload: Value) -> Result<()> {
            self.events
                .lock()
                .unwrap()
                .push((event.to_string(), payload));
            Ok(())
        }
    }

    #[tokio::test]
    async fn emit_forwards_event_and_payload() {
        let broadcaster = CapturingBroadcaster {
            events: Mutex::new(Vec::new()),
        };
        emit(&broadcaster, "productCreated", json!({"id": 1})).await;
        let events = broadcaster.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "productCreated");
    }

    #[tokio::test]
    async fn noop_broadcaster_accepts_everything() {
        assert!(NoopBroadcaster
            .broadcast("merchantUpdated", json!({}))
            .await
            .is_ok());
    }
}
