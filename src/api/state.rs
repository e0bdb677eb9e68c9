use std::sync::Arc;
use tracing::{debug, warn};

use crate::api::auth::TokenService;
use crate::api::uploads::ImageStore;
use crate::domain::events::DomainEvent;
use crate::payment::PaymentGateway;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub tokens: Arc<TokenService>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub images: ImageStore,
    pub links: CheckoutLinks,
    pub events: EventPublisher,
}

/// Where the gateway sends the browser back to, and where its hosted page lives.
#[derive(Clone, Debug)]
pub struct CheckoutLinks { pub public_url: String, pub pay_url: String }

impl CheckoutLinks {
    pub fn success_link(&self, order_ref: &str) -> String {
        format!("{}/checkout/success?order_id={}", self.public_url.trim_end_matches('/'), order_ref)
    }

    pub fn fail_link(&self) -> String { format!("{}/checkout/failure", self.public_url.trim_end_matches('/')) }
}

/// Publishes domain events to NATS when a client is connected.
#[derive(Clone, Default)]
pub struct EventPublisher { nats: Option<async_nats::Client> }

impl EventPublisher {
    pub fn new(nats: Option<async_nats::Client>) -> Self { Self { nats } }

    pub async fn publish(&self, event: DomainEvent) {
        let subject = event.subject();
        let Some(client) = &self.nats else {
            debug!(%subject, "event publishing disabled");
            return;
        };
        let payload = match serde_json::to_vec(&event) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(%subject, error = %e, "failed to encode event");
                return;
            }
        };
        if let Err(e) = client.publish(subject.clone(), payload.into()).await {
            warn!(%subject, error = %e, "failed to publish event");
        }
    }
}
