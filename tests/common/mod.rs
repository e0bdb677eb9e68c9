#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use storefront::api::auth::{hash_password, TokenService};
use storefront::api::uploads::ImageStore;
use storefront::api::{build_app, AppState, CheckoutLinks, EventPublisher, HttpOptions};
use storefront::domain::aggregates::{ProductDraft, Role};
use storefront::domain::value_objects::Email;
use storefront::payment::{GatewayError, PaymentGateway, PaymentInit, PaymentSession, PaymentVerification};
use storefront::store::{NewUser, Store};

pub const JWT_SECRET: &[u8] = b"test-secret";
pub const ADMIN_EMAIL: &str = "admin@shop.test";

/// Gateway double: every session gets a `pay-<order ref>` id, and verification
/// answers with whatever status was scripted for that id (default `SUCCESS`
/// for the amount that was initialized).
#[derive(Default)]
pub struct FakeGateway {
    amounts: Mutex<HashMap<String, i64>>,
    statuses: Mutex<HashMap<String, String>>,
    pub unreachable: Mutex<bool>,
}

impl FakeGateway {
    pub fn script(&self, payment_id: &str, status: &str) {
        self.statuses.lock().unwrap().insert(payment_id.to_string(), status.to_string());
    }

    /// Verification for this id will not report an amount.
    pub fn hide_amount(&self, payment_id: &str) {
        self.amounts.lock().unwrap().remove(payment_id);
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn initialize(&self, request: &PaymentInit) -> Result<PaymentSession, GatewayError> {
        if *self.unreachable.lock().unwrap() {
            return Err(GatewayError::Rejected { status: 503 });
        }
        let payment_id = format!("pay-{}", request.order_id);
        self.amounts.lock().unwrap().insert(payment_id.clone(), request.amount);
        Ok(PaymentSession { payload: json!({ "result": { "success": true, "payment_id": payment_id } }) })
    }

    async fn verify(&self, payment_id: &str) -> Result<PaymentVerification, GatewayError> {
        let status = self.statuses.lock().unwrap().get(payment_id).cloned().unwrap_or_else(|| "SUCCESS".into());
        let amount = self.amounts.lock().unwrap().get(payment_id).copied();
        Ok(PaymentVerification::from_payload(json!({ "result": { "status": status, "amount": amount } })))
    }
}

pub struct TestServer {
    pub base_url: String,
    pub store: Store,
    pub tokens: Arc<TokenService>,
    pub gateway: Arc<FakeGateway>,
    pub uploads: TempDir,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn spawn() -> Self {
        let store = Store::open_in_memory().await.expect("failed to open store");
        let uploads = tempfile::tempdir().expect("failed to create upload dir");
        let tokens = Arc::new(TokenService::new(JWT_SECRET, chrono::Duration::hours(1)));
        let gateway = Arc::new(FakeGateway::default());
        let state = AppState {
            store: store.clone(),
            tokens: tokens.clone(),
            gateway: gateway.clone(),
            images: ImageStore::new(uploads.path()),
            links: CheckoutLinks { public_url: "http://shop.test".into(), pay_url: "https://pay.test".into() },
            events: EventPublisher::default(),
        };
        let app = build_app(state, &HttpOptions::default());

        // Same router as prod, bound to an ephemeral port.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("failed to bind ephemeral port");
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, store, tokens, gateway, uploads, handle }
    }

    pub fn url(&self, path: &str) -> String { format!("{}/api{}", self.base_url, path) }

    pub async fn admin_token(&self) -> String {
        let admin = NewUser {
            name: "Admin".into(),
            email: Email::parse(ADMIN_EMAIL).unwrap(),
            password_hash: hash_password("admin-password").unwrap(),
            role: Role::Admin,
        };
        self.store.ensure_admin(&admin).await.unwrap();
        let user = self.store.find_user_by_email(ADMIN_EMAIL).await.unwrap().unwrap();
        self.tokens.issue(&user).unwrap()
    }

    pub async fn seed_product(&self, name: &str, price: rust_decimal::Decimal, stock: u32) -> i64 {
        let draft = ProductDraft {
            name: name.into(),
            description: format!("{name} description"),
            price,
            original_price: None,
            category: "gadgets".into(),
            image: "/uploads/seed.png".into(),
            stock_quantity: stock,
            features: vec![],
            specifications: Default::default(),
        };
        self.store.create_product(&draft).await.unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub fn shipping() -> Value {
    json!({
        "firstName": "Amira", "lastName": "Ben Salah", "email": "amira@example.tn", "phone": "+21620000000",
        "address": "12 Rue de Marseille", "city": "Tunis", "postalCode": "1000", "governorate": "Tunis"
    })
}
