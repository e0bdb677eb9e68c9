//! Payment gateway seam.
//!
//! Handlers only see [`PaymentGateway`]; the Flouci HTTP adapter lives in
//! [`flouci`] and tests swap in their own implementation.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub mod flouci;

pub use flouci::{FlouciConfig, FlouciGateway};

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("payment gateway credentials are not configured")]
    NotConfigured,

    #[error("payment gateway unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("payment gateway rejected the request with status {status}")]
    Rejected { status: u16 },

    #[error("unexpected payment gateway response: {0}")]
    InvalidResponse(String),
}

/// Fields sent to the gateway when a hosted payment session is opened.
/// `amount` is in millimes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentInit {
    pub amount: i64,
    pub order_id: String,
    pub client_email: String,
    pub client_name: String,
    pub client_phone: String,
    pub address_billing: String,
    pub city_billing: String,
    pub zip_billing: String,
    pub success_link: String,
    pub fail_link: String,
}

/// Raw gateway answer to an initialization request.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentSession { pub payload: Value }

impl PaymentSession {
    pub fn pay_token(&self) -> Option<&str> {
        [&self.payload["pay_token"], &self.payload["result"]["pay_token"], &self.payload["result"]["payment_id"]]
            .into_iter()
            .find_map(Value::as_str)
    }

    /// Id the gateway reports back on verification for this session.
    pub fn payment_id(&self) -> Option<&str> {
        self.payload["result"]["payment_id"].as_str().or_else(|| self.pay_token())
    }

    /// Hosted page the browser is sent to. Prefers the link the gateway returned.
    pub fn redirect_url(&self, pay_url: &str) -> Option<String> {
        if let Some(link) = self.payload["result"]["link"].as_str() {
            return Some(link.to_string());
        }
        self.pay_token().map(|token| format!("{}/{}", pay_url.trim_end_matches('/'), token))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentVerification { pub status: String, pub amount: Option<i64>, pub payload: Value }

impl PaymentVerification {
    pub fn from_payload(payload: Value) -> Self {
        let result = if payload["result"].is_object() { &payload["result"] } else { &payload };
        let status = [&result["status"], &result["payment_status"]]
            .into_iter()
            .find_map(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let amount = result["amount"].as_i64();
        Self { status, amount, payload }
    }

    pub fn is_successful(&self) -> bool { self.status.eq_ignore_ascii_case("success") }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initialize(&self, request: &PaymentInit) -> Result<PaymentSession, GatewayError>;
    async fn verify(&self, payment_id: &str) -> Result<PaymentVerification, GatewayError>;
}
