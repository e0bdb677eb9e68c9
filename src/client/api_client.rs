//! HTTP client for the storefront API, the seam the checkout flow talks through.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::api::dto::{
    CreateOrderRequest, Envelope, LoginRequest, OrderCreated, PaymentInitRequest, PaymentInitResponse,
    PaymentVerifyRequest, PaymentVerifyResponse, RegisterRequest, Session,
};
use crate::domain::aggregates::Product;

#[derive(Error, Debug)]
pub enum ApiClientError {
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx answer; `message` is the server's `error` field when it sent one.
    #[error("{message}")]
    Api { status: u16, message: String },
}

impl ApiClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
        }
    }
}

#[async_trait]
pub trait StorefrontApi: Send + Sync {
    async fn products(&self) -> Result<Vec<Product>, ApiClientError>;
    async fn register(&self, request: &RegisterRequest) -> Result<Session, ApiClientError>;
    async fn login(&self, request: &LoginRequest) -> Result<Session, ApiClientError>;
    async fn create_order(&self, request: &CreateOrderRequest) -> Result<OrderCreated, ApiClientError>;
    async fn init_payment(&self, request: &PaymentInitRequest) -> Result<PaymentInitResponse, ApiClientError>;
    async fn verify_payment(&self, request: &PaymentVerifyRequest) -> Result<PaymentVerifyResponse, ApiClientError>;
}

#[derive(Debug, Clone)]
pub struct HttpStorefrontApi { http: Client, base_url: String }

impl HttpStorefrontApi {
    /// `base_url` is the server root, e.g. `http://localhost:3002`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiClientError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url: base_url.into().trim_end_matches('/').to_string() })
    }

    fn url(&self, path: &str) -> String { format!("{}/api{}", self.base_url, path) }

    async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ApiClientError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        let body: Value = response.json().await.unwrap_or(Value::Null);
        let message = body["error"].as_str().map(str::to_string).unwrap_or_else(|| format!("request failed with status {status}"));
        Err(ApiClientError::Api { status: status.as_u16(), message })
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ApiClientError> {
        Self::send(self.http.post(self.url(path)).json(body)).await
    }
}

#[async_trait]
impl StorefrontApi for HttpStorefrontApi {
    async fn products(&self) -> Result<Vec<Product>, ApiClientError> { Self::send(self.http.get(self.url("/products"))).await }

    async fn register(&self, request: &RegisterRequest) -> Result<Session, ApiClientError> {
        let envelope: Envelope<Session> = self.post("/auth/register", request).await?;
        Ok(envelope.data)
    }

    async fn login(&self, request: &LoginRequest) -> Result<Session, ApiClientError> {
        let envelope: Envelope<Session> = self.post("/auth/login", request).await?;
        Ok(envelope.data)
    }

    async fn create_order(&self, request: &CreateOrderRequest) -> Result<OrderCreated, ApiClientError> {
        self.post("/orders", request).await
    }

    async fn init_payment(&self, request: &PaymentInitRequest) -> Result<PaymentInitResponse, ApiClientError> {
        self.post("/payment/flouci/init", request).await
    }

    async fn verify_payment(&self, request: &PaymentVerifyRequest) -> Result<PaymentVerifyResponse, ApiClientError> {
        self.post("/payment/flouci/verify", request).await
    }
}
