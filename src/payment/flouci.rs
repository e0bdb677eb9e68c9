//! Flouci developer API adapter (`generate_payment` / `verify_payment`).

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use super::{GatewayError, PaymentGateway, PaymentInit, PaymentSession, PaymentVerification};

pub const DEFAULT_BASE_URL: &str = "https://developers.flouci.com/api";
pub const DEFAULT_PAY_URL: &str = "https://secure.flouci.com/pay";

/// Seconds the hosted payment page stays valid.
const SESSION_TIMEOUT_SECS: u32 = 1200;

#[derive(Debug, Clone, Default)]
pub struct FlouciConfig {
    pub api_key: Option<String>,
    pub app_token: Option<String>,
    pub app_secret: Option<String>,
    pub developer_id: Option<String>,
    pub base_url: String,
}

struct Credentials<'a> { api_key: &'a str, app_token: &'a str, app_secret: &'a str }

impl FlouciConfig {
    pub fn is_configured(&self) -> bool { self.credentials().is_ok() }

    fn credentials(&self) -> Result<Credentials<'_>, GatewayError> {
        match (&self.api_key, &self.app_token, &self.app_secret) {
            (Some(api_key), Some(app_token), Some(app_secret)) => Ok(Credentials { api_key, app_token, app_secret }),
            _ => Err(GatewayError::NotConfigured),
        }
    }
}

#[derive(Serialize)]
struct GenerateBody<'a> {
    app_token: &'a str,
    app_secret: &'a str,
    accept_card: &'static str,
    session_timeout_secs: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    developer_tracking: Option<&'a str>,
    #[serde(flatten)]
    init: &'a PaymentInit,
}

#[derive(Serialize)]
struct VerifyBody<'a> { app_token: &'a str, app_secret: &'a str, payment_id: &'a str }

pub struct FlouciGateway { config: FlouciConfig, http: reqwest::Client }

impl FlouciGateway {
    pub fn new(config: FlouciConfig, timeout: Duration) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { config, http })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post<B: Serialize>(&self, api_key: &str, path: &str, body: &B) -> Result<Value, GatewayError> {
        let response = self.http.post(self.endpoint(path)).bearer_auth(api_key).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(path, status = status.as_u16(), "flouci rejected request");
            return Err(GatewayError::Rejected { status: status.as_u16() });
        }
        response.json::<Value>().await.map_err(|e| GatewayError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl PaymentGateway for FlouciGateway {
    async fn initialize(&self, request: &PaymentInit) -> Result<PaymentSession, GatewayError> {
        let creds = self.config.credentials()?;
        let body = GenerateBody {
            app_token: creds.app_token,
            app_secret: creds.app_secret,
            accept_card: "true",
            session_timeout_secs: SESSION_TIMEOUT_SECS,
            developer_tracking: self.config.developer_id.as_deref(),
            init: request,
        };
        let payload = self.post(creds.api_key, "generate_payment", &body).await?;
        debug!(order_ref = %request.order_id, "flouci payment generated");
        Ok(PaymentSession { payload })
    }

    async fn verify(&self, payment_id: &str) -> Result<PaymentVerification, GatewayError> {
        let creds = self.config.credentials()?;
        let body = VerifyBody { app_token: creds.app_token, app_secret: creds.app_secret, payment_id };
        let payload = self.post(creds.api_key, "verify_payment", &body).await?;
        Ok(PaymentVerification::from_payload(payload))
    }
}
