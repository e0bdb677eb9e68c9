//! Storefront
//!
//! Online shop backend and shopper-side library.
//!
//! ## Features
//! - Product catalog with search, category list and filter/sort queries
//! - Cart and wishlist state with durable client storage
//! - Two-step checkout: cash on delivery or hosted Flouci payment
//! - Back-office: products, image uploads, orders, users, stats
//! - Bearer-token auth with an admin role

use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{info, warn};

pub mod api;
pub mod client;
pub mod config;
pub mod domain;
pub mod payment;
pub mod store;
pub mod telemetry;

use crate::api::auth::{hash_password, AuthError, TokenService};
use crate::api::uploads::ImageStore;
use crate::api::{build_app, AppState, CheckoutLinks, EventPublisher, HttpOptions};
use crate::config::{Config, ConfigError};
use crate::domain::aggregates::Role;
use crate::domain::value_objects::Email;
use crate::payment::{FlouciGateway, GatewayError};
use crate::store::{NewUser, Store, StoreError};

#[derive(Error, Debug)]
pub enum StorefrontError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("invalid admin email: {0}")]
    AdminEmail(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StorefrontError>;

/// Creates the admin account from `ADMIN_EMAIL`/`ADMIN_PASSWORD` when it does not exist yet.
pub async fn seed_admin(store: &Store, config: &Config) -> Result<()> {
    let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) else {
        return Ok(());
    };
    let email = Email::parse(email).map_err(|e| StorefrontError::AdminEmail(e.to_string()))?;
    let admin = NewUser { name: "Admin".into(), email, password_hash: hash_password(password)?, role: Role::Admin };
    if store.ensure_admin(&admin).await? {
        info!(email = %admin.email, "admin account created");
    }
    Ok(())
}

/// Opens the store and serves the API until ctrl-c.
pub async fn run(config: Config) -> Result<()> {
    let store = Store::open(&config.database_url).await?;
    tokio::fs::create_dir_all(&config.upload_dir).await?;
    seed_admin(&store, &config).await?;

    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => {
                info!(url, "connected to NATS");
                Some(client)
            }
            Err(e) => {
                warn!(url, error = %e, "NATS unavailable, domain events disabled");
                None
            }
        },
        None => None,
    };
    if !config.flouci.is_configured() {
        warn!("Flouci credentials not set, online payments will fail");
    }

    let state = AppState {
        store: store.clone(),
        tokens: Arc::new(TokenService::new(config.jwt_secret.as_bytes(), chrono::Duration::hours(config.token_ttl_hours))),
        gateway: Arc::new(FlouciGateway::new(config.flouci.clone(), config.request_timeout)?),
        images: ImageStore::new(config.upload_dir.clone()),
        links: CheckoutLinks { public_url: config.public_url.clone(), pay_url: config.pay_url.clone() },
        events: EventPublisher::new(nats),
    };
    let options = HttpOptions { request_timeout: config.request_timeout, frontend_url: config.frontend_url.clone() };
    let app = build_app(state, &options);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "storefront listening");
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    store.close().await;
    info!("storefront stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
