use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::info;

use crate::api::auth::AdminUser;
use crate::api::dto::{ProductCreated, StatusUpdateRequest};
use crate::api::error::{ApiError, ValidJson};
use crate::api::state::AppState;
use crate::api::uploads::{ImageForm, PreparedImage, ProductForm};
use crate::domain::aggregates::{Order, OrderStatus, ProductDraft, User};
use crate::domain::events::{DomainEvent, OrderEvent, ProductEvent};
use crate::store::{StoreError, StoreStats};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stats", get(stats))
        .route("/orders", get(list_orders))
        .route("/orders/:id/status", put(update_order_status))
        .route("/users", get(list_users))
        .route("/products", post(create_product))
        .route("/products/:id", put(update_product).delete(delete_product))
}

pub async fn stats(State(state): State<AppState>, _admin: AdminUser) -> Result<Json<StoreStats>, ApiError> {
    Ok(Json(state.store.stats().await?))
}

pub async fn list_orders(State(state): State<AppState>, _admin: AdminUser) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(state.store.list_orders().await?))
}

pub async fn list_users(State(state): State<AppState>, _admin: AdminUser) -> Result<Json<Vec<User>>, ApiError> {
    Ok(Json(state.store.list_users().await?))
}

/// Validates the form and picks the stored image, without writing anything yet.
fn draft_from_form(state: &AppState, form: ProductForm) -> Result<(ProductDraft, Option<PreparedImage>), ApiError> {
    let mut draft = form.payload.into_draft()?;
    let image = form.image.map(|upload| state.images.prepare(upload));
    if let Some(image) = &image {
        draft.image = image.url.clone();
    }
    draft.validate()?;
    Ok((draft, image))
}

pub async fn create_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    form: ProductForm,
) -> Result<(StatusCode, Json<ProductCreated>), ApiError> {
    let (draft, image) = draft_from_form(&state, form)?;
    if let Some(image) = &image {
        image.write().await?;
    }
    let id = match state.store.create_product(&draft).await {
        Ok(id) => id,
        Err(e) => {
            if let Some(image) = &image {
                image.discard().await;
            }
            return Err(e.into());
        }
    };

    info!(product_id = id, name = %draft.name, "product created");
    state.events.publish(DomainEvent::Product(ProductEvent::Created { product_id: id, name: draft.name })).await;
    Ok((StatusCode::CREATED, Json(ProductCreated { success: true, id })))
}

pub async fn update_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    form: ProductForm,
) -> Result<Json<Value>, ApiError> {
    let (draft, image) = draft_from_form(&state, form)?;
    if let Some(image) = &image {
        image.write().await?;
    }
    if let Err(e) = state.store.update_product(id, &draft).await {
        if let Some(image) = &image {
            image.discard().await;
        }
        return Err(e.into());
    }

    info!(product_id = id, "product updated");
    state.events.publish(DomainEvent::Product(ProductEvent::Updated { product_id: id })).await;
    Ok(Json(json!({ "success": true })))
}

pub async fn delete_product(State(state): State<AppState>, _admin: AdminUser, Path(id): Path<i64>) -> Result<Json<Value>, ApiError> {
    state.store.delete_product(id).await?;
    info!(product_id = id, "product deleted");
    state.events.publish(DomainEvent::Product(ProductEvent::Deleted { product_id: id })).await;
    Ok(Json(json!({ "success": true })))
}

pub async fn update_order_status(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    ValidJson(body): ValidJson<StatusUpdateRequest>,
) -> Result<Json<Order>, ApiError> {
    let next = body.status.parse::<OrderStatus>()?;
    let mut order = state.store.get_order(id).await?.ok_or(StoreError::OrderNotFound(id))?;
    let previous = order.transition(next)?;
    if !state.store.update_order_status(id, previous, next).await? {
        return Err(ApiError::Conflict("Order was modified concurrently, reload and retry".into()));
    }

    info!(order_id = id, from = previous.as_str(), to = next.as_str(), "order status changed");
    state.events.publish(DomainEvent::Order(OrderEvent::StatusChanged { order_id: id, from: previous, to: next })).await;
    Ok(Json(order))
}

/// `POST /api/upload`: stores a single image and returns its public path.
pub async fn upload_image(State(state): State<AppState>, _admin: AdminUser, ImageForm(upload): ImageForm) -> Result<Json<Value>, ApiError> {
    let image_url = state.images.save(upload).await?;
    info!(%image_url, "image uploaded");
    Ok(Json(json!({ "success": true, "imageUrl": image_url })))
}
