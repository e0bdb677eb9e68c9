use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{CatalogParams, ProductResponse, SearchParams};
use crate::api::error::ApiError;
use crate::api::state::AppState;
use crate::domain::catalog::CatalogQuery;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products))
        .route("/search", get(search_products))
        .route("/categories", get(list_categories))
        .route("/:id", get(get_product))
}

/// Newest first unless catalog parameters ask for something else.
pub async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<CatalogParams>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    let products = state.store.list_products().await?;
    let products = if params.is_empty() { products } else { CatalogQuery::from(params).apply(products) };
    Ok(Json(products.into_iter().map(ProductResponse::from).collect()))
}

pub async fn get_product(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<ProductResponse>, ApiError> {
    let not_found = || ApiError::NotFound("Product not found".into());
    let id = id.parse::<i64>().map_err(|_| not_found())?;
    let product = state.store.get_product(id).await?.ok_or_else(not_found)?;
    Ok(Json(product.into()))
}

pub async fn search_products(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    let term = params.q.as_deref().map(str::trim).filter(|q| !q.is_empty());
    let term = term.ok_or_else(|| ApiError::Validation("Search query is required".into()))?;
    let products = state.store.search_products(term).await?;
    Ok(Json(products.into_iter().map(ProductResponse::from).collect()))
}

pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.store.list_categories().await?))
}
