use anyhow::Context;
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument};

use super::services::{add_to_collection, build_shopping_list, remove_from_collection};
use super::CollectionKind;
use crate::{
    auth::services::AuthUser,
    error::AppResult,
    recipes::dto::RecipeSummary,
    state::AppState,
};

pub fn collection_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/recipes/:id/favorite",
            post(add_favorite).delete(remove_favorite),
        )
        .route(
            "/recipes/:id/shopping_cart",
            post(add_to_cart).delete(remove_from_cart),
        )
        .route("/recipes/download_shopping_cart", get(download_shopping_cart))
}

#[instrument(skip(state))]
pub async fn add_favorite(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> AppResult<(StatusCode, Json<RecipeSummary>)> {
    let summary = add_to_collection(&state, user_id, id, CollectionKind::Favorites).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

#[instrument(skip(state))]
pub async fn remove_favorite(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    remove_from_collection(&state, user_id, id, CollectionKind::Favorites).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn add_to_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> AppResult<(StatusCode, Json<RecipeSummary>)> {
    let summary = add_to_collection(&state, user_id, id, CollectionKind::Cart).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

#[instrument(skip(state))]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    remove_from_collection(&state, user_id, id, CollectionKind::Cart).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn download_shopping_cart(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<(HeaderMap, String)> {
    let today = OffsetDateTime::now_utc().date();
    let file = build_shopping_list(&state, user_id, today).await?;
    info!(%user_id, lines = file.lines, "shopping list generated");

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        format!("attachment; filename=\"{}\"", file.filename)
            .parse::<HeaderValue>()
            .context("content-disposition header")?,
    );
    Ok((headers, file.body))
}
