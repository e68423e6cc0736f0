use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::get,
    Json, Router,
};
use axum_extra::extract::Query;
use tracing::instrument;

use super::dto::{RecipeDetails, RecipeQuery, RecipeWrite};
use super::services;
use crate::{
    auth::services::AuthUser,
    error::AppResult,
    pagination::Page,
    state::AppState,
};

// --- public routers ---

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(list_recipes))
        .route("/recipes/:id", get(get_recipe))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", axum::routing::post(create_recipe))
        .route(
            "/recipes/:id",
            axum::routing::patch(update_recipe).delete(delete_recipe),
        )
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // base64 images
}

// --- handlers ---

#[instrument(skip(state))]
pub async fn list_recipes(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    Query(q): Query<RecipeQuery>,
) -> AppResult<Json<Page<RecipeDetails>>> {
    let viewer = viewer.map(|AuthUser(id)| id);
    Ok(Json(services::list_recipes(&state, viewer, &q).await?))
}

#[instrument(skip(state))]
pub async fn get_recipe(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<RecipeDetails>> {
    let viewer = viewer.map(|AuthUser(id)| id);
    Ok(Json(services::get_recipe(&state, viewer, id).await?))
}

#[instrument(skip(state, body))]
pub async fn create_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<RecipeWrite>,
) -> AppResult<(StatusCode, HeaderMap, Json<RecipeDetails>)> {
    let recipe = services::create_recipe(&state, user_id, body).await?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/api/recipes/{}", recipe.id)) {
        headers.insert(header::LOCATION, location);
    }
    Ok((StatusCode::CREATED, headers, Json(recipe)))
}

#[instrument(skip(state, body))]
pub async fn update_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    Json(body): Json<RecipeWrite>,
) -> AppResult<Json<RecipeDetails>> {
    Ok(Json(services::update_recipe(&state, user_id, id, body).await?))
}

#[instrument(skip(state))]
pub async fn delete_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    services::delete_recipe(&state, user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
