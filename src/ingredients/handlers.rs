use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::instrument;

use super::repo::{self, Ingredient};
use crate::{
    error::{AppError, AppResult},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct IngredientSearch {
    pub name: Option<String>,
}

pub fn ingredient_routes() -> Router<AppState> {
    Router::new()
        .route("/ingredients", get(list_ingredients))
        .route("/ingredients/:id", get(get_ingredient))
}

#[instrument(skip(state))]
pub async fn list_ingredients(
    State(state): State<AppState>,
    Query(q): Query<IngredientSearch>,
) -> AppResult<Json<Vec<Ingredient>>> {
    Ok(Json(repo::search(&state.db, q.name.as_deref()).await?))
}

#[instrument(skip(state))]
pub async fn get_ingredient(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Ingredient>> {
    repo::find(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Ingredient"))
}
