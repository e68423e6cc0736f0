use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::{
    AuthorWithRecipes, RecipesLimit, SetPasswordRequest, SubscriptionsQuery, UserProfile,
};
use super::{repo, services};
use crate::{
    auth::{
        repo_types::User,
        services::{hash_password, verify_password, AuthUser, MIN_PASSWORD_LEN},
    },
    error::{AppError, AppResult},
    pagination::{Page, PageParams},
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/me", get(get_me))
        .route("/users/set_password", post(set_password))
        .route("/users/subscriptions", get(list_subscriptions))
        .route("/users/:id", get(get_user))
        .route("/users/:id/subscribe", post(subscribe).delete(unsubscribe))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    Query(p): Query<PageParams>,
) -> AppResult<Json<Page<UserProfile>>> {
    let viewer = viewer.map(|AuthUser(id)| id);
    let count = repo::count_users(&state.db).await?;
    let users = repo::list_profiles(&state.db, viewer, p.limit(), p.offset()).await?;
    Ok(Json(Page::new(&p, count, users)))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<UserProfile>> {
    let viewer = viewer.map(|AuthUser(id)| id);
    repo::find_profile(&state.db, viewer, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("User"))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<UserProfile>> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;
    Ok(Json(UserProfile::from_user(user, false)))
}

#[instrument(skip(state, payload))]
pub async fn set_password(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<SetPasswordRequest>,
) -> AppResult<StatusCode> {
    if payload.new_password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::validation("Password too short"));
    }
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;

    if !verify_password(&payload.current_password, &user.password_hash)? {
        warn!(%user_id, "set_password with wrong current password");
        return Err(AppError::validation("Current password is incorrect"));
    }

    let hash = hash_password(&payload.new_password)?;
    User::update_password(&state.db, user_id, &hash).await?;
    info!(%user_id, "password changed");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn list_subscriptions(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<SubscriptionsQuery>,
) -> AppResult<Json<Page<AuthorWithRecipes>>> {
    let p = PageParams::new(q.page, q.limit);
    let count = repo::count_subscriptions(&state.db, user_id).await?;
    let authors = repo::list_subscriptions(&state.db, user_id, p.limit(), p.offset()).await?;

    let mut results = Vec::with_capacity(authors.len());
    for author in authors {
        results.push(services::with_recipes(&state, author, q.recipes_limit).await?);
    }
    Ok(Json(Page::new(&p, count, results)))
}

#[instrument(skip(state))]
pub async fn subscribe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(author_id): Path<Uuid>,
    Query(q): Query<RecipesLimit>,
) -> AppResult<(StatusCode, Json<AuthorWithRecipes>)> {
    let author = services::subscribe(&state, user_id, author_id, q.recipes_limit).await?;
    Ok((StatusCode::CREATED, Json(author)))
}

#[instrument(skip(state))]
pub async fn unsubscribe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(author_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    services::unsubscribe(&state, user_id, author_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
