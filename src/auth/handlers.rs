use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, RefreshRequest, RegisterRequest},
        repo_types::{NewUser, User},
        services::{
            hash_password, is_valid_email, is_valid_username, verify_password, JwtKeys, TokenKind,
            MAX_EMAIL_LEN, MAX_PERSON_NAME_LEN, MIN_PASSWORD_LEN,
        },
    },
    error::{AppError, AppResult},
    state::AppState,
    users::dto::UserProfile,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

fn issue_tokens(state: &AppState, user: User) -> AppResult<AuthResponse> {
    let keys = JwtKeys::from_ref(state);
    let (access_token, refresh_token) = keys.sign_pair(user.id).map_err(|e| {
        error!(error = %e, "jwt sign failed");
        AppError::Internal(e)
    })?;
    Ok(AuthResponse {
        access_token,
        refresh_token,
        user: UserProfile::from_user(user, false),
    })
}

/// Checks a registration payload after email normalisation.
pub(crate) fn validate_registration(payload: &RegisterRequest) -> AppResult<()> {
    if payload.email.chars().count() > MAX_EMAIL_LEN || !is_valid_email(&payload.email) {
        return Err(AppError::validation("Invalid email"));
    }
    if !is_valid_username(&payload.username) {
        return Err(AppError::validation("Invalid username"));
    }
    if payload.first_name.trim().is_empty() {
        return Err(AppError::validation("First name is required"));
    }
    if payload.first_name.trim().chars().count() > MAX_PERSON_NAME_LEN
        || payload.last_name.trim().chars().count() > MAX_PERSON_NAME_LEN
    {
        return Err(AppError::validation(format!(
            "Names must be at most {MAX_PERSON_NAME_LEN} characters"
        )));
    }
    if payload.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::validation("Password too short"));
    }
    Ok(())
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    payload.email = payload.email.trim().to_lowercase();

    if let Err(e) = validate_registration(&payload) {
        warn!(email = %payload.email, error = %e, "invalid registration");
        return Err(e);
    }

    let hash = hash_password(&payload.password)?;
    let user = User::create(
        &state.db,
        NewUser {
            email: &payload.email,
            username: &payload.username,
            first_name: payload.first_name.trim(),
            last_name: payload.last_name.trim(),
            password_hash: &hash,
        },
    )
    .await
    .map_err(|e| {
        warn!(email = %payload.email, error = %e, "create user failed");
        e
    })?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((StatusCode::CREATED, Json(issue_tokens(&state, user)?)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AppError::validation("Invalid email"));
    }

    let user = match User::find_by_email(&state.db, &payload.email).await? {
        Some(u) => u,
        None => {
            warn!(email = %payload.email, "login unknown email");
            return Err(AppError::Unauthorized("Invalid credentials".into()));
        }
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(issue_tokens(&state, user)?))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> AppResult<Json<AuthResponse>> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .decode(&payload.refresh_token, TokenKind::Refresh)
        .map_err(|e| AppError::Unauthorized(e.to_string()))?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;

    Ok(Json(issue_tokens(&state, user)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(email: &str, username: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.into(),
            username: username.into(),
            first_name: "Anna".into(),
            last_name: String::new(),
            password: password.into(),
        }
    }

    #[test]
    fn registration_validation() {
        assert!(validate_registration(&payload("a@b.io", "anna", "longenough")).is_ok());
        assert!(validate_registration(&payload("not-an-email", "anna", "longenough")).is_err());
        assert!(validate_registration(&payload("a@b.io", "an na", "longenough")).is_err());
        assert!(validate_registration(&payload("a@b.io", "anna", "short")).is_err());

        let mut p = payload("a@b.io", "anna", "longenough");
        p.first_name = "  ".into();
        assert!(matches!(validate_registration(&p), Err(AppError::Validation(_))));
    }

    #[test]
    fn registration_rejects_overlong_fields() {
        let mut p = payload("a@b.io", "anna", "longenough");
        p.first_name = "а".repeat(MAX_PERSON_NAME_LEN);
        p.last_name = "б".repeat(MAX_PERSON_NAME_LEN);
        assert!(validate_registration(&p).is_ok());

        let mut p = payload("a@b.io", "anna", "longenough");
        p.first_name = "a".repeat(MAX_PERSON_NAME_LEN + 1);
        assert!(matches!(validate_registration(&p), Err(AppError::Validation(_))));

        let mut p = payload("a@b.io", "anna", "longenough");
        p.last_name = "a".repeat(MAX_PERSON_NAME_LEN + 1);
        assert!(matches!(validate_registration(&p), Err(AppError::Validation(_))));

        let local = "a".repeat(MAX_EMAIL_LEN);
        let long_email = format!("{local}@example.com");
        assert!(is_valid_email(&long_email));
        let p = payload(&long_email, "anna", "longenough");
        assert!(matches!(validate_registration(&p), Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn refresh_rejects_garbage_token() {
        let state = AppState::fake();
        let err = refresh(
            State(state),
            Json(RefreshRequest {
                refresh_token: "garbage".into(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }
}
