//! Credential checks, password hashing, tokens and the caller extractor.

pub(crate) use crate::auth::dto::{Claims, JwtKeys, TokenKind};
use crate::config::JwtConfig;
use crate::error::AppError;
use crate::state::AppState;
use anyhow::anyhow;
use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use regex::Regex;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_USERNAME_LEN: usize = 150;
pub const MAX_EMAIL_LEN: usize = 254;
pub const MAX_PERSON_NAME_LEN: usize = 150;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref USERNAME_RE: Regex = Regex::new(r"^[\w.@+-]+$").unwrap();
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Letters, digits and `.@+-_`, at most 150 characters.
pub(crate) fn is_valid_username(username: &str) -> bool {
    username.chars().count() <= MAX_USERNAME_LEN && USERNAME_RE.is_match(username)
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow!("hash password: {e}"))
}

/// `Ok(false)` on a wrong password; `Err` only when the stored hash is unreadable.
pub fn verify_password(plain: &str, stored: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored).map_err(|e| anyhow!("stored password hash: {e}"))?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig) -> Self {
        let minutes = |m: i64| Duration::from_secs(m.max(0) as u64 * 60);
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: minutes(cfg.ttl_minutes),
            refresh_ttl: minutes(cfg.refresh_ttl_minutes),
        }
    }

    pub fn sign(&self, user_id: Uuid, kind: TokenKind) -> anyhow::Result<String> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = Claims {
            sub: user_id,
            iat: now,
            exp: now + ttl.as_secs() as i64,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    pub fn sign_pair(&self, user_id: Uuid) -> anyhow::Result<(String, String)> {
        Ok((
            self.sign(user_id, TokenKind::Access)?,
            self.sign(user_id, TokenKind::Refresh)?,
        ))
    }

    /// Checks signature, expiry, issuer and audience, then the token kind.
    pub fn decode(&self, token: &str, expected: TokenKind) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        let claims = decode::<Claims>(token, &self.decoding, &validation)?.claims;
        if claims.kind != expected {
            anyhow::bail!("expected a {:?} token", expected);
        }
        debug!(user_id = %claims.sub, kind = ?claims.kind, "token accepted");
        Ok(claims)
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        JwtKeys::new(&state.config.jwt)
    }
}

/// Authenticated caller, resolved from a `Bearer` access token.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Authentication credentials were not provided".into()))?
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("Expected a Bearer token".into()))
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let claims = JwtKeys::from_ref(state)
            .decode(token, TokenKind::Access)
            .map_err(|e| {
                warn!(error = %e, "rejected bearer token");
                AppError::Unauthorized("Invalid or expired token".into())
            })?;
        Ok(AuthUser(claims.sub))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(issuer: &str, audience: &str) -> JwtKeys {
        JwtKeys::new(&JwtConfig {
            secret: "kitchen-secret".into(),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl_minutes: 5,
            refresh_ttl_minutes: 60,
        })
    }

    fn parts_with(auth: Option<&str>) -> Parts {
        let mut req = axum::http::Request::builder();
        if let Some(value) = auth {
            req = req.header(AUTHORIZATION, value);
        }
        req.body(()).unwrap().into_parts().0
    }

    #[test]
    fn password_hash_accepts_only_the_original() {
        let hash = hash_password("flour-and-water").unwrap();
        assert_ne!(hash, "flour-and-water");
        assert!(verify_password("flour-and-water", &hash).unwrap());
        assert!(!verify_password("flour-and-salt", &hash).unwrap());
        assert!(verify_password("anything", "plain-text").is_err());
    }

    #[test]
    fn validates_email_and_username() {
        assert!(is_valid_email("cook@example.com"));
        assert!(!is_valid_email("cook@example"));
        assert!(!is_valid_email("co ok@example.com"));

        assert!(is_valid_username("chef.anna+1@home"));
        assert!(is_valid_username("повар_42"));
        assert!(!is_valid_username("chef anna"));
        assert!(!is_valid_username(""));
        assert!(!is_valid_username(&"a".repeat(MAX_USERNAME_LEN + 1)));
    }

    #[test]
    fn pair_decodes_by_kind() {
        let k = keys("foodgram", "cooks");
        let user = Uuid::new_v4();
        let (access, refresh) = k.sign_pair(user).unwrap();

        let claims = k.decode(&access, TokenKind::Access).unwrap();
        assert_eq!((claims.sub, claims.kind), (user, TokenKind::Access));
        assert_eq!(claims.exp - claims.iat, 5 * 60);
        assert_eq!(k.decode(&refresh, TokenKind::Refresh).unwrap().sub, user);

        assert!(k.decode(&access, TokenKind::Refresh).is_err());
        assert!(k.decode(&refresh, TokenKind::Access).is_err());
    }

    #[test]
    fn foreign_or_expired_tokens_are_rejected() {
        let k = keys("foodgram", "cooks");
        let token = k.sign(Uuid::new_v4(), TokenKind::Access).unwrap();
        assert!(keys("other", "cooks").decode(&token, TokenKind::Access).is_err());
        assert!(keys("foodgram", "others").decode(&token, TokenKind::Access).is_err());

        let now = OffsetDateTime::now_utc().unix_timestamp();
        let stale = Claims {
            sub: Uuid::new_v4(),
            iat: now - 3600,
            exp: now - 600,
            iss: "foodgram".into(),
            aud: "cooks".into(),
            kind: TokenKind::Access,
        };
        let token = encode(&Header::default(), &stale, &k.encoding).unwrap();
        assert!(k.decode(&token, TokenKind::Access).is_err());
    }

    #[tokio::test]
    async fn extractor_accepts_only_access_tokens() {
        let state = AppState::fake();
        let k = JwtKeys::from_ref(&state);
        let user = Uuid::new_v4();

        let access = k.sign(user, TokenKind::Access).unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {access}")));
        let AuthUser(id) = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(id, user);

        let refresh = k.sign(user, TokenKind::Refresh).unwrap();
        for header in [None, Some(access.clone()), Some(format!("Bearer {refresh}"))] {
            let mut parts = parts_with(header.as_deref());
            let err = AuthUser::from_request_parts(&mut parts, &state).await.unwrap_err();
            assert!(matches!(err, AppError::Unauthorized(_)));
        }
    }
}
