// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
//! Token issuance and request authentication.
//!
//! - `POST /api/auth/token` exchanges an email/password pair for a signed access token.
//! - [`AuthUser`] and [`AdminUser`] are extractors that resolve the bearer token of a
//!   request into an active account, rejecting with 401 (or 403 for missing admin rights).

use crate::config::{BootstrapAdmin, ServerConfig};
use crate::database;
use crate::handlers::AppError;
use crate::state::AppState;
use anyhow::{Context, anyhow};
use argon2::password_hash::{
    PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
};
use argon2::Argon2;
use axum::{
    extract::{FromRequestParts, Json, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION, request::Parts},
};
use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use taskboard_common::{Claims, LoginPayload, TokenError, TokenResponse, User, token};
use tracing::{debug, error, info};

/// Signs and verifies access tokens with the server secret.
pub struct TokenIssuer {
    secret: Vec<u8>,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: Vec<u8>, ttl: Duration) -> Self {
        Self { secret, ttl }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.token_secret.clone(), config.token_ttl)
    }

    pub fn issue(&self, user: &User) -> anyhow::Result<String> {
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(self.ttl)
            .context("Token lifetime overflows the calendar")?;
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            is_admin: user.is_admin,
            is_superadmin: user.is_superadmin,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        token::encode(&claims, &self.secret).context("Failed to sign access token")
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        token::verify(token, &self.secret, Utc::now().timestamp())
    }
}

/// Argon2id hash in PHC string format (`$argon2id$v=19$...`).
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("Failed to hash password: {e}"))?;
    Ok(hash.to_string())
}

/// False for a wrong password and for anything that is not a PHC hash.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Creates the configured superadmin if no account uses that email yet.
pub async fn ensure_bootstrap_admin(
    pool: &SqlitePool,
    admin: &BootstrapAdmin,
) -> anyhow::Result<User> {
    if let Some(existing) = database::find_user_by_email(pool, &admin.email).await? {
        debug!("Bootstrap admin {} already exists.", admin.email);
        return Ok(existing.user);
    }

    let password_hash = hash_password(&admin.password)?;
    let user = database::create_user_in_db(pool, &admin.email, &password_hash, true, true).await?;
    info!("Created bootstrap superadmin {} (ID {}).", user.email, user.id);
    Ok(user)
}

/// Handler for `POST /api/auth/token`.
pub async fn issue_token(
    State(state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> Result<Json<TokenResponse>, AppError> {
    let email = payload.email.trim();
    debug!("Received token request for: {}", email);

    let record = database::find_user_by_email(&state.pool, email).await?;
    let Some(record) = record.filter(|r| verify_password(&payload.password, &r.password_hash))
    else {
        error!("Authentication failed for: {}", email);
        return Err(AppError::new(
            StatusCode::UNAUTHORIZED,
            "Invalid email or password.",
        ));
    };

    if !record.user.is_active {
        error!("Authentication refused for disabled account: {}", email);
        return Err(AppError::new(StatusCode::UNAUTHORIZED, "Account is disabled."));
    }

    let access_token = state.tokens.issue(&record.user)?;
    info!("Issued access token for user ID: {}", record.user.id);

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
    }))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// The active account behind the request's bearer token.
pub struct AuthUser(pub User);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(&parts.headers) else {
            debug!("Rejecting {}: no bearer token.", parts.uri.path());
            return Err(AppError::new(
                StatusCode::UNAUTHORIZED,
                "Authentication required.",
            ));
        };

        let claims = state.tokens.verify(token).map_err(|e| {
            debug!("Rejecting {}: {}", parts.uri.path(), e);
            AppError::new(StatusCode::UNAUTHORIZED, "Invalid or expired token.")
        })?;

        match database::get_user_from_db(&state.pool, claims.sub).await? {
            Some(user) if user.is_active => Ok(AuthUser(user)),
            Some(_) => Err(AppError::new(StatusCode::UNAUTHORIZED, "Account is disabled.")),
            None => Err(AppError::new(
                StatusCode::UNAUTHORIZED,
                "Invalid or expired token.",
            )),
        }
    }
}

/// Like [`AuthUser`], but the account must also hold the admin role.
pub struct AdminUser(pub User);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if !(user.is_admin || user.is_superadmin) {
            error!("User ID {} is not allowed on {}", user.id, parts.uri.path());
            return Err(AppError::new(
                StatusCode::FORBIDDEN,
                "Administrator rights required.",
            ));
        }
        Ok(AdminUser(user))
    }
}
