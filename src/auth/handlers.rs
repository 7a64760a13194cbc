use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, PublicUser, RefreshRequest, RegisterRequest, UpdateMeRequest},
        jwt::{AuthUser, JwtKeys},
        password::{hash_password, verify_password},
        repo::{normalize_email, User},
    },
    error::AppError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me).patch(update_me))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn token_pair(state: &AppState, user: &User) -> anyhow::Result<AuthResponse> {
    let keys = JwtKeys::from_ref(state);
    Ok(AuthResponse {
        access_token: keys.sign_access(user.id)?,
        refresh_token: keys.sign_refresh(user.id)?,
        user: PublicUser {
            id: user.id,
            email: user.email.clone(),
        },
    })
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let email = normalize_email(&payload.email);

    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::field("email", "Enter a valid email address."));
    }

    if payload.password.len() < 8 {
        warn!("password too short");
        return Err(AppError::field(
            "password",
            "Password must be at least 8 characters.",
        ));
    }

    if User::find_by_email(&state.db, &email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let hash = hash_password(&payload.password)?;
    let user = User::create(&state.db, &email, &hash).await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((StatusCode::CREATED, Json(token_pair(&state, &user)?)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let email = normalize_email(&payload.email);

    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::field("email", "Enter a valid email address."));
    }

    let user = match User::find_by_email(&state.db, &email).await? {
        Some(u) => u,
        None => {
            warn!(email = %email, "login unknown email");
            return Err(AppError::unauthorized("Invalid credentials"));
        }
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(email = %email, user_id = %user.id, "login invalid password");
        return Err(AppError::unauthorized("Invalid credentials"));
    }

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(token_pair(&state, &user)?))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| AppError::unauthorized(e.to_string()))?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| AppError::unauthorized("User not found"))?;

    Ok(Json(token_pair(&state, &user)?))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, AppError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::unauthorized("User not found"))?;

    Ok(Json(PublicUser {
        id: user.id,
        email: user.email,
    }))
}

#[instrument(skip(state, payload))]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateMeRequest>,
) -> Result<Json<PublicUser>, AppError> {
    let mut user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::unauthorized("User not found"))?;

    if let Some(email) = payload.email {
        let email = normalize_email(&email);
        if !is_valid_email(&email) {
            return Err(AppError::field("email", "Enter a valid email address."));
        }
        if let Some(existing) = User::find_by_email(&state.db, &email).await? {
            if existing.id != user.id {
                return Err(AppError::Conflict("Email already registered".into()));
            }
        }
        user = User::update_email(&state.db, user.id, &email).await?;
    }

    if let Some(password) = payload.password {
        if password.len() < 8 {
            return Err(AppError::field(
                "password",
                "Password must be at least 8 characters.",
            ));
        }
        let hash = hash_password(&password)?;
        User::update_password(&state.db, user.id, &hash).await?;
    }

    info!(user_id = %user.id, "user profile updated");
    Ok(Json(PublicUser {
        id: user.id,
        email: user.email,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plausible_emails() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("User.Name+tag@sub.example.org"));
    }

    #[test]
    fn rejects_malformed_emails() {
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("two@at@signs.com"));
        assert!(!is_valid_email("spaces in@example.com"));
        assert!(!is_valid_email("missing-tld@example"));
    }
}
