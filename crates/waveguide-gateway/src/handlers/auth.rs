//! Authentication handlers.
//!
//! - `POST /api/v1/auth/register` - create a user, returns a token (201)
//! - `POST /api/v1/auth/login` - exchange credentials for a token
//! - `POST /api/v1/auth/logout` - revoke the presented token (protected)
//! - `GET /api/v1/auth/me` - current user (protected)

use crate::audit::{record_user_action, UserAction};
use crate::auth::claims::{EMAIL_CLAIM, USER_ID_CLAIM};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::Identity;
use crate::directory::{NewUser, User};
use crate::errors::{ApiError, ApiRejection};
use crate::observability::metrics::record_revocation;
use crate::routes::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{StatusCode, Uri},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

const MIN_USERNAME_LEN: usize = 3;
const MAX_USERNAME_LEN: usize = 50;
const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 72;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Token issued on register and login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
    pub username: String,
    pub email: String,
}

/// Response for `GET /api/v1/auth/me`.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for MeResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

/// Unwrap a JSON body, rendering extractor failures in the common error shape.
fn json_body<T>(body: Result<Json<T>, JsonRejection>, uri: &Uri) -> Result<T, ApiRejection> {
    body.map(|Json(value)| value).map_err(|rejection| {
        ApiError::BadRequest("Malformed request body".to_string())
            .at(uri.path())
            .with_detail(rejection.body_text())
    })
}

/// Field-level checks for registration. Returns one line per violation.
fn validate_registration(req: &RegisterRequest) -> Vec<String> {
    let mut details = Vec::new();

    let username_len = req.username.chars().count();
    if !(MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&username_len) {
        details.push(format!(
            "username: must be between {MIN_USERNAME_LEN} and {MAX_USERNAME_LEN} characters"
        ));
    } else if !req
        .username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        details.push(
            "username: may contain only letters, digits, '.', '_' and '-'".to_string(),
        );
    }

    if !is_plausible_email(&req.email) {
        details.push("email: must be a well-formed email address".to_string());
    }

    // bcrypt only reads the first 72 bytes
    if req.password.chars().count() < MIN_PASSWORD_LEN || req.password.len() > MAX_PASSWORD_LEN {
        details.push(format!(
            "password: must be at least {MIN_PASSWORD_LEN} characters and at most {MAX_PASSWORD_LEN} bytes"
        ));
    }

    details
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

/// Sign a token for `user` carrying the `userId` and `email` claims.
fn issue_for(state: &AppState, user: &User) -> Result<AuthResponse, ApiError> {
    let mut extra = Map::new();
    extra.insert(USER_ID_CLAIM.to_string(), json!(user.id.to_string()));
    extra.insert(EMAIL_CLAIM.to_string(), json!(user.email));

    let issued = state.codec.issue(
        &user.username,
        extra,
        chrono::Duration::seconds(state.config.jwt_ttl_seconds),
    )?;

    Ok(AuthResponse {
        token: issued.token,
        token_type: "Bearer",
        expires_at: issued.expires_at,
        username: user.username.clone(),
        email: user.email.clone(),
    })
}

/// Check a login password against `user`'s hash.
///
/// Without a matching account the decoy hash is verified instead and the
/// result is always `false`, so both paths cost one bcrypt verify.
async fn check_password(
    state: &AppState,
    user: Option<&User>,
    password: String,
) -> Result<bool, ApiError> {
    let (hash, known) = match user {
        Some(user) => (user.password_hash.clone(), true),
        None => (state.login_decoy.hash().await?.to_string(), false),
    };

    let valid = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| {
            tracing::error!(target: "waveguide.handlers.auth", error = %e, "Password verification task failed");
            ApiError::Internal
        })?;

    Ok(known && valid)
}

/// Handler for POST /api/v1/auth/register
///
/// ## Response
///
/// - 201 Created with an [`AuthResponse`]
/// - 400 with `details` when fields fail validation
/// - 409 when the username or email is already registered
#[instrument(skip_all, name = "waveguide.handlers.register")]
pub async fn register(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiRejection> {
    let req = json_body(body, &uri)?;

    let details = validate_registration(&req);
    if !details.is_empty() {
        let rejection = ApiError::BadRequest("Validation error".to_string()).at(uri.path());
        return Err(details
            .into_iter()
            .fold(rejection, |rejection, detail| rejection.with_detail(detail)));
    }

    let cost = state.config.bcrypt_cost;
    let password = req.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password, cost))
        .await
        .map_err(|e| {
            tracing::error!(target: "waveguide.handlers.auth", error = %e, "Password hashing task failed");
            ApiError::Internal.at(uri.path())
        })?
        .map_err(|e| e.at(uri.path()))?;

    let user = state
        .directory
        .create(NewUser {
            username: req.username,
            email: req.email,
            password_hash,
        })
        .await
        .map_err(|e| ApiError::from(e).at(uri.path()))?;

    let response = issue_for(&state, &user).map_err(|e| e.at(uri.path()))?;

    record_user_action(
        state.audit.as_ref(),
        Some(user.id),
        &user.username,
        UserAction::Registration,
        "User registered successfully",
    )
    .await;

    tracing::info!(target: "waveguide.handlers.auth", user_id = %user.id, "User registered");

    Ok((StatusCode::CREATED, Json(response)))
}

/// Handler for POST /api/v1/auth/login
///
/// Unknown email and wrong password are indistinguishable (401
/// "Invalid email or password"), in body and in bcrypt work done.
#[instrument(skip_all, name = "waveguide.handlers.login")]
pub async fn login(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiRejection> {
    let req = json_body(body, &uri)?;

    let user = state
        .directory
        .find_by_email(&req.email)
        .await
        .map_err(|e| ApiError::from(e).at(uri.path()))?;

    let valid = check_password(&state, user.as_ref(), req.password)
        .await
        .map_err(|e| e.at(uri.path()))?;

    let user = match user {
        Some(user) if valid => user,
        Some(user) => {
            tracing::debug!(target: "waveguide.handlers.auth", user_id = %user.id, "Login with wrong password");
            return Err(ApiError::InvalidCredentials.at(uri.path()));
        }
        None => {
            tracing::debug!(target: "waveguide.handlers.auth", "Login for unknown email");
            return Err(ApiError::InvalidCredentials.at(uri.path()));
        }
    };

    let response = issue_for(&state, &user).map_err(|e| e.at(uri.path()))?;

    record_user_action(
        state.audit.as_ref(),
        Some(user.id),
        &user.username,
        UserAction::Login,
        "User logged in successfully",
    )
    .await;

    tracing::info!(target: "waveguide.handlers.auth", user_id = %user.id, "User logged in");

    Ok(Json(response))
}

/// Handler for POST /api/v1/auth/logout
///
/// Revokes the token the caller authenticated with until its natural expiry.
/// Returns 204 No Content; logging out twice is not an error.
#[instrument(skip_all, name = "waveguide.handlers.logout")]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    Extension(identity): Extension<Identity>,
) -> Result<StatusCode, ApiRejection> {
    // Trusted here only because the gate verified this exact token
    let expiry = state.codec.expiry_of(&identity.token).map_err(|e| {
        tracing::error!(target: "waveguide.handlers.auth", error = %e, "Verified token has no readable expiry");
        ApiError::Internal.at(uri.path())
    })?;

    if state.revocations.revoke(&identity.token, expiry) {
        record_revocation();
        tracing::info!(target: "waveguide.handlers.auth", expires_at = %expiry, "Token revoked on logout");
    }

    let user_id = identity
        .claims
        .user_id()
        .and_then(|id| Uuid::parse_str(id).ok());
    record_user_action(
        state.audit.as_ref(),
        user_id,
        &identity.subject,
        UserAction::Logout,
        "User logged out successfully",
    )
    .await;

    Ok(StatusCode::NO_CONTENT)
}

/// Handler for GET /api/v1/auth/me
///
/// Resolves the verified subject through the user directory.
#[instrument(skip_all, name = "waveguide.handlers.me")]
pub async fn me(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    Extension(identity): Extension<Identity>,
) -> Result<Json<MeResponse>, ApiRejection> {
    let user = state
        .directory
        .find_by_username(&identity.subject)
        .await
        .map_err(|e| ApiError::from(e).at(uri.path()))?
        .ok_or_else(|| {
            tracing::debug!(target: "waveguide.handlers.auth", "Verified subject not found in directory");
            ApiError::UnknownSubject.at(uri.path())
        })?;

    Ok(Json(MeResponse::from(user)))
}
