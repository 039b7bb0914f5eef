use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use common_auth::{Role, TokenIdentity, TokenPurpose};
use common_http_errors::ApiError;
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use crate::app::AppState;
use crate::gate::AuthContext;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(rename = "fullName")]
    pub full_name: String,
    #[serde(rename = "userType")]
    pub user_type: String,
    pub status: Option<String>,
    #[serde(rename = "pfpImg")]
    pub pfp_img: Option<String>,
    #[serde(rename = "bgImg")]
    pub bg_img: Option<String>,
}

#[derive(Serialize)]
pub struct RegisteredUser {
    pub email: String,
    #[serde(rename = "fullName")]
    pub full_name: String,
    #[serde(rename = "userType")]
    pub user_type: Role,
    pub status: String,
    #[serde(rename = "pfpImg")]
    pub pfp_img: Option<String>,
    #[serde(rename = "bgImg")]
    pub bg_img: Option<String>,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    #[serde(rename = "userId")]
    pub user_id: Uuid,
    pub token: String,
    pub user: RegisteredUser,
}

pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    // Validation fails before any external call.
    let role =
        Role::parse(&request.user_type).ok_or_else(|| ApiError::validation("Invalid user type"))?;
    if !request.email.contains('@') {
        return Err(ApiError::validation("Invalid email address"));
    }
    if request.password.len() < 6 {
        return Err(ApiError::validation(
            "Password must be at least 6 characters",
        ));
    }
    if request.full_name.trim().is_empty() {
        return Err(ApiError::validation("Full name is required"));
    }

    let status = request.status.unwrap_or_else(|| "Active".to_string());

    let identity = state
        .credentials
        .create_identity(&request.email, &request.password, &request.full_name, role, &status)
        .await
        .map_err(|err| {
            error!(email = %request.email, error = ?err, "Identity creation failed");
            ApiError::dependency("Registration failed", err)
        })?;

    // No compensating rollback: a profile-insert failure after this point
    // leaves the identity behind.
    sqlx::query(
        "INSERT INTO users (id, email, full_name, user_type, status, pfp_img, bg_img)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(identity.id)
    .bind(&identity.email)
    .bind(&identity.full_name)
    .bind(role.as_str())
    .bind(&status)
    .bind(&request.pfp_img)
    .bind(&request.bg_img)
    .execute(&state.db)
    .await
    .map_err(|err| {
        error!(user_id = %identity.id, error = ?err, "User profile insert failed");
        ApiError::dependency("Failed to create user profile", err)
    })?;

    // Registration tokens are short-lived and carry no status claim.
    let token_identity = TokenIdentity {
        user_id: identity.id,
        email: identity.email.clone(),
        role,
        status: None,
    };
    let issued = state
        .signer
        .issue(&token_identity, TokenPurpose::Registration)
        .map_err(|err| {
            error!(user_id = %identity.id, error = ?err, "Failed to issue registration token");
            ApiError::internal("Unable to issue authentication token")
        })?;

    state.metrics.registration();

    // Registration deliberately creates no active-session entry; only login
    // does.
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: identity.id,
            token: issued.token,
            user: RegisteredUser {
                email: identity.email,
                full_name: identity.full_name,
                user_type: role,
                status,
                pfp_img: request.pfp_img,
                bg_img: request.bg_img,
            },
        }),
    ))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginUser {
    pub id: Uuid,
    pub email: String,
    #[serde(rename = "fullName")]
    pub full_name: String,
    #[serde(rename = "userType")]
    pub user_type: Role,
    pub status: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: LoginUser,
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let identity = match state
        .credentials
        .verify_credentials(&request.email, &request.password)
        .await
    {
        Ok(Some(identity)) => identity,
        // One message for unknown email and wrong password alike.
        Ok(None) => {
            state.metrics.login_attempt("invalid_credentials");
            return Err(ApiError::authentication("Invalid credentials"));
        }
        Err(err) => {
            state.metrics.login_attempt("error");
            error!(email = %request.email, error = ?err, "Credential check failed");
            return Err(ApiError::dependency("Login failed", err));
        }
    };

    let token_identity = TokenIdentity {
        user_id: identity.id,
        email: identity.email.clone(),
        role: identity.role,
        status: Some(identity.status.clone()),
    };
    let issued = state
        .signer
        .issue(&token_identity, TokenPurpose::Session)
        .map_err(|err| {
            state.metrics.login_attempt("error");
            error!(user_id = %identity.id, error = ?err, "Failed to issue session token");
            ApiError::internal("Unable to issue authentication token")
        })?;

    // One upsert both supersedes any prior session and records the new one.
    // An untracked long-lived token is worse than a failed login, so this
    // write is fatal to the request.
    state
        .active_sessions
        .replace(identity.id, &issued.token, issued.expires_at)
        .await
        .map_err(|err| {
            state.metrics.login_attempt("error");
            error!(user_id = %identity.id, error = ?err, "Failed to store new active token");
            ApiError::dependency("Failed to store new active token", err)
        })?;

    state.metrics.login_attempt("success");

    Ok(Json(LoginResponse {
        token: issued.token,
        user: LoginUser {
            id: identity.id,
            email: identity.email,
            full_name: identity.full_name,
            user_type: identity.role,
            status: identity.status,
        },
    }))
}

#[derive(Serialize)]
pub struct LogoutResponse {
    pub message: &'static str,
}

/// Runs behind the auth gate, so a revoked or malformed token never reaches
/// this handler. Removing the active entry and recording the revocation are
/// both required for a successful logout.
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<LogoutResponse>, ApiError> {
    state
        .active_sessions
        .remove_if_matches(auth.claims.user_id, &auth.token)
        .await
        .map_err(|err| {
            error!(user_id = %auth.claims.user_id, error = ?err, "Failed to remove active token");
            ApiError::dependency("Failed to remove active token", err)
        })?;

    // The revocation entry inherits the token's own claimed expiry.
    let expires_at = auth.claims.expires_at().unwrap_or_else(Utc::now);
    state
        .revoked_tokens
        .add(&auth.token, auth.claims.user_id, expires_at)
        .await
        .map_err(|err| {
            error!(user_id = %auth.claims.user_id, error = ?err, "Failed to blacklist token");
            ApiError::dependency("Error during logout", err)
        })?;

    Ok(Json(LogoutResponse {
        message: "Logged out successfully",
    }))
}
