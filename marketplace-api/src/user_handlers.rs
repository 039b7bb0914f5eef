use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use common_auth::{require_admin, require_admin_or_merchant, Role};
use common_http_errors::ApiError;
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::app::AppState;
use crate::gate::{forbid, AuthContext};
use crate::pagination::{PageParams, Pagination};

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    #[serde(rename = "fullName")]
    pub full_name: String,
    #[serde(rename = "userType")]
    pub user_type: String,
    pub status: String,
    #[serde(rename = "pfpImg")]
    pub pfp_img: Option<String>,
    #[serde(rename = "bgImg")]
    pub bg_img: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

const PROFILE_COLUMNS: &str =
    "id, email, full_name, user_type, status, pfp_img, bg_img, created_at";

pub async fn get_current_user(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<UserProfile>, ApiError> {
    let user = sqlx::query_as::<_, UserProfile>(&format!(
        "SELECT {PROFILE_COLUMNS} FROM users WHERE id = $1"
    ))
    .bind(auth.claims.user_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|err| ApiError::dependency("Failed to fetch user profile", err))?;

    match user {
        Some(user) => Ok(Json(user)),
        None => Err(ApiError::not_found("User profile not found")),
    }
}

#[derive(Deserialize)]
pub struct ListUsersQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    #[serde(rename = "userType")]
    pub user_type: Option<String>,
}

#[derive(Serialize)]
pub struct UsersPage {
    pub pagination: Pagination,
    pub users: Vec<UserProfile>,
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<UsersPage>, ApiError> {
    let params = PageParams::new(query.page, query.limit);
    // Some clients send the filter wrapped in literal quotes.
    let user_type = query
        .user_type
        .as_deref()
        .map(|value| value.trim_matches('"').to_string())
        .filter(|value| !value.is_empty());

    let page = fetch_profiles(&state, params, user_type.as_deref()).await?;
    Ok(Json(page))
}

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub id: Option<Uuid>,
}

pub async fn get_user_by_id(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<UserIdQuery>,
) -> Result<Json<UserProfile>, ApiError> {
    require_admin_or_merchant(&auth.claims).map_err(forbid)?;
    let id = query
        .id
        .ok_or_else(|| ApiError::validation("User ID is required"))?;

    let user = sqlx::query_as::<_, UserProfile>(&format!(
        "SELECT {PROFILE_COLUMNS} FROM users WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&state.db)
    .await
    .map_err(|err| ApiError::dependency("Failed to fetch user profile", err))?;

    match user {
        Some(user) => Ok(Json(user)),
        None => Err(ApiError::not_found("User profile not found")),
    }
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct CustomersPage {
    pub pagination: Pagination,
    pub customers: Vec<UserProfile>,
}

pub async fn list_customers(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<PageQuery>,
) -> Result<Json<CustomersPage>, ApiError> {
    require_admin_or_merchant(&auth.claims).map_err(forbid)?;
    let params = PageParams::new(query.page, query.limit);
    let page = fetch_profiles(&state, params, Some(Role::Customer.as_str())).await?;
    Ok(Json(CustomersPage {
        pagination: page.pagination,
        customers: page.users,
    }))
}

#[derive(Serialize)]
pub struct MerchantsPage {
    pub pagination: Pagination,
    pub merchants: Vec<UserProfile>,
}

pub async fn list_merchant_users(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<PageQuery>,
) -> Result<Json<MerchantsPage>, ApiError> {
    require_admin(&auth.claims).map_err(forbid)?;
    let params = PageParams::new(query.page, query.limit);
    let page = fetch_profiles(&state, params, Some(Role::Merchant.as_str())).await?;
    Ok(Json(MerchantsPage {
        pagination: page.pagination,
        merchants: page.users,
    }))
}

#[derive(Serialize)]
pub struct AdminsPage {
    pub pagination: Pagination,
    pub admins: Vec<UserProfile>,
}

pub async fn list_admins(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<PageQuery>,
) -> Result<Json<AdminsPage>, ApiError> {
    require_admin(&auth.claims).map_err(forbid)?;
    let params = PageParams::new(query.page, query.limit);
    let page = fetch_profiles(&state, params, Some(Role::Admin.as_str())).await?;
    Ok(Json(AdminsPage {
        pagination: page.pagination,
        admins: page.users,
    }))
}

async fn fetch_profiles(
    state: &AppState,
    params: PageParams,
    user_type: Option<&str>,
) -> Result<UsersPage, ApiError> {
    let mut count_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT COUNT(*) FROM users");
    if let Some(user_type) = user_type {
        count_builder.push(" WHERE user_type = ").push_bind(user_type);
    }
    let total: i64 = count_builder
        .build_query_scalar()
        .fetch_one(&state.db)
        .await
        .map_err(|err| ApiError::dependency("Failed to count users", err))?;

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT {PROFILE_COLUMNS} FROM users"));
    if let Some(user_type) = user_type {
        builder.push(" WHERE user_type = ").push_bind(user_type);
    }
    builder
        .push(" ORDER BY created_at DESC LIMIT ")
        .push_bind(params.limit)
        .push(" OFFSET ")
        .push_bind(params.offset());

    let users = builder
        .build_query_as::<UserProfile>()
        .fetch_all(&state.db)
        .await
        .map_err(|err| ApiError::dependency("Failed to fetch users", err))?;

    Ok(UsersPage {
        pagination: Pagination::new(total, params),
        users,
    })
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    #[serde(rename = "fullName")]
    pub full_name: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "userType")]
    pub user_type: Option<String>,
    pub status: Option<String>,
}

#[derive(Serialize)]
pub struct UserMutationResponse {
    pub message: &'static str,
    pub user: UserProfile,
}

pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<UserIdQuery>,
    Json(update): Json<UpdateUserRequest>,
) -> Result<Json<UserMutationResponse>, ApiError> {
    require_admin_or_merchant(&auth.claims).map_err(forbid)?;
    let id = query
        .id
        .ok_or_else(|| ApiError::validation("User ID is required"))?;
    if let Some(user_type) = &update.user_type {
        Role::parse(user_type).ok_or_else(|| ApiError::validation("Invalid user type"))?;
    }

    let user = apply_profile_update(
        &state,
        id,
        &update.full_name,
        &update.email,
        &update.user_type,
        &update.status,
        &None,
        &None,
    )
    .await?;

    Ok(Json(UserMutationResponse {
        message: "User updated successfully",
        user,
    }))
}

#[derive(Deserialize)]
pub struct PatchUserRequest {
    #[serde(rename = "fullName")]
    pub full_name: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "userType")]
    pub user_type: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "pfpImg")]
    pub pfp_img: Option<String>,
    #[serde(rename = "bgImg")]
    pub bg_img: Option<String>,
}

pub async fn patch_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<UserIdQuery>,
    Json(patch): Json<PatchUserRequest>,
) -> Result<Json<UserMutationResponse>, ApiError> {
    require_admin_or_merchant(&auth.claims).map_err(forbid)?;
    let id = query
        .id
        .ok_or_else(|| ApiError::validation("User ID is required"))?;
    if let Some(user_type) = &patch.user_type {
        Role::parse(user_type).ok_or_else(|| ApiError::validation("Invalid user type"))?;
    }

    let user = apply_profile_update(
        &state,
        id,
        &patch.full_name,
        &patch.email,
        &patch.user_type,
        &patch.status,
        &patch.pfp_img,
        &patch.bg_img,
    )
    .await?;

    Ok(Json(UserMutationResponse {
        message: "User patched successfully",
        user,
    }))
}

#[allow(clippy::too_many_arguments)]
async fn apply_profile_update(
    state: &AppState,
    id: Uuid,
    full_name: &Option<String>,
    email: &Option<String>,
    user_type: &Option<String>,
    status: &Option<String>,
    pfp_img: &Option<String>,
    bg_img: &Option<String>,
) -> Result<UserProfile, ApiError> {
    let user = sqlx::query_as::<_, UserProfile>(&format!(
        "UPDATE users SET
             full_name = COALESCE($1, full_name),
             email = COALESCE($2, email),
             user_type = COALESCE($3, user_type),
             status = COALESCE($4, status),
             pfp_img = COALESCE($5, pfp_img),
             bg_img = COALESCE($6, bg_img)
         WHERE id = $7
         RETURNING {PROFILE_COLUMNS}"
    ))
    .bind(full_name)
    .bind(email)
    .bind(user_type)
    .bind(status)
    .bind(pfp_img)
    .bind(bg_img)
    .bind(id)
    .fetch_optional(&state.db)
    .await
    .map_err(|err| ApiError::dependency("Failed to update user profile", err))?;

    match user {
        Some(user) => Ok(user),
        None => Err(ApiError::not_found("User profile not found")),
    }
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub message: &'static str,
}

pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<UserIdQuery>,
) -> Result<Json<DeleteResponse>, ApiError> {
    require_admin_or_merchant(&auth.claims).map_err(forbid)?;
    let id = query
        .id
        .ok_or_else(|| ApiError::validation("User ID is required"))?;

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await
        .map_err(|err| ApiError::dependency("Failed to delete user", err))?;

    // Best-effort: a deleted user should not keep a live session around.
    if let Err(err) = state.active_sessions.revoke_all_for_user(id).await {
        tracing::warn!(user_id = %id, error = ?err, "Failed to clear sessions for deleted user");
    }

    Ok(Json(DeleteResponse {
        message: "User deleted successfully",
    }))
}
