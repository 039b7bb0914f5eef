use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use common_auth::{require_admin, require_admin_or_merchant, require_merchant};
use common_http_errors::ApiError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::app::AppState;
use crate::events;
use crate::gate::{forbid, AuthContext};
use crate::pagination::{PageParams, Pagination};

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct MerchantProfile {
    pub id: Uuid,
    pub email: String,
    #[serde(rename = "fullName")]
    pub full_name: Option<String>,
    #[serde(rename = "userType")]
    pub user_type: String,
    pub status: String,
    #[serde(rename = "pfpImg")]
    pub pfp_img: Option<String>,
    #[serde(rename = "bgImg")]
    pub bg_img: Option<String>,
    pub country: Option<String>,
    #[serde(rename = "commercialNumber")]
    pub commercial_number: Option<String>,
    #[serde(rename = "nationalNumber")]
    pub national_number: Option<String>,
    pub products: Value,
    pub stores: Value,
    pub theme: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

const MERCHANT_COLUMNS: &str = "id, email, full_name, user_type, status, pfp_img, bg_img, \
     country, commercial_number, national_number, products, stores, theme, created_at";

#[derive(Deserialize)]
pub struct NewMerchantProfile {
    pub email: String,
    #[serde(rename = "fullName")]
    pub full_name: Option<String>,
    pub country: Option<String>,
    #[serde(rename = "pfpImg")]
    pub pfp_img: Option<String>,
    #[serde(rename = "bgImg")]
    pub bg_img: Option<String>,
    pub products: Option<Value>,
    pub stores: Option<Value>,
    #[serde(rename = "commercialNumber")]
    pub commercial_number: Option<String>,
    #[serde(rename = "nationalNumber")]
    pub national_number: Option<String>,
}

#[derive(Serialize)]
pub struct MerchantMutationResponse {
    pub message: &'static str,
    pub merchant: MerchantProfile,
}

pub async fn create_merchant_profile(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(profile): Json<NewMerchantProfile>,
) -> Result<(StatusCode, Json<MerchantMutationResponse>), ApiError> {
    // Only merchants own merchant profiles; the profile id is the caller's
    // identity id.
    require_merchant(&auth.claims).map_err(forbid)?;
    let merchant_id = auth.claims.user_id;

    let existing: Option<Uuid> = sqlx::query_scalar("SELECT id FROM merchants WHERE id = $1")
        .bind(merchant_id)
        .fetch_optional(&state.db)
        .await
        .map_err(|err| ApiError::dependency("Error checking merchant profile", err))?;
    if existing.is_some() {
        return Err(ApiError::validation("Merchant profile already exists"));
    }

    let merchant = sqlx::query_as::<_, MerchantProfile>(&format!(
        "INSERT INTO merchants (id, email, full_name, user_type, status, pfp_img, bg_img, \
             country, commercial_number, national_number, products, stores, theme)
         VALUES ($1, $2, $3, 'merchant', 'Pending', $4, $5, $6, $7, $8, \
             COALESCE($9, '[]'::jsonb), COALESCE($10, '[]'::jsonb), 'light')
         RETURNING {MERCHANT_COLUMNS}"
    ))
    .bind(merchant_id)
    .bind(&profile.email)
    .bind(&profile.full_name)
    .bind(&profile.pfp_img)
    .bind(&profile.bg_img)
    .bind(&profile.country)
    .bind(&profile.commercial_number)
    .bind(&profile.national_number)
    .bind(&profile.products)
    .bind(&profile.stores)
    .fetch_one(&state.db)
    .await
    .map_err(|err| ApiError::dependency("Failed to create merchant profile", err))?;

    Ok((
        StatusCode::CREATED,
        Json(MerchantMutationResponse {
            message: "Merchant profile created successfully",
            merchant,
        }),
    ))
}

#[derive(Deserialize)]
pub struct MerchantIdQuery {
    pub id: Option<Uuid>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct MerchantsPage {
    pub pagination: Pagination,
    pub merchants: Vec<MerchantProfile>,
}

pub async fn get_merchant_profile(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(query): Query<MerchantIdQuery>,
) -> Result<Json<MerchantsPage>, ApiError> {
    let id = query
        .id
        .ok_or_else(|| ApiError::validation("Merchant ID is required"))?;
    let params = PageParams::new(query.page, query.limit);

    let merchant = sqlx::query_as::<_, MerchantProfile>(&format!(
        "SELECT {MERCHANT_COLUMNS} FROM merchants WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&state.db)
    .await
    .map_err(|err| ApiError::dependency("Failed to fetch merchant profile", err))?;

    // An unknown merchant id yields an empty page, not a 404.
    let merchants: Vec<MerchantProfile> = merchant.into_iter().collect();
    let total = merchants.len() as i64;
    Ok(Json(MerchantsPage {
        pagination: Pagination::new(total, params),
        merchants,
    }))
}

#[derive(Deserialize)]
pub struct MerchantsPageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_merchants(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<MerchantsPageQuery>,
) -> Result<Json<MerchantsPage>, ApiError> {
    require_admin(&auth.claims).map_err(forbid)?;
    let params = PageParams::new(query.page, query.limit);

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM merchants")
        .fetch_one(&state.db)
        .await
        .map_err(|err| ApiError::dependency("Failed to count merchants", err))?;

    let merchants = sqlx::query_as::<_, MerchantProfile>(&format!(
        "SELECT {MERCHANT_COLUMNS} FROM merchants ORDER BY created_at DESC LIMIT $1 OFFSET $2"
    ))
    .bind(params.limit)
    .bind(params.offset())
    .fetch_all(&state.db)
    .await
    .map_err(|err| ApiError::dependency("Failed to fetch merchants", err))?;

    Ok(Json(MerchantsPage {
        pagination: Pagination::new(total, params),
        merchants,
    }))
}

/// `id`, `created_at`, `email`, and `user_type` are immutable through this
/// surface by construction.
#[derive(Deserialize)]
pub struct UpdateMerchantProfile {
    #[serde(rename = "fullName")]
    pub full_name: Option<String>,
    pub country: Option<String>,
    #[serde(rename = "pfpImg")]
    pub pfp_img: Option<String>,
    #[serde(rename = "bgImg")]
    pub bg_img: Option<String>,
    pub products: Option<Value>,
    pub stores: Option<Value>,
    #[serde(rename = "commercialNumber")]
    pub commercial_number: Option<String>,
    #[serde(rename = "nationalNumber")]
    pub national_number: Option<String>,
    pub status: Option<String>,
    pub theme: Option<String>,
}

pub async fn update_merchant_profile(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<MerchantIdQuery>,
    Json(update): Json<UpdateMerchantProfile>,
) -> Result<Json<MerchantMutationResponse>, ApiError> {
    require_admin_or_merchant(&auth.claims).map_err(forbid)?;
    let id = query
        .id
        .ok_or_else(|| ApiError::validation("Merchant ID is required"))?;

    let merchant = sqlx::query_as::<_, MerchantProfile>(&format!(
        "UPDATE merchants SET
             full_name = COALESCE($1, full_name),
             country = COALESCE($2, country),
             pfp_img = COALESCE($3, pfp_img),
             bg_img = COALESCE($4, bg_img),
             products = COALESCE($5, products),
             stores = COALESCE($6, stores),
             commercial_number = COALESCE($7, commercial_number),
             national_number = COALESCE($8, national_number),
             status = COALESCE($9, status),
             theme = COALESCE($10, theme)
         WHERE id = $11
         RETURNING {MERCHANT_COLUMNS}"
    ))
    .bind(&update.full_name)
    .bind(&update.country)
    .bind(&update.pfp_img)
    .bind(&update.bg_img)
    .bind(&update.products)
    .bind(&update.stores)
    .bind(&update.commercial_number)
    .bind(&update.national_number)
    .bind(&update.status)
    .bind(&update.theme)
    .bind(id)
    .fetch_optional(&state.db)
    .await
    .map_err(|err| ApiError::dependency("Failed to update merchant profile", err))?;

    let merchant = match merchant {
        Some(merchant) => merchant,
        None => return Err(ApiError::not_found("Merchant profile not found")),
    };

    events::emit(
        state.broadcaster.as_ref(),
        "merchantUpdated",
        serde_json::to_value(&merchant).unwrap_or(Value::Null),
    )
    .await;

    Ok(Json(MerchantMutationResponse {
        message: "Merchant profile updated successfully",
        merchant,
    }))
}

#[derive(Serialize)]
pub struct DeleteMerchantResponse {
    pub message: &'static str,
}

pub async fn delete_merchant_profile(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<MerchantIdQuery>,
) -> Result<Json<DeleteMerchantResponse>, ApiError> {
    require_admin_or_merchant(&auth.claims).map_err(forbid)?;
    let id = query
        .id
        .ok_or_else(|| ApiError::validation("Merchant ID is required"))?;

    sqlx::query("DELETE FROM merchants WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await
        .map_err(|err| ApiError::dependency("Failed to delete merchant profile", err))?;

    Ok(Json(DeleteMerchantResponse {
        message: "Merchant profile deleted successfully",
    }))
}
