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
use crate::gate::{forbid, AuthContext};
use crate::pagination::{PageParams, Pagination};

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct Store {
    pub id: Uuid,
    #[serde(rename = "merchantId")]
    pub merchant_id: Uuid,
    pub name: String,
    pub location: Option<String>,
    pub products: Value,
    #[serde(rename = "storeLogo")]
    pub store_logo: Option<String>,
    #[serde(rename = "storeBg")]
    pub store_bg: Option<String>,
    pub images: Option<Value>,
    pub categories: Option<Value>,
    #[serde(rename = "regNumber")]
    pub reg_number: Option<String>,
    pub status: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

const STORE_COLUMNS: &str = "id, merchant_id, name, location, products, store_logo, store_bg, \
     images, categories, reg_number, status, created_at";

#[derive(Deserialize)]
pub struct NewStore {
    pub name: String,
    pub location: Option<String>,
    pub products: Option<Value>,
    #[serde(rename = "storeLogo")]
    pub store_logo: Option<String>,
    #[serde(rename = "storeBg")]
    pub store_bg: Option<String>,
    pub images: Option<Value>,
    pub categories: Option<Value>,
    #[serde(rename = "regNumber")]
    pub reg_number: Option<String>,
}

pub async fn create_store(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(new_store): Json<NewStore>,
) -> Result<(StatusCode, Json<Store>), ApiError> {
    require_merchant(&auth.claims).map_err(forbid)?;
    let merchant_id = auth.claims.user_id;
    let store_id = Uuid::new_v4();

    // New stores always start under review.
    let store = sqlx::query_as::<_, Store>(&format!(
        "INSERT INTO stores (id, merchant_id, name, location, products, store_logo, store_bg, \
             images, categories, reg_number, status)
         VALUES ($1, $2, $3, $4, COALESCE($5, '[]'::jsonb), $6, $7, $8, $9, $10, 'Under review')
         RETURNING {STORE_COLUMNS}"
    ))
    .bind(store_id)
    .bind(merchant_id)
    .bind(&new_store.name)
    .bind(&new_store.location)
    .bind(&new_store.products)
    .bind(&new_store.store_logo)
    .bind(&new_store.store_bg)
    .bind(&new_store.images)
    .bind(&new_store.categories)
    .bind(&new_store.reg_number)
    .fetch_one(&state.db)
    .await
    .map_err(|err| ApiError::dependency("Failed to create store", err))?;

    // Denormalized list of owned store ids on the merchant profile.
    if let Err(err) = sqlx::query(
        "UPDATE merchants SET stores = stores || jsonb_build_array(jsonb_build_object('id', $1::uuid))
         WHERE id = $2",
    )
    .bind(store_id)
    .bind(merchant_id)
    .execute(&state.db)
    .await
    {
        tracing::warn!(
            merchant_id = %merchant_id,
            error = ?err,
            "Failed to append store to merchant profile"
        );
    }

    Ok((StatusCode::CREATED, Json(store)))
}

#[derive(Deserialize)]
pub struct StoreIdQuery {
    pub id: Option<Uuid>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct StoresPage {
    pub pagination: Pagination,
    pub stores: Vec<Store>,
}

pub async fn get_store_by_id(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<StoreIdQuery>,
) -> Result<Json<StoresPage>, ApiError> {
    require_admin_or_merchant(&auth.claims).map_err(forbid)?;
    let id = query
        .id
        .ok_or_else(|| ApiError::validation("Store ID is required"))?;
    let params = PageParams::new(query.page, query.limit);

    let stores = sqlx::query_as::<_, Store>(&format!(
        "SELECT {STORE_COLUMNS} FROM stores WHERE id = $1"
    ))
    .bind(id)
    .fetch_all(&state.db)
    .await
    .map_err(|err| ApiError::dependency("Failed to fetch store", err))?;

    let total = stores.len() as i64;
    Ok(Json(StoresPage {
        pagination: Pagination::new(total, params),
        stores,
    }))
}

#[derive(Deserialize)]
pub struct AllStoresQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort: Option<String>,
    pub order: Option<String>,
}

pub async fn list_all_stores(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<AllStoresQuery>,
) -> Result<Json<StoresPage>, ApiError> {
    require_admin(&auth.claims).map_err(forbid)?;
    let params = PageParams::new(query.page, query.limit);

    // Sort input is mapped onto a fixed column set, never interpolated.
    let sort_column = match query.sort.as_deref() {
        Some("name") => "name",
        Some("status") => "status",
        _ => "created_at",
    };
    let direction = match query.order.as_deref() {
        Some("asc") => "ASC",
        _ => "DESC",
    };

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stores")
        .fetch_one(&state.db)
        .await
        .map_err(|err| ApiError::dependency("Failed to count stores", err))?;

    let stores = sqlx::query_as::<_, Store>(&format!(
        "SELECT {STORE_COLUMNS} FROM stores ORDER BY {sort_column} {direction} LIMIT $1 OFFSET $2"
    ))
    .bind(params.limit)
    .bind(params.offset())
    .fetch_all(&state.db)
    .await
    .map_err(|err| ApiError::dependency("Failed to fetch stores", err))?;

    Ok(Json(StoresPage {
        pagination: Pagination::new(total, params),
        stores,
    }))
}

#[derive(Deserialize)]
pub struct MerchantStoresQuery {
    pub id: Option<Uuid>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_stores_by_merchant(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<MerchantStoresQuery>,
) -> Result<Json<StoresPage>, ApiError> {
    require_admin_or_merchant(&auth.claims).map_err(forbid)?;
    let merchant_id = query
        .id
        .ok_or_else(|| ApiError::validation("Merchant ID is required"))?;
    let params = PageParams::new(query.page, query.limit);

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stores WHERE merchant_id = $1")
        .bind(merchant_id)
        .fetch_one(&state.db)
        .await
        .map_err(|err| ApiError::dependency("Failed to count stores", err))?;

    let stores = sqlx::query_as::<_, Store>(&format!(
        "SELECT {STORE_COLUMNS} FROM stores WHERE merchant_id = $1
         ORDER BY created_at DESC LIMIT $2 OFFSET $3"
    ))
    .bind(merchant_id)
    .bind(params.limit)
    .bind(params.offset())
    .fetch_all(&state.db)
    .await
    .map_err(|err| ApiError::dependency("Failed to fetch stores", err))?;

    Ok(Json(StoresPage {
        pagination: Pagination::new(total, params),
        stores,
    }))
}

#[derive(Deserialize)]
pub struct UpdateStore {
    pub name: Option<String>,
    pub location: Option<String>,
    pub products: Option<Value>,
    #[serde(rename = "storeLogo")]
    pub store_logo: Option<String>,
    #[serde(rename = "storeBg")]
    pub store_bg: Option<String>,
    pub images: Option<Value>,
    pub categories: Option<Value>,
    #[serde(rename = "regNumber")]
    pub reg_number: Option<String>,
    pub status: Option<String>,
}

pub async fn update_store(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<StoreIdQuery>,
    Json(update): Json<UpdateStore>,
) -> Result<Json<Store>, ApiError> {
    require_admin_or_merchant(&auth.claims).map_err(forbid)?;
    let id = query
        .id
        .ok_or_else(|| ApiError::validation("Store ID is required"))?;

    let store = sqlx::query_as::<_, Store>(&format!(
        "UPDATE stores SET
             name = COALESCE($1, name),
             location = COALESCE($2, location),
             products = COALESCE($3, products),
             store_logo = COALESCE($4, store_logo),
             store_bg = COALESCE($5, store_bg),
             images = COALESCE($6, images),
             categories = COALESCE($7, categories),
             reg_number = COALESCE($8, reg_number),
             status = COALESCE($9, status)
         WHERE id = $10
         RETURNING {STORE_COLUMNS}"
    ))
    .bind(&update.name)
    .bind(&update.location)
    .bind(&update.products)
    .bind(&update.store_logo)
    .bind(&update.store_bg)
    .bind(&update.images)
    .bind(&update.categories)
    .bind(&update.reg_number)
    .bind(&update.status)
    .bind(id)
    .fetch_optional(&state.db)
    .await
    .map_err(|err| ApiError::dependency("Failed to update store", err))?;

    match store {
        Some(store) => Ok(Json(store)),
        None => Err(ApiError::not_found("Store not found")),
    }
}

#[derive(Serialize)]
pub struct DeleteStoreResponse {
    pub message: &'static str,
}

pub async fn delete_store(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(query): Query<StoreIdQuery>,
) -> Result<Json<DeleteStoreResponse>, ApiError> {
    require_admin_or_merchant(&auth.claims).map_err(forbid)?;
    let id = query
        .id
        .ok_or_else(|| ApiError::validation("Store ID is required"))?;

    sqlx::query("DELETE FROM stores WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await
        .map_err(|err| ApiError::dependency("Failed to delete store", err))?;

    Ok(Json(DeleteStoreResponse {
        message: "Store deleted successfully",
    }))
}
