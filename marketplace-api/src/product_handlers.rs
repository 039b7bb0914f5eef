use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use common_auth::require_merchant;
use common_http_errors::ApiError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::app::AppState;
use crate::events;
use crate::gate::{forbid, AuthContext};
use crate::pagination::{PageParams, Pagination};

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    #[serde(rename = "merchantId")]
    pub merchant_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub price: Option<BigDecimal>,
    pub category: Option<String>,
    #[serde(rename = "mainImage")]
    pub main_image: Option<String>,
    pub images: Option<Value>,
    #[serde(rename = "prodColors")]
    pub prod_colors: Option<Value>,
    pub stock: Option<i32>,
    pub specifications: Option<Value>,
    #[serde(rename = "countryOfOrigin")]
    pub country_of_origin: Option<String>,
    pub height: Option<BigDecimal>,
    pub width: Option<BigDecimal>,
    pub unit_size: Option<String>,
    pub sizes: Option<Value>,
    pub discount: Option<BigDecimal>,
    pub tags: Option<Value>,
    pub rating: Option<BigDecimal>,
    pub related_products: Option<Value>,
    #[serde(rename = "customFields")]
    pub custom_fields: Value,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

const PRODUCT_COLUMNS: &str = "id, merchant_id, title, description, price, category, main_image, \
     images, prod_colors, stock, specifications, country_of_origin, height, width, unit_size, \
     sizes, discount, tags, rating, related_products, custom_fields, created_at";

#[derive(Deserialize)]
pub struct NewProduct {
    pub title: String,
    pub description: Option<String>,
    pub price: Option<BigDecimal>,
    pub category: Option<String>,
    #[serde(rename = "mainImage")]
    pub main_image: Option<String>,
    pub images: Option<Value>,
    #[serde(rename = "prodColors")]
    pub prod_colors: Option<Value>,
    pub stock: Option<i32>,
    pub specifications: Option<Value>,
    #[serde(rename = "countryOfOrigin")]
    pub country_of_origin: Option<String>,
    pub height: Option<BigDecimal>,
    pub width: Option<BigDecimal>,
    pub unit_size: Option<String>,
    pub sizes: Option<Value>,
    pub discount: Option<BigDecimal>,
    pub tags: Option<Value>,
    pub rating: Option<BigDecimal>,
    pub related_products: Option<Value>,
    /// Unknown request fields land here instead of growing the schema.
    #[serde(flatten)]
    pub custom_fields: serde_json::Map<String, Value>,
}

pub async fn create_product(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(new_product): Json<NewProduct>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    require_merchant(&auth.claims).map_err(forbid)?;
    let merchant_id = auth.claims.user_id;
    let product_id = Uuid::new_v4();

    let product = sqlx::query_as::<_, Product>(&format!(
        "INSERT INTO products (id, merchant_id, title, description, price, category, main_image, \
             images, prod_colors, stock, specifications, country_of_origin, height, width, \
             unit_size, sizes, discount, tags, rating, related_products, custom_fields)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
             $18, $19, $20, $21)
         RETURNING {PRODUCT_COLUMNS}"
    ))
    .bind(product_id)
    .bind(merchant_id)
    .bind(&new_product.title)
    .bind(&new_product.description)
    .bind(&new_product.price)
    .bind(&new_product.category)
    .bind(&new_product.main_image)
    .bind(&new_product.images)
    .bind(&new_product.prod_colors)
    .bind(new_product.stock)
    .bind(&new_product.specifications)
    .bind(&new_product.country_of_origin)
    .bind(&new_product.height)
    .bind(&new_product.width)
    .bind(&new_product.unit_size)
    .bind(&new_product.sizes)
    .bind(&new_product.discount)
    .bind(&new_product.tags)
    .bind(&new_product.rating)
    .bind(&new_product.related_products)
    .bind(Value::Object(new_product.custom_fields.clone()))
    .fetch_one(&state.db)
    .await
    .map_err(|err| ApiError::dependency("Failed to create product", err))?;

    // The merchant profile keeps a denormalized list of owned product ids.
    if let Err(err) = sqlx::query(
        "UPDATE merchants SET products = products || jsonb_build_array(jsonb_build_object('id', $1::uuid))
         WHERE id = $2",
    )
    .bind(product_id)
    .bind(merchant_id)
    .execute(&state.db)
    .await
    {
        tracing::warn!(
            merchant_id = %merchant_id,
            error = ?err,
            "Failed to append product to merchant profile"
        );
    }

    let product_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
        .fetch_one(&state.db)
        .await
        .unwrap_or(0);

    events::emit(
        state.broadcaster.as_ref(),
        "productCreated",
        json!({
            "product": serde_json::to_value(&product).unwrap_or(Value::Null),
            "productCount": product_count,
        }),
    )
    .await;

    Ok((StatusCode::CREATED, Json(product)))
}

#[derive(Deserialize)]
pub struct ProductQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub category: Option<String>,
    pub search: Option<String>,
    #[serde(rename = "minPrice")]
    pub min_price: Option<BigDecimal>,
    #[serde(rename = "maxPrice")]
    pub max_price: Option<BigDecimal>,
    pub merchant: Option<Uuid>,
    #[serde(rename = "countryOfOrigin")]
    pub country_of_origin: Option<String>,
}

#[derive(Serialize)]
pub struct ProductsPage {
    pub pagination: Pagination,
    pub products: Vec<Product>,
}

fn push_product_filters(builder: &mut QueryBuilder<Postgres>, query: &ProductQuery) {
    builder.push(" WHERE 1 = 1");
    if let Some(merchant) = query.merchant {
        builder.push(" AND merchant_id = ").push_bind(merchant);
    }
    if let Some(category) = &query.category {
        builder.push(" AND category = ").push_bind(category.clone());
    }
    if let Some(search) = &query.search {
        builder
            .push(" AND title ILIKE ")
            .push_bind(format!("%{search}%"));
    }
    if let Some(min_price) = &query.min_price {
        builder.push(" AND price >= ").push_bind(min_price.clone());
    }
    if let Some(max_price) = &query.max_price {
        builder.push(" AND price <= ").push_bind(max_price.clone());
    }
    if let Some(country) = &query.country_of_origin {
        builder
            .push(" AND country_of_origin = ")
            .push_bind(country.clone());
    }
}

pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<ProductsPage>, ApiError> {
    let params = PageParams::new(query.page, query.limit);

    let mut count_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT COUNT(*) FROM products");
    push_product_filters(&mut count_builder, &query);
    let total: i64 = count_builder
        .build_query_scalar()
        .fetch_one(&state.db)
        .await
        .map_err(|err| ApiError::dependency("Failed to count products", err))?;

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products"));
    push_product_filters(&mut builder, &query);
    builder
        .push(" ORDER BY created_at DESC LIMIT ")
        .push_bind(params.limit)
        .push(" OFFSET ")
        .push_bind(params.offset());

    let products = builder
        .build_query_as::<Product>()
        .fetch_all(&state.db)
        .await
        .map_err(|err| ApiError::dependency("Failed to fetch products", err))?;

    Ok(Json(ProductsPage {
        pagination: Pagination::new(total, params),
        products,
    }))
}

#[derive(Deserialize)]
pub struct MerchantProductsQuery {
    pub merchant_id: Option<Uuid>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_merchant_products(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(query): Query<MerchantProductsQuery>,
) -> Result<Json<ProductsPage>, ApiError> {
    let merchant_id = query
        .merchant_id
        .ok_or_else(|| ApiError::validation("Merchant ID is required"))?;
    let params = PageParams::new(query.page, query.limit);

    let total: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE merchant_id = $1")
            .bind(merchant_id)
            .fetch_one(&state.db)
            .await
            .map_err(|err| ApiError::dependency("Failed to count products", err))?;

    let products = sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE merchant_id = $1
         ORDER BY created_at DESC LIMIT $2 OFFSET $3"
    ))
    .bind(merchant_id)
    .bind(params.limit)
    .bind(params.offset())
    .fetch_all(&state.db)
    .await
    .map_err(|err| ApiError::dependency("Failed to fetch products", err))?;

    Ok(Json(ProductsPage {
        pagination: Pagination::new(total, params),
        products,
    }))
}
