use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use common_auth::require_admin;
use common_http_errors::ApiError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::app::AppState;
use crate::gate::{forbid, AuthContext};
use crate::pagination::{PageParams, Pagination};

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct DataEntry {
    pub id: Uuid,
    #[serde(rename = "userId")]
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub images: Option<Value>,
    pub files: Option<Value>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

const DATA_COLUMNS: &str = "id, user_id, title, description, category, images, files, created_at";

#[derive(Deserialize)]
pub struct NewDataEntry {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub images: Option<Value>,
    pub files: Option<Value>,
}

pub async fn insert_data(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(entry): Json<NewDataEntry>,
) -> Result<(StatusCode, Json<DataEntry>), ApiError> {
    require_admin(&auth.claims).map_err(forbid)?;

    let data = sqlx::query_as::<_, DataEntry>(&format!(
        "INSERT INTO data_entries (id, user_id, title, description, category, images, files)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING {DATA_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(auth.claims.user_id)
    .bind(&entry.title)
    .bind(&entry.description)
    .bind(&entry.category)
    .bind(&entry.images)
    .bind(&entry.files)
    .fetch_one(&state.db)
    .await
    .map_err(|err| ApiError::dependency("Failed to create data entry", err))?;

    Ok((StatusCode::CREATED, Json(data)))
}

#[derive(Deserialize)]
pub struct DataQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub category: Option<String>,
    pub search: Option<String>,
}

#[derive(Serialize)]
pub struct DataPage {
    pub pagination: Pagination,
    pub data: Vec<DataEntry>,
}

fn push_data_filters(builder: &mut QueryBuilder<Postgres>, query: &DataQuery) {
    builder.push(" WHERE 1 = 1");
    if let Some(category) = &query.category {
        builder.push(" AND category = ").push_bind(category.clone());
    }
    if let Some(search) = &query.search {
        builder
            .push(" AND title ILIKE ")
            .push_bind(format!("%{search}%"));
    }
}

pub async fn get_data(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(query): Query<DataQuery>,
) -> Result<Json<DataPage>, ApiError> {
    let params = PageParams::new(query.page, query.limit);

    let mut count_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT COUNT(*) FROM data_entries");
    push_data_filters(&mut count_builder, &query);
    let total: i64 = count_builder
        .build_query_scalar()
        .fetch_one(&state.db)
        .await
        .map_err(|err| ApiError::dependency("Failed to count data entries", err))?;

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT {DATA_COLUMNS} FROM data_entries"));
    push_data_filters(&mut builder, &query);
    builder
        .push(" ORDER BY created_at DESC LIMIT ")
        .push_bind(params.limit)
        .push(" OFFSET ")
        .push_bind(params.offset());

    let data = builder
        .build_query_as::<DataEntry>()
        .fetch_all(&state.db)
        .await
        .map_err(|err| ApiError::dependency("Failed to fetch data entries", err))?;

    Ok(Json(DataPage {
        pagination: Pagination::new(total, params),
        data,
    }))
}
