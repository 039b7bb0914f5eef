use axum::{
    extract::{Query, State},
    http::{header::USER_AGENT, HeaderMap},
    Json,
};
use chrono::{DateTime, Utc};
use common_http_errors::ApiError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{Postgres, QueryBuilder};
use std::collections::BTreeMap;
use uuid::Uuid;
use woothee::parser::Parser;

use crate::app::AppState;
use crate::pagination::{PageParams, Pagination};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserInfo {
    pub name: String,
    pub version: String,
    #[serde(
        rename = "locationAccuracy",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub location_accuracy: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OsInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub vendor: String,
    pub model: String,
}

fn classify_user_agent(user_agent: &str) -> (BrowserInfo, OsInfo, DeviceInfo) {
    match Parser::new().parse(user_agent) {
        Some(result) => {
            let kind = match result.category {
                "pc" => "desktop".to_string(),
                other => other.to_string(),
            };
            (
                BrowserInfo {
                    name: result.name.to_string(),
                    version: result.version.to_string(),
                    location_accuracy: None,
                },
                OsInfo {
                    name: result.os.to_string(),
                    version: result.os_version.to_string(),
                },
                DeviceInfo {
                    kind,
                    vendor: result.vendor.to_string(),
                    model: "Unknown".to_string(),
                },
            )
        }
        None => (
            BrowserInfo {
                name: "Unknown".to_string(),
                version: "Unknown".to_string(),
                location_accuracy: None,
            },
            OsInfo {
                name: "Unknown".to_string(),
                version: "Unknown".to_string(),
            },
            DeviceInfo {
                kind: "desktop".to_string(),
                vendor: "Unknown".to_string(),
                model: "Unknown".to_string(),
            },
        ),
    }
}

/// First hop of `X-Forwarded-For`, falling back to loopback when the header
/// is absent (the geo client substitutes its configured address for that).
fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "127.0.0.1".to_string())
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct Visit {
    pub id: Uuid,
    pub ip: String,
    #[serde(rename = "visitTimestamp")]
    pub visit_timestamp: DateTime<Utc>,
    pub country: String,
    pub city: String,
    pub region: String,
    pub timezone: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub browser: Value,
    pub device: Value,
    pub os: Value,
    pub isp: Option<String>,
}

const VISIT_COLUMNS: &str = "id, ip, visit_timestamp, country, city, region, timezone, \
     latitude, longitude, browser, device, os, isp";

#[derive(Debug, Default, Deserialize)]
pub struct TrackRequest {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy: Option<f64>,
}

#[derive(Serialize)]
pub struct TrackResponse {
    pub success: bool,
    pub message: &'static str,
    pub data: Visit,
}

pub async fn track_visit(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Option<Json<TrackRequest>>,
) -> Result<Json<TrackResponse>, ApiError> {
    let body = payload.map(|Json(body)| body).unwrap_or_default();

    let ip = state.geo.normalize_ip(&client_ip(&headers));
    // Geolocation is best-effort; an unreachable provider degrades the
    // record to Unknown fields instead of failing the request.
    let location = state.geo.lookup(&ip).await.ok().unwrap_or_default();

    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    let (mut browser, os, device) = classify_user_agent(user_agent);
    browser.location_accuracy = body.accuracy;

    let latitude = body.latitude.or(location.lat).unwrap_or(0.0);
    let longitude = body.longitude.or(location.lon).unwrap_or(0.0);

    let visit = sqlx::query_as::<_, Visit>(&format!(
        "INSERT INTO visits (id, ip, country, city, region, timezone, latitude, longitude, \
             browser, device, os, isp)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
         RETURNING {VISIT_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(&ip)
    .bind(location.country.unwrap_or_else(|| "Unknown".to_string()))
    .bind(location.city.unwrap_or_else(|| "Unknown".to_string()))
    .bind(location.region_name.unwrap_or_else(|| "Unknown".to_string()))
    .bind(&location.timezone)
    .bind(latitude)
    .bind(longitude)
    .bind(serde_json::to_value(&browser).unwrap_or(Value::Null))
    .bind(serde_json::to_value(&device).unwrap_or(Value::Null))
    .bind(serde_json::to_value(&os).unwrap_or(Value::Null))
    .bind(location.isp.unwrap_or_else(|| "Unknown".to_string()))
    .fetch_one(&state.db)
    .await
    .map_err(|err| ApiError::dependency("Failed to track user visit", err))?;

    state.metrics.visit_tracked();

    Ok(Json(TrackResponse {
        success: true,
        message: "User visit tracked successfully",
        data: visit,
    }))
}

#[derive(Deserialize)]
pub struct VisitsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct VisitsPage {
    pub success: bool,
    pub data: Vec<Visit>,
    pub pagination: Pagination,
}

pub async fn list_tracked_visits(
    State(state): State<AppState>,
    Query(query): Query<VisitsQuery>,
) -> Result<Json<VisitsPage>, ApiError> {
    let params = PageParams::new(query.page, query.limit);

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM visits")
        .fetch_one(&state.db)
        .await
        .map_err(|err| ApiError::dependency("Failed to fetch tracked users", err))?;

    let visits = sqlx::query_as::<_, Visit>(&format!(
        "SELECT {VISIT_COLUMNS} FROM visits ORDER BY visit_timestamp DESC LIMIT $1 OFFSET $2"
    ))
    .bind(params.limit)
    .bind(params.offset())
    .fetch_all(&state.db)
    .await
    .map_err(|err| ApiError::dependency("Failed to fetch tracked users", err))?;

    Ok(Json(VisitsPage {
        success: true,
        data: visits,
        pagination: Pagination::new(total, params),
    }))
}

#[derive(Deserialize)]
pub struct AnalyticsQuery {
    #[serde(rename = "startDate")]
    pub start_date: Option<String>,
    #[serde(rename = "endDate")]
    pub end_date: Option<String>,
}

#[derive(Serialize)]
pub struct AnalyticsData {
    #[serde(rename = "totalVisits")]
    pub total_visits: i64,
    #[serde(rename = "uniqueVisitors")]
    pub unique_visitors: i64,
    #[serde(rename = "countryDistribution")]
    pub country_distribution: BTreeMap<String, i64>,
    #[serde(rename = "browserDistribution")]
    pub browser_distribution: BTreeMap<String, i64>,
    #[serde(rename = "deviceTypes")]
    pub device_types: BTreeMap<String, i64>,
}

#[derive(Serialize)]
pub struct AnalyticsTimeframe {
    pub start: String,
    pub end: String,
}

#[derive(Serialize)]
pub struct AnalyticsResponse {
    pub success: bool,
    pub data: AnalyticsData,
    pub timeframe: AnalyticsTimeframe,
}

fn parse_window(
    query: &AnalyticsQuery,
) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, ApiError> {
    // The window applies only when both bounds are present.
    match (&query.start_date, &query.end_date) {
        (Some(start), Some(end)) => {
            let start = DateTime::parse_from_rfc3339(start)
                .map_err(|_| ApiError::validation("Invalid startDate"))?
                .with_timezone(&Utc);
            let end = DateTime::parse_from_rfc3339(end)
                .map_err(|_| ApiError::validation("Invalid endDate"))?
                .with_timezone(&Utc);
            Ok(Some((start, end)))
        }
        _ => Ok(None),
    }
}

fn push_window(
    builder: &mut QueryBuilder<Postgres>,
    window: &Option<(DateTime<Utc>, DateTime<Utc>)>,
) {
    if let Some((start, end)) = window {
        builder
            .push(" WHERE visit_timestamp >= ")
            .push_bind(*start)
            .push(" AND visit_timestamp <= ")
            .push_bind(*end);
    }
}

async fn count_with_window(
    state: &AppState,
    select: &str,
    window: &Option<(DateTime<Utc>, DateTime<Utc>)>,
) -> Result<i64, ApiError> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(select);
    push_window(&mut builder, window);
    builder
        .build_query_scalar()
        .fetch_one(&state.db)
        .await
        .map_err(|err| ApiError::dependency("Failed to generate analytics", err))
}

async fn distribution_with_window(
    state: &AppState,
    key_expr: &str,
    window: &Option<(DateTime<Utc>, DateTime<Utc>)>,
) -> Result<BTreeMap<String, i64>, ApiError> {
    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT {key_expr} AS key, COUNT(*) FROM visits"));
    push_window(&mut builder, window);
    builder.push(" GROUP BY 1");

    let rows: Vec<(Option<String>, i64)> = builder
        .build_query_as()
        .fetch_all(&state.db)
        .await
        .map_err(|err| ApiError::dependency("Failed to generate analytics", err))?;

    Ok(rows
        .into_iter()
        .map(|(key, count)| (key.unwrap_or_else(|| "Unknown".to_string()), count))
        .collect())
}

pub async fn visit_analytics(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<AnalyticsResponse>, ApiError> {
    let window = parse_window(&query)?;

    let total_visits =
        count_with_window(&state, "SELECT COUNT(*) FROM visits", &window).await?;
    let unique_visitors =
        count_with_window(&state, "SELECT COUNT(DISTINCT ip) FROM visits", &window).await?;
    let country_distribution = distribution_with_window(&state, "country", &window).await?;
    let browser_distribution =
        distribution_with_window(&state, "browser->>'name'", &window).await?;
    let device_types = distribution_with_window(&state, "device->>'type'", &window).await?;

    Ok(Json(AnalyticsResponse {
        success: true,
        data: AnalyticsData {
            total_visits,
            unique_visitors,
            country_distribution,
            browser_distribution,
            device_types,
        },
        timeframe: AnalyticsTimeframe {
            start: query.start_date.unwrap_or_else(|| "all time".to_string()),
            end: query.end_date.unwrap_or_else(|| "present".to_string()),
        },
    }))
}
