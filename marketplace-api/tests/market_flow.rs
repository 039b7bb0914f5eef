mod support;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header::AUTHORIZATION, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use support::{test_config, TestDatabase};
use tower::util::ServiceExt;

use marketplace_api::app::{router, AppState};
use marketplace_api::events::EventBroadcaster;
use marketplace_api::metrics::ApiMetrics;

struct CapturingBroadcaster {
    events: Mutex<Vec<(String, Value)>>,
}

#[async_trait]
impl EventBroadcaster for CapturingBroadcaster {
    async fn broadcast(&self, event: &str, payload: Value) -> anyhow::Result<()> {
        self.events
            .lock()
            .unwrap()
            .push((event.to_string(), payload));
        Ok(())
    }
}

fn capturing_state(pool: sqlx::PgPool) -> (AppState, Arc<CapturingBroadcaster>) {
    let broadcaster = Arc::new(CapturingBroadcaster {
        events: Mutex::new(Vec::new()),
    });
    let state = AppState::new(
        pool,
        test_config(),
        reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .expect("http client"),
        broadcaster.clone(),
        ApiMetrics::new().expect("metrics"),
    );
    (state, broadcaster)
}

async fn body_json(response: axum::response::Response) -> Result<Value> {
    let bytes = response.into_body().collect().await?.to_bytes();
    Ok(serde_json::from_slice(&bytes)?)
}

async fn send_json(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Value,
) -> Result<(StatusCode, Value)> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    let response = app
        .clone()
        .oneshot(builder.body(Body::from(body.to_string()))?)
        .await?;
    let status = response.status();
    let body = body_json(response).await?;
    Ok((status, body))
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
) -> Result<(StatusCode, Value)> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    let response = app.clone().oneshot(builder.body(Body::empty())?).await?;
    let status = response.status();
    let body = body_json(response).await?;
    Ok((status, body))
}

async fn signup_and_login(app: &Router, email: &str, user_type: &str) -> Result<String> {
    let (status, _) = send_json(
        app,
        "POST",
        "/api/auth/register",
        None,
        json!({
            "email": email,
            "password": "secret1",
            "fullName": "Test User",
            "userType": user_type
        }),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send_json(
        app,
        "POST",
        "/api/auth/login",
        None,
        json!({ "email": email, "password": "secret1" }),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    Ok(body["token"].as_str().expect("token").to_string())
}

#[tokio::test(flavor = "multi_thread")]
#[cfg_attr(
    not(feature = "integration"),
    ignore = "enable with --features integration (requires Postgres: embedded or external)"
)]
async fn products_and_stores_flow() -> Result<()> {
    let Some(db) = TestDatabase::setup().await? else {
        return Ok(());
    };
    let pool = db.pool_clone();
    let (state, broadcaster) = capturing_state(pool);
    let app = router(state);

    let merchant_token = signup_and_login(&app, "seller@x.com", "merchant").await?;
    let admin_token = signup_and_login(&app, "boss@x.com", "admin").await?;
    let customer_token = signup_and_login(&app, "buyer@x.com", "customer").await?;

    // Merchant profile is required before products reference it.
    let (status, body) = send_json(
        &app,
        "POST",
        "/api/merchants/profile",
        Some(&merchant_token),
        json!({ "email": "seller@x.com", "fullName": "Seller", "country": "NZ" }),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["merchant"]["status"], "Pending");
    assert_eq!(body["merchant"]["theme"], "light");

    // Duplicate profile creation is rejected up front.
    let (status, body) = send_json(
        &app,
        "POST",
        "/api/merchants/profile",
        Some(&merchant_token),
        json!({ "email": "seller@x.com" }),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Merchant profile already exists");

    // Customers cannot create products.
    let (status, _) = send_json(
        &app,
        "POST",
        "/api/products",
        Some(&customer_token),
        json!({ "title": "Nope" }),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Unknown request fields land in customFields instead of new columns.
    let (status, body) = send_json(
        &app,
        "POST",
        "/api/products",
        Some(&merchant_token),
        json!({
            "title": "Handwoven rug",
            "price": "129.99",
            "category": "home",
            "countryOfOrigin": "NZ",
            "warrantyYears": 2
        }),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["title"], "Handwoven rug");
    assert_eq!(body["customFields"]["warrantyYears"], 2);
    let product_id = body["id"].as_str().expect("product id").to_string();

    {
        let events = broadcaster.events.lock().unwrap();
        assert!(events
            .iter()
            .any(|(name, payload)| name == "productCreated"
                && payload["product"]["id"] == json!(product_id)
                && payload["productCount"] == 1));
    }

    let (status, _) = send_json(
        &app,
        "POST",
        "/api/products",
        Some(&merchant_token),
        json!({ "title": "Clay mug", "price": "18.00", "category": "kitchen" }),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);

    // Public listing with a category filter.
    let (status, body) = send(&app, "GET", "/api/products?category=home", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["products"][0]["title"], "Handwoven rug");

    let (status, body) = send(&app, "GET", "/api/products?search=mug", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["products"][0]["title"], "Clay mug");

    // Stores: merchants create, only admins list everything.
    let (status, body) = send_json(
        &app,
        "POST",
        "/api/stores",
        Some(&merchant_token),
        json!({ "name": "Rug Shack", "location": "Auckland" }),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "Under review");
    let store_id = body["id"].as_str().expect("store id").to_string();

    let (status, _) = send(&app, "GET", "/api/stores/all", Some(&merchant_token)).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, "GET", "/api/stores/all", Some(&admin_token)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 1);

    let (status, body) = send_json(
        &app,
        "PATCH",
        &format!("/api/stores?id={store_id}"),
        Some(&admin_token),
        json!({ "status": "Approved" }),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Approved");

    // Merchant profile update fans out an event.
    let merchant_id = {
        let (status, body) = send(&app, "GET", "/api/users/me", Some(&merchant_token)).await?;
        assert_eq!(status, StatusCode::OK);
        body["id"].as_str().expect("merchant id").to_string()
    };
    let (status, body) = send_json(
        &app,
        "PATCH",
        &format!("/api/merchants/profile?id={merchant_id}"),
        Some(&merchant_token),
        json!({ "theme": "dark" }),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["merchant"]["theme"], "dark");
    {
        let events = broadcaster.events.lock().unwrap();
        assert!(events
            .iter()
            .any(|(name, payload)| name == "merchantUpdated" && payload["theme"] == "dark"));
    }

    // Image upload is public; listing requires a bearer token.
    let boundary = "MARKET-TEST-BOUNDARY";
    let multipart_body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"rug.png\"\r\n\
         Content-Type: image/png\r\n\r\nnot-really-a-png\r\n--{boundary}--\r\n"
    );
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/images/upload")
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(multipart_body))?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    let url = body["url"].as_str().expect("url");
    assert!(url.ends_with("_rug.png"));

    let (status, _) = send(&app, "GET", "/api/images/list", None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, "GET", "/api/images/list", Some(&merchant_token)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert!(body["images"][0]["name"]
        .as_str()
        .expect("name")
        .ends_with("_rug.png"));

    db.teardown().await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
#[cfg_attr(
    not(feature = "integration"),
    ignore = "enable with --features integration (requires Postgres: embedded or external)"
)]
async fn user_directory_and_data_entries() -> Result<()> {
    let Some(db) = TestDatabase::setup().await? else {
        return Ok(());
    };
    let pool = db.pool_clone();
    let (state, _) = capturing_state(pool);
    let app = router(state.clone());

    let admin_token = signup_and_login(&app, "root@x.com", "admin").await?;
    let customer_token = signup_and_login(&app, "c1@x.com", "customer").await?;
    signup_and_login(&app, "c2@x.com", "customer").await?;

    // Public directory with a role filter; quoted filter values are
    // tolerated.
    let (status, body) = send(&app, "GET", "/api/users?userType=%22customer%22", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 2);

    let (status, body) = send(&app, "GET", "/api/users/customers", Some(&admin_token)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["customers"].as_array().map(Vec::len), Some(2));

    // Profile updates go through the fixed column set.
    let customer_id = {
        let (_, body) = send(&app, "GET", "/api/users/me", Some(&customer_token)).await?;
        body["id"].as_str().expect("id").to_string()
    };
    let (status, body) = send_json(
        &app,
        "PATCH",
        &format!("/api/users/profile?id={customer_id}"),
        Some(&admin_token),
        json!({ "status": "Suspended" }),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["status"], "Suspended");

    let (status, body) = send_json(
        &app,
        "PUT",
        &format!("/api/users/profile?id={customer_id}"),
        Some(&admin_token),
        json!({ "userType": "astronaut" }),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid user type");

    // Data entries: admin-only insert, authenticated list.
    let (status, _) = send_json(
        &app,
        "POST",
        "/api/data",
        Some(&customer_token),
        json!({ "title": "not allowed" }),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send_json(
        &app,
        "POST",
        "/api/data",
        Some(&admin_token),
        json!({ "title": "Launch checklist", "category": "ops" }),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["title"], "Launch checklist");

    let (status, body) = send(&app, "GET", "/api/data?category=ops", Some(&customer_token)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 1);

    // Deleting a user clears any live session they held.
    let customer_uuid = uuid::Uuid::parse_str(&customer_id)?;
    assert!(state
        .active_sessions
        .token_for_user(customer_uuid)
        .await?
        .is_some());
    let (status, body) = send(
        &app,
        "DELETE",
        &format!("/api/users/profile?id={customer_id}"),
        Some(&admin_token),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User deleted successfully");
    assert!(state
        .active_sessions
        .token_for_user(customer_uuid)
        .await?
        .is_none());

    db.teardown().await?;
    Ok(())
}
