use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderName, HeaderValue, Method,
};
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};

use marketplace_api::app::{router, AppState};
use marketplace_api::config::load_config;
use marketplace_api::events::{EventBroadcaster, NoopBroadcaster, WebhookBroadcaster};
use marketplace_api::metrics::ApiMetrics;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let config = load_config()?;

    let db = PgPool::connect(&config.database_url).await?;
    // Ensure database schema is up to date before serving traffic
    sqlx::migrate!("./migrations").run(&db).await?;

    let http_client = reqwest::Client::builder()
        .timeout(config.outbound_timeout)
        .build()?;

    let broadcaster: Arc<dyn EventBroadcaster> = match &config.event_webhook_url {
        Some(url) => Arc::new(WebhookBroadcaster::new(
            http_client.clone(),
            url.clone(),
            config.event_webhook_bearer.clone(),
        )),
        None => Arc::new(NoopBroadcaster),
    };

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            ACCEPT,
            CONTENT_TYPE,
            HeaderName::from_static("authorization"),
        ]);

    let host = config.host.clone();
    let port = config.port;

    let metrics = ApiMetrics::new()?;
    let state = AppState::new(db, config, http_client, broadcaster, metrics);
    let app = router(state).layer(cors);

    let ip: std::net::IpAddr = host.parse()?;
    let addr = SocketAddr::from((ip, port));

    println!("starting marketplace-api on {addr}");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
