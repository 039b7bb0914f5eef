use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, FromRef, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use common_auth::{TokenSigner, TokenVerifier};
use sqlx::PgPool;

use crate::auth_handlers::{login, logout, register};
use crate::config::AppConfig;
use crate::credentials::CredentialStore;
use crate::data_handlers::{get_data, insert_data};
use crate::events::EventBroadcaster;
use crate::geo::GeoClient;
use crate::iplocation_handlers::get_ip_location;
use crate::media::MediaStore;
use crate::media_handlers::{list_images, upload_image};
use crate::merchant_handlers::{
    create_merchant_profile, delete_merchant_profile, get_merchant_profile, list_merchants,
    update_merchant_profile,
};
use crate::metrics::ApiMetrics;
use crate::product_handlers::{create_product, list_merchant_products, list_products};
use crate::sessions::{ActiveSessionRegistry, RevocationRegistry};
use crate::store_handlers::{
    create_store, delete_store, get_store_by_id, list_all_stores, list_stores_by_merchant,
    update_store,
};
use crate::tracking_handlers::{list_tracked_visits, track_visit, visit_analytics};
use crate::user_handlers::{
    delete_user, get_current_user, get_user_by_id, list_admins, list_customers,
    list_merchant_users, list_users, patch_user, update_user,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub signer: Arc<TokenSigner>,
    pub verifier: Arc<TokenVerifier>,
    pub credentials: CredentialStore,
    pub active_sessions: ActiveSessionRegistry,
    pub revoked_tokens: RevocationRegistry,
    pub media: Arc<MediaStore>,
    pub geo: Arc<GeoClient>,
    pub broadcaster: Arc<dyn EventBroadcaster>,
    pub metrics: Arc<ApiMetrics>,
}

impl AppState {
    pub fn new(
        db: PgPool,
        config: AppConfig,
        http_client: reqwest::Client,
        broadcaster: Arc<dyn EventBroadcaster>,
        metrics: ApiMetrics,
    ) -> Self {
        let signer = Arc::new(TokenSigner::new(config.token.clone()));
        let verifier = Arc::new(TokenVerifier::new(&config.token));
        let credentials = CredentialStore::new(db.clone());
        let active_sessions = ActiveSessionRegistry::new(db.clone());
        let revoked_tokens = RevocationRegistry::new(db.clone());
        let media = Arc::new(MediaStore::new(
            config.media_root.clone(),
            config.media_base_url.clone(),
        ));
        let geo = Arc::new(GeoClient::new(
            http_client,
            config.tracking_fallback_ip.clone(),
        ));

        Self {
            db,
            config: Arc::new(config),
            signer,
            verifier,
            credentials,
            active_sessions,
            revoked_tokens,
            media,
            geo,
            broadcaster,
            metrics: Arc::new(metrics),
        }
    }
}

impl FromRef<AppState> for Arc<TokenVerifier> {
    fn from_ref(state: &AppState) -> Self {
        state.verifier.clone()
    }
}

impl FromRef<AppState> for ActiveSessionRegistry {
    fn from_ref(state: &AppState) -> Self {
        state.active_sessions.clone()
    }
}

impl FromRef<AppState> for RevocationRegistry {
    fn from_ref(state: &AppState) -> Self {
        state.revoked_tokens.clone()
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn metrics_endpoint(State(state): State<AppState>) -> Result<Response, StatusCode> {
    state.metrics.render().map_err(|err| {
        tracing::warn!(error = %err, "Unable to render metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// The full route table; reused verbatim by the integration tests.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/products", get(list_products).post(create_product))
        .route("/api/products/merchant", get(list_merchant_products))
        .route(
            "/api/stores",
            post(create_store)
                .get(get_store_by_id)
                .put(update_store)
                .patch(update_store)
                .delete(delete_store),
        )
        .route("/api/stores/all", get(list_all_stores))
        .route("/api/stores/merchant", get(list_stores_by_merchant))
        .route("/api/users", get(list_users))
        .route("/api/users/me", get(get_current_user))
        .route(
            "/api/users/profile",
            get(get_user_by_id)
                .put(update_user)
                .patch(patch_user)
                .delete(delete_user),
        )
        .route("/api/users/customers", get(list_customers))
        .route("/api/users/merchants", get(list_merchant_users))
        .route("/api/users/admins", get(list_admins))
        .route("/api/merchants", get(list_merchants))
        .route(
            "/api/merchants/profile",
            post(create_merchant_profile)
                .get(get_merchant_profile)
                .put(update_merchant_profile)
                .patch(update_merchant_profile)
                .delete(delete_merchant_profile),
        )
        .route("/api/images/upload", post(upload_image))
        .route("/api/images/list", get(list_images))
        .route("/api/data", get(get_data).post(insert_data))
        .route("/api/ipLocation", get(get_ip_location))
        .route("/api/ip-stuff/track", post(track_visit))
        .route("/api/ip-stuff/users", get(list_tracked_visits))
        .route("/api/ip-stuff/analytics", get(visit_analytics))
        .layer(DefaultBodyLimit::max(25 * 1024 * 1024))
        .with_state(state)
}
