use anyhow::Result;
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct ApiMetrics {
    registry: Registry,
    login_attempts: IntCounterVec,
    registrations: IntCounter,
    visits_tracked: IntCounter,
}

impl ApiMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let login_attempts = IntCounterVec::new(
            Opts::new(
                "auth_login_attempts_total",
                "Count of login attempts grouped by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(login_attempts.clone()))?;

        let registrations = IntCounter::new(
            "auth_registrations_total",
            "Count of completed registrations",
        )?;
        registry.register(Box::new(registrations.clone()))?;

        let visits_tracked = IntCounter::new(
            "tracking_visits_total",
            "Count of visitor tracking inserts",
        )?;
        registry.register(Box::new(visits_tracked.clone()))?;

        Ok(Self {
            registry,
            login_attempts,
            registrations,
            visits_tracked,
        })
    }

    pub fn login_attempt(&self, outcome: &str) {
        self.login_attempts.with_label_values(&[outcome]).inc();
    }

    pub fn registration(&self) {
        self.registrations.inc();
    }

    pub fn visit_tracked(&self) {
        self.visits_tracked.inc();
    }

    pub fn render(&self) -> Result<Response> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            )
            .body(Body::from(buffer))?;
        Ok(response)
    }
}
