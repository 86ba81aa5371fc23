use std::sync::OnceLock;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::Request;
use axum::http::{HeaderValue, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts as PromOpts, Registry,
    TextEncoder,
};

struct Metrics {
    registry: Registry,
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    http_in_flight_requests: IntGauge,
    stage_duration_seconds: HistogramVec,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

fn build() -> prometheus::Result<Metrics> {
    let registry = Registry::new();

    let http_requests_total = IntCounterVec::new(
        PromOpts::new(
            "topicflow_http_requests_total",
            "Total HTTP requests served by topicflow-server.",
        ),
        &["route", "status"],
    )?;

    let http_request_duration_seconds = HistogramVec::new(
        HistogramOpts::new(
            "topicflow_http_request_duration_seconds",
            "HTTP request latency in seconds.",
        ),
        &["route", "status"],
    )?;

    let http_in_flight_requests = IntGauge::new(
        "topicflow_http_in_flight_requests",
        "Current number of in-flight HTTP requests.",
    )?;

    // Embedding calls can take many seconds, so the buckets reach well past the defaults.
    let stage_duration_seconds = HistogramVec::new(
        HistogramOpts::new(
            "topicflow_stage_duration_seconds",
            "Time spent in each processing stage.",
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0]),
        &["stage", "outcome"],
    )?;

    registry.register(Box::new(http_requests_total.clone()))?;
    registry.register(Box::new(http_request_duration_seconds.clone()))?;
    registry.register(Box::new(http_in_flight_requests.clone()))?;
    registry.register(Box::new(stage_duration_seconds.clone()))?;

    Ok(Metrics {
        registry,
        http_requests_total,
        http_request_duration_seconds,
        http_in_flight_requests,
        stage_duration_seconds,
    })
}

/// Register all collectors. Until this succeeds the recording helpers are no-ops.
pub fn init() -> prometheus::Result<()> {
    if METRICS.get().is_none() {
        let metrics = build()?;
        let _ = METRICS.set(metrics);
    }
    Ok(())
}

pub fn observe_stage(stage: &str, elapsed: Duration, ok: bool) {
    let Some(m) = METRICS.get() else {
        return;
    };
    let outcome = if ok { "ok" } else { "error" };
    m.stage_duration_seconds
        .with_label_values(&[stage, outcome])
        .observe(elapsed.as_secs_f64());
}

pub async fn prometheus_metrics() -> Response {
    let Some(m) = METRICS.get() else {
        return (StatusCode::SERVICE_UNAVAILABLE, "metrics disabled").into_response();
    };

    let families = m.registry.gather();
    let mut buf = Vec::new();
    if TextEncoder::new().encode(&families, &mut buf).is_err() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "failed to encode metrics",
        )
            .into_response();
    }

    (
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
        )],
        buf,
    )
        .into_response()
}

pub async fn track_http_metrics(req: Request<Body>, next: Next) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str())
        .unwrap_or_else(|| req.uri().path())
        .to_owned();

    let Some(m) = METRICS.get() else {
        return next.run(req).await;
    };
    if route == "/metrics" || route == "/healthz" {
        return next.run(req).await;
    }

    let start = Instant::now();

    m.http_in_flight_requests.inc();
    let response = next.run(req).await;
    m.http_in_flight_requests.dec();

    let status = response.status().as_u16().to_string();
    m.http_requests_total
        .with_label_values(&[route.as_str(), status.as_str()])
        .inc();
    m.http_request_duration_seconds
        .with_label_values(&[route.as_str(), status.as_str()])
        .observe(start.elapsed().as_secs_f64());

    response
}
