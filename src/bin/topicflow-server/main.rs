use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{StatusCode, header};
use axum::middleware::from_fn;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnResponse, TraceLayer};
use tracing::{Level, error, info, warn};

mod metrics;

use topicflow::suppliers::openai::{OpenAiConfig, OpenAiEmbedder};
use topicflow::suppliers::yt_dlp::YtDlpSupplier;
use topicflow::{
    Chunk, ChunkOpts, ClusterOpts, ClusterRecord, EmbeddedChunk, EmbeddingSupplier, Error,
    OutputType, TextSupplier, chunk, cluster, embed_chunks, parse_cues, window_count,
    write_clusters,
};

#[derive(Parser, Debug)]
#[command(name = "topicflow-server")]
#[command(about = "HTTP server for caption chunking, embedding and topic clustering")]
struct Params {
    /// Host interface to bind to.
    #[arg(long = "host", default_value = "127.0.0.1")]
    host: String,

    /// TCP port to listen on.
    #[arg(long = "port", default_value_t = 8080)]
    port: u16,

    /// Maximum request body size (bytes).
    #[arg(long = "max-bytes", default_value_t = 50 * 1024 * 1024)]
    max_bytes: usize,

    /// Per-request timeout (seconds).
    #[arg(long = "request-timeout", default_value_t = 300)]
    request_timeout_secs: u64,

    /// Path to the yt-dlp executable.
    #[arg(long = "yt-dlp", default_value = "yt-dlp")]
    yt_dlp: String,

    /// Caption language to download.
    #[arg(long = "lang", default_value = "en")]
    language: String,

    /// How long to wait for the subtitle file after yt-dlp exits (milliseconds).
    #[arg(long = "settle-ms", default_value_t = 1000)]
    settle_ms: u64,

    /// Embedding model name.
    #[arg(long = "embedding-model", default_value = topicflow::suppliers::openai::DEFAULT_MODEL)]
    embedding_model: String,

    /// Largest number of windows one `/v1/chunk` request may scan.
    #[arg(long = "max-windows", default_value_t = 100_000)]
    max_windows: usize,
}

type SharedText = Arc<dyn TextSupplier + Send + Sync>;
type SharedEmbedder = Arc<dyn EmbeddingSupplier + Send + Sync>;

#[derive(Clone)]
struct AppState {
    text: SharedText,
    /// `None` when no API key is configured; `/v1/embed` then fails per request.
    embedder: Option<SharedEmbedder>,
    max_windows: usize,
}

#[derive(Debug, Deserialize)]
struct AnalyzeRequest {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Serialize)]
struct AnalyzeResponse {
    transcript: String,
}

#[derive(Debug, Deserialize)]
struct ChunkRequest {
    #[serde(default)]
    transcript: String,
    #[serde(flatten)]
    opts: ChunkOpts,
}

#[derive(Debug, Serialize)]
struct ChunkResponse {
    chunks: Vec<Chunk>,
}

#[derive(Debug, Deserialize)]
struct EmbedRequest {
    #[serde(default)]
    chunks: Vec<Chunk>,
}

#[derive(Debug, Serialize)]
struct EmbedResponse {
    embedded: Vec<EmbeddedChunk>,
}

#[derive(Debug, Deserialize)]
struct ClusterRequest {
    #[serde(default)]
    embedded: Vec<EmbeddedChunk>,
    #[serde(flatten)]
    opts: ClusterOpts,
    #[serde(default, rename = "outputType")]
    output_type: OutputType,
}

#[derive(Debug, Serialize)]
struct ClusterResponse {
    clusters: Vec<ClusterRecord>,
    noise: Vec<usize>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        Self {
            status: status_for(&err),
            message: err.to_string(),
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        error!(error = %err, "worker task failed");
        Self::internal("worker task failed")
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

fn status_for(err: &Error) -> StatusCode {
    if err.is_client_error() {
        StatusCode::BAD_REQUEST
    } else if err.is_not_found() {
        StatusCode::NOT_FOUND
    } else if matches!(err, Error::Upstream(_)) {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

#[tokio::main]
async fn main() {
    topicflow::init_logging();

    if let Err(err) = run().await {
        error!(error = ?err, "topicflow-server failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let params = Params::parse();

    if let Err(err) = metrics::init() {
        warn!(error = ?err, "metrics disabled (init failed)");
    }

    let addr: SocketAddr = format!("{}:{}", params.host, params.port)
        .parse()
        .context("invalid host/port bind address")?;

    let text = YtDlpSupplier::new(&params.yt_dlp)
        .with_language(&params.language)
        .with_settle_timeout(Duration::from_millis(params.settle_ms));

    let embedder = match OpenAiConfig::from_env() {
        Ok(mut config) => {
            config.model = params.embedding_model.clone();
            let embedder =
                OpenAiEmbedder::new(config).context("failed to set up embeddings client")?;
            Some(Arc::new(embedder) as SharedEmbedder)
        }
        Err(err) => {
            warn!(error = %err, "embedding endpoint disabled");
            None
        }
    };

    let state = AppState {
        text: Arc::new(text),
        embedder,
        max_windows: params.max_windows,
    };

    let app = router(state)
        .layer(DefaultBodyLimit::max(params.max_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            params.request_timeout_secs,
        )))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(
                    DefaultMakeSpan::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                .on_response(DefaultOnResponse::new().level(Level::INFO))
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        );

    let listener = TcpListener::bind(addr).await.context("bind failed")?;
    info!(%addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics::prometheus_metrics))
        .route("/v1/analyze", post(analyze))
        .route("/v1/chunk", post(chunk_transcript))
        .route("/v1/embed", post(embed))
        .route("/v1/cluster", post(cluster_embeddings))
        .route_layer(from_fn(metrics::track_http_metrics))
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn root() -> &'static str {
    "topicflow-server: POST /v1/analyze, /v1/chunk, /v1/embed, /v1/cluster"
}

async fn healthz() -> &'static str {
    "ok"
}

/// Download the captions for `url`.
async fn analyze(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> std::result::Result<Json<AnalyzeResponse>, AppError> {
    let url = req
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("URL is required in request body"))?;

    let text = state.text.clone();
    let transcript = timed("download", move || text.fetch_transcript(&url)).await?;

    Ok(Json(AnalyzeResponse { transcript }))
}

/// Parse captions and window them into chunks.
async fn chunk_transcript(
    State(state): State<AppState>,
    Json(req): Json<ChunkRequest>,
) -> std::result::Result<Json<ChunkResponse>, AppError> {
    let ChunkRequest { transcript, opts } = req;
    let max_windows = state.max_windows;
    let chunks = timed("chunk", move || {
        let cues = parse_cues(&transcript)?;
        let windows = window_count(&cues, &opts)?;
        if windows > max_windows {
            return Err(Error::Config(format!(
                "chunkSize {} would scan {windows} windows (limit {max_windows})",
                opts.chunk_size
            )));
        }
        chunk(&cues, &opts)
    })
    .await?;

    Ok(Json(ChunkResponse { chunks }))
}

/// Attach an embedding to every chunk.
async fn embed(
    State(state): State<AppState>,
    Json(req): Json<EmbedRequest>,
) -> std::result::Result<Json<EmbedResponse>, AppError> {
    let embedder = state
        .embedder
        .clone()
        .ok_or_else(|| AppError::internal("missing OpenAI api key"))?;

    let embedded = timed("embed", move || embed_chunks(&*embedder, req.chunks)).await?;

    Ok(Json(EmbedResponse { embedded }))
}

/// Group embedded chunks into topic clusters.
///
/// `outputType: "vtt"` returns the clusters as a WebVTT track instead of JSON; noise is
/// dropped from that form.
async fn cluster_embeddings(
    Json(req): Json<ClusterRequest>,
) -> std::result::Result<Response, AppError> {
    let ClusterRequest {
        embedded,
        opts,
        output_type,
    } = req;
    let clustering = timed("cluster", move || cluster(&embedded, &opts)).await?;

    match output_type {
        OutputType::Json => Ok(Json(ClusterResponse {
            clusters: clustering.clusters,
            noise: clustering.noise,
        })
        .into_response()),
        OutputType::Vtt => {
            let mut body = Vec::new();
            write_clusters(&clustering.clusters, &mut body, output_type)?;
            Ok(([(header::CONTENT_TYPE, output_type.content_type())], body).into_response())
        }
    }
}

/// Run blocking or CPU-bound work off the async runtime and record how long it took.
async fn timed<T, F>(stage: &'static str, work: F) -> std::result::Result<T, AppError>
where
    F: FnOnce() -> topicflow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let start = Instant::now();
    let res = tokio::task::spawn_blocking(work).await?;
    metrics::observe_stage(stage, start.elapsed(), res.is_ok());

    res.map_err(|err| {
        let app_err = AppError::from(err);
        if app_err.status.is_server_error() {
            error!(stage, error = %app_err.message, "request failed");
        }
        app_err
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use topicflow::UpstreamError;

    struct StaticText(&'static str);

    impl TextSupplier for StaticText {
        fn fetch_transcript(&self, _source: &str) -> topicflow::Result<String> {
            Ok(self.0.to_owned())
        }
    }

    struct MissingText;

    impl TextSupplier for MissingText {
        fn fetch_transcript(&self, _source: &str) -> topicflow::Result<String> {
            Err(UpstreamError::NotFound("subtitle file not found".into()).into())
        }
    }

    struct AxisEmbedder;

    impl EmbeddingSupplier for AxisEmbedder {
        fn embed(&self, texts: &[&str]) -> topicflow::Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }
    }

    fn state(text: impl TextSupplier + Send + Sync + 'static) -> AppState {
        AppState {
            text: Arc::new(text),
            embedder: Some(Arc::new(AxisEmbedder)),
            max_windows: 1_000,
        }
    }

    const CAPTIONS: &str = "WEBVTT\n\n\
00:00:00.000 --> 00:00:10.000\na\n\n\
00:00:10.000 --> 00:00:20.000\nb\n\n\
00:00:20.000 --> 00:00:35.000\nc\n\n\
00:00:35.000 --> 00:00:50.000\nd\n";

    #[test]
    fn errors_map_to_http_statuses() {
        assert_eq!(
            status_for(&Error::EmptyInput("no cues provided")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&Error::from(UpstreamError::NotFound("x".into()))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&Error::from(UpstreamError::Failed("x".into()))),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn requests_accept_camel_case_parameters() -> anyhow::Result<()> {
        let req: ChunkRequest =
            serde_json::from_str(r#"{"transcript":"x","chunkSize":60,"overlap":10}"#)?;
        assert_eq!(req.opts.chunk_size, 60.0);
        assert_eq!(req.opts.overlap, 10.0);

        let req: ClusterRequest = serde_json::from_str(
            r#"{"embedded":[{"id":0,"start":0,"end":30,"text":"a","embedding":[1.0]}],"minPts":2}"#,
        )?;
        assert_eq!(req.embedded.len(), 1);
        assert_eq!(req.opts.min_pts, 2);
        assert_eq!(req.opts.eps, 0.25);
        assert_eq!(req.output_type, OutputType::Json);

        let req: ClusterRequest =
            serde_json::from_str(r#"{"embedded":[],"eps":0.5,"outputType":"vtt"}"#)?;
        assert_eq!(req.output_type, OutputType::Vtt);
        assert_eq!(req.opts.eps, 0.5);
        Ok(())
    }

    #[tokio::test]
    async fn analyze_requires_url() {
        let res = analyze(
            State(state(StaticText(CAPTIONS))),
            Json(AnalyzeRequest { url: None }),
        )
        .await;
        let err = res.err().expect("expected AppError");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("URL is required"));
    }

    #[tokio::test]
    async fn analyze_returns_transcript() {
        let res = analyze(
            State(state(StaticText(CAPTIONS))),
            Json(AnalyzeRequest {
                url: Some("https://www.youtube.com/watch?v=abc".into()),
            }),
        )
        .await;
        match res {
            Ok(Json(body)) => assert_eq!(body.transcript, CAPTIONS),
            Err(err) => panic!("unexpected error: {}", err.message),
        }
    }

    #[tokio::test]
    async fn analyze_maps_missing_subtitles_to_not_found() {
        let res = analyze(
            State(state(MissingText)),
            Json(AnalyzeRequest {
                url: Some("https://www.youtube.com/watch?v=abc".into()),
            }),
        )
        .await;
        let err = res.err().expect("expected AppError");
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn chunk_windows_transcript() {
        let res = chunk_transcript(
            State(state(StaticText(CAPTIONS))),
            Json(ChunkRequest {
                transcript: CAPTIONS.into(),
                opts: ChunkOpts::default(),
            }),
        )
        .await;
        let chunks = match res {
            Ok(Json(body)) => body.chunks,
            Err(err) => panic!("unexpected error: {}", err.message),
        };
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["a b c", "b c d", "c d", "d"]);
    }

    #[tokio::test]
    async fn chunk_refuses_too_many_windows() {
        let res = chunk_transcript(
            State(state(StaticText(CAPTIONS))),
            Json(ChunkRequest {
                transcript: CAPTIONS.into(),
                opts: ChunkOpts {
                    chunk_size: 1e-9,
                    overlap: 0.0,
                },
            }),
        )
        .await;
        let err = res.err().expect("expected AppError");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("limit 1000"), "{}", err.message);
    }

    #[tokio::test]
    async fn chunk_rejects_unparsable_transcript() {
        let res = chunk_transcript(
            State(state(StaticText(CAPTIONS))),
            Json(ChunkRequest {
                transcript: String::new(),
                opts: ChunkOpts::default(),
            }),
        )
        .await;
        let err = res.err().expect("expected AppError");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "no cues parsed");
    }

    #[tokio::test]
    async fn embed_without_configured_embedder_fails() {
        let state = AppState {
            text: Arc::new(StaticText(CAPTIONS)),
            embedder: None,
            max_windows: 1_000,
        };
        let res = embed(State(state), Json(EmbedRequest { chunks: Vec::new() })).await;
        let err = res.err().expect("expected AppError");
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn embed_attaches_vectors() {
        let chunks = vec![Chunk {
            id: 0,
            start: 0.0,
            end: 30.0,
            text: "hello".into(),
        }];
        let res = embed(
            State(state(StaticText(CAPTIONS))),
            Json(EmbedRequest { chunks }),
        )
        .await;
        match res {
            Ok(Json(body)) => {
                assert_eq!(body.embedded.len(), 1);
                assert_eq!(body.embedded[0].embedding, vec![5.0, 1.0]);
            }
            Err(err) => panic!("unexpected error: {}", err.message),
        }
    }

    #[tokio::test]
    async fn cluster_rejects_empty_batch() {
        let res = cluster_embeddings(Json(ClusterRequest {
            embedded: Vec::new(),
            opts: ClusterOpts::default(),
            output_type: OutputType::Json,
        }))
        .await;
        let err = res.err().expect("expected AppError");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "no embeddings provided");
    }

    fn embedded(id: usize, text: &str, embedding: Vec<f32>) -> EmbeddedChunk {
        EmbeddedChunk::new(
            Chunk {
                id,
                start: 15.0 * id as f64,
                end: 15.0 * id as f64 + 30.0,
                text: text.into(),
            },
            embedding,
        )
    }

    #[tokio::test]
    async fn cluster_can_answer_with_a_vtt_track() -> anyhow::Result<()> {
        let batch = vec![
            embedded(0, "cats", vec![1.0, 0.0]),
            embedded(1, "more cats", vec![1.0, 0.01]),
            embedded(2, "rockets", vec![0.0, 1.0]),
        ];
        let res = cluster_embeddings(Json(ClusterRequest {
            embedded: batch,
            opts: ClusterOpts { eps: 0.25, min_pts: 2 },
            output_type: OutputType::Vtt,
        }))
        .await;
        let res = match res {
            Ok(res) => res,
            Err(err) => panic!("unexpected error: {}", err.message),
        };

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers().get(header::CONTENT_TYPE),
            Some(&header::HeaderValue::from_static("text/vtt; charset=utf-8"))
        );
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await?;
        let vtt = String::from_utf8(body.to_vec())?;
        assert!(vtt.starts_with("WEBVTT\n\n"));
        assert!(vtt.contains("topic-0\n00:00:00.000 --> 00:00:45.000\ncats more cats\n"));
        assert!(!vtt.contains("rockets"));
        Ok(())
    }
}
