use std::io;

use anyhow::{Context, Result};
use clap::Parser;

use topicflow::suppliers::FileSupplier;
use topicflow::suppliers::openai::{OpenAiConfig, OpenAiEmbedder};
use topicflow::suppliers::yt_dlp::YtDlpSupplier;
use topicflow::{ChunkOpts, ClusterOpts, Opts, OutputType, TopicFlow};

fn main() -> Result<()> {
    topicflow::init_logging();
    let params = Params::parse();

    let opts = Opts {
        chunk: ChunkOpts {
            chunk_size: params.chunk_size,
            overlap: params.overlap,
        },
        cluster: ClusterOpts {
            eps: params.eps,
            min_pts: params.min_pts,
        },
        output_type: params.output_type,
    };

    let mut config = OpenAiConfig::from_env()?;
    config.model = params.embedding_model;
    let embedder = OpenAiEmbedder::new(config).context("failed to set up embeddings client")?;

    let stdout = io::stdout();
    let writer = stdout.lock();

    match (params.vtt_path, params.url) {
        (Some(path), _) => {
            let flow = TopicFlow::new(FileSupplier::new(), embedder);
            flow.analyze_to_writer(&path, writer, &opts)?;
        }
        (None, Some(url)) => {
            let supplier = YtDlpSupplier::new(params.yt_dlp).with_language(params.language);
            let flow = TopicFlow::new(supplier, embedder);
            flow.analyze_to_writer(&url, writer, &opts)?;
        }
        (None, None) => anyhow::bail!("either --url or --vtt is required"),
    }

    Ok(())
}

#[derive(Parser, Debug)]
#[command(name = "topicflow")]
#[command(about = "Cluster a video's captions into topic segments")]
struct Params {
    /// Video watch URL; captions are downloaded with yt-dlp.
    #[arg(
        short = 'u',
        long = "url",
        required_unless_present = "vtt_path",
        conflicts_with = "vtt_path"
    )]
    url: Option<String>,

    /// Local caption file (WebVTT or SRT) instead of downloading.
    #[arg(long = "vtt")]
    vtt_path: Option<String>,

    /// Path to the yt-dlp executable.
    #[arg(long = "yt-dlp", default_value = "yt-dlp")]
    yt_dlp: String,

    /// Caption language to download.
    #[arg(long = "lang", default_value = "en")]
    language: String,

    /// Window length in seconds.
    #[arg(long = "chunk-size", default_value_t = topicflow::opts::DEFAULT_CHUNK_SIZE_SECONDS)]
    chunk_size: f64,

    /// Seconds shared by consecutive windows.
    #[arg(long = "overlap", default_value_t = topicflow::opts::DEFAULT_OVERLAP_SECONDS)]
    overlap: f64,

    /// DBSCAN neighborhood radius (cosine distance).
    #[arg(long = "eps", default_value_t = topicflow::opts::DEFAULT_EPS)]
    eps: f32,

    /// DBSCAN minimum neighborhood size, including the point itself.
    #[arg(long = "min-pts", default_value_t = topicflow::opts::DEFAULT_MIN_PTS)]
    min_pts: usize,

    /// Embedding model name.
    #[arg(long = "embedding-model", default_value = topicflow::suppliers::openai::DEFAULT_MODEL)]
    embedding_model: String,

    #[arg(
        short = 'o',
        long = "output-type",
        value_enum,
        default_value_t = OutputType::Json
    )]
    output_type: OutputType,
}
