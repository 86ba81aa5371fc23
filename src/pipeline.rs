//! High-level API for turning a caption source into topic clusters.
//!
//! We expose a single entry point (`TopicFlow`) that wires the stages together:
//! transcript → cues → chunks → embeddings → distance matrix → DBSCAN → cluster records.
//!
//! The intent is:
//! - Collaborators (caption download, embedding API) are injected once and reused.
//! - Every call allocates its own working state; nothing is shared between calls.
//! - Each call either produces a complete result or fails as a whole.

use std::io::{BufWriter, Write};

use serde::Serialize;
use tracing::{info, info_span};

use crate::Result;
use crate::chunker::{Chunk, chunk};
use crate::cluster_encoder::ClusterEncoder;
use crate::clusters::{ClusterRecord, cluster};
use crate::cues::parse_cues;
use crate::json_array_encoder::JsonArrayEncoder;
use crate::opts::{ChunkOpts, Opts};
use crate::output_type::OutputType;
use crate::supplier::{EmbeddingSupplier, TextSupplier, embed_chunks};
use crate::vtt_encoder::VttEncoder;

/// Everything a full run produces.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    /// The chunks that were embedded and clustered, indexed by `ClusterRecord::chunk_ids`.
    pub chunks: Vec<Chunk>,
    pub clusters: Vec<ClusterRecord>,
    pub noise: Vec<usize>,
}

/// Owns the transcript and embedding collaborators.
pub struct TopicFlow<T: TextSupplier, E: EmbeddingSupplier> {
    text: T,
    embedder: E,
}

impl<T: TextSupplier, E: EmbeddingSupplier> TopicFlow<T, E> {
    pub fn new(text: T, embedder: E) -> Self {
        Self { text, embedder }
    }

    /// Fetch the raw caption markup for `source`.
    pub fn transcript(&self, source: &str) -> Result<String> {
        self.text.fetch_transcript(source)
    }

    /// Fetch, parse and window the captions for `source`.
    pub fn chunks(&self, source: &str, opts: &ChunkOpts) -> Result<Vec<Chunk>> {
        let raw = self.transcript(source)?;
        let cues = parse_cues(&raw)?;
        chunk(&cues, opts)
    }

    /// Run every stage for `source` and return the chunks and clusters.
    pub fn analyze(&self, source: &str, opts: &Opts) -> Result<Analysis> {
        let span = info_span!("analyze", %source);
        let _guard = span.enter();

        let chunks = self.chunks(source, &opts.chunk)?;
        let embedded = embed_chunks(&self.embedder, chunks)?;
        let clustering = cluster(&embedded, &opts.cluster)?;

        info!(
            chunks = embedded.len(),
            clusters = clustering.clusters.len(),
            noise = clustering.noise.len(),
            "analysis complete"
        );

        Ok(Analysis {
            chunks: embedded.into_iter().map(|e| e.chunk).collect(),
            clusters: clustering.clusters,
            noise: clustering.noise,
        })
    }

    /// Run every stage for `source` and encode the clusters to `w` in `opts.output_type`.
    ///
    /// Nothing is written unless the analysis succeeds.
    pub fn analyze_to_writer<W: Write>(&self, source: &str, w: W, opts: &Opts) -> Result<()> {
        let analysis = self.analyze(source, opts)?;
        write_clusters(&analysis.clusters, w, opts.output_type)
    }
}

/// Encode `clusters` to `w` with the encoder selected by `output_type`.
pub fn write_clusters<W: Write>(
    clusters: &[ClusterRecord],
    w: W,
    output_type: OutputType,
) -> Result<()> {
    let writer = BufWriter::new(w);

    // We keep this explicit (no trait objects) so each encoder owns its writer.
    match output_type {
        OutputType::Json => {
            let mut encoder = JsonArrayEncoder::new(writer);
            let run_res = write_all(&mut encoder, clusters);
            merge_run_and_close(run_res, encoder.close())
        }
        OutputType::Vtt => {
            let mut encoder = VttEncoder::new(writer);
            let run_res = write_all(&mut encoder, clusters);
            merge_run_and_close(run_res, encoder.close())
        }
    }
}

fn write_all<E: ClusterEncoder>(encoder: &mut E, clusters: &[ClusterRecord]) -> Result<()> {
    for record in clusters {
        encoder.write_cluster(record)?;
    }
    Ok(())
}

fn merge_run_and_close(run_res: Result<()>, close_res: Result<()>) -> Result<()> {
    match (run_res, close_res) {
        (Ok(()), Ok(())) => Ok(()),
        (Ok(()), Err(close_err)) => Err(close_err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(close_err)) => Err(crate::Error::msg(format!(
            "{err} (while closing output: {close_err})"
        ))),
    }
}
