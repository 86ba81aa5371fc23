//! Topic clusters over embedded chunks.
//!
//! `cluster` is the public entry point: it builds the distance matrix, runs DBSCAN and maps the
//! resulting index sets back onto chunk time ranges and text.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chunker::Chunk;
use crate::dbscan::{ClusterAssignment, dbscan};
use crate::distance::build_distance_matrix;
use crate::opts::ClusterOpts;
use crate::{Error, Result};

/// A chunk paired with its embedding vector.
///
/// The chunk's identity (`id`, `start`, `end`, `text`) is carried unchanged; serializes flat
/// (`{id, start, end, text, embedding}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    #[serde(flatten)]
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

impl EmbeddedChunk {
    pub fn new(chunk: Chunk, embedding: Vec<f32>) -> Self {
        Self { chunk, embedding }
    }
}

/// One topic: a group of chunks with their combined time range and text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRecord {
    pub id: usize,
    /// Indices into the clustered batch, in the order the clusterer produced them.
    pub chunk_ids: Vec<usize>,
    /// Earliest member start.
    pub start: f64,
    /// Latest member end.
    pub end: f64,
    /// Member texts joined with a single space, in `chunk_ids` order.
    pub texts: String,
}

/// Final clustering result: topic records plus the batch indices rejected as noise.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Clustering {
    pub clusters: Vec<ClusterRecord>,
    pub noise: Vec<usize>,
}

/// Cluster embedded chunks into topics.
///
/// Fails with [`Error::EmptyInput`] when `embedded` is empty and [`Error::DimensionMismatch`]
/// when the embeddings differ in length.
pub fn cluster(embedded: &[EmbeddedChunk], opts: &ClusterOpts) -> Result<Clustering> {
    if embedded.is_empty() {
        return Err(Error::EmptyInput("no embeddings provided"));
    }

    let vectors: Vec<&[f32]> = embedded.iter().map(|c| c.embedding.as_slice()).collect();
    let matrix = build_distance_matrix(&vectors)?;
    let assignment = dbscan(&matrix, opts)?;

    Ok(assemble(assignment, embedded))
}

/// Resolve cluster index sets against the chunks they index and pass noise through unchanged.
///
/// Every index in `assignment` must be in bounds for `embedded`.
pub fn assemble(assignment: ClusterAssignment, embedded: &[EmbeddedChunk]) -> Clustering {
    let ClusterAssignment { clusters, noise } = assignment;

    let clusters: Vec<ClusterRecord> = clusters
        .into_iter()
        .enumerate()
        .map(|(id, chunk_ids)| {
            let members: Vec<&Chunk> = chunk_ids.iter().map(|&i| &embedded[i].chunk).collect();

            let start = members
                .iter()
                .map(|c| c.start)
                .fold(f64::INFINITY, f64::min);
            let end = members
                .iter()
                .map(|c| c.end)
                .fold(f64::NEG_INFINITY, f64::max);
            let texts = members
                .iter()
                .map(|c| c.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");

            ClusterRecord {
                id,
                chunk_ids,
                start,
                end,
                texts,
            }
        })
        .collect();

    debug!(clusters = clusters.len(), noise = noise.len(), "assembled clusters");
    Clustering { clusters, noise }
}
