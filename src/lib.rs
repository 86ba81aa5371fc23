//! `topicflow`: turn a video's timed captions into semantically clustered topic segments.
//!
//! This crate provides:
//! - Caption parsing (WebVTT / SRT style timing lines)
//! - Overlapping time-window chunking
//! - Cosine distance matrices and DBSCAN clustering over chunk embeddings
//! - Pluggable collaborators for caption download and embedding APIs
//! - Output encoders for cluster records (JSON, VTT)
//!
//! The core stages are pure functions over request-scoped data; the only I/O happens inside
//! the [`TextSupplier`] and [`EmbeddingSupplier`] implementations.

mod error;

// High-level API (most consumers should start here).
pub mod opts;
pub mod pipeline;

// Core stages, leaf-first.
pub mod chunker;
pub mod clusters;
pub mod cues;
pub mod dbscan;
pub mod distance;

// Collaborator seams and built-in implementations.
pub mod supplier;
pub mod suppliers;

// Output selection and encoder interfaces.
pub mod cluster_encoder;
pub mod output_type;

// Output encoders that serialize cluster records into various formats.
pub mod json_array_encoder;
pub mod vtt_encoder;

// Logging configuration and control.
#[cfg(feature = "logging")]
pub mod logging;

pub use chunker::{Chunk, chunk, window_count};
pub use clusters::{ClusterRecord, Clustering, EmbeddedChunk, assemble, cluster};
pub use cues::{Cue, parse_cues};
pub use dbscan::{ClusterAssignment, dbscan};
pub use distance::{DistanceMatrix, build_distance_matrix, cosine_distance};
pub use error::{Error, Result, UpstreamError};
pub use opts::{ChunkOpts, ClusterOpts, Opts};
pub use output_type::OutputType;
pub use pipeline::{Analysis, TopicFlow, write_clusters};
pub use supplier::{EmbeddingSupplier, TextSupplier, clean_embedding_text, embed_chunks};

#[cfg(feature = "logging")]
pub use logging::init as init_logging;
