use serde::{Deserialize, Serialize};

use crate::output_type::OutputType;

/// Default sliding-window length, in seconds.
pub const DEFAULT_CHUNK_SIZE_SECONDS: f64 = 30.0;

/// Default overlap between consecutive windows, in seconds.
pub const DEFAULT_OVERLAP_SECONDS: f64 = 15.0;

/// Default DBSCAN neighborhood radius (cosine distance).
pub const DEFAULT_EPS: f32 = 0.25;

/// Default DBSCAN density threshold (a point counts itself).
pub const DEFAULT_MIN_PTS: usize = 3;

/// Sliding-window parameters for the chunker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChunkOpts {
    /// Window length in seconds. Must be greater than `overlap`.
    pub chunk_size: f64,

    /// Seconds shared by consecutive windows. Must be non-negative.
    pub overlap: f64,
}

impl Default for ChunkOpts {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE_SECONDS,
            overlap: DEFAULT_OVERLAP_SECONDS,
        }
    }
}

/// Density clustering parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterOpts {
    /// Neighborhood radius. Two chunks are neighbors when their cosine distance is below this.
    pub eps: f32,

    /// Minimum neighborhood size (including the point itself) for a core point.
    pub min_pts: usize,
}

impl Default for ClusterOpts {
    fn default() -> Self {
        Self {
            eps: DEFAULT_EPS,
            min_pts: DEFAULT_MIN_PTS,
        }
    }
}

/// Options that control a full caption → clusters run.
///
/// This struct represents *library-level configuration*, not CLI flags directly.
/// The CLI and the HTTP server map user input into this type so that other frontends
/// (tests, batch jobs) can construct options programmatically.
#[derive(Debug, Clone, Default)]
pub struct Opts {
    /// How captions are windowed into chunks.
    pub chunk: ChunkOpts,

    /// How embedded chunks are clustered.
    pub cluster: ClusterOpts,

    /// The desired output format for cluster records.
    pub output_type: OutputType,
}
