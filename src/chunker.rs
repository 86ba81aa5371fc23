//! Sliding, overlapping time windows over a cue sequence.
//!
//! Overlap lets a topic boundary that falls inside one window appear whole in the next,
//! at the cost of repeating text across adjacent chunks.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cues::Cue;
use crate::opts::ChunkOpts;
use crate::{Error, Result};

/// Text gathered from every cue overlapping one time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// 0-based, contiguous among produced chunks, in creation order.
    pub id: usize,
    /// Window start in seconds.
    pub start: f64,
    /// Window end in seconds, clamped to the end of the last cue.
    pub end: f64,
    /// Non-empty, space-joined cue texts.
    pub text: String,
}

/// Slide a `chunk_size` window with `overlap` over `cues` and collect the text of each window.
///
/// A cue belongs to a window `[start, end)` iff `cue.start < end && cue.end > start`, so a cue
/// that only touches a boundary is left out of that window. Windows whose text is empty are
/// skipped without consuming an id.
pub fn chunk(cues: &[Cue], opts: &ChunkOpts) -> Result<Vec<Chunk>> {
    let step = validate(opts)?;

    let Some(last) = cues.last() else {
        return Err(Error::EmptyInput("no cues provided"));
    };
    let total_duration = last.end;

    let mut chunks = Vec::new();
    let mut skipped = 0usize;

    // Window starts are derived from the index so long transcripts don't accumulate drift.
    for k in 0usize.. {
        let window_start = k as f64 * step;
        if window_start >= total_duration {
            break;
        }
        let window_end = (window_start + opts.chunk_size).min(total_duration);

        let text = cues
            .iter()
            .filter(|c| c.start < window_end && c.end > window_start)
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let text = text.trim();

        if text.is_empty() {
            skipped += 1;
            continue;
        }

        chunks.push(Chunk {
            id: chunks.len(),
            start: window_start,
            end: window_end,
            text: text.to_owned(),
        });
    }

    if chunks.is_empty() {
        warn!(cues = cues.len(), total_duration, "no window produced any text");
    }
    debug!(chunks = chunks.len(), skipped, step, "chunked cues");

    Ok(chunks)
}

/// Number of windows [`chunk`] scans over `cues`, counting the ones it skips as empty.
///
/// Runs in constant time, so callers can refuse a tiny `chunk_size` over a long transcript
/// before any text is gathered.
pub fn window_count(cues: &[Cue], opts: &ChunkOpts) -> Result<usize> {
    let step = validate(opts)?;
    let total_duration = cues.last().map_or(0.0, |c| c.end);
    if total_duration <= 0.0 {
        return Ok(0);
    }
    Ok((total_duration / step).ceil() as usize)
}

/// Check the window parameters and return the step between window starts.
fn validate(opts: &ChunkOpts) -> Result<f64> {
    let ChunkOpts {
        chunk_size,
        overlap,
    } = *opts;

    if !chunk_size.is_finite() || !overlap.is_finite() {
        return Err(Error::config("chunkSize and overlap must be finite"));
    }
    if overlap < 0.0 {
        return Err(Error::config(format!(
            "overlap must be >= 0 (got {overlap})"
        )));
    }
    if chunk_size <= overlap {
        return Err(Error::config(format!(
            "chunkSize ({chunk_size}) must be greater than overlap ({overlap})"
        )));
    }

    Ok(chunk_size - overlap)
}
