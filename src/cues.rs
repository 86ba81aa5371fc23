//! Parsing of line-oriented timed-text markup (WebVTT / SRT style) into cues.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

/// Separator between the start and end timestamp on a cue timing line.
const TIME_SEPARATOR: &str = "-->";

/// A single timed caption entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds. Never earlier than `start`.
    pub end: f64,
    /// Text lines of the cue joined with a single space. May be empty.
    pub text: String,
}

/// Parse raw caption markup into an ordered sequence of cues.
///
/// Every line containing `-->` starts a cue. The lines that follow, up to the next blank line or
/// the next timing line, are trimmed and joined with a single space to form the cue text.
/// Anything outside a cue (headers, `NOTE` blocks, SRT counters) is ignored.
///
/// Fails with [`Error::Parse`] when no timing line is found or a timing line is malformed.
pub fn parse_cues(raw: &str) -> Result<Vec<Cue>> {
    let mut cues = Vec::new();
    let mut lines = raw.lines().enumerate().peekable();

    while let Some((line_no, line)) = lines.next() {
        if !line.contains(TIME_SEPARATOR) {
            continue;
        }

        let (start, end) = parse_time_line(line)
            .map_err(|msg| Error::parse(format!("line {}: {msg}", line_no + 1)))?;

        let mut text: Vec<&str> = Vec::new();
        while let Some(&(_, next)) = lines.peek() {
            let next = next.trim();
            if next.is_empty() || next.contains(TIME_SEPARATOR) {
                break;
            }
            text.push(next);
            lines.next();
        }

        cues.push(Cue {
            start,
            end,
            text: text.join(" "),
        });
    }

    if cues.is_empty() {
        return Err(Error::parse("no cues parsed"));
    }

    debug!(cues = cues.len(), "parsed cues");
    Ok(cues)
}

/// Split a timing line into its start and end timestamps (in seconds).
///
/// Cue settings trailing the end timestamp (`align:start position:0%`) are ignored.
fn parse_time_line(line: &str) -> std::result::Result<(f64, f64), String> {
    let (left, right) = line
        .split_once(TIME_SEPARATOR)
        .ok_or_else(|| "missing '-->' separator".to_owned())?;

    let start_raw = left.trim();
    let end_raw = right.split_whitespace().next().unwrap_or("");

    let start = parse_timestamp(start_raw)
        .ok_or_else(|| format!("invalid start timestamp '{start_raw}'"))?;
    let end =
        parse_timestamp(end_raw).ok_or_else(|| format!("invalid end timestamp '{end_raw}'"))?;

    if end < start {
        return Err(format!("cue ends ({end_raw}) before it starts ({start_raw})"));
    }

    Ok((start, end))
}

/// Convert `HH:MM:SS.mmm` (or `MM:SS.mmm`) into seconds. A comma decimal separator is accepted.
pub(crate) fn parse_timestamp(raw: &str) -> Option<f64> {
    let parts: Vec<&str> = raw.split(':').collect();
    let (h, m, s) = match parts.as_slice() {
        [h, m, s] => (*h, *m, *s),
        [m, s] => ("0", *m, *s),
        _ => return None,
    };

    let h: f64 = h.trim().parse().ok()?;
    let m: f64 = m.trim().parse().ok()?;
    let s: f64 = s.trim().replace(',', ".").parse().ok()?;

    let seconds = h * 3600.0 + m * 60.0 + s;
    if seconds.is_finite() && seconds >= 0.0 {
        Some(seconds)
    } else {
        None
    }
}
