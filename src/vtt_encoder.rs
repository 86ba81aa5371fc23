use std::io::Write;

use crate::Result;
use crate::cluster_encoder::ClusterEncoder;
use crate::clusters::ClusterRecord;

/// A `ClusterEncoder` that writes each topic cluster as a WebVTT cue.
///
/// The cue spans the cluster's time range and carries the cluster id as its identifier, so the
/// output can be loaded as a chapter-like subtitle track. The `WEBVTT` header is written lazily
/// on the first cluster.
pub struct VttEncoder<W: Write> {
    w: W,
    started: bool,
    closed: bool,
}

impl<W: Write> VttEncoder<W> {
    /// Create a new VTT encoder that writes to the provided writer.
    pub fn new(w: W) -> Self {
        Self {
            w,
            started: false,
            closed: false,
        }
    }

    fn start_if_needed(&mut self) -> Result<()> {
        if !self.started {
            // WebVTT files begin with a mandatory header line followed by a blank line.
            self.w.write_all(b"WEBVTT\n\n")?;
            self.started = true;
        }
        Ok(())
    }
}

impl<W: Write> ClusterEncoder for VttEncoder<W> {
    fn write_cluster(&mut self, cluster: &ClusterRecord) -> Result<()> {
        if self.closed {
            return Err(crate::Error::msg(
                "cannot write cluster: encoder is already closed",
            ));
        }

        self.start_if_needed()?;

        let start = format_timestamp_vtt(cluster.start);
        let end = format_timestamp_vtt(cluster.end);

        writeln!(&mut self.w, "topic-{}", cluster.id)?;
        writeln!(&mut self.w, "{start} --> {end}")?;
        // A blank line would terminate the cue early.
        writeln!(&mut self.w, "{}", cluster.texts.replace('\n', " "))?;
        writeln!(&mut self.w)?;

        self.w.flush()?;

        Ok(())
    }

    /// Flush the underlying writer. This is idempotent.
    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        self.w.flush()?;
        self.closed = true;

        Ok(())
    }
}

/// Format seconds into a WebVTT timestamp (`HH:MM:SS.mmm`), rounded to the nearest millisecond.
fn format_timestamp_vtt(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;

    let ms = total_ms % 1000;
    let total_s = total_ms / 1000;

    let s = total_s % 60;
    let total_m = total_s / 60;

    let m = total_m % 60;
    let h = total_m / 60;

    format!("{h:02}:{m:02}:{s:02}.{ms:03}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cues::parse_cues;

    fn record(id: usize, start: f64, end: f64, texts: &str) -> ClusterRecord {
        ClusterRecord {
            id,
            chunk_ids: vec![id],
            start,
            end,
            texts: texts.to_string(),
        }
    }

    #[test]
    fn vtt_close_without_clusters_emits_nothing() -> anyhow::Result<()> {
        let mut out = Vec::new();
        let mut enc = VttEncoder::new(&mut out);
        enc.close()?;
        assert_eq!(std::str::from_utf8(&out)?, "");
        Ok(())
    }

    #[test]
    fn vtt_writes_header_once_and_formats_cues() -> anyhow::Result<()> {
        let mut out = Vec::new();
        let mut enc = VttEncoder::new(&mut out);

        enc.write_cluster(&record(0, 0.0, 1.2346, "hello"))?;
        enc.write_cluster(&record(1, 61.5, 3723.0, "world"))?;
        enc.close()?;

        let s = std::str::from_utf8(&out)?;
        assert!(s.starts_with("WEBVTT\n\n"));
        assert!(s.contains("topic-0\n00:00:00.000 --> 00:00:01.235\nhello\n\n"));
        assert!(s.contains("topic-1\n00:01:01.500 --> 01:02:03.000\nworld\n\n"));
        assert_eq!(s.matches("WEBVTT\n\n").count(), 1);
        Ok(())
    }

    #[test]
    fn vtt_output_parses_back_into_cues() -> anyhow::Result<()> {
        let mut out = Vec::new();
        let mut enc = VttEncoder::new(&mut out);
        enc.write_cluster(&record(0, 0.0, 45.0, "a b\nc"))?;
        enc.write_cluster(&record(1, 30.0, 90.0, "d"))?;
        enc.close()?;

        let cues = parse_cues(std::str::from_utf8(&out)?)?;
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].text, "a b c");
        assert_eq!(cues[1].start, 30.0);
        assert_eq!(cues[1].end, 90.0);
        Ok(())
    }

    #[test]
    fn vtt_format_timestamp_rounds_to_nearest_millisecond() {
        assert_eq!(format_timestamp_vtt(0.0004), "00:00:00.000");
        assert_eq!(format_timestamp_vtt(1.9996), "00:00:02.000");
        assert_eq!(format_timestamp_vtt(-3.0), "00:00:00.000");
    }

    #[test]
    fn vtt_write_after_close_errors() -> anyhow::Result<()> {
        let mut out = Vec::new();
        let mut enc = VttEncoder::new(&mut out);
        enc.close()?;
        let err = enc.write_cluster(&record(0, 0.0, 1.0, "nope")).unwrap_err();
        assert!(err.to_string().contains("already closed"));
        Ok(())
    }
}
