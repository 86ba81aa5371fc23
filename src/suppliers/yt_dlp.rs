//! Auto-generated caption download through an external `yt-dlp` process.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::supplier::TextSupplier;
use crate::{Error, Result, UpstreamError};

/// How long we wait for the subtitle file to appear after the downloader exits.
pub const DEFAULT_SETTLE_TIMEOUT: Duration = Duration::from_secs(1);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Extract the video id (the `v` query parameter) from a watch URL.
pub fn video_id_from_url(url: &str) -> Result<String> {
    let invalid = || Error::config("invalid YouTube URL - no video ID found");

    let (_, query) = url.split_once('?').ok_or_else(invalid)?;
    let query = query.split('#').next().unwrap_or("");

    let id = query
        .split('&')
        .find_map(|pair| pair.strip_prefix("v="))
        .filter(|id| !id.is_empty())
        .ok_or_else(invalid)?;

    // The id ends up in a file name; anything beyond the usual alphabet is refused.
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(Error::config(format!("invalid video ID '{id}'")));
    }

    Ok(id.to_owned())
}

/// A `TextSupplier` that downloads auto-generated subtitles with `yt-dlp`.
///
/// Each fetch runs in a fresh temporary directory that is removed afterwards, so concurrent
/// fetches never share files.
#[derive(Debug, Clone)]
pub struct YtDlpSupplier {
    program: PathBuf,
    program_args: Vec<OsString>,
    language: String,
    settle_timeout: Duration,
}

impl Default for YtDlpSupplier {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

impl YtDlpSupplier {
    /// Use `program` as the downloader executable.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            program_args: Vec::new(),
            language: "en".to_owned(),
            settle_timeout: DEFAULT_SETTLE_TIMEOUT,
        }
    }

    /// Arguments placed before the downloader flags (e.g. `["-m", "yt_dlp"]` for `python3`).
    pub fn with_program_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.program_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Subtitle language to request (default `en`).
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Maximum time to wait for the subtitle file once the downloader has exited.
    pub fn with_settle_timeout(mut self, timeout: Duration) -> Self {
        self.settle_timeout = timeout;
        self
    }

    fn download(&self, url: &str, video_id: &str, dir: &Path) -> Result<PathBuf> {
        let template = dir.join(format!("{video_id}.%(ext)s"));

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.program_args)
            .arg("--write-auto-sub")
            .arg("--sub-lang")
            .arg(&self.language)
            .arg("--skip-download")
            .arg("-o")
            .arg(&template)
            .arg(url);

        debug!(program = %self.program.display(), %url, "running subtitle downloader");
        let output = cmd.output().map_err(|err| {
            UpstreamError::Failed(format!(
                "failed to download subtitles: could not run '{}': {err}",
                self.program.display()
            ))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(status = %output.status, stderr = %stderr.trim(), "subtitle downloader failed");
            return Err(UpstreamError::Failed(format!(
                "failed to download subtitles: {} ({})",
                output.status,
                stderr.trim()
            ))
            .into());
        }

        Ok(dir.join(format!("{video_id}.{}.vtt", self.language)))
    }

    fn wait_for_file(&self, path: &Path) -> bool {
        let deadline = Instant::now() + self.settle_timeout;
        loop {
            if path.is_file() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl TextSupplier for YtDlpSupplier {
    fn fetch_transcript(&self, url: &str) -> Result<String> {
        let video_id = video_id_from_url(url)?;
        let dir = tempfile::tempdir()?;

        let path = self.download(url, &video_id, dir.path())?;
        if !self.wait_for_file(&path) {
            return Err(UpstreamError::NotFound("subtitle file not found".to_owned()).into());
        }

        let transcript = fs::read_to_string(&path).map_err(|err| {
            UpstreamError::Failed(format!("failed to read subtitle file: {err}"))
        })?;

        info!(%video_id, bytes = transcript.len(), "downloaded subtitles");
        Ok(transcript)
    }
}
