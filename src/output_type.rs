use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[cfg(feature = "cli")]
use clap::ValueEnum;

use crate::Error;

/// The supported output formats for encoded cluster records.
///
/// Each variant maps to a concrete `ClusterEncoder` implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(ValueEnum))]
pub enum OutputType {
    /// Output clusters as a JSON array.
    #[default]
    Json,

    /// Output clusters as WebVTT cues, one per topic.
    Vtt,
}

impl OutputType {
    /// Content type to advertise when serving this format over HTTP.
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Json => "application/json; charset=utf-8",
            Self::Vtt => "text/vtt; charset=utf-8",
        }
    }
}

impl FromStr for OutputType {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "vtt" => Ok(Self::Vtt),
            other => Err(Error::config(format!(
                "unknown output type '{other}' (expected 'json' or 'vtt')"
            ))),
        }
    }
}
