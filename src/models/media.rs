//! Media-related data models.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Video file information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoFile {
    /// Full path to the file.
    pub path: PathBuf,
    /// File name without path.
    pub filename: String,
    /// File size in bytes.
    pub size: u64,
    /// Last modified time.
    pub modified: chrono::DateTime<chrono::Utc>,
    /// Parent directory.
    pub parent_dir: PathBuf,
}

/// Resolution tier parsed from a release name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Unknown,
    Sd,
    #[serde(rename = "720p")]
    Hd720,
    #[serde(rename = "1080p")]
    Hd1080,
    #[serde(rename = "2160p")]
    Uhd2160,
}

impl Default for Resolution {
    fn default() -> Self {
        Resolution::Unknown
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Resolution::Unknown => "unknown",
            Resolution::Sd => "SD",
            Resolution::Hd720 => "720p",
            Resolution::Hd1080 => "1080p",
            Resolution::Uhd2160 => "2160p",
        };
        write!(f, "{}", s)
    }
}

/// Release source parsed from a release name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Unknown,
    Cam,
    Tv,
    Dvd,
    Web,
    Bluray,
    Remux,
}

impl Default for Source {
    fn default() -> Self {
        Source::Unknown
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Source::Unknown => "unknown",
            Source::Cam => "CAM",
            Source::Tv => "HDTV",
            Source::Dvd => "DVD",
            Source::Web => "WEB",
            Source::Bluray => "BluRay",
            Source::Remux => "Remux",
        };
        write!(f, "{}", s)
    }
}

/// Video codec parsed from a release name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    H264,
    H265,
    Av1,
    Xvid,
}

impl std::fmt::Display for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Codec::H264 => "x264",
            Codec::H265 => "x265",
            Codec::Av1 => "AV1",
            Codec::Xvid => "XviD",
        };
        write!(f, "{}", s)
    }
}

/// Quality signals carried by a filename.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityTokens {
    /// Resolution tier (e.g., 1080p).
    pub resolution: Resolution,
    /// Release source (e.g., WEB, BluRay).
    pub source: Source,
    /// Video codec, if tagged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codec: Option<Codec>,
    /// Release group tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl QualityTokens {
    /// True when neither resolution nor source could be read.
    pub fn is_unknown(&self) -> bool {
        self.resolution == Resolution::Unknown && self.source == Source::Unknown
    }
}

impl std::fmt::Display for QualityTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if self.resolution != Resolution::Unknown {
            parts.push(self.resolution.to_string());
        }
        if self.source != Source::Unknown {
            parts.push(self.source.to_string());
        }
        if let Some(codec) = self.codec {
            parts.push(codec.to_string());
        }
        if parts.is_empty() {
            write!(f, "unknown")
        } else {
            write!(f, "{}", parts.join(" "))
        }
    }
}
