//! Quality parsing and arbitration.
//!
//! Reads resolution, source, codec and group tags out of a release name and
//! orders two files by those signals. The ordering is coarse on purpose:
//! resolution tier first, then source tier, then file size.

use crate::models::config::{QualityConfig, DEFAULT_SOURCE_ORDER};
use crate::models::media::{Codec, QualityTokens, Resolution, Source};
use regex::Regex;
use std::cmp::Ordering;
use std::sync::LazyLock;

static RESOLUTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^a-z0-9])(2160p|4k|uhd|1080[pi]|720p|576p|480p)(?:[^a-z0-9]|$)")
        .expect("valid resolution regex")
});

static REMUX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|[^a-z0-9])(?:bd)?remux(?:[^a-z0-9]|$)").expect("valid remux regex"));

static BLURAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^a-z0-9])(?:blu-?ray|bdrip|brrip|bd25|bd50)(?:[^a-z0-9]|$)")
        .expect("valid bluray regex")
});

static WEB: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^a-z0-9])(?:web-?dl|webrip|web)(?:[^a-z0-9]|$)").expect("valid web regex")
});

static TV: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^a-z0-9])(?:hdtv|pdtv|sdtv|dsr|tvrip)(?:[^a-z0-9]|$)").expect("valid tv regex")
});

static DVD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^a-z0-9])(?:dvdrip|dvd5|dvd9|dvd)(?:[^a-z0-9]|$)").expect("valid dvd regex")
});

static CAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^a-z0-9])(?:hdcam|cam|camrip|ts|hdts|telesync|tc|telecine)(?:[^a-z0-9]|$)")
        .expect("valid cam regex")
});

static CODEC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^a-z0-9])([hx][ .]?26[45]|hevc|avc|av1|xvid|divx)(?:[^a-z0-9]|$)")
        .expect("valid codec regex")
});

static GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-([A-Za-z0-9]+)$").expect("valid group regex"));

/// Parse quality tokens from a file stem (no extension).
pub fn parse_tokens(stem: &str) -> QualityTokens {
    let resolution = RESOLUTION
        .captures(stem)
        .and_then(|caps| caps.get(1))
        .map(|m| match m.as_str().to_lowercase().as_str() {
            "2160p" | "4k" | "uhd" => Resolution::Uhd2160,
            "1080p" | "1080i" => Resolution::Hd1080,
            "720p" => Resolution::Hd720,
            _ => Resolution::Sd,
        })
        .unwrap_or_default();

    // Most specific source first
    let source = if REMUX.is_match(stem) {
        Source::Remux
    } else if BLURAY.is_match(stem) {
        Source::Bluray
    } else if WEB.is_match(stem) {
        Source::Web
    } else if TV.is_match(stem) {
        Source::Tv
    } else if DVD.is_match(stem) {
        Source::Dvd
    } else if CAM.is_match(stem) {
        Source::Cam
    } else {
        Source::Unknown
    };

    let codec = CODEC.captures(stem).and_then(|caps| caps.get(1)).map(|m| {
        let lower = m.as_str().to_lowercase();
        if lower.ends_with("265") || lower == "hevc" {
            Codec::H265
        } else if lower.ends_with("264") || lower == "avc" {
            Codec::H264
        } else if lower == "av1" {
            Codec::Av1
        } else {
            Codec::Xvid
        }
    });

    let group = GROUP
        .captures(stem.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|g| !g.chars().all(|c| c.is_ascii_digit()));

    QualityTokens {
        resolution,
        source,
        codec,
        group,
    }
}

/// Quality of one concrete file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileQuality {
    pub tokens: QualityTokens,
    pub size: Option<u64>,
}

impl FileQuality {
    pub fn new(tokens: QualityTokens, size: Option<u64>) -> Self {
        Self { tokens, size }
    }
}

/// Ordering policy over quality signals.
#[derive(Debug, Clone)]
pub struct QualityPolicy {
    source_order: Vec<Source>,
    prefer_larger: bool,
}

impl Default for QualityPolicy {
    fn default() -> Self {
        Self {
            source_order: DEFAULT_SOURCE_ORDER.to_vec(),
            prefer_larger: true,
        }
    }
}

impl QualityPolicy {
    pub fn from_config(config: &QualityConfig) -> Self {
        Self {
            source_order: config.source_order.clone(),
            prefer_larger: config.prefer_larger,
        }
    }

    /// Position in the configured order; unlisted sources rank lowest.
    fn source_rank(&self, source: Source) -> usize {
        self.source_order
            .iter()
            .position(|s| *s == source)
            .map(|p| p + 1)
            .unwrap_or(0)
    }

    /// Total order over two files.
    pub fn compare(&self, a: &FileQuality, b: &FileQuality) -> Ordering {
        a.tokens
            .resolution
            .cmp(&b.tokens.resolution)
            .then_with(|| {
                self.source_rank(a.tokens.source)
                    .cmp(&self.source_rank(b.tokens.source))
            })
            .then_with(|| {
                if self.prefer_larger {
                    a.size.unwrap_or(0).cmp(&b.size.unwrap_or(0))
                } else {
                    Ordering::Equal
                }
            })
    }

    /// Whether `incoming` should take the place of `existing`.
    pub fn should_replace(&self, existing: &FileQuality, incoming: &FileQuality) -> bool {
        // An unreadable release name never displaces a known one
        if incoming.tokens.is_unknown() && !existing.tokens.is_unknown() {
            return false;
        }
        self.compare(incoming, existing) == Ordering::Greater
    }
}

/// Decide replacement with the default policy (convenience function).
pub fn should_replace(existing: &FileQuality, incoming: &FileQuality) -> bool {
    QualityPolicy::default().should_replace(existing, incoming)
}
