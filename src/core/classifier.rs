//! Filename classifier.
//!
//! Turns a bare filename into a TV hint, a movie hint, or `Unparsed`.
//! Pure and deterministic: no I/O, no catalog access.
//!
//! TV patterns are tried in priority order:
//! 1. `S01E02` (optionally `S01E02E03` / `S01E02-E03`)
//! 2. `1x02`
//! 3. Three-digit fallback `102` (low confidence), suppressed next to codec
//!    markers such as `H.265` or `x264`
//!
//! When no TV pattern fires, the movie pattern looks for a plausible
//! release-year token after at least one title token.

use crate::core::quality;
use crate::models::media::QualityTokens;
use chrono::Datelike;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Earliest year accepted as a release year.
const MIN_RELEASE_YEAR: u16 = 1900;

/// How far a TV pattern can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    High,
}

/// Probable TV episode identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TvHint {
    pub season: u16,
    pub episode: u16,
    /// Further episodes in a multi-episode file.
    pub extra_episodes: Vec<u16>,
    /// Show title, original case.
    pub title_hint: String,
    /// Year found at the tail of the show title.
    pub year: Option<u16>,
    pub quality: QualityTokens,
    pub confidence: Confidence,
    /// Name of the pattern that fired.
    pub pattern: &'static str,
}

impl TvHint {
    /// Every episode number the file covers.
    pub fn episodes(&self) -> Vec<u16> {
        let mut all = vec![self.episode];
        all.extend(self.extra_episodes.iter().copied());
        all
    }
}

/// Probable movie identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieHint {
    /// Title, original case.
    pub title_hint: String,
    pub year: Option<u16>,
    pub quality: QualityTokens,
}

/// Why a filename could not be classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnparsedReason {
    /// Neither a TV nor a movie pattern matched.
    NoPattern,
    /// A pattern matched but left no title.
    EmptyTitle,
}

impl std::fmt::Display for UnparsedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnparsedReason::NoPattern => write!(f, "no TV or movie pattern matched"),
            UnparsedReason::EmptyTitle => write!(f, "no title before the match"),
        }
    }
}

/// Classification result. Serialized for display, never read back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParseResult {
    Tv(TvHint),
    Movie(MovieHint),
    Unparsed { reason: UnparsedReason },
}

/// Raw hit from one TV matcher.
struct EpisodeHit {
    season: u16,
    episode: u16,
    extra_episodes: Vec<u16>,
    /// Byte offset where the match starts; the title is everything before it.
    start: usize,
}

/// A named TV matcher; tried in list order.
struct TvPattern {
    name: &'static str,
    regex: &'static LazyLock<Regex>,
    confidence: Confidence,
    extract: fn(&str, &Captures) -> Option<EpisodeHit>,
}

static SXXEYY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^a-z0-9])(s(\d{1,2})[ ._-]?e(\d{1,3})((?:[ ._-]?-?[ ._-]?e\d{1,3})*))(?:[^0-9]|$)")
        .expect("valid SxxEyy regex")
});

static EXTRA_EPISODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)e(\d{1,3})").expect("valid extra episode regex"));

static NXNN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^a-z0-9])((\d{1,2})x(\d{2,3}))(?:[^a-z0-9]|$)").expect("valid NxNN regex")
});

static THREE_DIGIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^A-Za-z0-9])(([1-9])(\d{2}))(?:[^A-Za-z0-9]|$)").expect("valid 3-digit regex")
});

/// `h`/`x` with an optional separator, right before the digits.
static CODEC_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|[^a-z])[hx][ ._-]?$").expect("valid codec marker regex"));

static LEADING_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[\[\(][^\]\)]*[\]\)]\s*").expect("valid leading tag regex"));

static TRAILING_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*?)[\s(\[]*((?:19|20)\d{2})[\s)\]]*$").expect("valid year regex"));

static TV_PATTERNS: &[TvPattern] = &[
    TvPattern {
        name: "sxxeyy",
        regex: &SXXEYY,
        confidence: Confidence::High,
        extract: extract_sxxeyy,
    },
    TvPattern {
        name: "nxnn",
        regex: &NXNN,
        confidence: Confidence::High,
        extract: extract_nxnn,
    },
    TvPattern {
        name: "three_digit",
        regex: &THREE_DIGIT,
        confidence: Confidence::Low,
        extract: extract_three_digit,
    },
];

fn extract_sxxeyy(_text: &str, caps: &Captures) -> Option<EpisodeHit> {
    let whole = caps.get(1)?;
    let season = caps.get(2)?.as_str().parse().ok()?;
    let episode = caps.get(3)?.as_str().parse().ok()?;
    let extra_episodes = caps
        .get(4)
        .map(|m| {
            EXTRA_EPISODE
                .captures_iter(m.as_str())
                .filter_map(|c| c.get(1)?.as_str().parse::<u16>().ok())
                .collect()
        })
        .unwrap_or_default();

    Some(EpisodeHit {
        season,
        episode,
        extra_episodes,
        start: whole.start(),
    })
}

fn extract_nxnn(_text: &str, caps: &Captures) -> Option<EpisodeHit> {
    let whole = caps.get(1)?;
    Some(EpisodeHit {
        season: caps.get(2)?.as_str().parse().ok()?,
        episode: caps.get(3)?.as_str().parse().ok()?,
        extra_episodes: Vec::new(),
        start: whole.start(),
    })
}

fn extract_three_digit(text: &str, caps: &Captures) -> Option<EpisodeHit> {
    let whole = caps.get(1)?;
    if is_after_codec_marker(text, whole.start()) {
        return None;
    }
    let season: u16 = caps.get(2)?.as_str().parse().ok()?;
    let episode: u16 = caps.get(3)?.as_str().parse().ok()?;
    if episode == 0 {
        return None;
    }
    Some(EpisodeHit {
        season,
        episode,
        extra_episodes: Vec::new(),
        start: whole.start(),
    })
}

/// True when the digits at `start` belong to a codec tag like `H.265`.
fn is_after_codec_marker(text: &str, start: usize) -> bool {
    CODEC_MARKER.is_match(&text[..start])
}

/// Strip a known video extension, keeping anything else (dots are common in titles).
fn file_stem(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if crate::utils::fs::is_video_extension(ext) => stem,
        _ => filename,
    }
}

/// Replace delimiters with spaces and collapse whitespace; case is kept.
pub fn clean_title(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '.' | '_' | '-' | '[' | ']' | '(' | ')' => ' ',
            _ => c,
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split a trailing year off a show title: `Show 2019` -> (`Show`, 2019).
fn split_trailing_year(title: &str) -> (String, Option<u16>) {
    if let Some(caps) = TRAILING_YEAR.captures(title) {
        let head = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
        let year = caps.get(2).and_then(|m| m.as_str().parse::<u16>().ok());
        if !head.is_empty() && year.map(is_plausible_year).unwrap_or(false) {
            return (head.to_string(), year);
        }
    }
    (title.to_string(), None)
}

/// Title and optional year from a folder name such as `Borgen (2010)`.
pub fn folder_title(name: &str) -> (String, Option<u16>) {
    split_trailing_year(&clean_title(name))
}

fn is_plausible_year(year: u16) -> bool {
    let max_year = chrono::Utc::now().year() as u16 + 1;
    (MIN_RELEASE_YEAR..=max_year).contains(&year)
}

fn classify_tv(stem: &str, quality: &QualityTokens) -> Option<ParseResult> {
    for pattern in TV_PATTERNS {
        // Try every occurrence; a suppressed hit must not hide a later valid one
        for caps in pattern.regex.captures_iter(stem) {
            let Some(hit) = (pattern.extract)(stem, &caps) else {
                continue;
            };

            let (title_hint, year) = split_trailing_year(&clean_title(&stem[..hit.start]));
            if title_hint.is_empty() {
                return Some(ParseResult::Unparsed {
                    reason: UnparsedReason::EmptyTitle,
                });
            }

            tracing::debug!(
                "TV pattern '{}' matched {:?}: S{:02}E{:02}",
                pattern.name,
                stem,
                hit.season,
                hit.episode
            );

            return Some(ParseResult::Tv(TvHint {
                season: hit.season,
                episode: hit.episode,
                extra_episodes: hit.extra_episodes,
                title_hint,
                year,
                quality: quality.clone(),
                confidence: pattern.confidence,
                pattern: pattern.name,
            }));
        }
    }
    None
}

fn classify_movie(stem: &str, quality: &QualityTokens) -> Option<ParseResult> {
    let stem = LEADING_TAG.replace(stem, "");
    let tokens: Vec<&str> = stem
        .split(|c: char| matches!(c, '.' | '_' | '-' | ' ' | '(' | ')' | '[' | ']'))
        .filter(|t| !t.is_empty())
        .collect();

    // Last plausible year with at least one title token before it
    let year_idx = tokens.iter().enumerate().rev().find_map(|(idx, token)| {
        if idx == 0 || token.len() != 4 {
            return None;
        }
        token
            .parse::<u16>()
            .ok()
            .filter(|y| is_plausible_year(*y))
            .map(|y| (idx, y))
    });

    let (idx, year) = year_idx?;
    let title_hint = tokens[..idx].join(" ");
    if title_hint.trim().is_empty() {
        return Some(ParseResult::Unparsed {
            reason: UnparsedReason::EmptyTitle,
        });
    }

    Some(ParseResult::Movie(MovieHint {
        title_hint,
        year: Some(year),
        quality: quality.clone(),
    }))
}

/// Classify a filename.
pub fn classify(filename: &str) -> ParseResult {
    let stem = file_stem(filename.trim());
    let quality = quality::parse_tokens(stem);

    if let Some(result) = classify_tv(stem, &quality) {
        return result;
    }
    if let Some(result) = classify_movie(stem, &quality) {
        return result;
    }

    ParseResult::Unparsed {
        reason: UnparsedReason::NoPattern,
    }
}
