//! Catalog matcher.
//!
//! Resolves classifier hints against the tracked catalog and scores remote
//! search results during folder discovery. Names are compared after
//! normalization; an alias counts exactly as much as the canonical name.

use crate::core::classifier::{MovieHint, TvHint};
use crate::models::catalog::{CatalogEpisode, CatalogMovie, CatalogShow, CatalogSnapshot};
use crate::models::config::{MatchingConfig, DEFAULT_MIN_DISCOVERY_SCORE, DEFAULT_TITLE_WEIGHT};
use crate::services::provider::SearchCandidate;
use std::path::Path;

/// Tokens that carry no identity.
const NOISE_TOKENS: &[&str] = &["the", "a", "an", "and", "complete", "proper", "repack", "internal"];

/// Similarity a fuzzy name match needs.
pub const FUZZY_MATCH_THRESHOLD: f64 = 0.85;

/// Confidence of a movie matched by name only (a year is missing on one side).
pub const NAME_ONLY_CONFIDENCE: f64 = 0.7;

/// How the owning entity was identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchVia {
    /// File lives under the show's root folder.
    Path,
    /// Canonical name or alias, after normalization.
    Name,
    /// Closest name above the fuzzy threshold.
    Fuzzy,
}

/// Why a hint found no owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoMatch {
    UnknownTitle,
    /// Several entities fit equally well.
    Ambiguous(Vec<String>),
    /// The show is known but lacks the episode.
    UnknownEpisode { show: String, season: u16, episode: u16 },
}

impl std::fmt::Display for NoMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoMatch::UnknownTitle => write!(f, "title not in catalog"),
            NoMatch::Ambiguous(names) => write!(f, "ambiguous: {}", names.join(", ")),
            NoMatch::UnknownEpisode { show, season, episode } => {
                write!(f, "{} has no S{:02}E{:02}", show, season, episode)
            }
        }
    }
}

/// A TV hint resolved to catalog episodes.
#[derive(Debug, Clone)]
pub struct EpisodeMatch {
    pub show: CatalogShow,
    /// One entry per episode in the file, in file order.
    pub episodes: Vec<CatalogEpisode>,
    pub confidence: f64,
    pub via: MatchVia,
}

/// A movie hint resolved to a catalog movie.
#[derive(Debug, Clone)]
pub struct MovieMatch {
    pub movie: CatalogMovie,
    pub confidence: f64,
    pub via: MatchVia,
}

/// Case-fold, strip punctuation and noise tokens, collapse whitespace.
pub fn normalize(value: &str) -> String {
    let folded: String = value
        .to_lowercase()
        .replace('&', " and ")
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    let tokens: Vec<&str> = folded.split_whitespace().collect();
    let kept: Vec<&str> = tokens
        .iter()
        .copied()
        .filter(|t| !NOISE_TOKENS.contains(t))
        .collect();

    // A title made only of noise keeps its tokens
    if kept.is_empty() {
        tokens.join(" ")
    } else {
        kept.join(" ")
    }
}

/// Similarity of two names in 0..=1 (1 - normalized edit distance).
pub fn similarity(left: &str, right: &str) -> f64 {
    let left = normalize(left);
    let right = normalize(right);
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    if left == right {
        return 1.0;
    }

    let distance = levenshtein_distance(&left, &right) as f64;
    let max_len = left.chars().count().max(right.chars().count()) as f64;
    (1.0 - distance / max_len).clamp(0.0, 1.0)
}

fn levenshtein_distance(left: &str, right: &str) -> usize {
    let left_chars: Vec<char> = left.chars().collect();
    let right_chars: Vec<char> = right.chars().collect();

    if left_chars.is_empty() {
        return right_chars.len();
    }
    if right_chars.is_empty() {
        return left_chars.len();
    }

    let mut previous_row: Vec<usize> = (0..=right_chars.len()).collect();
    let mut current_row: Vec<usize> = vec![0; right_chars.len() + 1];

    for (left_index, left_char) in left_chars.iter().enumerate() {
        current_row[0] = left_index + 1;
        for (right_index, right_char) in right_chars.iter().enumerate() {
            let insert_cost = current_row[right_index] + 1;
            let delete_cost = previous_row[right_index + 1] + 1;
            let replace_cost = previous_row[right_index] + usize::from(left_char != right_char);
            current_row[right_index + 1] = insert_cost.min(delete_cost).min(replace_cost);
        }
        std::mem::swap(&mut previous_row, &mut current_row);
    }

    previous_row[right_chars.len()]
}

/// Name forms a hint can be compared by: the title, and title plus year.
fn hint_keys(title: &str, year: Option<u16>) -> Vec<String> {
    let mut keys = vec![normalize(title)];
    if let Some(y) = year {
        keys.push(normalize(&format!("{} {}", title, y)));
    }
    keys
}

/// Entities whose normalized name or alias equals one of `keys`.
fn exact_name_hits<'a, T>(items: &'a [T], keys: &[String], names: impl Fn(&'a T) -> Vec<&'a str>) -> Vec<&'a T> {
    items
        .iter()
        .filter(|item| names(*item).iter().any(|n| keys.contains(&normalize(n))))
        .collect()
}

/// Best fuzzy hit, if unique and above the threshold.
fn fuzzy_name_hit<'a, T>(
    items: &'a [T],
    title: &str,
    names: impl Fn(&'a T) -> Vec<&'a str>,
) -> Option<(&'a T, f64)> {
    let mut best: Option<(&T, f64)> = None;
    let mut tied = false;

    for item in items {
        let score = names(item)
            .iter()
            .map(|n| similarity(n, title))
            .fold(0.0, f64::max);
        if score < FUZZY_MATCH_THRESHOLD {
            continue;
        }
        match best {
            Some((_, s)) if (score - s).abs() < f64::EPSILON => tied = true,
            Some((_, s)) if score < s => {}
            _ => {
                best = Some((item, score));
                tied = false;
            }
        }
    }

    if tied {
        None
    } else {
        best
    }
}

/// Tracked show whose root folder contains `path` (deepest root wins).
pub fn show_for_path<'a>(path: &Path, shows: &'a [CatalogShow]) -> Option<&'a CatalogShow> {
    shows
        .iter()
        .filter(|s| s.tracked && path.starts_with(&s.root_folder))
        .max_by_key(|s| s.root_folder.components().count())
}

/// Identify the show a TV hint belongs to.
pub fn identify_show<'a>(
    hint: &TvHint,
    catalog: &'a CatalogSnapshot,
    path: Option<&Path>,
) -> std::result::Result<(&'a CatalogShow, f64, MatchVia), NoMatch> {
    if let Some(show) = path.and_then(|p| show_for_path(p, &catalog.shows)) {
        return Ok((show, 1.0, MatchVia::Path));
    }

    let tracked: Vec<CatalogShow> = catalog.shows.iter().filter(|s| s.tracked).cloned().collect();
    let keys = hint_keys(&hint.title_hint, hint.year);
    let mut hits = exact_name_hits(&tracked, &keys, |s| s.names().collect());

    // Same name, different eras: the year decides
    if hits.len() > 1 {
        if let Some(year) = hint.year {
            hits.retain(|s| s.year == Some(year));
        }
    }

    let resolved = match hits.as_slice() {
        [show] => Some((show.id, 1.0, MatchVia::Name)),
        [] => fuzzy_name_hit(&tracked, &hint.title_hint, |s| s.names().collect())
            .map(|(show, score)| (show.id, score * 0.9, MatchVia::Fuzzy)),
        many => return Err(NoMatch::Ambiguous(many.iter().map(|s| s.name.clone()).collect())),
    };

    let (id, confidence, via) = resolved.ok_or(NoMatch::UnknownTitle)?;
    let show = catalog
        .shows
        .iter()
        .find(|s| s.id == id)
        .ok_or(NoMatch::UnknownTitle)?;
    Ok((show, confidence, via))
}

/// Resolve every episode of `hint` within `show`; exact on (season, episode).
pub fn resolve_episodes(
    hint: &TvHint,
    show: &CatalogShow,
    catalog: &CatalogSnapshot,
) -> std::result::Result<Vec<CatalogEpisode>, NoMatch> {
    hint.episodes()
        .into_iter()
        .map(|number| {
            catalog
                .episodes_of(show.id)
                .find(|e| e.season == hint.season && e.episode == number)
                .cloned()
                .ok_or_else(|| NoMatch::UnknownEpisode {
                    show: show.name.clone(),
                    season: hint.season,
                    episode: number,
                })
        })
        .collect()
}

/// Match a TV hint to catalog episodes.
pub fn match_tv(
    hint: &TvHint,
    catalog: &CatalogSnapshot,
    path: Option<&Path>,
) -> std::result::Result<EpisodeMatch, NoMatch> {
    let (show, confidence, via) = identify_show(hint, catalog, path)?;
    let episodes = resolve_episodes(hint, show, catalog)?;
    Ok(EpisodeMatch {
        show: show.clone(),
        episodes,
        confidence,
        via,
    })
}

/// Match a movie hint to a catalog movie.
///
/// The year must agree when both sides carry one; otherwise the match is by
/// name only, with lower confidence.
pub fn match_movie(hint: &MovieHint, catalog: &CatalogSnapshot) -> std::result::Result<MovieMatch, NoMatch> {
    let tracked: Vec<CatalogMovie> = catalog.movies.iter().filter(|m| m.tracked).cloned().collect();
    let keys = vec![normalize(&hint.title_hint)];

    let year_ok = |m: &CatalogMovie| match (hint.year, m.year) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    };
    let confidence_for = |m: &CatalogMovie| {
        if hint.year.is_some() && m.year.is_some() {
            1.0
        } else {
            NAME_ONLY_CONFIDENCE
        }
    };

    let mut hits: Vec<&CatalogMovie> = exact_name_hits(&tracked, &keys, |m| m.names().collect());
    hits.retain(|m| year_ok(m));

    // Prefer a year-confirmed hit over name-only ones
    if hits.len() > 1 {
        let confirmed: Vec<&CatalogMovie> =
            hits.iter().copied().filter(|m| confidence_for(m) == 1.0).collect();
        if !confirmed.is_empty() {
            hits = confirmed;
        }
    }

    match hits.as_slice() {
        [movie] => Ok(MovieMatch {
            movie: (*movie).clone(),
            confidence: confidence_for(movie),
            via: MatchVia::Name,
        }),
        [] => {
            let candidates: Vec<CatalogMovie> = tracked.iter().filter(|m| year_ok(m)).cloned().collect();
            fuzzy_name_hit(&candidates, &hint.title_hint, |m| m.names().collect())
                .map(|(movie, score)| MovieMatch {
                    movie: movie.clone(),
                    confidence: score * confidence_for(movie) * 0.9,
                    via: MatchVia::Fuzzy,
                })
                .ok_or(NoMatch::UnknownTitle)
        }
        many => Err(NoMatch::Ambiguous(many.iter().map(|m| m.title.clone()).collect())),
    }
}

/// Scores remote search results during folder discovery.
#[derive(Debug, Clone, Copy)]
pub struct DiscoveryScorer {
    pub title_weight: f64,
    pub min_score: f64,
}

impl Default for DiscoveryScorer {
    fn default() -> Self {
        Self {
            title_weight: DEFAULT_TITLE_WEIGHT,
            min_score: DEFAULT_MIN_DISCOVERY_SCORE,
        }
    }
}

impl DiscoveryScorer {
    pub fn from_config(config: &MatchingConfig) -> Self {
        Self {
            title_weight: config.title_weight,
            min_score: config.min_discovery_score,
        }
    }

    /// Weighted title similarity plus a year bonus/penalty, in 0..=1.
    pub fn score(&self, title: &str, year: Option<u16>, candidate: &SearchCandidate) -> f64 {
        let title_score = similarity(title, &candidate.name);
        let year_score = match (year, candidate.year) {
            (Some(a), Some(b)) if a == b => 1.0,
            (Some(a), Some(b)) if a.abs_diff(b) == 1 => 0.5,
            (Some(_), Some(_)) => 0.0,
            _ => 0.5,
        };
        (self.title_weight * title_score + (1.0 - self.title_weight) * year_score).clamp(0.0, 1.0)
    }

    /// Highest-scoring candidate that is not already owned and clears the threshold.
    pub fn best_candidate<'a>(
        &self,
        title: &str,
        year: Option<u16>,
        candidates: &'a [SearchCandidate],
        is_owned: impl Fn(&SearchCandidate) -> bool,
    ) -> Option<(&'a SearchCandidate, f64)> {
        let mut best: Option<(&SearchCandidate, f64)> = None;

        for candidate in candidates {
            if is_owned(candidate) {
                tracing::debug!("Skipping '{}': already in the catalog", candidate.name);
                continue;
            }
            let score = self.score(title, year, candidate);
            if best.map(|(_, s)| score > s).unwrap_or(true) {
                best = Some((candidate, score));
            }
        }

        best.filter(|(candidate, score)| {
            let accepted = *score >= self.min_score;
            if !accepted {
                tracing::debug!(
                    "Best candidate '{}' for '{}' scored {:.2}, below {:.2}",
                    candidate.name,
                    title,
                    score,
                    self.min_score
                );
            }
            accepted
        })
    }
}

/// Score a candidate with the default weights.
pub fn score_candidate(title: &str, year: Option<u16>, candidate: &SearchCandidate) -> f64 {
    DiscoveryScorer::default().score(title, year, candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classifier::Confidence;
    use crate::models::catalog::ProviderKind;
    use std::path::PathBuf;

    fn tv_hint(title: &str, season: u16, episode: u16) -> TvHint {
        TvHint {
            season,
            episode,
            extra_episodes: Vec::new(),
            title_hint: title.to_string(),
            year: None,
            quality: Default::default(),
            confidence: Confidence::High,
            pattern: "sxxeyy",
        }
    }

    fn movie_hint(title: &str, year: Option<u16>) -> MovieHint {
        MovieHint {
            title_hint: title.to_string(),
            year,
            quality: Default::default(),
        }
    }

    fn catalog_with_show(name: &str, seasons: u16, per_season: u16) -> (CatalogSnapshot, CatalogShow) {
        let show = CatalogShow::new(name, &PathBuf::from(format!("/tv/{}", name)), ProviderKind::Tmdb);
        let mut catalog = CatalogSnapshot::default();
        for s in 1..=seasons {
            for e in 1..=per_season {
                catalog
                    .episodes
                    .push(CatalogEpisode::new(show.id, s, e, &format!("Ep {}", e), None));
            }
        }
        catalog.shows.push(show.clone());
        (catalog, show)
    }

    fn candidate(name: &str, id: u64) -> SearchCandidate {
        SearchCandidate {
            provider: ProviderKind::Tmdb,
            id,
            name: name.to_string(),
            year: None,
        }
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("Law & Order: SVU"), "law order svu");
        assert_eq!(normalize("The  Office"), "office");
        assert_eq!(normalize("The"), "the");
    }

    #[test]
    fn test_similarity() {
        assert_eq!(similarity("Borgen", "borgen"), 1.0);
        assert!(similarity("Borgen", "Borgen - Power & Glory") < 0.5);
        assert_eq!(similarity("", "x"), 0.0);
    }

    #[test]
    fn test_episode_match_is_unique_and_exact() {
        let (catalog, show) = catalog_with_show("Breaking Bad", 3, 10);
        for season in 1..=3 {
            for episode in 1..=10 {
                let m = match_tv(&tv_hint("Breaking.Bad", season, episode), &catalog, None).unwrap();
                assert_eq!(m.show.id, show.id);
                assert_eq!(m.episodes.len(), 1);
                assert_eq!((m.episodes[0].season, m.episodes[0].episode), (season, episode));
            }
        }
    }

    #[test]
    fn test_unknown_episode() {
        let (catalog, _) = catalog_with_show("Breaking Bad", 1, 5);
        assert!(matches!(
            match_tv(&tv_hint("Breaking Bad", 1, 6), &catalog, None),
            Err(NoMatch::UnknownEpisode { .. })
        ));
    }

    #[test]
    fn test_alias_matches_like_name() {
        let (mut catalog, show) = catalog_with_show("Shōgun", 1, 3);
        catalog.shows[0].aliases.push("Shogun".to_string());
        let m = match_tv(&tv_hint("Shogun", 1, 2), &catalog, None).unwrap();
        assert_eq!(m.show.id, show.id);
        assert_eq!(m.confidence, 1.0);
        assert_eq!(m.via, MatchVia::Name);
    }

    #[test]
    fn test_untracked_show_is_ignored() {
        let (mut catalog, _) = catalog_with_show("Borgen", 1, 3);
        catalog.shows[0].tracked = false;
        assert_eq!(
            match_tv(&tv_hint("Borgen", 1, 1), &catalog, None).unwrap_err(),
            NoMatch::UnknownTitle
        );
    }

    #[test]
    fn test_path_ownership_wins() {
        let (catalog, show) = catalog_with_show("Borgen", 1, 3);
        let path = PathBuf::from("/tv/Borgen/Season 01/weird name s01e02.mkv");
        let m = match_tv(&tv_hint("weird name", 1, 2), &catalog, Some(&path)).unwrap();
        assert_eq!(m.show.id, show.id);
        assert_eq!(m.via, MatchVia::Path);
    }

    #[test]
    fn test_fuzzy_match_has_lower_confidence() {
        let (catalog, show) = catalog_with_show("Brooklyn Nine-Nine", 1, 3);
        let m = match_tv(&tv_hint("Brooklyn Nine Nin", 1, 1), &catalog, None).unwrap();
        assert_eq!(m.show.id, show.id);
        assert_eq!(m.via, MatchVia::Fuzzy);
        assert!(m.confidence < 1.0);
    }

    #[test]
    fn test_year_disambiguates_shows() {
        let (mut catalog, _) = catalog_with_show("Doctor Who", 1, 2);
        let mut modern = CatalogShow::new("Doctor Who", Path::new("/tv/Doctor Who 2005"), ProviderKind::Tmdb);
        modern.year = Some(2005);
        catalog.shows[0].year = Some(1963);
        catalog.episodes.push(CatalogEpisode::new(modern.id, 1, 1, "Rose", None));
        catalog.shows.push(modern.clone());

        let mut hint = tv_hint("Doctor Who", 1, 1);
        assert!(matches!(match_tv(&hint, &catalog, None), Err(NoMatch::Ambiguous(_))));

        hint.year = Some(2005);
        assert_eq!(match_tv(&hint, &catalog, None).unwrap().show.id, modern.id);
    }

    #[test]
    fn test_movie_year_rules() {
        let mut catalog = CatalogSnapshot::default();
        catalog.movies.push(CatalogMovie::new("Dune", Some(1984)));
        catalog.movies.push(CatalogMovie::new("Dune", Some(2021)));

        let m = match_movie(&movie_hint("Dune", Some(2021)), &catalog).unwrap();
        assert_eq!(m.movie.year, Some(2021));
        assert_eq!(m.confidence, 1.0);

        assert!(match_movie(&movie_hint("Dune", Some(2000)), &catalog).is_err());
        assert!(matches!(
            match_movie(&movie_hint("Dune", None), &catalog),
            Err(NoMatch::Ambiguous(_))
        ));
    }

    #[test]
    fn test_movie_name_only_confidence() {
        let mut catalog = CatalogSnapshot::default();
        catalog.movies.push(CatalogMovie::new("Heat", None));
        let m = match_movie(&movie_hint("Heat", Some(1995)), &catalog).unwrap();
        assert_eq!(m.confidence, NAME_ONLY_CONFIDENCE);
    }

    #[test]
    fn test_score_candidate_year() {
        let mut c = candidate("Borgen", 1);
        c.year = Some(2010);
        assert!((score_candidate("Borgen", Some(2010), &c) - 1.0).abs() < 1e-9);
        assert!(score_candidate("Borgen", Some(2010), &c) > score_candidate("Borgen", Some(2015), &c));
    }

    #[test]
    fn test_discovery_skips_owned_candidates() {
        let candidates = vec![candidate("Borgen - Power & Glory", 1), candidate("Borgen", 2)];
        let scorer = DiscoveryScorer::default();
        let (best, score) = scorer
            .best_candidate("Borgen", None, &candidates, |c| c.id == 1)
            .unwrap();
        assert_eq!(best.name, "Borgen");
        assert!(score >= DEFAULT_MIN_DISCOVERY_SCORE);
    }

    #[test]
    fn test_discovery_threshold_rejects_best() {
        let candidates = vec![candidate("Completely Different Thing", 1)];
        assert!(DiscoveryScorer::default()
            .best_candidate("Borgen", Some(2010), &candidates, |_| false)
            .is_none());
    }
}
