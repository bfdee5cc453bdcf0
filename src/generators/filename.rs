//! Naming-template rendering.
//!
//! Templates use `{var}` placeholders; numeric variables accept a zero-padded
//! width such as `{season:02}`. Multi-valued numbers (the episodes of a
//! multi-episode file) render each value padded and joined by their separator,
//! so `E{episode:02}` becomes `E01E02`.

use crate::models::catalog::{CatalogEpisode, CatalogMovie, CatalogShow};
use crate::Result;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(\w+)(?::(\d+))?\}").expect("valid placeholder regex"));

#[derive(Debug, Clone)]
enum Value {
    Text(String),
    Numbers { values: Vec<u32>, separator: String },
}

/// Variables available to a naming template.
#[derive(Debug, Clone, Default)]
pub struct NamingContext {
    vars: HashMap<String, Value>,
}

impl NamingContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a text variable; the value is sanitized for filesystem use.
    pub fn with_text(mut self, key: &str, value: &str) -> Self {
        self.vars
            .insert(key.to_string(), Value::Text(sanitize_filename(value)));
        self
    }

    /// Add a numeric variable.
    pub fn with_number(self, key: &str, value: u32) -> Self {
        self.with_numbers(key, &[value], "")
    }

    /// Add a multi-valued numeric variable.
    pub fn with_numbers(mut self, key: &str, values: &[u32], separator: &str) -> Self {
        self.vars.insert(
            key.to_string(),
            Value::Numbers {
                values: values.to_vec(),
                separator: separator.to_string(),
            },
        );
        self
    }

    /// Context for the file covering `episodes` of `show`.
    pub fn for_episodes(show: &CatalogShow, episodes: &[&CatalogEpisode]) -> Self {
        let season = episodes.first().map(|e| e.season as u32).unwrap_or(0);
        let numbers: Vec<u32> = episodes.iter().map(|e| e.episode as u32).collect();
        let title = episodes
            .iter()
            .map(|e| e.title.as_str())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" + ");

        let mut ctx = Self::new()
            .with_text("show", &show.name)
            .with_text("title", &title)
            .with_number("season", season)
            .with_numbers("episode", &numbers, "E");
        if let Some(year) = show.year {
            ctx = ctx.with_number("year", year as u32);
        }
        ctx
    }

    /// Context for a movie.
    pub fn for_movie(movie: &CatalogMovie) -> Self {
        let mut ctx = Self::new()
            .with_text("title", &movie.title)
            .with_text("edition", movie.edition.as_deref().unwrap_or(""));
        ctx = match movie.year {
            Some(year) => ctx.with_number("year", year as u32),
            None => ctx.with_text("year", ""),
        };
        ctx
    }

    fn render_value(value: &Value, width: Option<usize>) -> String {
        match value {
            Value::Text(text) => text.clone(),
            Value::Numbers { values, separator } => values
                .iter()
                .map(|n| match width {
                    Some(w) => format!("{:0w$}", n, w = w),
                    None => n.to_string(),
                })
                .collect::<Vec<_>>()
                .join(separator),
        }
    }

    /// Render a template; unknown variables are an error.
    pub fn render(&self, template: &str) -> Result<String> {
        let mut missing = None;
        let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures| {
            let key = &caps[1];
            let width = caps.get(2).and_then(|m| m.as_str().parse::<usize>().ok());
            match self.vars.get(key) {
                Some(value) => Self::render_value(value, width),
                None => {
                    missing.get_or_insert_with(|| key.to_string());
                    String::new()
                }
            }
        });

        if let Some(key) = missing {
            return Err(crate::Error::Template(format!(
                "unknown variable '{{{}}}' in \"{}\"",
                key, template
            )));
        }

        Ok(tidy_name(&rendered))
    }
}

/// Drop separators and empty brackets left behind by empty variables.
fn tidy_name(name: &str) -> String {
    let name = name.replace("()", "").replace("[]", "");
    let name = name.split_whitespace().collect::<Vec<_>>().join(" ");
    name.trim_end_matches(|c: char| c == ' ' || c == '-' || c == '.')
        .trim_start()
        .to_string()
}

/// Sanitize a string for use in a filename.
pub fn sanitize_filename(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}
