//! CLI command implementations.

pub mod actions;
pub mod discover;
pub mod issues;
pub mod movies;
pub mod scan;
pub mod shows;
pub mod watch;

use colored::{ColoredString, Colorize};
use std::path::Path;

/// Shorten a path for table output, keeping the tail.
pub(crate) fn short_path(path: &Path, width: usize) -> String {
    let text = path.display().to_string();
    let count = text.chars().count();
    if count <= width {
        return text;
    }
    let tail: String = text.chars().skip(count - (width - 3)).collect();
    format!("...{}", tail)
}

/// Colored status label.
pub(crate) fn status_label(status: &str) -> ColoredString {
    match status {
        "added" | "applied" => status.green(),
        "proposed" | "pending" | "approved" => status.cyan(),
        "skipped" | "rejected" => status.yellow(),
        _ => status.red(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_path() {
        assert_eq!(short_path(Path::new("/a/b.mkv"), 20), "/a/b.mkv");
        let long = short_path(Path::new("/very/long/path/to/Show.S01E01.mkv"), 16);
        assert_eq!(long.chars().count(), 16);
        assert!(long.ends_with("S01E01.mkv"));
    }
}
