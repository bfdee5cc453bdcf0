//! Movies command implementation.

use crate::cli::context::Context;
use crate::models::catalog::CatalogMovie;
use crate::Result;
use colored::Colorize;
use uuid::Uuid;

fn label(movie: &CatalogMovie) -> String {
    match movie.year {
        Some(year) => format!("{} ({})", movie.title, year),
        None => movie.title.clone(),
    }
}

pub fn list(ctx: &Context) -> Result<()> {
    let mut movies = ctx.catalog.movies()?;
    movies.retain(|m| m.tracked);
    movies.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase()).then(a.year.cmp(&b.year)));

    if movies.is_empty() {
        println!("No tracked movies.");
        return Ok(());
    }

    println!(
        "{:<36} {:<30} {:<6} {:<10} {}",
        "ID".bold(),
        "TITLE".bold(),
        "YEAR".bold(),
        "QUALITY".bold(),
        "FILE".bold()
    );
    for movie in &movies {
        println!(
            "{:<36} {:<30} {:<6} {:<10} {}",
            movie.id,
            movie.title,
            movie.year.map(|y| y.to_string()).unwrap_or_default(),
            movie
                .quality
                .as_ref()
                .map(|q| q.resolution.to_string())
                .unwrap_or_else(|| "-".to_string()),
            movie
                .file
                .as_deref()
                .map(|p| super::short_path(p, 50))
                .unwrap_or_else(|| "-".dimmed().to_string())
        );
    }
    Ok(())
}

pub fn add(ctx: &Context, title: &str, year: Option<u16>, tmdb_id: Option<u64>) -> Result<()> {
    let movie = ctx.catalog.add_movie(title, year, tmdb_id)?;
    println!("{} Tracking {} [{}]", "[OK]".bold().green(), label(&movie), movie.id);
    Ok(())
}

pub fn alias(ctx: &Context, id: Uuid, alias: &str, remove: bool) -> Result<()> {
    let movie = if remove {
        ctx.catalog.remove_movie_alias(id, alias)?
    } else {
        ctx.catalog.add_movie_alias(id, alias)?
    };
    println!(
        "{} {}: {}",
        "[OK]".bold().green(),
        label(&movie),
        if movie.aliases.is_empty() {
            "(no aliases)".to_string()
        } else {
            movie.aliases.join(", ")
        }
    );
    Ok(())
}

pub fn untrack(ctx: &Context, id: Uuid) -> Result<()> {
    let movie = ctx.catalog.untrack_movie(id)?;
    println!("{} {} is no longer tracked", "[OK]".bold().green(), label(&movie));
    Ok(())
}
