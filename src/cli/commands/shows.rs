//! Shows command implementation.

use crate::cli::context::Context;
use crate::Result;
use colored::Colorize;
use uuid::Uuid;

pub fn list(ctx: &Context) -> Result<()> {
    let mut shows = ctx.catalog.shows()?;
    shows.retain(|s| s.tracked);
    shows.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));

    if shows.is_empty() {
        println!("No tracked shows.");
        return Ok(());
    }

    println!(
        "{:<36} {:<30} {:<6} {:<8} {}",
        "ID".bold(),
        "NAME".bold(),
        "YEAR".bold(),
        "SOURCE".bold(),
        "ALIASES".bold()
    );
    for show in &shows {
        println!(
            "{:<36} {:<30} {:<6} {:<8} {}",
            show.id,
            show.name,
            show.year.map(|y| y.to_string()).unwrap_or_default(),
            show.metadata_source.to_string(),
            show.aliases.join(", ")
        );
    }
    Ok(())
}

pub fn alias(ctx: &Context, id: Uuid, alias: &str, remove: bool) -> Result<()> {
    let show = if remove {
        ctx.catalog.remove_show_alias(id, alias)?
    } else {
        ctx.catalog.add_show_alias(id, alias)?
    };
    println!(
        "{} {}: {}",
        "[OK]".bold().green(),
        show.name,
        if show.aliases.is_empty() {
            "(no aliases)".to_string()
        } else {
            show.aliases.join(", ")
        }
    );
    Ok(())
}

pub fn missing(ctx: &Context, id: Uuid) -> Result<()> {
    let show = ctx.store.get_show(id)?;
    let missing = ctx.catalog.missing_episodes(id)?;

    println!("{} {}", show.name.bold().cyan(), format!("({} missing)", missing.len()).dimmed());
    for episode in &missing {
        println!(
            "  S{:02}E{:02}  {:<12} {}  [{}]",
            episode.season,
            episode.episode,
            episode
                .air_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string()),
            episode.title,
            episode.id
        );
    }
    Ok(())
}

pub fn untrack(ctx: &Context, id: Uuid) -> Result<()> {
    let show = ctx.catalog.untrack_show(id)?;
    println!("{} {} is no longer tracked", "[OK]".bold().green(), show.name);
    Ok(())
}

pub fn ignore(ctx: &Context, episode_id: Uuid) -> Result<()> {
    let episode = ctx.catalog.ignore_episode(episode_id)?;
    println!(
        "{} S{:02}E{:02} is now {}",
        "[OK]".bold().green(),
        episode.season,
        episode.episode,
        episode.status
    );
    Ok(())
}

pub fn reset(ctx: &Context, episode_id: Uuid) -> Result<()> {
    let episode = ctx.catalog.reset_status(episode_id)?;
    println!(
        "{} S{:02}E{:02} is now {}",
        "[OK]".bold().green(),
        episode.season,
        episode.episode,
        episode.status
    );
    Ok(())
}
