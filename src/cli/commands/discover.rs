//! Discover command implementation.

use crate::cli::context::Context;
use crate::core::discovery::{Discovery, DiscoveryOutcome};
use crate::Result;
use colored::Colorize;
use std::path::Path;

pub async fn discover(ctx: &Context, root: Option<&Path>) -> Result<()> {
    let root = root.unwrap_or(ctx.config.library.tv_root.as_path());
    println!("{} {}", "[DISCOVER]".bold().cyan(), root.display());

    let discovery = Discovery::new(
        ctx.store.clone(),
        ctx.providers(),
        ctx.pipeline.clone(),
        ctx.config.clone(),
    );
    let entries = discovery.discover(root).await?;

    if entries.is_empty() {
        println!("Every folder is already tracked.");
        return Ok(());
    }

    let mut added = 0;
    for entry in &entries {
        let folder = entry
            .folder
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        match &entry.outcome {
            DiscoveryOutcome::Added {
                show_id,
                name,
                score,
                episodes,
                imported,
                fallback,
            } => {
                added += 1;
                println!(
                    "  {} {} -> {} ({:.2}) [{}]",
                    "[ADD]".green(),
                    folder,
                    name.bold(),
                    score,
                    show_id
                );
                println!("        {} episodes, {} files imported, fallback {}", episodes, imported, fallback);
            }
            DiscoveryOutcome::NoCandidate { reason } => {
                println!("  {} {}: {}", "[SKIP]".yellow(), folder, reason);
            }
            DiscoveryOutcome::Failed { reason } => {
                println!("  {} {}: {}", "[FAIL]".red(), folder, reason);
            }
        }
    }

    println!();
    println!("{} {} of {} folders added", "[Discovery Summary]".bold().green(), added, entries.len());
    Ok(())
}
