//! Watch command implementation.

use crate::cli::context::Context;
use crate::core::watcher::FolderWatcher;
use crate::Result;
use colored::Colorize;

/// Watch the download folders until Ctrl-C.
pub async fn watch(ctx: &Context) -> Result<()> {
    let dirs = ctx.config.library.download_dirs.clone();
    if dirs.is_empty() {
        return Err(crate::Error::Config(
            "library.download_dirs is empty; nothing to watch".to_string(),
        ));
    }

    println!("{}", "[WATCH] Watching download folders (Ctrl-C to stop)".bold().cyan());
    for dir in &dirs {
        println!("  {}", dir.display());
    }

    let watcher = FolderWatcher::new(ctx.config.watcher.clone(), dirs, ctx.pipeline.clone());
    watcher
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
            }
        })
        .await?;

    println!("{}", "[WATCH] Stopped".bold().green());
    Ok(())
}
