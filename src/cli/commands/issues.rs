//! Issues command implementation.

use crate::cli::context::Context;
use crate::Result;
use colored::Colorize;
use std::path::Path;

pub fn list(ctx: &Context) -> Result<()> {
    let groups = ctx.quarantine.list_grouped()?;
    if groups.is_empty() {
        println!("No quarantined files.");
        return Ok(());
    }

    let mut total = 0;
    for (day, files) in groups.iter().rev() {
        println!("{}", day.format("%Y-%m-%d").to_string().bold().cyan());
        for file in files {
            println!(
                "  {:<18} {}",
                file.reason.to_string().yellow(),
                file.path.display()
            );
            println!("  {:<18} from {}", "", file.original_path.display());
            if let Some(ref detail) = file.detail {
                println!("  {:<18} {}", "", detail);
            }
        }
        total += files.len();
    }
    println!();
    println!("  {} quarantined files in {}", total, ctx.quarantine.root().display());
    Ok(())
}

pub fn delete(ctx: &Context, path: &Path) -> Result<()> {
    ctx.quarantine.delete(path)?;
    println!("{} {}", "[OK] Deleted".bold().green(), path.display());
    Ok(())
}

pub fn clear(ctx: &Context) -> Result<()> {
    let report = ctx.quarantine.clear_all()?;
    for (path, reason) in &report.failed {
        println!("{} {}: {}", "[FAIL]".bold().red(), path.display(), reason);
    }
    println!(
        "{} {} removed, {} failed",
        "[Issues]".bold().green(),
        report.removed.len(),
        report.failed.len()
    );

    if report.failed.is_empty() {
        Ok(())
    } else {
        Err(crate::Error::PartialBatchFailure {
            success: report.removed.len(),
            failed: report.failed.len(),
        })
    }
}
