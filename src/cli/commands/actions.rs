//! Actions command implementation.

use super::{short_path, status_label};
use crate::cli::context::Context;
use crate::models::action::{ActionOutcome, ActionStatus};
use crate::Result;
use colored::Colorize;
use uuid::Uuid;

/// List actions, pending only unless `all`.
pub fn list(ctx: &Context, all: bool) -> Result<()> {
    let filter = if all { None } else { Some(ActionStatus::Pending) };
    let actions = ctx.actions.list(filter)?;

    if actions.is_empty() {
        println!("No {}actions.", if all { "" } else { "pending " });
        return Ok(());
    }

    println!(
        "{:<36} {:<8} {:<10} {:<40} {}",
        "ID".bold(),
        "KIND".bold(),
        "STATUS".bold(),
        "SOURCE".bold(),
        "DESTINATION".bold()
    );
    for action in &actions {
        println!(
            "{:<36} {:<8} {:<10} {:<40} {}",
            action.id,
            action.kind.to_string(),
            status_label(&action.status.to_string()),
            short_path(&action.source, 40),
            action
                .destination
                .as_ref()
                .map(|d| d.display().to_string())
                .unwrap_or_else(|| "-".to_string())
        );
        if let Some(ref reason) = action.failure_reason {
            println!("{:<36} {}", "", reason.red());
        }
    }
    println!();
    println!("  {} actions", actions.len());
    Ok(())
}

fn print_outcome(outcome: &ActionOutcome) {
    println!(
        "{:<10} {:<40} {}",
        status_label(&outcome.status.to_string()),
        short_path(&outcome.source, 40),
        match (&outcome.destination, &outcome.reason) {
            (_, Some(reason)) => reason.clone(),
            (Some(dest), None) => dest.display().to_string(),
            (None, None) => String::new(),
        }
    );
}

pub async fn approve(ctx: &Context, id: Uuid) -> Result<()> {
    let outcome = ctx.actions.approve(id).await?;
    print_outcome(&outcome);
    if outcome.status == ActionStatus::Failed {
        return Err(crate::Error::other(format!("action {} failed", id)));
    }
    Ok(())
}

pub async fn reject(ctx: &Context, id: Uuid) -> Result<()> {
    let action = ctx.actions.reject(id).await?;
    println!("{} {} ({})", "[OK] Rejected".bold().green(), action.id, action.source.display());
    Ok(())
}

/// Apply every pending action and report each one.
pub async fn approve_all(ctx: &Context) -> Result<()> {
    let report = ctx.actions.approve_all().await?;

    for outcome in &report.items {
        print_outcome(outcome);
    }
    println!();
    println!("{}", "[Apply Summary]".bold().green());
    println!("  Applied: {}", report.success.to_string().green());
    println!("  Failed:  {}", report.failed.to_string().red());

    if report.is_success() {
        Ok(())
    } else {
        Err(crate::Error::PartialBatchFailure {
            success: report.success,
            failed: report.failed,
        })
    }
}
