//! Scan command implementation.
//!
//! Starts a scan job, follows it on a progress bar by polling the job
//! registry, then prints the itemised result table.

use super::{short_path, status_label};
use crate::cli::args::ScanTarget;
use crate::cli::context::Context;
use crate::core::jobs::{JobRegistry, ScanOrchestrator};
use crate::models::job::{JobState, ScanScope, ScanSummary};
use crate::Result;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

impl From<ScanTarget> for ScanScope {
    fn from(target: ScanTarget) -> Self {
        match target {
            ScanTarget::Full => ScanScope::Full,
            ScanTarget::Quick => ScanScope::Quick,
            ScanTarget::Ongoing => ScanScope::OngoingOnly,
            ScanTarget::Show { id } => ScanScope::SingleShow { show_id: id },
            ScanTarget::Folder { path } => ScanScope::SingleFolder { path },
            ScanTarget::Items { ids } => ScanScope::SelectedItems { ids },
        }
    }
}

/// Run a scan to completion.
pub async fn scan(ctx: &Context, target: ScanTarget) -> Result<()> {
    let scope = ScanScope::from(target);
    println!("{} {}", "[SCAN]".bold().cyan(), scope.class());

    let registry = JobRegistry::with_lock_dir(&ctx.config.library.data_dir);
    let orchestrator = Arc::new(ScanOrchestrator::new(
        registry.clone(),
        ctx.pipeline.clone(),
        ctx.config.clone(),
    ));
    let job_id = orchestrator.start(scope)?;

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );

    let job = loop {
        let Some(job) = registry.get(job_id) else {
            return Err(crate::Error::NotFound(format!("scan job {}", job_id)));
        };
        pb.set_position(job.progress as u64);
        pb.set_message(job.message.clone());
        if job.state != JobState::Running {
            break job;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    };
    pb.finish_and_clear();

    match (job.state, job.result) {
        (JobState::Completed, Some(summary)) => {
            print_summary(&summary);
            Ok(())
        }
        _ => Err(crate::Error::other(format!("scan failed: {}", job.message))),
    }
}

/// Print the result table and counts.
pub fn print_summary(summary: &ScanSummary) {
    if !summary.items.is_empty() {
        println!();
        println!("{:<12} {:<50} {}", "STATUS".bold(), "FILE".bold(), "REASON".bold());
        for item in &summary.items {
            println!(
                "{:<12} {:<50} {}",
                status_label(&item.outcome.to_string()),
                short_path(&item.path, 50),
                item.reason
            );
        }
    }

    println!();
    println!("{}", "[Scan Summary]".bold().green());
    println!("  Added:       {}", summary.added);
    println!("  Proposed:    {}", summary.proposed);
    println!("  Skipped:     {}", summary.skipped);
    println!("  Quarantined: {}", summary.quarantined);
    println!("  Errored:     {}", summary.errored);
    if summary.reconciled > 0 {
        println!("  Stale links cleared: {}", summary.reconciled);
    }
    if summary.proposed > 0 {
        println!();
        println!(
            "  Review with: {}",
            "media-ingest actions list".cyan()
        );
    }
}
