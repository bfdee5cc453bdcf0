//! Media Ingest CLI
//!
//! Classifies newly arrived video files, matches them to the catalog and
//! files them into the library, with review and quarantine for the rest.

use clap::Parser;
use media_ingest::cli::{
    args::{ActionsAction, Cli, Commands, IssuesAction, MoviesAction, ShowsAction},
    commands::{actions, discover, issues, movies, scan, shows, watch},
    context::Context,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    let ctx = Context::load(cli.config.as_deref())?;

    // Run the appropriate command
    match cli.command {
        Commands::Scan { scope } => {
            scan::scan(&ctx, scope).await?;
        }

        Commands::Watch => {
            watch::watch(&ctx).await?;
        }

        Commands::Actions { action } => match action {
            ActionsAction::List { all } => actions::list(&ctx, all)?,
            ActionsAction::Approve { id } => actions::approve(&ctx, id).await?,
            ActionsAction::Reject { id } => actions::reject(&ctx, id).await?,
            ActionsAction::ApproveAll => actions::approve_all(&ctx).await?,
        },

        Commands::Issues { action } => match action {
            IssuesAction::List => issues::list(&ctx)?,
            IssuesAction::Delete { path } => issues::delete(&ctx, &path)?,
            IssuesAction::Clear => issues::clear(&ctx)?,
        },

        Commands::Discover { root } => {
            discover::discover(&ctx, root.as_deref()).await?;
        }

        Commands::Shows { action } => match action {
            ShowsAction::List => shows::list(&ctx)?,
            ShowsAction::Alias { id, alias, remove } => shows::alias(&ctx, id, &alias, remove)?,
            ShowsAction::Missing { id } => shows::missing(&ctx, id)?,
            ShowsAction::Untrack { id } => shows::untrack(&ctx, id)?,
            ShowsAction::Ignore { episode_id } => shows::ignore(&ctx, episode_id)?,
            ShowsAction::Reset { episode_id } => shows::reset(&ctx, episode_id)?,
        },

        Commands::Movies { action } => match action {
            MoviesAction::List => movies::list(&ctx)?,
            MoviesAction::Add { title, year, tmdb_id } => movies::add(&ctx, &title, year, tmdb_id)?,
            MoviesAction::Alias { id, alias, remove } => movies::alias(&ctx, id, &alias, remove)?,
            MoviesAction::Untrack { id } => movies::untrack(&ctx, id)?,
        },
    }

    Ok(())
}

/// Initialize the logging system; `RUST_LOG` wins when set.
fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("media_ingest=debug")
        } else {
            EnvFilter::new("media_ingest=info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
