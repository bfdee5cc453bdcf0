//! Command line argument definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

/// Media Ingest - classify, match and file new downloads into your library
#[derive(Parser, Debug)]
#[command(name = "media-ingest")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config.toml (default: the user config directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a scan job and print its result table
    Scan {
        #[command(subcommand)]
        scope: ScanTarget,
    },

    /// Watch the download folders until Ctrl-C
    Watch,

    /// Review pending actions
    Actions {
        #[command(subcommand)]
        action: ActionsAction,
    },

    /// Manage quarantined files
    Issues {
        #[command(subcommand)]
        action: IssuesAction,
    },

    /// Add un-owned folders of the TV root as shows
    Discover {
        /// Folder to look in (default: library.tv_root)
        #[arg(value_name = "ROOT")]
        root: Option<PathBuf>,
    },

    /// Inspect and maintain tracked shows
    Shows {
        #[command(subcommand)]
        action: ShowsAction,
    },

    /// Track movies and maintain their aliases
    Movies {
        #[command(subcommand)]
        action: MoviesAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ScanTarget {
    /// Every library and download folder, plus link reconciliation
    Full,
    /// Download folders only
    Quick,
    /// Folders of shows still airing
    Ongoing,
    /// One show
    Show {
        #[arg(value_name = "SHOW_ID")]
        id: Uuid,
    },
    /// One folder
    Folder {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
    /// Selected shows and movies
    Items {
        #[arg(value_name = "ID", required = true)]
        ids: Vec<Uuid>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ActionsAction {
    /// List actions (pending only unless --all)
    List {
        #[arg(long)]
        all: bool,
    },
    /// Apply one action
    Approve {
        #[arg(value_name = "ACTION_ID")]
        id: Uuid,
    },
    /// Reject one action; no files are touched
    Reject {
        #[arg(value_name = "ACTION_ID")]
        id: Uuid,
    },
    /// Apply every pending action
    ApproveAll,
}

#[derive(Subcommand, Debug)]
pub enum IssuesAction {
    /// List quarantined files grouped by day
    List,
    /// Delete one quarantined file
    Delete {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
    /// Delete every quarantined file
    Clear,
}

#[derive(Subcommand, Debug)]
pub enum ShowsAction {
    /// List tracked shows
    List,
    /// Add (or with --remove, drop) a matching alias
    Alias {
        #[arg(value_name = "SHOW_ID")]
        id: Uuid,
        #[arg(value_name = "ALIAS")]
        alias: String,
        #[arg(long)]
        remove: bool,
    },
    /// Aired episodes without a file
    Missing {
        #[arg(value_name = "SHOW_ID")]
        id: Uuid,
    },
    /// Stop tracking a show; files stay on disk
    Untrack {
        #[arg(value_name = "SHOW_ID")]
        id: Uuid,
    },
    /// Leave an episode out of missing reports
    Ignore {
        #[arg(value_name = "EPISODE_ID")]
        episode_id: Uuid,
    },
    /// Recompute an episode's status from its file and air date
    Reset {
        #[arg(value_name = "EPISODE_ID")]
        episode_id: Uuid,
    },
}

#[derive(Subcommand, Debug)]
pub enum MoviesAction {
    /// List movies in the catalog
    List,
    /// Track a movie so its downloads are imported
    Add {
        #[arg(value_name = "TITLE")]
        title: String,
        #[arg(long)]
        year: Option<u16>,
        #[arg(long, value_name = "ID")]
        tmdb_id: Option<u64>,
    },
    /// Add (or with --remove, drop) a matching alias
    Alias {
        #[arg(value_name = "MOVIE_ID")]
        id: Uuid,
        #[arg(value_name = "ALIAS")]
        alias: String,
        #[arg(long)]
        remove: bool,
    },
    /// Stop tracking a movie; its file stays on disk
    Untrack {
        #[arg(value_name = "MOVIE_ID")]
        id: Uuid,
    },
}
