// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

mod commands;
mod config;
mod hub_client;
mod workspace;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Exit code for runtime errors.
const EXIT_RUNTIME_ERROR: i32 = 1;

#[derive(Parser, Debug)]
#[command(name = "muse", version, about = "Muse Hub version-control CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging.
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new Muse Hub working copy.
    Init {
        /// Directory to initialize (defaults to the current directory).
        path: Option<PathBuf>,
    },

    /// Clone a repo from a Muse Hub daemon.
    Clone {
        /// Repo resource URL, e.g. http://host:8420/api/v1/musehub/repos/<repo_id>.
        url: String,
        /// Directory to clone into (defaults to the repo ID).
        directory: Option<String>,
        /// Branch to check out (defaults to the repo's default branch).
        #[arg(long)]
        branch: Option<String>,
        /// Only include this many generations of history.
        #[arg(long)]
        depth: Option<u32>,
        /// Only include objects tagged with this track name.
        #[arg(long)]
        single_track: Option<String>,
        /// Bearer token to store and authenticate future requests with.
        #[arg(long, env = "MUSE_TOKEN")]
        token: Option<String>,
    },

    /// Record a new local commit from a project-state JSON file.
    Commit {
        /// Commit message.
        #[arg(long, short = 'm')]
        message: String,
        /// Path to a JSON file holding the project-state snapshot.
        state: PathBuf,
    },

    /// Upload local commits and advance a remote branch.
    Push {
        /// Remote name (defaults to "origin").
        #[arg(long)]
        remote: Option<String>,
        /// Branch to push (defaults to the current branch).
        #[arg(long)]
        branch: Option<String>,
        /// Unconditionally overwrite a non-fast-forward remote branch.
        #[arg(long)]
        force: bool,
    },

    /// Download commits missing from the current branch.
    Pull {
        /// Remote name (defaults to "origin").
        #[arg(long)]
        remote: Option<String>,
        /// Branch to pull (defaults to the current branch).
        #[arg(long)]
        branch: Option<String>,
    },

    /// Report remote branch head pointers without downloading history.
    Fetch {
        /// Remote name (defaults to "origin").
        #[arg(long)]
        remote: Option<String>,
        /// Specific branches to fetch (defaults to all).
        branches: Vec<String>,
    },

    /// Manage configured remotes.
    Remote {
        #[command(subcommand)]
        action: RemoteAction,
    },

    /// Store a Bearer token for future requests.
    Login {
        /// Token to store in `.muse/config.toml`.
        #[arg(env = "MUSE_TOKEN")]
        token: String,
    },
}

#[derive(Subcommand, Debug)]
enum RemoteAction {
    /// Add a new remote.
    Add { name: String, url: String },
    /// Remove a remote.
    Remove { name: String },
    /// List configured remotes.
    List,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("muse_cli=debug")
    } else {
        EnvFilter::new("muse_cli=info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let result = match cli.command {
        Commands::Init { path } => commands::init(path).await,
        Commands::Clone { url, directory, branch, depth, single_track, token } => {
            commands::clone_repo(url, directory, branch, depth, single_track, token).await
        }
        Commands::Commit { message, state } => commands::commit(message, state).await,
        Commands::Push { remote, branch, force } => commands::push(remote, branch, force).await,
        Commands::Pull { remote, branch } => commands::pull(remote, branch).await,
        Commands::Fetch { remote, branches } => commands::fetch(remote, branches).await,
        Commands::Remote { action } => match action {
            RemoteAction::Add { name, url } => commands::remote_add(name, url).await,
            RemoteAction::Remove { name } => commands::remote_remove(name).await,
            RemoteAction::List => commands::remote_list().await,
        },
        Commands::Login { token } => commands::login(token).await,
    };

    if let Err(err) = result {
        eprintln!("error: {err:#}");
        std::process::exit(EXIT_RUNTIME_ERROR);
    }
}
