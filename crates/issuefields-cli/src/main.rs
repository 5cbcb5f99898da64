//! issuefields CLI - Inspect and edit issues through the field layer.

mod commands;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "issuefields")]
#[command(author, version, about = "Issue field layer CLI")]
#[command(propagate_version = true)]
struct Cli {
    /// Output format
    #[arg(long, global = true, default_value = "human")]
    format: output::OutputFormat,

    /// Site path (defaults to current directory)
    #[arg(long, short = 'C', global = true)]
    path: Option<std::path::PathBuf>,

    /// Act as this user (anonymous if omitted)
    #[arg(long = "as", global = true, env = "ISSUEFIELDS_USER")]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new site with sample data
    Init {
        /// Site name
        #[arg(long)]
        name: Option<String>,
    },

    /// List fields
    Fields {
        /// Only navigator columns the user can see
        #[arg(long)]
        navigable: bool,

        /// Limit navigator columns to these project keys
        #[arg(long, short = 'p')]
        project: Vec<String>,

        /// Limit navigator columns to these issue type ids
        #[arg(long, short = 't')]
        issue_type: Vec<String>,
    },

    /// List issues with navigator columns
    #[command(alias = "ls")]
    List {
        /// Column field ids
        #[arg(long, short = 'c', value_delimiter = ',', default_value = "issuekey,summary,assignee")]
        columns: Vec<String>,
    },

    /// Show an issue as its fields see it
    Show {
        /// Issue key (e.g., HR-1)
        key: String,

        /// Include rendered values
        #[arg(long)]
        rendered: bool,
    },

    /// Edit an issue
    Edit {
        key: String,

        /// Request parameters (name=value, repeatable)
        #[arg(long = "set", short = 's', required = true)]
        params: Vec<String>,
    },

    /// Edit an issue on a workflow transition screen
    Transition {
        key: String,

        /// Request parameters (name=value, repeatable)
        #[arg(long = "set", short = 's')]
        params: Vec<String>,

        /// Only offer these resolution ids
        #[arg(long)]
        include_resolution: Vec<String>,

        /// Never offer these resolution ids
        #[arg(long)]
        exclude_resolution: Vec<String>,
    },

    /// Create an issue
    Create {
        /// Project key
        #[arg(long, short = 'p')]
        project: String,

        /// Request parameters (name=value, repeatable)
        #[arg(long = "set", short = 's')]
        params: Vec<String>,
    },

    /// Which fields a selection of issues can be bulk edited with
    BulkCheck {
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Which fields need input when moving issues
    MoveCheck {
        #[arg(required = true)]
        keys: Vec<String>,

        /// Target project key
        #[arg(long, short = 'p')]
        project: String,

        /// Target issue type id
        #[arg(long, short = 't')]
        issue_type: String,
    },

    /// Show change history for an issue
    History {
        key: String,

        /// Only changes from the last N days
        #[arg(long)]
        since: Option<u32>,
    },

    /// Start the REST server
    Serve {
        /// Port to listen on
        #[arg(long, short = 'p', default_value = "17380")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let site_path = match cli.path {
        Some(path) => path,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    let session = commands::Session {
        path: &site_path,
        user: cli.user.as_deref(),
        format: cli.format,
    };

    match cli.command {
        Commands::Init { name } => commands::init(&session, name),
        Commands::Fields {
            navigable,
            project,
            issue_type,
        } => commands::fields(&session, navigable, &project, &issue_type),
        Commands::List { columns } => commands::list(&session, &columns),
        Commands::Show { key, rendered } => commands::show(&session, &key, rendered),
        Commands::Edit { key, params } => commands::edit(&session, &key, &params),
        Commands::Transition {
            key,
            params,
            include_resolution,
            exclude_resolution,
        } => commands::transition(&session, &key, &params, include_resolution, exclude_resolution),
        Commands::Create { project, params } => commands::create(&session, &project, &params),
        Commands::BulkCheck { keys } => commands::bulk_check(&session, &keys),
        Commands::MoveCheck {
            keys,
            project,
            issue_type,
        } => commands::move_check(&session, &keys, &project, &issue_type),
        Commands::History { key, since } => commands::history(&session, &key, since),
        Commands::Serve { port, host } => commands::serve(&session, &host, port),
    }
}
