//! # doc-rag CLI
//!
//! Ingest a markdown documentation tree and ask questions about it.
//!
//! ## Usage
//!
//! ```bash
//! doc-rag --config ./config/doc-rag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `doc-rag init` | Create the SQLite database and schema |
//! | `doc-rag ingest` | Chunk and embed new or changed documents, drop removed ones |
//! | `doc-rag search "<query>"` | Print the most similar chunks |
//! | `doc-rag ask "<question>"` | Answer a question from the indexed docs |
//! | `doc-rag show <path>` | Print every chunk of one document |
//! | `doc-rag status` | Provider and index overview |
//! | `doc-rag clean` | Delete every indexed chunk |
//! | `doc-rag serve` | Start the MCP server (`query_docs`, `list_sources`, `reingest`) |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use doc_rag::{ask, clean, config, ingest, logging, migrate, search, server, status};
use doc_rag_core::retrieve::RetrieveOptions;

/// doc-rag: question answering over a markdown documentation tree.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/doc-rag.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "doc-rag",
    about = "Retrieval-augmented question answering over markdown documentation",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/doc-rag.toml")]
    config: PathBuf,

    /// Force debug-level logging (overrides `RUST_LOG` and `[logging].level`).
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Retrieval filters shared by `search` and `ask`.
#[derive(clap::Args)]
struct FilterArgs {
    /// Number of chunks to retrieve (defaults to `[retrieval].top_k`).
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    top_k: Option<u64>,

    /// Only consider chunks in this category (e.g. `runbook`).
    #[arg(long)]
    category: Option<String>,

    /// Only consider documents whose relative path starts with this prefix.
    #[arg(long)]
    path: Option<String>,
}

impl From<FilterArgs> for RetrieveOptions {
    fn from(args: FilterArgs) -> Self {
        RetrieveOptions {
            top_k: args.top_k.map(|k| k as usize),
            category: args.category,
            path_prefix: args.path,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent: running it multiple times is safe.
    Init,

    /// Index the docs tree.
    ///
    /// Unchanged documents are skipped, changed documents are re-chunked
    /// and re-embedded, and chunks of documents no longer on disk are
    /// removed.
    Ingest {
        /// Re-embed every document, even if unchanged.
        #[arg(long)]
        full: bool,

        /// Show what would be indexed without embedding or writing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Search indexed chunks by semantic similarity.
    Search {
        /// The search query string.
        query: String,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Answer a question using the indexed documentation.
    Ask {
        /// The question to answer.
        question: String,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Print every chunk of one document, in order.
    Show {
        /// Document path relative to the docs root.
        path: String,
    },

    /// Show provider availability and index statistics.
    Status,

    /// Delete every indexed chunk.
    Clean {
        /// Skip the confirmation prompt.
        #[arg(long, short)]
        yes: bool,
    },

    /// Start the MCP server.
    ///
    /// Binds to `[server].bind` and serves the `query_docs`,
    /// `list_sources` and `reingest` tools over MCP (`/mcp`) and plain
    /// HTTP (`/tools/{name}`).
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    logging::init(&cfg.logging, cli.debug)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { full, dry_run } => {
            ingest::run_ingest(&cfg, full, dry_run).await?;
        }
        Commands::Search { query, filters } => {
            search::run_search(&cfg, &query, &filters.into()).await?;
        }
        Commands::Ask { question, filters } => {
            ask::run_ask(&cfg, &question, &filters.into()).await?;
        }
        Commands::Show { path } => {
            search::run_show(&cfg, &path).await?;
        }
        Commands::Status => {
            status::run_status(&cfg).await?;
        }
        Commands::Clean { yes } => {
            clean::run_clean(&cfg, yes).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
