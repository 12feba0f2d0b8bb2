//! # Knowledge Harness CLI (`kh`)
//!
//! Index a markdown knowledge corpus, validate its links and structure,
//! and look documents up by id, path, or title.
//!
//! ## Usage
//!
//! ```bash
//! kh --config ./config/kh.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kh index <root>` | Build a snapshot and print a summary |
//! | `kh validate <root>` | Report dangling links, cycles, conflicts, orphans |
//! | `kh query <id>` | Resolve and print one document |
//! | `kh serve` | Start the HTTP tool server |
//!
//! ## Exit codes
//!
//! `0` success, `1` validation issues (or nothing matched a query), `2`
//! fatal error.
//!
//! ## Examples
//!
//! ```bash
//! kh index ./docs --output snapshot.json
//! kh validate ./docs --allow orphan-document --allow cycle-detected
//! kh query guides/setup --related
//! kh query "Getting Started" --traverse 2 --json
//! kh serve --root ./docs
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use knowledge_harness::config;
use knowledge_harness::index::{run_index, run_validate};
use knowledge_harness::logging;
use knowledge_harness::progress::ProgressMode;
use knowledge_harness::query::{run_query, QueryMode};
use knowledge_harness::server;
use knowledge_harness_core::IssueKind;

/// Knowledge Harness CLI: index, validate, and query a markdown corpus.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/kh.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "kh",
    about = "Knowledge Harness: index, validate, and query a markdown knowledge corpus",
    version,
    long_about = "Knowledge Harness loads a tree of markdown files (splitting multi-document \
    files on a separator), resolves links between them, detects cycles and orphans, merges \
    duplicate documents into canonical groups, and answers lookups from an immutable snapshot."
)]
struct Cli {
    /// Path to configuration file (TOML). A missing file means defaults.
    #[arg(long, global = true, default_value = "./config/kh.toml")]
    config: PathBuf,

    /// Progress output on stderr. Defaults to `human` on a TTY, else `off`.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    /// Debug-level diagnostics on stderr (overridden by `KH_LOG`).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a snapshot of the corpus and print a summary.
    Index {
        /// Corpus root directory.
        root: PathBuf,

        /// Write the snapshot as JSON to this file.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Report validation issues. Exits 1 when any non-allowed issue exists.
    Validate {
        /// Corpus root directory.
        root: PathBuf,

        /// Issue kind that does not affect the exit code (repeatable).
        /// One of: dangling-link, dangling-anchor, cycle-detected,
        /// duplicate-title-conflict, orphan-document.
        #[arg(long = "allow")]
        allow: Vec<IssueKind>,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Resolve a document by id, path, or title and print it.
    Query {
        /// Document id, corpus-relative path, or title.
        id: String,

        /// Corpus root (defaults to `corpus.root` from config).
        #[arg(long)]
        root: Option<PathBuf>,

        /// List related documents instead.
        #[arg(long, conflicts_with = "traverse")]
        related: bool,

        /// List documents reachable within this many reference links.
        #[arg(long)]
        traverse: Option<usize>,

        /// Print JSON.
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP tool server.
    ///
    /// Binds to `[server].bind` and serves `/health`, `/tools/list`, and
    /// `POST /tools/{name}`.
    Serve {
        /// Corpus root (defaults to `corpus.root` from config).
        #[arg(long)]
        root: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let cfg = config::load_config(&cli.config)?;
    let progress = cli
        .progress
        .unwrap_or_else(ProgressMode::default_for_tty)
        .reporter();

    let code = match cli.command {
        Commands::Index { root, output } => {
            run_index(&cfg, &root, output.as_deref(), progress.as_ref()).await?;
            ExitCode::SUCCESS
        }
        Commands::Validate { root, allow, json } => {
            let blocking = run_validate(&cfg, &root, &allow, json, progress.as_ref()).await?;
            if blocking == 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Commands::Query {
            id,
            root,
            related,
            traverse,
            json,
        } => {
            let root = root.unwrap_or_else(|| cfg.corpus.root.clone());
            let mode = match (related, traverse) {
                (true, _) => QueryMode::Related,
                (false, Some(depth)) => QueryMode::Traverse(depth),
                (false, None) => QueryMode::Describe,
            };
            if run_query(&cfg, &root, &id, mode, json, progress.as_ref()).await? {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Commands::Serve { root } => {
            let root = root.unwrap_or_else(|| cfg.corpus.root.clone());
            server::run_server(&cfg, &root, progress.as_ref()).await?;
            ExitCode::SUCCESS
        }
    };

    Ok(code)
}
