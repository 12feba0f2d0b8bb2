//! # Knowledge Harness
//!
//! Index a tree of markdown documents into an immutable, queryable
//! snapshot: resolved links, a reference graph with cycles and orphans,
//! merged duplicate groups, and validation issues.
//!
//! The pure pipeline lives in the `knowledge-harness-core` crate. This
//! crate adds everything with I/O: configuration, the concurrent loader,
//! the snapshot handle, the CLI commands, and the HTTP tool server.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │   Loader    │──▶│  Pipeline   │──▶│   Snapshot   │
//! │ walk + read │   │ link/graph/ │   │  (immutable) │
//! │  (tokio)    │   │   dedup     │   │              │
//! └─────────────┘   └─────────────┘   └──────┬───────┘
//!                                            │
//!                      ┌─────────────────────┤
//!                      ▼                     ▼
//!                 ┌──────────┐         ┌──────────┐
//!                 │   CLI    │         │   HTTP   │
//!                 │  (kh)    │         │  tools   │
//!                 └──────────┘         └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! kh index ./docs                    # build and summarize
//! kh validate ./docs                 # exit 1 when issues are found
//! kh query "Getting Started"         # resolve by title
//! kh serve --root ./docs             # start the HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`loader`] | Concurrent, cancellable corpus loading |
//! | [`index`] | Pipeline orchestration and `index` / `validate` commands |
//! | [`query`] | Lookup responses and the `query` command |
//! | [`snapshot`] | Atomic snapshot publication |
//! | [`export`] | Snapshot JSON export |
//! | [`progress`] | Indexing progress reporting |
//! | [`traits`] | `Tool` trait and registry |
//! | [`server`] | HTTP tool server |
//! | [`logging`] | Diagnostic log setup |

pub mod config;
pub mod export;
pub mod index;
pub mod loader;
pub mod logging;
pub mod progress;
pub mod query;
pub mod server;
pub mod snapshot;
pub mod traits;
