//! # Knowledge Harness Core
//!
//! Pure indexing and resolution logic for Knowledge Harness: document
//! models, multi-document segment splitting, markdown parsing, link
//! resolution, graph building, merge/dedup, and the snapshot query API.
//!
//! This crate contains no tokio, filesystem I/O, or other runtime
//! dependencies. The calling application reads files, hands their text to
//! [`parse::parse_file`], and assembles the results into an immutable
//! [`snapshot::CorpusSnapshot`] with [`snapshot::build_snapshot`].
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐
//! │  parse   │──▶│  links   │──▶│  graph   │──▶│  dedup   │──▶│ snapshot │
//! │ segments │   │ resolve  │   │ SCC+orph │   │  groups  │   │  query   │
//! └──────────┘   └──────────┘   └──────────┘   └──────────┘   └──────────┘
//! ```

pub mod cancel;
pub mod dedup;
pub mod error;
pub mod graph;
pub mod ids;
pub mod links;
pub mod models;
pub mod parse;
pub mod query;
pub mod segment;
pub mod snapshot;

pub use cancel::CancelToken;
pub use error::{IndexError, LoadError, NotFound};
pub use models::{
    CanonicalGroup, Document, Edge, EdgeKind, GroupReason, IssueKind, LinkKind, LinkReference,
    Section, Severity, TitleSource, ValidationIssue,
};
pub use snapshot::{build_snapshot, CorpusSnapshot, PipelineOptions};
