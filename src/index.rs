//! Indexing pipeline orchestration.
//!
//! Coordinates the full flow: load (walk, read, parse) → snapshot assembly
//! (resolve, graph, dedup). Used by `kh index`, `kh validate`, `kh query`,
//! and the server's `reindex` tool.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::path::Path;

use knowledge_harness_core::{
    build_snapshot, CancelToken, CorpusSnapshot, EdgeKind, IndexError, IssueKind, Severity,
};

use crate::config::Config;
use crate::export;
use crate::loader::load_corpus;
use crate::progress::{IndexProgressEvent, ProgressReporter};

/// A built snapshot plus run metadata that is not part of the snapshot.
#[derive(Debug)]
pub struct IndexOutcome {
    pub snapshot: CorpusSnapshot,
    pub indexed_at: DateTime<Utc>,
    pub files_scanned: usize,
}

/// Load `root` and assemble a snapshot.
pub async fn build_index(
    root: &Path,
    config: &Config,
    cancel: &CancelToken,
    progress: &dyn ProgressReporter,
) -> Result<IndexOutcome, IndexError> {
    let loaded = load_corpus(root, config, cancel, progress).await?;
    if loaded.documents.is_empty() {
        return Err(IndexError::EmptyCorpus {
            errors: loaded.errors,
        });
    }

    progress.report(IndexProgressEvent::Building {
        documents: loaded.documents.len() as u64,
    });

    let options = config.pipeline_options();
    let documents = loaded.documents;
    let errors = loaded.errors;
    let snapshot =
        tokio::task::spawn_blocking(move || build_snapshot(documents, errors, &options))
            .await
            .map_err(|e| IndexError::Worker(e.to_string()))?;

    if cancel.is_cancelled() {
        return Err(IndexError::Cancelled);
    }

    Ok(IndexOutcome {
        snapshot,
        indexed_at: Utc::now(),
        files_scanned: loaded.files_scanned,
    })
}

/// [`build_index`] with Ctrl-C wired to the cancel token.
pub async fn build_index_interruptible(
    root: &Path,
    config: &Config,
    progress: &dyn ProgressReporter,
) -> Result<IndexOutcome, IndexError> {
    let cancel = CancelToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, cancelling");
                cancel.cancel();
            }
        })
    };
    let result = build_index(root, config, &cancel, progress).await;
    watcher.abort();
    result
}

/// CLI entry point for `kh index`: build, print a summary, optionally export.
pub async fn run_index(
    config: &Config,
    root: &Path,
    output: Option<&Path>,
    progress: &dyn ProgressReporter,
) -> Result<()> {
    let outcome = build_index_interruptible(root, config, progress).await?;
    let snapshot = &outcome.snapshot;

    let segments = snapshot
        .documents
        .iter()
        .filter(|d| d.segment_index > 0)
        .count();
    let merged = snapshot.groups.iter().filter(|g| !g.is_singleton()).count();
    let warnings = snapshot
        .issues
        .iter()
        .filter(|i| i.severity == Severity::Warning)
        .count();

    println!("index {}", root.display());
    println!("  files scanned: {}", outcome.files_scanned);
    println!(
        "  documents: {} ({} files, {} extra segments)",
        snapshot.documents.len(),
        snapshot.file_count(),
        segments
    );
    println!(
        "  edges: {} reference, {} related",
        snapshot.graph.edge_count(EdgeKind::Reference),
        snapshot.graph.edge_count(EdgeKind::Related)
    );
    println!("  groups: {} ({} merged)", snapshot.groups.len(), merged);
    println!("  cycles: {}", snapshot.graph.cycles.len());
    println!(
        "  issues: {} ({} warnings)",
        snapshot.issues.len(),
        warnings
    );
    println!("  load errors: {}", snapshot.load_errors.len());
    for err in &snapshot.load_errors {
        println!("    {}", err);
    }
    println!("  fingerprint: {}", snapshot.fingerprint);
    println!("  indexed at: {}", outcome.indexed_at.to_rfc3339());

    if let Some(path) = output {
        export::write_snapshot(snapshot, path)?;
    }

    println!("ok");
    Ok(())
}

/// Issues whose kind is not in `allow`.
pub fn blocking_issues<'a>(
    snapshot: &'a CorpusSnapshot,
    allow: &[IssueKind],
) -> Vec<&'a knowledge_harness_core::ValidationIssue> {
    snapshot
        .issues
        .iter()
        .filter(|i| !allow.contains(&i.kind))
        .collect()
}

/// CLI entry point for `kh validate`.
///
/// Prints every issue and returns how many are not covered by `allow`.
pub async fn run_validate(
    config: &Config,
    root: &Path,
    allow: &[IssueKind],
    json: bool,
    progress: &dyn ProgressReporter,
) -> Result<usize> {
    let outcome = build_index_interruptible(root, config, progress).await?;
    let snapshot = &outcome.snapshot;
    let blocking = blocking_issues(snapshot, allow).len();

    if json {
        let report = serde_json::json!({
            "root": root.display().to_string(),
            "fingerprint": snapshot.fingerprint,
            "issues": snapshot.issues,
            "load_errors": snapshot.load_errors,
            "blocking": blocking,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(blocking);
    }

    for issue in &snapshot.issues {
        let marker = if allow.contains(&issue.kind) {
            " (allowed)"
        } else {
            ""
        };
        println!(
            "{:<7} {}{}",
            match issue.severity {
                Severity::Warning => "warning",
                Severity::Info => "info",
            },
            issue,
            marker
        );
    }
    for err in &snapshot.load_errors {
        eprintln!("load error: {}", err);
    }

    println!(
        "validate {}: {} documents, {} issues ({} allowed)",
        root.display(),
        snapshot.documents.len(),
        snapshot.issues.len(),
        snapshot.issues.len() - blocking
    );
    if blocking == 0 {
        println!("ok");
    }
    Ok(blocking)
}
