//! Export a corpus snapshot as JSON.
//!
//! The exported file contains the whole snapshot (documents, edges,
//! cycles, groups, issues, load errors, and fingerprint). Two exports of an
//! unchanged tree are byte-identical, so the file can be committed and
//! diffed.

use anyhow::{Context, Result};
use std::path::Path;

use knowledge_harness_core::CorpusSnapshot;

/// Write `snapshot` as pretty-printed JSON to `path`, creating parent
/// directories.
pub fn write_snapshot(snapshot: &CorpusSnapshot, path: &Path) -> Result<()> {
    let json = snapshot
        .to_json()
        .context("Failed to serialize snapshot")?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, format!("{}\n", json))
        .with_context(|| format!("Failed to write snapshot: {}", path.display()))?;
    eprintln!(
        "Exported {} documents, {} edges to {}",
        snapshot.documents.len(),
        snapshot.graph.edges.len(),
        path.display()
    );

    Ok(())
}
