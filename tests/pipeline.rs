//! Library-level checks of the load → snapshot pipeline.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use knowledge_harness::config::Config;
use knowledge_harness::index::build_index;
use knowledge_harness::progress::{IndexProgressEvent, NoProgress, ProgressReporter};
use knowledge_harness::snapshot::SnapshotHandle;
use knowledge_harness_core::{CancelToken, IndexError, IssueKind, LoadError};

fn write_corpus(root: &Path, files: usize) {
    for i in 0..files {
        let next = (i + 1) % files;
        let dir = root.join(format!("section{}", i % 3));
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join(format!("doc{:02}.md", i)),
            format!(
                "# Document {i}\n\nBody of document {i}.\n\n[next](../section{}/doc{:02}.md)\n",
                next % 3,
                next
            ),
        )
        .unwrap();
    }
}

fn config_with_concurrency(concurrency: usize) -> Config {
    let mut config = Config::default();
    config.load.concurrency = concurrency;
    config
}

#[tokio::test]
async fn test_snapshot_independent_of_concurrency() {
    let tmp = TempDir::new().unwrap();
    write_corpus(tmp.path(), 24);

    let serial = build_index(
        tmp.path(),
        &config_with_concurrency(1),
        &CancelToken::new(),
        &NoProgress,
    )
    .await
    .unwrap();
    let parallel = build_index(
        tmp.path(),
        &config_with_concurrency(16),
        &CancelToken::new(),
        &NoProgress,
    )
    .await
    .unwrap();

    assert_eq!(serial.snapshot.fingerprint, parallel.snapshot.fingerprint);
    assert_eq!(
        serial.snapshot.to_json().unwrap(),
        parallel.snapshot.to_json().unwrap()
    );
    assert_eq!(serial.files_scanned, 24);

    // The next-links form one ring through every document.
    assert_eq!(serial.snapshot.graph.cycles.len(), 1);
    assert_eq!(serial.snapshot.graph.cycles[0].len(), 24);
}

#[tokio::test]
async fn test_bad_files_do_not_stop_the_run() {
    let tmp = TempDir::new().unwrap();
    write_corpus(tmp.path(), 3);
    fs::write(tmp.path().join("binary.md"), [0xff, 0xfe, 0x00, 0x9f]).unwrap();
    fs::write(tmp.path().join("Section0.md"), "# Upper\n").unwrap();
    fs::write(tmp.path().join("section0.md"), "# Lower\n").unwrap();

    let outcome = build_index(tmp.path(), &Config::default(), &CancelToken::new(), &NoProgress)
        .await
        .unwrap();
    let snapshot = &outcome.snapshot;

    assert!(snapshot
        .load_errors
        .contains(&LoadError::Encoding { path: "binary.md".to_string() }));
    assert!(snapshot.load_errors.iter().any(|e| matches!(
        e,
        LoadError::IdCollision { path, .. } if path == "section0.md"
    )));
    assert_eq!(snapshot.get("section0").unwrap().title, "Upper");
    assert_eq!(snapshot.documents.len(), 4);
}

#[tokio::test]
async fn test_cancellation_stops_indexing() {
    let tmp = TempDir::new().unwrap();
    write_corpus(tmp.path(), 10);

    let cancel = CancelToken::new();
    cancel.cancel();
    let err = build_index(tmp.path(), &Config::default(), &cancel, &NoProgress)
        .await
        .unwrap_err();
    assert!(matches!(err, IndexError::Cancelled));
}

/// Cancels the run as soon as the first file finishes loading.
struct CancelAfterFirst(CancelToken);

impl ProgressReporter for CancelAfterFirst {
    fn report(&self, event: IndexProgressEvent) {
        if let IndexProgressEvent::Loading { n: 1, .. } = event {
            self.0.cancel();
        }
    }
}

#[tokio::test]
async fn test_cancellation_mid_load() {
    let tmp = TempDir::new().unwrap();
    write_corpus(tmp.path(), 30);

    let cancel = CancelToken::new();
    let reporter = CancelAfterFirst(cancel.clone());
    let err = build_index(
        tmp.path(),
        &config_with_concurrency(1),
        &cancel,
        &reporter,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, IndexError::Cancelled));
}

#[tokio::test]
async fn test_swap_during_concurrent_reads() {
    let tmp = TempDir::new().unwrap();
    write_corpus(tmp.path(), 4);
    let first = build_index(tmp.path(), &Config::default(), &CancelToken::new(), &NoProgress)
        .await
        .unwrap();
    let handle = Arc::new(SnapshotHandle::new(first.snapshot));

    fs::write(tmp.path().join("extra.md"), "# Extra\n").unwrap();
    let second = build_index(tmp.path(), &Config::default(), &CancelToken::new(), &NoProgress)
        .await
        .unwrap();
    let old_fingerprint = handle.current().fingerprint.clone();
    let new_fingerprint = second.snapshot.fingerprint.clone();
    assert_ne!(old_fingerprint, new_fingerprint);

    let mut readers = Vec::new();
    for _ in 0..8 {
        let handle = Arc::clone(&handle);
        let (old, new) = (old_fingerprint.clone(), new_fingerprint.clone());
        readers.push(tokio::spawn(async move {
            for _ in 0..200 {
                let snapshot = handle.current();
                // A reader sees one whole snapshot or the other.
                let count = snapshot.documents.len();
                if snapshot.fingerprint == old {
                    assert_eq!(count, 4);
                } else {
                    assert_eq!(snapshot.fingerprint, new);
                    assert_eq!(count, 5);
                }
                tokio::task::yield_now().await;
            }
        }));
    }

    handle.swap(second.snapshot);
    for reader in readers {
        reader.await.unwrap();
    }
    assert_eq!(handle.current().fingerprint, new_fingerprint);
    assert!(handle
        .current()
        .validate()
        .iter()
        .any(|i| i.kind == IssueKind::OrphanDocument && i.document_id == "extra"));
}
