//! Concurrent corpus loader.
//!
//! Discovers markdown files under a corpus root and turns them into
//! [`Document`]s:
//!
//! 1. **Discover**: walk the root with `walkdir`, keeping files that match
//!    the include globs and none of the exclude globs (`.git`, `target`,
//!    and `node_modules` are always excluded).
//! 2. **Read**: files are read concurrently on the tokio runtime, bounded
//!    by a semaphore (`[load].concurrency`). The cancel token is checked
//!    before every read.
//! 3. **Parse**: each file's text is split into segments and parsed on the
//!    blocking pool.
//!
//! Unreadable and non-UTF-8 files become [`LoadError`]s and never abort the
//! run. Results are sorted before they are returned, so completion order
//! does not leak into the output.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use walkdir::WalkDir;

use knowledge_harness_core::parse::{parse_file, ParseOptions};
use knowledge_harness_core::{CancelToken, Document, IndexError, LoadError};

use crate::config::Config;
use crate::progress::{IndexProgressEvent, ProgressReporter};

const DEFAULT_EXCLUDES: [&str; 3] = ["**/.git/**", "**/target/**", "**/node_modules/**"];

/// Everything the loader produced for one corpus root.
#[derive(Debug, Default)]
pub struct LoadOutcome {
    /// Sorted by `(source_path, segment_index)`.
    pub documents: Vec<Document>,
    /// Sorted; one entry per failed file.
    pub errors: Vec<LoadError>,
    /// Files that matched the include globs.
    pub files_scanned: usize,
}

/// A file selected for loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusFile {
    pub path: PathBuf,
    /// Corpus-relative, `/`-separated.
    pub relative: String,
}

enum FileOutcome {
    Parsed(Vec<Document>),
    Failed(LoadError),
    Cancelled,
}

/// Load every matching file under `root`.
pub async fn load_corpus(
    root: &Path,
    config: &Config,
    cancel: &CancelToken,
    progress: &dyn ProgressReporter,
) -> Result<LoadOutcome, IndexError> {
    if !root.exists() {
        return Err(IndexError::RootNotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(IndexError::RootNotDirectory(root.to_path_buf()));
    }

    progress.report(IndexProgressEvent::Discovering {
        root: root.display().to_string(),
    });

    let walk_root = root.to_path_buf();
    let corpus = config.corpus.clone();
    let (files, mut errors) = tokio::task::spawn_blocking(move || {
        discover_files(
            &walk_root,
            &corpus.include_globs,
            &corpus.exclude_globs,
            corpus.follow_symlinks,
        )
    })
    .await
    .map_err(|e| IndexError::Worker(e.to_string()))??;

    let total = files.len();
    tracing::info!(root = %root.display(), files = total, "discovered corpus files");

    let semaphore = Arc::new(Semaphore::new(config.load.concurrency.max(1)));
    let separator: Arc<str> = Arc::from(config.corpus.separator.as_str());
    let options = Arc::new(config.parse_options());

    let mut tasks = JoinSet::new();
    for file in files {
        let semaphore = Arc::clone(&semaphore);
        let separator = Arc::clone(&separator);
        let options = Arc::clone(&options);
        let cancel = cancel.clone();
        tasks.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return FileOutcome::Cancelled;
            };
            if cancel.is_cancelled() {
                return FileOutcome::Cancelled;
            }
            load_file(file, separator, options).await
        });
    }

    let mut documents = Vec::new();
    let mut done = 0u64;
    while let Some(joined) = tasks.join_next().await {
        let outcome = joined.map_err(|e| IndexError::Worker(e.to_string()))?;
        match outcome {
            FileOutcome::Parsed(docs) => documents.extend(docs),
            FileOutcome::Failed(err) => errors.push(err),
            FileOutcome::Cancelled => {}
        }
        done += 1;
        progress.report(IndexProgressEvent::Loading {
            n: done,
            total: total as u64,
        });
    }

    if cancel.is_cancelled() {
        tracing::info!("load cancelled");
        return Err(IndexError::Cancelled);
    }

    documents.sort_by(|a, b| {
        a.source_path
            .cmp(&b.source_path)
            .then(a.segment_index.cmp(&b.segment_index))
    });
    errors.sort();

    tracing::debug!(
        documents = documents.len(),
        errors = errors.len(),
        "loaded corpus"
    );

    Ok(LoadOutcome {
        documents,
        errors,
        files_scanned: total,
    })
}

async fn load_file(file: CorpusFile, separator: Arc<str>, options: Arc<ParseOptions>) -> FileOutcome {
    let bytes = match tokio::fs::read(&file.path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(path = %file.relative, error = %e, "failed to read file");
            return FileOutcome::Failed(LoadError::Io {
                path: file.relative,
                message: e.to_string(),
            });
        }
    };

    let text = match decode(bytes) {
        Some(text) => text,
        None => {
            tracing::warn!(path = %file.relative, "file is not valid UTF-8");
            return FileOutcome::Failed(LoadError::Encoding {
                path: file.relative,
            });
        }
    };

    let relative = file.relative.clone();
    match tokio::task::spawn_blocking(move || parse_file(&relative, &text, &separator, &options))
        .await
    {
        Ok(docs) => FileOutcome::Parsed(docs),
        Err(e) => {
            tracing::warn!(path = %file.relative, error = %e, "parser task failed");
            FileOutcome::Failed(LoadError::Io {
                path: file.relative,
                message: format!("parser task failed: {}", e),
            })
        }
    }
}

/// UTF-8 decode, dropping a leading byte-order mark.
fn decode(bytes: Vec<u8>) -> Option<String> {
    let mut text = String::from_utf8(bytes).ok()?;
    if text.starts_with('\u{feff}') {
        text.replace_range(..'\u{feff}'.len_utf8(), "");
    }
    Some(text)
}

/// Walk `root` and return the matching files in path order, plus a
/// [`LoadError`] for every entry that could not be inspected.
///
/// An error on the root itself is fatal.
pub fn discover_files(
    root: &Path,
    include_globs: &[String],
    exclude_globs: &[String],
    follow_symlinks: bool,
) -> Result<(Vec<CorpusFile>, Vec<LoadError>), IndexError> {
    let include_set = build_globset(include_globs)?;

    let mut excludes: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
    excludes.extend(exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut files = Vec::new();
    let mut errors = Vec::new();

    for entry in WalkDir::new(root).follow_links(follow_symlinks) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(IndexError::Walk(e.to_string())),
            Err(e) => {
                let path = e
                    .path()
                    .map(|p| relative_path(root, p))
                    .unwrap_or_default();
                tracing::warn!(path = %path, error = %e, "failed to inspect entry");
                errors.push(LoadError::Io {
                    path,
                    message: e.to_string(),
                });
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = relative_path(root, entry.path());
        if exclude_set.is_match(&relative) || !include_set.is_match(&relative) {
            continue;
        }

        files.push(CorpusFile {
            path: entry.path().to_path_buf(),
            relative,
        });
    }

    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok((files, errors))
}

fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, IndexError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| IndexError::InvalidGlob {
            pattern: pattern.clone(),
            message: e.to_string(),
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| IndexError::InvalidGlob {
        pattern: patterns.join(", "),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_discover_applies_globs_and_default_excludes() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.md", b"# A");
        write(dir.path(), "sub/b.markdown", b"# B");
        write(dir.path(), "notes.txt", b"text");
        write(dir.path(), ".git/HEAD.md", b"# no");
        write(dir.path(), "node_modules/pkg/README.md", b"# no");
        write(dir.path(), "drafts/wip.md", b"# no");

        let (files, errors) = discover_files(
            dir.path(),
            &["**/*.md".to_string(), "**/*.markdown".to_string()],
            &["drafts/**".to_string()],
            false,
        )
        .unwrap();
        let rel: Vec<&str> = files.iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(rel, vec!["a.md", "sub/b.markdown"]);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_invalid_glob_is_fatal() {
        let dir = TempDir::new().unwrap();
        let err = discover_files(dir.path(), &["[".to_string()], &[], false).unwrap_err();
        assert!(matches!(err, IndexError::InvalidGlob { .. }));
    }

    #[test]
    fn test_decode_strips_bom() {
        let mut bytes = "\u{feff}".as_bytes().to_vec();
        bytes.extend_from_slice(b"# Title");
        assert_eq!(decode(bytes).as_deref(), Some("# Title"));
        assert_eq!(decode(vec![0xff, 0xfe, 0x00]), None);
    }

    #[tokio::test]
    async fn test_load_collects_per_file_errors() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "good.md", b"# Good\n\nRELATED_DOC_SEP\n\n# Second\n");
        write(dir.path(), "bad.md", &[0xc3, 0x28, 0x0a]);

        let outcome = load_corpus(dir.path(), &Config::default(), &CancelToken::new(), &NoProgress)
            .await
            .unwrap();
        assert_eq!(outcome.files_scanned, 2);
        let ids: Vec<&str> = outcome.documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["good", "good~1"]);
        assert_eq!(
            outcome.errors,
            vec![LoadError::Encoding {
                path: "bad.md".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_missing_root_is_fatal() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let err = load_corpus(&missing, &Config::default(), &CancelToken::new(), &NoProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::RootNotFound(_)));

        write(dir.path(), "file.md", b"# F");
        let err = load_corpus(
            &dir.path().join("file.md"),
            &Config::default(),
            &CancelToken::new(),
            &NoProgress,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, IndexError::RootNotDirectory(_)));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.md", b"# A");
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = load_corpus(dir.path(), &Config::default(), &cancel, &NoProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::Cancelled));
    }
}
