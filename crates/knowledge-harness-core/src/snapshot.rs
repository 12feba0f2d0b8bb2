//! Immutable corpus snapshots.
//!
//! A [`CorpusSnapshot`] is the complete result of one indexing run: the
//! documents in canonical order, the graph, the canonical groups, every
//! validation issue, and the per-file load errors. It is assembled once by
//! [`build_snapshot`] and never mutated afterwards, so it can be shared
//! between readers behind an `Arc`.
//!
//! ```text
//! documents ─▶ sort ─▶ drop id collisions ─▶ resolve ─▶ graph ─▶ dedup
//!                                                                 │
//!                      fingerprint ◀─ sort issues ◀─ part_of ◀────┘
//! ```
//!
//! Assembly is a pure function of the document *set*: the order in which
//! the loader delivers documents does not affect the result, and
//! serializing two snapshots of an unchanged tree yields identical bytes.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::dedup::{self, DedupOptions};
use crate::error::LoadError;
use crate::graph::{self, DocumentGraph};
use crate::links;
use crate::models::{CanonicalGroup, Document, ValidationIssue};

/// Settings for the post-load pipeline stages.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub dedup: DedupOptions,
}

/// One complete, immutable view of the corpus.
#[derive(Debug, Clone, Serialize)]
pub struct CorpusSnapshot {
    /// SHA-256 over document ids, content hashes, and edges.
    pub fingerprint: String,
    /// Sorted by `(source_path, segment_index)`.
    pub documents: Vec<Document>,
    #[serde(flatten)]
    pub graph: DocumentGraph,
    pub groups: Vec<CanonicalGroup>,
    /// Sorted and deduplicated.
    pub issues: Vec<ValidationIssue>,
    pub load_errors: Vec<LoadError>,
    #[serde(skip)]
    index: HashMap<String, usize>,
    #[serde(skip)]
    group_of: Vec<usize>,
    #[serde(skip)]
    options: PipelineOptions,
}

struct Analysis {
    documents: Vec<Document>,
    graph: DocumentGraph,
    groups: Vec<CanonicalGroup>,
    issues: Vec<ValidationIssue>,
}

/// Resolve, graph, and group `documents` (already sorted and unique).
fn analyze(documents: Vec<Document>, options: &PipelineOptions) -> Analysis {
    let (documents, mut issues) = links::resolve(documents);
    let (graph, graph_issues) = graph::build(&documents);
    let (groups, dedup_issues) = dedup::group(&documents, &options.dedup);

    issues.extend(graph_issues);
    issues.extend(dedup_issues);
    issues.sort();
    issues.dedup();

    Analysis {
        documents,
        graph,
        groups,
        issues,
    }
}

/// Keep every segment of one file, or none of them when any segment id is
/// already owned by an earlier file.
fn admit_file(
    file: Vec<Document>,
    owners: &mut HashMap<String, String>,
    kept: &mut Vec<Document>,
    load_errors: &mut Vec<LoadError>,
) {
    let Some(first) = file.first() else {
        return;
    };
    if let Some(taken) = file.iter().find(|d| owners.contains_key(&d.id)) {
        tracing::warn!(path = %taken.source_path, id = %taken.id, "document id collision");
        load_errors.push(LoadError::IdCollision {
            path: first.source_path.clone(),
            id: taken.id.clone(),
        });
        return;
    }
    for doc in file {
        owners.insert(doc.id.clone(), doc.source_path.clone());
        kept.push(doc);
    }
}

/// Assemble a snapshot from parsed documents and the loader's errors.
///
/// When two files map to the same id (for example `Guide.md` and
/// `guide.md`, or `Guide~1.md` and the second segment of `guide.md`), the
/// file that sorts first keeps the id and every segment of the other is
/// dropped with a [`LoadError::IdCollision`].
pub fn build_snapshot(
    mut documents: Vec<Document>,
    mut load_errors: Vec<LoadError>,
    options: &PipelineOptions,
) -> CorpusSnapshot {
    documents.sort_by(|a, b| {
        a.source_path
            .cmp(&b.source_path)
            .then(a.segment_index.cmp(&b.segment_index))
    });

    let mut owners: HashMap<String, String> = HashMap::new();
    let mut kept = Vec::with_capacity(documents.len());
    let mut file: Vec<Document> = Vec::new();
    for mut doc in documents {
        doc.part_of = None;
        if file.first().is_some_and(|d| d.source_path != doc.source_path) {
            admit_file(std::mem::take(&mut file), &mut owners, &mut kept, &mut load_errors);
        }
        file.push(doc);
    }
    admit_file(file, &mut owners, &mut kept, &mut load_errors);
    load_errors.sort();
    load_errors.dedup();

    let Analysis {
        mut documents,
        graph,
        groups,
        issues,
    } = analyze(kept, options);

    let index: HashMap<String, usize> = documents
        .iter()
        .enumerate()
        .map(|(i, d)| (d.id.clone(), i))
        .collect();

    let mut group_of = vec![0; documents.len()];
    for (gi, group) in groups.iter().enumerate() {
        for member in &group.members {
            if let Some(&di) = index.get(member) {
                group_of[di] = gi;
                if *member != group.canonical_id {
                    documents[di].part_of = Some(group.canonical_id.clone());
                }
            }
        }
    }

    let fingerprint = fingerprint(&documents, &graph);

    tracing::info!(
        documents = documents.len(),
        edges = graph.edges.len(),
        groups = groups.len(),
        issues = issues.len(),
        load_errors = load_errors.len(),
        "snapshot assembled"
    );

    CorpusSnapshot {
        fingerprint,
        documents,
        graph,
        groups,
        issues,
        load_errors,
        index,
        group_of,
        options: options.clone(),
    }
}

fn fingerprint(documents: &[Document], graph: &DocumentGraph) -> String {
    let mut hasher = Sha256::new();
    for doc in documents {
        hasher.update(doc.id.as_bytes());
        hasher.update([0u8]);
        hasher.update(doc.content_hash.as_bytes());
        hasher.update(b"\n");
    }
    for edge in &graph.edges {
        hasher.update(edge.from_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(edge.to_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(format!("{:?}", edge.kind).as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

impl CorpusSnapshot {
    /// Recompute every validation issue from the stored documents.
    ///
    /// Pure; returns the same list the snapshot was built with.
    pub fn validate(&self) -> Vec<ValidationIssue> {
        analyze(self.documents.clone(), &self.options).issues
    }

    /// Exact id lookup.
    pub fn get(&self, id: &str) -> Option<&Document> {
        self.index_of(id).map(|i| &self.documents[i])
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// The canonical group containing the document at `idx`.
    pub fn group_at(&self, idx: usize) -> Option<&CanonicalGroup> {
        self.groups.get(*self.group_of.get(idx)?)
    }

    /// Number of physical files that contributed documents.
    pub fn file_count(&self) -> usize {
        self.documents.iter().filter(|d| d.segment_index == 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
