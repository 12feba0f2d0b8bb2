//! Merge/dedup engine.
//!
//! Groups documents that describe the same logical topic:
//!
//! - **same file**: every segment split from one physical file;
//! - **same title**: documents in different files whose heading-derived
//!   titles normalize to the same string.
//!
//! Groups are the connected components of both relations. Every document
//! belongs to exactly one group; most groups are singletons. Within a group
//! the canonical member is the one with the shortest `source_path`, then the
//! lexicographically smaller path, then the lower segment index.
//!
//! Members are never deleted. When two same-titled documents from different
//! files have dissimilar bodies, a `duplicate-title-conflict` issue is raised
//! on the less-preferred one.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use petgraph::unionfind::UnionFind;

use crate::models::{
    CanonicalGroup, Document, GroupReason, IssueKind, TitleSource, ValidationIssue,
};

/// Default minimum body similarity for same-titled documents.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone, PartialEq)]
pub struct DedupOptions {
    /// Pairs below this Jaccard similarity are reported as conflicts.
    pub similarity_threshold: f64,
}

impl Default for DedupOptions {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

/// Lowercase alphanumeric words joined by a single space.
///
/// `"Error Handling: Patterns!"` and `"error-handling patterns"` both
/// normalize to `"error handling patterns"`.
pub fn normalize_title(title: &str) -> String {
    words(title).collect::<Vec<_>>().join(" ")
}

/// Jaccard similarity of the two bodies' word sets, in `[0.0, 1.0]`.
pub fn body_similarity(a: &Document, b: &Document) -> f64 {
    if a.content_hash == b.content_hash {
        return 1.0;
    }
    let left: HashSet<String> = words(&a.raw_body).collect();
    let right: HashSet<String> = words(&b.raw_body).collect();
    let union = left.union(&right).count();
    if union == 0 {
        return 1.0;
    }
    left.intersection(&right).count() as f64 / union as f64
}

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

/// Group `documents` into canonical groups and collect conflict issues.
///
/// Output does not depend on input order: groups are sorted by canonical
/// id and members by preference.
pub fn group(
    documents: &[Document],
    options: &DedupOptions,
) -> (Vec<CanonicalGroup>, Vec<ValidationIssue>) {
    let mut sets = UnionFind::new(documents.len());

    let mut by_file: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    let mut by_title: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (i, doc) in documents.iter().enumerate() {
        by_file.entry(doc.source_path.as_str()).or_default().push(i);
        if doc.title_source == TitleSource::Heading {
            let key = normalize_title(&doc.title);
            if !key.is_empty() {
                by_title.entry(key).or_default().push(i);
            }
        }
    }

    for members in by_file.values().chain(by_title.values()) {
        for pair in members.windows(2) {
            sets.union(pair[0], pair[1]);
        }
    }

    let mut components: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, root) in sets.into_labeling().into_iter().enumerate() {
        components.entry(root).or_default().push(i);
    }

    let title_keys: Vec<Option<String>> = documents
        .iter()
        .map(|d| {
            (d.title_source == TitleSource::Heading)
                .then(|| normalize_title(&d.title))
                .filter(|key| !key.is_empty())
        })
        .collect();

    let mut groups: Vec<CanonicalGroup> = components
        .into_values()
        .map(|mut members| {
            members.sort_by(|a, b| documents[*a].preference_key().cmp(&documents[*b].preference_key()));

            let mut reasons = BTreeSet::new();
            for (pos, &a) in members.iter().enumerate() {
                for &b in &members[pos + 1..] {
                    if documents[a].source_path == documents[b].source_path {
                        reasons.insert(GroupReason::SameFile);
                    } else if title_keys[a].is_some() && title_keys[a] == title_keys[b] {
                        reasons.insert(GroupReason::SameTitle);
                    }
                }
            }

            let ids: Vec<String> = members.iter().map(|&i| documents[i].id.clone()).collect();
            CanonicalGroup {
                canonical_id: ids[0].clone(),
                members: ids,
                reasons: reasons.into_iter().collect(),
            }
        })
        .collect();
    groups.sort_by(|a, b| a.canonical_id.cmp(&b.canonical_id));

    let mut issues = Vec::new();
    for (title, members) in &by_title {
        let mut members = members.clone();
        members.sort_by(|a, b| documents[*a].preference_key().cmp(&documents[*b].preference_key()));
        for (pos, &preferred) in members.iter().enumerate() {
            for &other in &members[pos + 1..] {
                let (p, o) = (&documents[preferred], &documents[other]);
                if p.source_path == o.source_path {
                    continue;
                }
                let similarity = body_similarity(p, o);
                if similarity < options.similarity_threshold {
                    issues.push(ValidationIssue::new(
                        IssueKind::DuplicateTitleConflict,
                        &o.id,
                        format!(
                            "title \"{}\" also used by `{}` with differing content (similarity {:.2})",
                            title, p.id, similarity
                        ),
                    ));
                }
            }
        }
    }

    tracing::debug!(
        groups = groups.len(),
        merged = groups.iter().filter(|g| !g.is_singleton()).count(),
        conflicts = issues.len(),
        "grouped documents"
    );

    (groups, issues)
}
