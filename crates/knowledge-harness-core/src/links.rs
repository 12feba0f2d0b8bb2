//! Link resolution.
//!
//! Resolves every [`LinkReference`] against the complete document set:
//!
//! 1. The target path is taken relative to the referencing document's
//!    directory, normalized, stripped of `.md`, and lowercased.
//! 2. It is matched against file ids; a directory link (`../patterns/`)
//!    falls back to that directory's `readme` or `index` document.
//! 3. Anchors are checked against the sections of every segment of the
//!    target file. An anchor found in a later segment resolves the link to
//!    that segment.
//!
//! Unresolved targets produce `dangling-link` issues; resolved targets with
//! an unknown anchor produce `dangling-anchor` issues. External and asset
//! links are recorded but never resolved.
//!
//! The lookup index is built from the whole input before any link is
//! visited, so results do not depend on document order.

use std::collections::{HashMap, HashSet};

use crate::ids::resolve_relative;
use crate::models::{Document, IssueKind, LinkKind, ValidationIssue};
use crate::parse::target_path;

struct SegmentEntry {
    id: String,
    anchors: HashSet<String>,
}

/// File id → segments (in segment order) with their anchors.
struct ResolutionIndex {
    files: HashMap<String, Vec<SegmentEntry>>,
}

impl ResolutionIndex {
    fn new(documents: &[Document]) -> Self {
        let mut staged: HashMap<String, Vec<(usize, SegmentEntry)>> = HashMap::new();
        for doc in documents {
            staged.entry(doc.file_id()).or_default().push((
                doc.segment_index,
                SegmentEntry {
                    id: doc.id.clone(),
                    anchors: doc.sections.iter().map(|s| s.anchor.clone()).collect(),
                },
            ));
        }

        let files = staged
            .into_iter()
            .map(|(file_id, mut segments)| {
                segments.sort_by_key(|(index, _)| *index);
                (file_id, segments.into_iter().map(|(_, s)| s).collect())
            })
            .collect();

        Self { files }
    }

    fn lookup(&self, file_id: &str) -> Option<&[SegmentEntry]> {
        let candidates = if file_id.is_empty() {
            vec!["readme".to_string(), "index".to_string()]
        } else {
            vec![
                file_id.to_string(),
                format!("{}/readme", file_id),
                format!("{}/index", file_id),
            ]
        };
        candidates
            .iter()
            .find_map(|c| self.files.get(c))
            .map(|segments| segments.as_slice())
    }
}

/// Resolve all outbound links of `documents`.
///
/// Any previously set `resolved_id` is recomputed, so resolving an already
/// resolved set is a no-op.
pub fn resolve(mut documents: Vec<Document>) -> (Vec<Document>, Vec<ValidationIssue>) {
    let index = ResolutionIndex::new(&documents);
    let mut issues = Vec::new();

    for doc in &mut documents {
        let own_file = doc.file_id();
        let doc_id = doc.id.clone();

        for link in &mut doc.outbound_links {
            link.resolved_id = None;

            let segments = match link.kind {
                LinkKind::External | LinkKind::Asset => continue,
                LinkKind::SelfAnchor => index.lookup(&own_file),
                LinkKind::Internal => {
                    let target = resolve_relative(&doc.source_path, &target_path(&link.raw_target));
                    index.lookup(&target)
                }
            };

            let Some(segments) = segments.filter(|s| !s.is_empty()) else {
                issues.push(ValidationIssue::new(
                    IssueKind::DanglingLink,
                    &doc_id,
                    format!("unresolved link target `{}`", link.raw_target),
                ));
                continue;
            };

            let default_id = if link.kind == LinkKind::SelfAnchor {
                doc_id.clone()
            } else {
                segments[0].id.clone()
            };

            let resolved = match &link.anchor {
                None => default_id,
                Some(anchor) => {
                    let in_default = segments
                        .iter()
                        .any(|s| s.id == default_id && s.anchors.contains(anchor));
                    if in_default {
                        default_id
                    } else if let Some(segment) =
                        segments.iter().find(|s| s.anchors.contains(anchor))
                    {
                        segment.id.clone()
                    } else {
                        issues.push(ValidationIssue::new(
                            IssueKind::DanglingAnchor,
                            &doc_id,
                            format!(
                                "anchor `#{}` not found in `{}` (link `{}`)",
                                anchor, default_id, link.raw_target
                            ),
                        ));
                        default_id
                    }
                }
            };
            link.resolved_id = Some(resolved);
        }
    }

    tracing::debug!(
        documents = documents.len(),
        issues = issues.len(),
        "resolved links"
    );
    (documents, issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{parse_document, parse_file, ParseOptions};

    fn doc(path: &str, body: &str) -> Document {
        parse_document(path, 0, body, &ParseOptions::default())
    }

    fn resolved(docs: &[Document], id: &str) -> Vec<Option<String>> {
        docs.iter()
            .find(|d| d.id == id)
            .unwrap()
            .outbound_links
            .iter()
            .map(|l| l.resolved_id.clone())
            .collect()
    }

    #[test]
    fn test_relative_and_case_insensitive_resolution() {
        let docs = vec![
            doc("docs/a.md", "# A\n\n[b](./Sub/B.md) [top](../Top.md)\n"),
            doc("docs/sub/b.md", "# B\n"),
            doc("Top.md", "# Top\n"),
        ];
        let (docs, issues) = resolve(docs);
        assert!(issues.is_empty(), "{:?}", issues);
        assert_eq!(
            resolved(&docs, "docs/a"),
            vec![Some("docs/sub/b".to_string()), Some("top".to_string())]
        );
    }

    #[test]
    fn test_missing_target_is_one_dangling_issue() {
        let docs = vec![doc("a.md", "# A\n\n[text](./missing-file.md)\n")];
        let (docs, issues) = resolve(docs);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::DanglingLink);
        assert_eq!(issues[0].document_id, "a");
        assert!(issues[0].detail.contains("./missing-file.md"));
        assert_eq!(resolved(&docs, "a"), vec![None]);
    }

    #[test]
    fn test_missing_target_with_anchor_is_only_dangling_link() {
        let docs = vec![doc("a.md", "# A\n\n[x](missing.md#sec)\n")];
        let (docs, issues) = resolve(docs);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::DanglingLink);
        assert!(issues[0].detail.contains("missing.md#sec"));
        assert!(!issues.iter().any(|i| i.kind == IssueKind::DanglingAnchor));
        assert_eq!(resolved(&docs, "a"), vec![None]);
    }

    #[test]
    fn test_external_and_asset_links_never_resolved() {
        let docs = vec![doc("a.md", "# A\n\n[x](https://example.com) [img](pic.svg)\n")];
        let (docs, issues) = resolve(docs);
        assert!(issues.is_empty());
        assert_eq!(resolved(&docs, "a"), vec![None, None]);
    }

    #[test]
    fn test_anchor_validation() {
        let docs = vec![
            doc("a.md", "# A\n\n[ok](b.md#usage) [bad](b.md#nope) [self](#a) [selfbad](#zzz)\n"),
            doc("b.md", "# B\n\n## Usage\n"),
        ];
        let (docs, issues) = resolve(docs);
        let kinds: Vec<IssueKind> = issues.iter().map(|i| i.kind).collect();
        assert_eq!(kinds, vec![IssueKind::DanglingAnchor, IssueKind::DanglingAnchor]);
        assert!(issues[0].detail.contains("#nope"));
        assert!(issues[1].detail.contains("#zzz"));
        assert_eq!(
            resolved(&docs, "a"),
            vec![
                Some("b".to_string()),
                Some("b".to_string()),
                Some("a".to_string()),
                Some("a".to_string()),
            ]
        );
    }

    #[test]
    fn test_anchor_in_later_segment_resolves_to_segment() {
        let mut docs = parse_file(
            "multi.md",
            "# One\n\nRELATED_DOC_SEP\n\n# Two\n\n## Deep Dive\n",
            "RELATED_DOC_SEP",
            &ParseOptions::default(),
        );
        docs.push(doc("a.md", "# A\n\n[x](multi.md#deep-dive) [y](multi.md)\n"));
        let (docs, issues) = resolve(docs);
        assert!(issues.is_empty());
        assert_eq!(
            resolved(&docs, "a"),
            vec![Some("multi~1".to_string()), Some("multi".to_string())]
        );
    }

    #[test]
    fn test_directory_link_falls_back_to_readme() {
        let docs = vec![
            doc("a.md", "# A\n\n[patterns](patterns/)\n"),
            doc("patterns/README.md", "# Patterns\n"),
        ];
        let (docs, issues) = resolve(docs);
        assert!(issues.is_empty());
        assert_eq!(resolved(&docs, "a"), vec![Some("patterns/readme".to_string())]);
    }

    #[test]
    fn test_resolution_independent_of_order() {
        let build = || {
            vec![
                doc("a.md", "# A\n\n[b](b.md) [c](c.md#x) [m](missing.md)\n"),
                doc("b.md", "# B\n\n[a](a.md)\n"),
                doc("c.md", "# C\n"),
            ]
        };
        let (forward, mut forward_issues) = resolve(build());
        let mut reversed_input = build();
        reversed_input.reverse();
        let (mut reversed, mut reversed_issues) = resolve(reversed_input);
        reversed.reverse();
        forward_issues.sort();
        reversed_issues.sort();
        assert_eq!(forward, reversed);
        assert_eq!(forward_issues, reversed_issues);
    }
}
