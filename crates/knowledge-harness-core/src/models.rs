//! Core data models used throughout Knowledge Harness.
//!
//! These types represent the documents, links, edges, canonical groups, and
//! validation issues that flow through the indexing pipeline. A
//! [`Document`] is produced once by the parser and is never mutated after
//! its snapshot has been published.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where a document's title came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TitleSource {
    /// First level-1 or level-2 heading of the segment.
    Heading,
    /// No usable heading; the file stem was used instead.
    FileStem,
}

/// A heading within a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Heading level, 1 through 6.
    pub level: u8,
    /// Heading text with inline markup removed.
    pub text: String,
    /// Byte offset of the heading within the segment body.
    pub byte_offset: usize,
    /// GitHub-style slug, unique within the document.
    pub anchor: String,
}

/// Classification of a link target as written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkKind {
    /// A path to another markdown document in the corpus.
    Internal,
    /// A `#fragment` pointing into the same document.
    SelfAnchor,
    /// A URL with a scheme (`https:`, `mailto:`, ...). Never resolved.
    External,
    /// A relative path to a non-markdown file (images, PDFs, ...). Never resolved.
    Asset,
}

/// A single outbound link found in a document body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkReference {
    /// The target string exactly as written.
    pub raw_target: String,
    /// Link text (empty for bare paths).
    pub text: String,
    pub kind: LinkKind,
    /// Section anchor, lowercased and percent-decoded.
    pub anchor: Option<String>,
    /// Resolved document id; `None` means unresolved or not resolvable.
    pub resolved_id: Option<String>,
    /// True when the path appeared bare in prose instead of `[text](target)`.
    pub bare: bool,
    pub byte_offset: usize,
    /// True when the link sits under a "Related Documents"-style heading.
    pub in_related_section: bool,
}

/// One logical markdown document (a whole file, or one segment of a
/// multi-document file).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Normalized corpus-relative path: lowercased, `/`-separated,
    /// extension stripped. Segments after the first carry a `~N` suffix.
    pub id: String,
    /// Corpus-relative path as found on disk, `/`-separated.
    pub source_path: String,
    pub segment_index: usize,
    pub title: String,
    pub title_source: TitleSource,
    pub raw_body: String,
    pub outbound_links: Vec<LinkReference>,
    pub sections: Vec<Section>,
    /// SHA-256 of `raw_body`, hex encoded.
    pub content_hash: String,
    /// Canonical id of the group this document belongs to, when this
    /// document is not itself the canonical member.
    pub part_of: Option<String>,
}

impl Document {
    /// Id of the physical file this segment came from (segment 0's id).
    pub fn file_id(&self) -> String {
        crate::ids::normalize_id(&self.source_path)
    }

    /// True when this document is the representative of its group.
    pub fn is_canonical(&self) -> bool {
        self.part_of.is_none()
    }

    /// Preference key used for canonical selection: shortest path first,
    /// then lexicographically smaller path, then lower segment index.
    pub fn preference_key(&self) -> (usize, &str, usize) {
        (self.source_path.len(), &self.source_path, self.segment_index)
    }
}

/// Kind of a graph edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeKind {
    Reference,
    Related,
}

/// A directed edge between two resolved documents.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub from_id: String,
    pub to_id: String,
    pub kind: EdgeKind,
}

/// Why members of a [`CanonicalGroup`] were grouped together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupReason {
    /// Two or more files share a normalized heading title.
    SameTitle,
    /// Segments split from one physical file.
    SameFile,
}

/// A set of documents treated as one logical topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalGroup {
    pub canonical_id: String,
    /// Member ids in preference order; the first is `canonical_id`.
    pub members: Vec<String>,
    /// Empty for singleton groups.
    pub reasons: Vec<GroupReason>,
}

impl CanonicalGroup {
    pub fn is_singleton(&self) -> bool {
        self.members.len() == 1
    }
}

/// Kind of a [`ValidationIssue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueKind {
    DanglingLink,
    /// The link target resolved but the `#anchor` did not.
    DanglingAnchor,
    CycleDetected,
    DuplicateTitleConflict,
    OrphanDocument,
}

impl IssueKind {
    pub const ALL: [IssueKind; 5] = [
        IssueKind::DanglingLink,
        IssueKind::DanglingAnchor,
        IssueKind::CycleDetected,
        IssueKind::DuplicateTitleConflict,
        IssueKind::OrphanDocument,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::DanglingLink => "dangling-link",
            IssueKind::DanglingAnchor => "dangling-anchor",
            IssueKind::CycleDetected => "cycle-detected",
            IssueKind::DuplicateTitleConflict => "duplicate-title-conflict",
            IssueKind::OrphanDocument => "orphan-document",
        }
    }

    /// Informational kinds describe the corpus shape rather than a defect.
    pub fn severity(&self) -> Severity {
        match self {
            IssueKind::DanglingLink
            | IssueKind::DanglingAnchor
            | IssueKind::DuplicateTitleConflict => Severity::Warning,
            IssueKind::CycleDetected | IssueKind::OrphanDocument => Severity::Info,
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IssueKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = IssueKind::ALL.iter().map(|k| k.as_str()).collect();
                format!("unknown issue kind '{}' (expected one of: {})", s, known.join(", "))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
    Warning,
    Info,
}

/// A problem found while validating the corpus. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    pub document_id: String,
    pub detail: String,
    pub severity: Severity,
}

impl ValidationIssue {
    pub fn new(kind: IssueKind, document_id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            document_id: document_id.into(),
            detail: detail.into(),
            severity: kind.severity(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.document_id, self.detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_kind_round_trips_through_str() {
        for kind in IssueKind::ALL {
            assert_eq!(kind.as_str().parse::<IssueKind>().unwrap(), kind);
        }
        assert!("broken".parse::<IssueKind>().is_err());
    }

    #[test]
    fn test_issue_kind_serializes_kebab_case() {
        let json = serde_json::to_string(&IssueKind::DuplicateTitleConflict).unwrap();
        assert_eq!(json, "\"duplicate-title-conflict\"");
    }

    #[test]
    fn test_issue_severity() {
        let issue = ValidationIssue::new(IssueKind::OrphanDocument, "a", "alone");
        assert_eq!(issue.severity, Severity::Info);
        let issue = ValidationIssue::new(IssueKind::DanglingLink, "a", "missing");
        assert_eq!(issue.severity, Severity::Warning);
    }
}
