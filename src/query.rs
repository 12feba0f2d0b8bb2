//! Document lookup for the CLI and the tool server.
//!
//! Wraps the snapshot query API in serializable response shapes used by
//! both `kh query` and the `resolve` / `related` / `traverse` tools.

use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use knowledge_harness_core::{CorpusSnapshot, Document, LinkKind, NotFound};

use crate::config::Config;
use crate::index::build_index_interruptible;
use crate::progress::ProgressReporter;

/// Full document response for `kh query <id>` and the `resolve` tool.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentResponse {
    pub id: String,
    pub title: String,
    pub source_path: String,
    pub segment_index: usize,
    /// Canonical id of this document's group.
    pub canonical_id: String,
    /// Other members of the group, in preference order.
    pub group: Vec<String>,
    pub sections: Vec<SectionResponse>,
    pub links: Vec<LinkResponse>,
    pub in_cycle: bool,
    pub content_hash: String,
    pub body: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionResponse {
    pub level: u8,
    pub text: String,
    pub anchor: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkResponse {
    pub target: String,
    pub kind: LinkKind,
    pub resolved_id: Option<String>,
    pub related: bool,
}

/// Short listing entry for related and traversal results.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentRef {
    pub id: String,
    pub title: String,
    pub source_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<usize>,
}

impl DocumentRef {
    fn new(doc: &Document, depth: Option<usize>) -> Self {
        Self {
            id: doc.id.clone(),
            title: doc.title.clone(),
            source_path: doc.source_path.clone(),
            depth,
        }
    }
}

/// Resolve `query` and build the full response.
pub fn describe(snapshot: &CorpusSnapshot, query: &str) -> Result<DocumentResponse, NotFound> {
    let doc = snapshot.resolve(query)?;
    let idx = snapshot
        .index_of(&doc.id)
        .ok_or_else(|| NotFound::new(query))?;

    let (canonical_id, group) = match snapshot.group_at(idx) {
        Some(group) => (
            group.canonical_id.clone(),
            group
                .members
                .iter()
                .filter(|m| **m != doc.id)
                .cloned()
                .collect(),
        ),
        None => (doc.id.clone(), Vec::new()),
    };

    Ok(DocumentResponse {
        id: doc.id.clone(),
        title: doc.title.clone(),
        source_path: doc.source_path.clone(),
        segment_index: doc.segment_index,
        canonical_id,
        group,
        sections: doc
            .sections
            .iter()
            .map(|s| SectionResponse {
                level: s.level,
                text: s.text.clone(),
                anchor: s.anchor.clone(),
            })
            .collect(),
        links: doc
            .outbound_links
            .iter()
            .map(|l| LinkResponse {
                target: l.raw_target.clone(),
                kind: l.kind,
                resolved_id: l.resolved_id.clone(),
                related: l.in_related_section,
            })
            .collect(),
        in_cycle: snapshot.graph.in_cycle(idx),
        content_hash: doc.content_hash.clone(),
        body: doc.raw_body.clone(),
    })
}

pub fn related(snapshot: &CorpusSnapshot, id: &str) -> Result<Vec<DocumentRef>, NotFound> {
    Ok(snapshot
        .related_to(id)?
        .into_iter()
        .map(|d| DocumentRef::new(d, None))
        .collect())
}

pub fn traverse(
    snapshot: &CorpusSnapshot,
    id: &str,
    max_depth: usize,
) -> Result<Vec<DocumentRef>, NotFound> {
    Ok(snapshot
        .traverse_with_depth(id, max_depth)?
        .into_iter()
        .map(|(depth, d)| DocumentRef::new(d, Some(depth)))
        .collect())
}

/// What `kh query` should print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    Describe,
    Related,
    Traverse(usize),
}

/// CLI entry point for `kh query`.
///
/// Returns `false` when nothing matched `query`.
pub async fn run_query(
    config: &Config,
    root: &Path,
    query: &str,
    mode: QueryMode,
    json: bool,
    progress: &dyn ProgressReporter,
) -> Result<bool> {
    let outcome = build_index_interruptible(root, config, progress).await?;
    let snapshot = &outcome.snapshot;

    let printed = match mode {
        QueryMode::Describe => describe(snapshot, query).map(|doc| print_document(&doc, json)),
        QueryMode::Related => related(snapshot, query).map(|refs| print_refs("related", &refs, json)),
        QueryMode::Traverse(depth) => {
            traverse(snapshot, query, depth).map(|refs| print_refs("traverse", &refs, json))
        }
    };

    match printed {
        Ok(result) => {
            result?;
            Ok(true)
        }
        Err(not_found) => {
            eprintln!("Error: {}", not_found);
            Ok(false)
        }
    }
}

fn print_document(doc: &DocumentResponse, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(doc)?);
        return Ok(());
    }

    println!("--- Document ---");
    println!("id:           {}", doc.id);
    println!("title:        {}", doc.title);
    println!("source_path:  {}", doc.source_path);
    println!("segment:      {}", doc.segment_index);
    println!("canonical:    {}", doc.canonical_id);
    if !doc.group.is_empty() {
        println!("group:        {}", doc.group.join(", "));
    }
    if doc.in_cycle {
        println!("in_cycle:     yes");
    }
    println!();

    println!("--- Sections ({}) ---", doc.sections.len());
    for section in &doc.sections {
        println!(
            "{}{} (#{})",
            "  ".repeat(section.level.saturating_sub(1) as usize),
            section.text,
            section.anchor
        );
    }
    println!();

    println!("--- Links ({}) ---", doc.links.len());
    for link in &doc.links {
        let target = link.resolved_id.as_deref().unwrap_or("(unresolved)");
        let tag = if link.related { " [related]" } else { "" };
        println!("{} -> {}{}", link.target, target, tag);
    }
    println!();

    println!("--- Body ---");
    println!("{}", doc.body);
    Ok(())
}

fn print_refs(label: &str, refs: &[DocumentRef], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(refs)?);
        return Ok(());
    }
    println!("--- {} ({}) ---", label, refs.len());
    for r in refs {
        let indent = "  ".repeat(r.depth.unwrap_or(0));
        println!("{}{}  {}  ({})", indent, r.id, r.title, r.source_path);
    }
    Ok(())
}
