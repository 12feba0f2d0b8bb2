//! Markdown parsing into [`Document`] records.
//!
//! Uses `pulldown-cmark` with source offsets to extract headings
//! ([`Section`]s) and outbound links. Links inside fenced/indented code and
//! inline code are ignored, as are image links. Bare relative paths ending
//! in `.md` that appear in prose are recorded as links with `bare = true`.
//!
//! Links that appear under a "Related Documents"-style heading are flagged
//! with `in_related_section`, which the graph builder turns into `related`
//! edges instead of `reference` edges.

use pulldown_cmark::{Event, LinkType, Options, Parser, Tag, TagEnd};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::ids::{
    file_stem, has_markdown_extension, normalize_id, percent_decode, segment_id,
    strip_markdown_extension,
};
use crate::models::{Document, LinkKind, LinkReference, Section, TitleSource};
use crate::segment::split_segments;

/// Parser settings.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Headings whose subsections hold "related" links. Compared
    /// case-insensitively, ignoring a trailing colon.
    pub related_headings: Vec<String>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            related_headings: vec![
                "Related Documents".to_string(),
                "Related".to_string(),
                "See Also".to_string(),
            ],
        }
    }
}

impl ParseOptions {
    fn is_related_heading(&self, heading: &str) -> bool {
        let normalized = heading.trim().trim_end_matches(':').trim().to_lowercase();
        self.related_headings
            .iter()
            .any(|h| h.trim().to_lowercase() == normalized)
    }
}

/// Split a file on `separator` and parse every segment.
///
/// `source_path` is the corpus-relative path of the file.
pub fn parse_file(
    source_path: &str,
    text: &str,
    separator: &str,
    options: &ParseOptions,
) -> Vec<Document> {
    let source_path = source_path.replace('\\', "/");
    let file_id = normalize_id(&source_path);
    split_segments(text, separator)
        .into_iter()
        .enumerate()
        .map(|(index, body)| parse_segment(&source_path, &file_id, index, body, options))
        .collect()
}

/// Parse a single segment body into a [`Document`].
pub fn parse_document(
    source_path: &str,
    segment_index: usize,
    body: &str,
    options: &ParseOptions,
) -> Document {
    let source_path = source_path.replace('\\', "/");
    let file_id = normalize_id(&source_path);
    parse_segment(&source_path, &file_id, segment_index, body, options)
}

fn parse_segment(
    source_path: &str,
    file_id: &str,
    segment_index: usize,
    body: &str,
    options: &ParseOptions,
) -> Document {
    let mut walker = Walker::new(options);
    let parser = Parser::new_ext(
        body,
        Options::ENABLE_TABLES
            | Options::ENABLE_FOOTNOTES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS,
    );

    for (event, range) in parser.into_offset_iter() {
        match event {
            Event::Text(text) => walker.text(&text, range.start),
            Event::SoftBreak | Event::HardBreak => walker.text(" ", range.start),
            Event::Code(code) => {
                walker.flush_prose();
                walker.inline_code(&code);
            }
            Event::Start(tag) => {
                walker.flush_prose();
                walker.start(tag, range.start);
            }
            Event::End(tag) => {
                walker.flush_prose();
                walker.end(tag);
            }
            _ => walker.flush_prose(),
        }
    }
    walker.flush_prose();

    let (title, title_source) = walker
        .sections
        .iter()
        .find(|s| s.level <= 2 && !s.text.is_empty())
        .map(|s| (s.text.clone(), TitleSource::Heading))
        .unwrap_or_else(|| (file_stem(source_path).to_string(), TitleSource::FileStem));

    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    let content_hash = format!("{:x}", hasher.finalize());

    Document {
        id: segment_id(file_id, segment_index),
        source_path: source_path.to_string(),
        segment_index,
        title,
        title_source,
        raw_body: body.to_string(),
        outbound_links: walker.links,
        sections: walker.sections,
        content_hash,
        part_of: None,
    }
}

struct PendingLink {
    raw_target: String,
    offset: usize,
    text: String,
    email: bool,
}

/// Event-stream state for one segment.
struct Walker<'o> {
    options: &'o ParseOptions,
    sections: Vec<Section>,
    links: Vec<LinkReference>,
    slug_counts: HashMap<String, usize>,
    heading: Option<(u8, usize, String)>,
    link: Option<PendingLink>,
    image_depth: usize,
    in_code_block: bool,
    related_level: Option<u8>,
    prose: Option<(usize, String)>,
}

impl<'o> Walker<'o> {
    fn new(options: &'o ParseOptions) -> Self {
        Self {
            options,
            sections: Vec::new(),
            links: Vec::new(),
            slug_counts: HashMap::new(),
            heading: None,
            link: None,
            image_depth: 0,
            in_code_block: false,
            related_level: None,
            prose: None,
        }
    }

    fn text(&mut self, text: &str, offset: usize) {
        if self.image_depth > 0 || self.in_code_block {
            return;
        }
        let mut consumed = false;
        if let Some((_, _, heading)) = &mut self.heading {
            heading.push_str(text);
            consumed = true;
        }
        if let Some(link) = &mut self.link {
            link.text.push_str(text);
            consumed = true;
        }
        if !consumed {
            self.prose
                .get_or_insert_with(|| (offset, String::new()))
                .1
                .push_str(text);
        }
    }

    fn inline_code(&mut self, code: &str) {
        if self.image_depth > 0 {
            return;
        }
        if let Some((_, _, heading)) = &mut self.heading {
            heading.push_str(code);
        }
        if let Some(link) = &mut self.link {
            link.text.push_str(code);
        }
    }

    fn start(&mut self, tag: Tag<'_>, offset: usize) {
        match tag {
            Tag::Heading { level, .. } => {
                self.heading = Some((level as u8, offset, String::new()));
            }
            Tag::Link {
                link_type,
                dest_url,
                ..
            } => {
                if self.image_depth == 0 {
                    self.link = Some(PendingLink {
                        raw_target: dest_url.to_string(),
                        offset,
                        text: String::new(),
                        email: matches!(link_type, LinkType::Email),
                    });
                }
            }
            Tag::Image { .. } => self.image_depth += 1,
            Tag::CodeBlock(_) => self.in_code_block = true,
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Heading(_) => self.finish_heading(),
            TagEnd::Link => self.finish_link(),
            TagEnd::Image => self.image_depth = self.image_depth.saturating_sub(1),
            TagEnd::CodeBlock => self.in_code_block = false,
            _ => {}
        }
    }

    fn finish_heading(&mut self) {
        let Some((level, offset, raw_text)) = self.heading.take() else {
            return;
        };
        let text = raw_text.trim().to_string();

        let base = slugify(&text);
        let count = self.slug_counts.entry(base.clone()).or_insert(0);
        let anchor = if *count == 0 {
            base
        } else {
            format!("{}-{}", base, count)
        };
        *count += 1;

        if matches!(self.related_level, Some(open) if level <= open) {
            self.related_level = None;
        }
        if self.options.is_related_heading(&text) {
            self.related_level = Some(level);
        }

        self.sections.push(Section {
            level,
            text,
            byte_offset: offset,
            anchor,
        });
    }

    fn finish_link(&mut self) {
        let Some(pending) = self.link.take() else {
            return;
        };
        let classified = if pending.email {
            Some(ClassifiedTarget {
                kind: LinkKind::External,
                anchor: None,
            })
        } else {
            classify_target(&pending.raw_target)
        };
        if let Some(target) = classified {
            self.links.push(LinkReference {
                raw_target: pending.raw_target,
                text: pending.text.trim().to_string(),
                kind: target.kind,
                anchor: target.anchor,
                resolved_id: None,
                bare: false,
                byte_offset: pending.offset,
                in_related_section: self.related_level.is_some(),
            });
        }
    }

    fn flush_prose(&mut self) {
        if let Some((offset, text)) = self.prose.take() {
            self.scan_bare_paths(offset, &text);
        }
    }

    fn scan_bare_paths(&mut self, offset: usize, text: &str) {
        for token in text.split_whitespace() {
            let token = token
                .trim_start_matches(|c: char| matches!(c, '(' | '[' | '<' | '"' | '\''))
                .trim_end_matches(|c: char| {
                    matches!(
                        c,
                        ')' | ']' | '>' | '"' | '\'' | ',' | ';' | ':' | '.' | '!' | '?'
                    )
                });
            if !looks_like_bare_path(token) {
                continue;
            }
            if let Some(target) = classify_target(token) {
                if target.kind == LinkKind::Internal {
                    self.links.push(LinkReference {
                        raw_target: token.to_string(),
                        text: String::new(),
                        kind: target.kind,
                        anchor: target.anchor,
                        resolved_id: None,
                        bare: true,
                        byte_offset: offset,
                        in_related_section: self.related_level.is_some(),
                    });
                }
            }
        }
    }
}

fn looks_like_bare_path(token: &str) -> bool {
    if token.is_empty()
        || token.starts_with('#')
        || token.starts_with("//")
        || has_scheme(token)
        || token.contains(['*', '{', '}', '|'])
    {
        return false;
    }
    let path = token.split('#').next().unwrap_or(token);
    if !has_markdown_extension(path) {
        return false;
    }
    let name = path.rsplit('/').next().unwrap_or(path);
    !strip_markdown_extension(name).is_empty()
}

/// Result of classifying a link target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedTarget {
    pub kind: LinkKind,
    pub anchor: Option<String>,
}

/// Classify a raw link target. Returns `None` for targets that are not
/// links at all (empty, or a bare `#`).
pub fn classify_target(raw: &str) -> Option<ClassifiedTarget> {
    let target = raw.trim().trim_start_matches('<').trim_end_matches('>').trim();
    if target.is_empty() {
        return None;
    }

    if let Some(fragment) = target.strip_prefix('#') {
        return normalize_anchor(fragment).map(|anchor| ClassifiedTarget {
            kind: LinkKind::SelfAnchor,
            anchor: Some(anchor),
        });
    }

    if has_scheme(target) || target.starts_with("//") {
        return Some(ClassifiedTarget {
            kind: LinkKind::External,
            anchor: None,
        });
    }

    let (path_part, fragment) = match target.split_once('#') {
        Some((p, f)) => (p, Some(f)),
        None => (target, None),
    };
    let path_part = path_part.split('?').next().unwrap_or(path_part);
    let anchor = fragment.and_then(normalize_anchor);

    if path_part.is_empty() {
        return anchor.map(|anchor| ClassifiedTarget {
            kind: LinkKind::SelfAnchor,
            anchor: Some(anchor),
        });
    }

    let path = percent_decode(path_part);
    let last = path.rsplit('/').next().unwrap_or(&path);
    let kind = if path.ends_with('/') || has_markdown_extension(&path) || !last.contains('.') {
        LinkKind::Internal
    } else {
        LinkKind::Asset
    };

    Some(ClassifiedTarget { kind, anchor })
}

/// Path portion of a raw link target, percent-decoded, without anchor or
/// query string.
pub fn target_path(raw: &str) -> String {
    let target = raw.trim().trim_start_matches('<').trim_end_matches('>').trim();
    let path = target.split('#').next().unwrap_or(target);
    let path = path.split('?').next().unwrap_or(path);
    percent_decode(path)
}

fn normalize_anchor(fragment: &str) -> Option<String> {
    let anchor = percent_decode(fragment.trim()).to_lowercase();
    if anchor.is_empty() {
        None
    } else {
        Some(anchor)
    }
}

/// True for `scheme:` prefixes such as `https:`, `mailto:`, `urn:`.
/// Single-letter prefixes (Windows drive letters) do not count.
pub fn has_scheme(target: &str) -> bool {
    let Some(colon) = target.find(':') else {
        return false;
    };
    let scheme = &target[..colon];
    scheme.len() >= 2
        && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// GitHub-style heading slug: lowercase, alphanumerics plus `-`/`_` kept,
/// whitespace turned into `-`, everything else dropped.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.trim().chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() || c == '-' || c == '_' {
            slug.push(c);
        } else if c.is_whitespace() {
            slug.push('-');
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> Document {
        parse_document("docs/guide.md", 0, body, &ParseOptions::default())
    }

    #[test]
    fn test_title_from_first_heading() {
        let doc = parse("Intro text\n\n## Event Sourcing\n\n# Later\n");
        assert_eq!(doc.title, "Event Sourcing");
        assert_eq!(doc.title_source, TitleSource::Heading);
        assert_eq!(doc.id, "docs/guide");
    }

    #[test]
    fn test_title_falls_back_to_file_stem() {
        let doc = parse_document("docs/Guide.md", 0, "### Deep only\n\ntext", &ParseOptions::default());
        assert_eq!(doc.title, "Guide");
        assert_eq!(doc.title_source, TitleSource::FileStem);
    }

    #[test]
    fn test_sections_with_offsets_and_anchors() {
        let body = "# Top\n\n## Usage\n\ntext\n\n## Usage\n";
        let doc = parse(body);
        assert_eq!(doc.sections.len(), 3);
        assert_eq!(doc.sections[0].anchor, "top");
        assert_eq!(doc.sections[1].anchor, "usage");
        assert_eq!(doc.sections[2].anchor, "usage-1");
        assert_eq!(doc.sections[1].level, 2);
        assert_eq!(&body[doc.sections[1].byte_offset..doc.sections[1].byte_offset + 8], "## Usage");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Event Sourcing (CQRS)"), "event-sourcing-cqrs");
        assert_eq!(slugify("  API_v2 Notes! "), "api_v2-notes");
    }

    #[test]
    fn test_link_classification() {
        let doc = parse(
            "# T\n\n[a](./other.md) [b](https://example.com/x.md) [c](#t) \
             [d](diagram.png) [e](../up/page.md#Section-One) <mailto:me@example.com>\n",
        );
        let kinds: Vec<LinkKind> = doc.outbound_links.iter().map(|l| l.kind).collect();
        assert_eq!(
            kinds,
            vec![
                LinkKind::Internal,
                LinkKind::External,
                LinkKind::SelfAnchor,
                LinkKind::Asset,
                LinkKind::Internal,
                LinkKind::External,
            ]
        );
        assert_eq!(doc.outbound_links[0].text, "a");
        assert_eq!(doc.outbound_links[2].anchor.as_deref(), Some("t"));
        assert_eq!(doc.outbound_links[4].anchor.as_deref(), Some("section-one"));
        assert_eq!(doc.outbound_links[4].raw_target, "../up/page.md#Section-One");
    }

    #[test]
    fn test_links_in_code_are_ignored() {
        let doc = parse("# T\n\n```md\n[x](./in-block.md)\n```\n\n`[y](./inline.md)` and `other.md`\n");
        assert!(doc.outbound_links.is_empty());
    }

    #[test]
    fn test_image_links_are_ignored() {
        let doc = parse("# T\n\n![alt](./pic.md)\n");
        assert!(doc.outbound_links.is_empty());
    }

    #[test]
    fn test_bare_paths_in_prose() {
        let doc = parse("# T\n\nSee patterns/cqrs.md, and (../README.md#setup). Not *.md or https://x.io/a.md\n");
        let bare: Vec<&str> = doc
            .outbound_links
            .iter()
            .filter(|l| l.bare)
            .map(|l| l.raw_target.as_str())
            .collect();
        assert_eq!(bare, vec!["patterns/cqrs.md", "../README.md#setup"]);
        assert_eq!(doc.outbound_links[1].anchor.as_deref(), Some("setup"));
    }

    #[test]
    fn test_related_section_flag() {
        let doc = parse(
            "# T\n\n[body](a.md)\n\n## Related Documents\n\n- [r1](b.md)\n\n### Deeper\n\n- [r2](c.md)\n\n## Next\n\n[after](d.md)\n",
        );
        let flags: Vec<(String, bool)> = doc
            .outbound_links
            .iter()
            .map(|l| (l.raw_target.clone(), l.in_related_section))
            .collect();
        assert_eq!(
            flags,
            vec![
                ("a.md".to_string(), false),
                ("b.md".to_string(), true),
                ("c.md".to_string(), true),
                ("d.md".to_string(), false),
            ]
        );
    }

    #[test]
    fn test_parse_file_segments() {
        let text = "# First\n\none\n\n<!-- RELATED_DOC_SEP -->\n\n# Second\n\ntwo\n";
        let docs = parse_file("dir/Multi.md", text, "RELATED_DOC_SEP", &ParseOptions::default());
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "dir/multi");
        assert_eq!(docs[1].id, "dir/multi~1");
        assert_eq!(docs[1].segment_index, 1);
        assert_eq!(docs[1].title, "Second");
        assert_eq!(docs[0].source_path, docs[1].source_path);
        assert_ne!(docs[0].content_hash, docs[1].content_hash);
    }

    #[test]
    fn test_has_scheme() {
        assert!(has_scheme("https://x"));
        assert!(has_scheme("mailto:a@b"));
        assert!(!has_scheme("C:/dir/file.md"));
        assert!(!has_scheme("./a.md"));
    }
}
