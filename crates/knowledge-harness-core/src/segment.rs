//! Multi-document file splitting.
//!
//! Some knowledge bases pack several related documents into one physical
//! file, separated by a marker line (for example `<!-- RELATED_DOC_SEP -->`).
//! Any line whose trimmed text contains the configured marker ends the
//! current segment; the marker line itself belongs to no segment. Marker
//! lines inside fenced code blocks are ignored.

/// Default multi-document marker.
pub const DEFAULT_SEPARATOR: &str = "RELATED_DOC_SEP";

/// Split `text` into segments on lines containing `marker`.
///
/// Whitespace-only segments are dropped. A file always yields at least one
/// segment, so an empty file still produces one (empty) document.
pub fn split_segments<'a>(text: &'a str, marker: &str) -> Vec<&'a str> {
    if marker.trim().is_empty() {
        return vec![text];
    }

    let mut segments = Vec::new();
    let mut start = 0usize;
    let mut offset = 0usize;
    let mut fence: Option<&str> = None;

    for line in text.split_inclusive('\n') {
        let trimmed = line.trim();

        if let Some(open) = fence {
            if trimmed.starts_with(open) {
                fence = None;
            }
        } else if trimmed.starts_with("```") {
            fence = Some("```");
        } else if trimmed.starts_with("~~~") {
            fence = Some("~~~");
        } else if trimmed.contains(marker) {
            segments.push(&text[start..offset]);
            start = offset + line.len();
        }

        offset += line.len();
    }
    segments.push(&text[start..]);

    let kept: Vec<&str> = segments
        .into_iter()
        .filter(|s| !s.trim().is_empty())
        .collect();

    if kept.is_empty() {
        vec![text]
    } else {
        kept
    }
}
