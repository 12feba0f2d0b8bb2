//! Document id and path normalization.
//!
//! Ids are corpus-relative paths with `/` separators, lowercased, and with
//! the markdown extension stripped, so `Patterns/Event Sourcing.md` and
//! `./patterns/event sourcing` name the same document.

/// Separator between a file id and a segment number (`guide~2`).
pub const SEGMENT_SEPARATOR: char = '~';

const MARKDOWN_EXTENSIONS: [&str; 2] = [".md", ".markdown"];

/// Normalize a corpus-relative path into a document id.
///
/// `.` components are dropped and `..` pops the previous component; a `..`
/// above the corpus root is clamped at the root.
pub fn normalize_id(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let mut parts: Vec<&str> = Vec::new();
    for part in unified.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            p => parts.push(p),
        }
    }
    let joined = parts.join("/");
    strip_markdown_extension(&joined).to_lowercase()
}

/// Strip a trailing `.md` / `.markdown` (any case).
pub fn strip_markdown_extension(path: &str) -> &str {
    let lower = path.to_ascii_lowercase();
    for ext in MARKDOWN_EXTENSIONS {
        if lower.ends_with(ext) {
            return &path[..path.len() - ext.len()];
        }
    }
    path
}

/// Whether the path ends in a markdown extension (any case).
pub fn has_markdown_extension(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    MARKDOWN_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Id of segment `index` of the file whose id is `file_id`.
pub fn segment_id(file_id: &str, index: usize) -> String {
    if index == 0 {
        file_id.to_string()
    } else {
        format!("{}{}{}", file_id, SEGMENT_SEPARATOR, index)
    }
}

/// Resolve `target` relative to the directory containing `from_path` and
/// return the normalized id. A leading `/` makes `target` root-relative.
pub fn resolve_relative(from_path: &str, target: &str) -> String {
    if target.starts_with('/') {
        return normalize_id(target);
    }
    let unified = from_path.replace('\\', "/");
    let dir = match unified.rfind('/') {
        Some(pos) => &unified[..pos],
        None => "",
    };
    normalize_id(&format!("{}/{}", dir, target))
}

/// File stem of a corpus-relative path (`a/b/Guide.md` → `Guide`).
pub fn file_stem(path: &str) -> &str {
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    let stem = strip_markdown_extension(name);
    if stem.is_empty() {
        name
    } else {
        stem
    }
}

/// Decode `%XX` escapes. Input whose escapes do not decode to UTF-8 is
/// kept literally.
pub fn percent_decode(input: &str) -> String {
    urlencoding::decode(input)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| input.to_string())
}
