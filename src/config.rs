//! Configuration parsing and validation.
//!
//! Knowledge Harness is configured via a TOML file (default:
//! `config/kh.toml`). Every section is optional; a missing file means
//! built-in defaults. See `config/kh.example.toml` for a full example.
//!
//! ```toml
//! [corpus]
//! root = "./docs"
//! separator = "RELATED_DOC_SEP"
//!
//! [load]
//! concurrency = 8
//!
//! [dedup]
//! similarity_threshold = 0.8
//!
//! [server]
//! bind = "127.0.0.1:7341"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use knowledge_harness_core::dedup::{DedupOptions, DEFAULT_SIMILARITY_THRESHOLD};
use knowledge_harness_core::parse::ParseOptions;
use knowledge_harness_core::segment::DEFAULT_SEPARATOR;
use knowledge_harness_core::PipelineOptions;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub load: LoadConfig,
    #[serde(default)]
    pub links: LinksConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Where the corpus lives and which files belong to it.
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct CorpusConfig {
    /// Corpus root used by `query` and `serve` when no root is given.
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Marker that splits one file into several documents.
    #[serde(default = "default_separator")]
    pub separator: String,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    /// Added to the built-in `.git`, `target`, and `node_modules` excludes.
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            separator: default_separator(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from("./docs")
}
fn default_separator() -> String {
    DEFAULT_SEPARATOR.to_string()
}
fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string(), "**/*.markdown".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct LoadConfig {
    /// Maximum number of files read at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

fn default_concurrency() -> usize {
    8
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct LinksConfig {
    /// Headings whose links become `related` edges.
    #[serde(default = "default_related_headings")]
    pub related_headings: Vec<String>,
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            related_headings: default_related_headings(),
        }
    }
}

fn default_related_headings() -> Vec<String> {
    ParseOptions::default().related_headings
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct DedupConfig {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

fn default_similarity_threshold() -> f64 {
    DEFAULT_SIMILARITY_THRESHOLD
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

impl Config {
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            related_headings: self.links.related_headings.clone(),
        }
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            dedup: DedupOptions {
                similarity_threshold: self.dedup.similarity_threshold,
            },
        }
    }
}

/// Load and validate the config at `path`.
///
/// A missing file yields [`Config::default()`]; a file that exists but
/// cannot be read, parsed, or validated is an error.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        let config = Config::default();
        validate(&config)?;
        return Ok(config);
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.load.concurrency == 0 {
        bail!("load.concurrency must be >= 1");
    }

    if !(0.0..=1.0).contains(&config.dedup.similarity_threshold) {
        bail!("dedup.similarity_threshold must be in [0.0, 1.0]");
    }

    if config.corpus.include_globs.is_empty() {
        bail!("corpus.include_globs must list at least one pattern");
    }

    if config.server.bind.trim().is_empty() {
        bail!("server.bind must not be empty");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = load_config(Path::new("/definitely/not/here/kh.toml")).unwrap();
        assert_eq!(config.corpus.separator, "RELATED_DOC_SEP");
        assert_eq!(config.load.concurrency, 8);
        assert_eq!(config.server.bind, "127.0.0.1:7341");
        assert_eq!(config.links.related_headings.len(), 3);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let file = write_config(
            r#"
[corpus]
root = "./knowledge"
separator = "---8<---"

[dedup]
similarity_threshold = 0.5
"#,
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.corpus.root, PathBuf::from("./knowledge"));
        assert_eq!(config.corpus.separator, "---8<---");
        assert_eq!(config.corpus.include_globs, vec!["**/*.md", "**/*.markdown"]);
        assert_eq!(config.pipeline_options().dedup.similarity_threshold, 0.5);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let file = write_config("[load]\nconcurrency = 0\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("concurrency"));

        let file = write_config("[dedup]\nsimilarity_threshold = 1.5\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("similarity_threshold"));
    }

    #[test]
    fn test_rejects_unknown_keys() {
        let file = write_config("[corpus]\nrooot = \"./docs\"\n");
        assert!(load_config(file.path()).is_err());
    }
}
