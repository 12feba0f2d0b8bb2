//! Tool extension trait and registry.
//!
//! Every operation the HTTP server exposes is a [`Tool`]: the built-in
//! `resolve`, `related`, `traverse`, `validate`, and `reindex` tools, plus
//! any custom tools a host binary registers. All of them are dispatched
//! through the same `POST /tools/{name}` handler.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │              ToolRegistry                │
//! │  ┌───────────────────┐ ┌──────────────┐  │
//! │  │ Built-in          │ │  Custom      │  │
//! │  │ resolve/related   │ │  (Rust)      │  │
//! │  │ traverse/validate │ │  Tools       │  │
//! │  │ reindex           │ │              │  │
//! │  └───────────────────┘ └──────────────┘  │
//! └──────────────┬───────────────────────────┘
//!                ▼
//!        ToolContext → SnapshotHandle
//! ```
//!
//! # Usage
//!
//! ```rust
//! use knowledge_harness::traits::ToolRegistry;
//!
//! let mut tools = ToolRegistry::with_builtins();
//! // tools.register(Box::new(MyTool::new()));
//! assert_eq!(tools.len(), 5);
//! ```

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use knowledge_harness_core::{CorpusSnapshot, ValidationIssue};

use crate::config::Config;
use crate::index::build_index;
use crate::progress::NoProgress;
use crate::query;
use crate::snapshot::SnapshotHandle;

// ═══════════════════════════════════════════════════════════════════════
// Tool Trait
// ═══════════════════════════════════════════════════════════════════════

/// A tool that clients can discover and call.
///
/// Tools are registered at server startup and exposed via
/// `GET /tools/list` for discovery and `POST /tools/{name}` for
/// invocation.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use anyhow::Result;
/// use serde_json::{json, Value};
/// use knowledge_harness::traits::{Tool, ToolContext};
///
/// pub struct CountTool;
///
/// #[async_trait]
/// impl Tool for CountTool {
///     fn name(&self) -> &str { "count" }
///     fn description(&self) -> &str { "Count indexed documents" }
///
///     fn parameters_schema(&self) -> Value {
///         json!({ "type": "object", "properties": {} })
///     }
///
///     async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<Value> {
///         Ok(json!({ "documents": ctx.snapshot().documents.len() }))
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Route name (`POST /tools/{name}`).
    fn name(&self) -> &str;

    /// One-line description for discovery.
    fn description(&self) -> &str;

    /// Whether this tool ships with Knowledge Harness. Defaults to `false`.
    fn is_builtin(&self) -> bool {
        false
    }

    /// JSON Schema for the parameters object (`type: "object"`,
    /// `properties`, optional `required`).
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with validated parameters.
    ///
    /// The returned value is wrapped in `{ "result": ... }` in the HTTP
    /// response.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value>;
}

/// Serializable tool info for the `/tools/list` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub builtin: bool,
    pub parameters: Value,
}

impl ToolInfo {
    pub fn of(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            builtin: tool.is_builtin(),
            parameters: tool.parameters_schema(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// ToolContext
// ═══════════════════════════════════════════════════════════════════════

/// Context bridge for tool execution.
///
/// Gives tools the published snapshot and the ability to rebuild it.
/// Cloning is cheap; all clones share the same snapshot handle.
#[derive(Clone)]
pub struct ToolContext {
    config: Arc<Config>,
    root: PathBuf,
    snapshots: Arc<SnapshotHandle>,
    reindex_lock: Arc<tokio::sync::Mutex<()>>,
}

impl ToolContext {
    pub fn new(config: Arc<Config>, root: PathBuf, snapshots: Arc<SnapshotHandle>) -> Self {
        Self {
            config,
            root,
            snapshots,
            reindex_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// The currently published snapshot.
    pub fn snapshot(&self) -> Arc<CorpusSnapshot> {
        self.snapshots.current()
    }

    /// Corpus root that `reindex` rebuilds from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Re-run validation on the published snapshot.
    pub fn validate(&self) -> Vec<ValidationIssue> {
        self.snapshot().validate()
    }

    /// Rebuild the snapshot from the corpus root and publish it.
    ///
    /// Concurrent calls are serialized; readers keep the previous snapshot
    /// until the new one is swapped in. A failed rebuild leaves the
    /// published snapshot untouched.
    pub async fn reindex(&self) -> Result<Arc<CorpusSnapshot>> {
        let _guard = self.reindex_lock.lock().await;
        let cancel = knowledge_harness_core::CancelToken::new();
        let outcome = build_index(self.root(), &self.config, &cancel, &NoProgress).await?;
        self.snapshots.swap(outcome.snapshot);
        let current = self.snapshots.current();
        tracing::info!(
            root = %self.root().display(),
            documents = current.documents.len(),
            fingerprint = %current.fingerprint,
            "snapshot reindexed"
        );
        Ok(current)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Built-in Tool Implementations
// ═══════════════════════════════════════════════════════════════════════

fn required_str<'a>(params: &'a Value, key: &str) -> Result<&'a str> {
    let value = params[key].as_str().unwrap_or("");
    if value.trim().is_empty() {
        bail!("{} must not be empty", key);
    }
    Ok(value)
}

/// Built-in `resolve` tool: id, path, or title → full document.
pub struct ResolveTool;

#[async_trait]
impl Tool for ResolveTool {
    fn name(&self) -> &str {
        "resolve"
    }

    fn description(&self) -> &str {
        "Resolve a document id, path, or title to the full document"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Document id, corpus-relative path, or title" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let q = required_str(&params, "query")?;
        let doc = query::describe(&ctx.snapshot(), q)?;
        Ok(serde_json::to_value(&doc)?)
    }
}

/// Built-in `related` tool.
pub struct RelatedTool;

#[async_trait]
impl Tool for RelatedTool {
    fn name(&self) -> &str {
        "related"
    }

    fn description(&self) -> &str {
        "List documents related to a document (related sections, then group members)"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": { "type": "string", "description": "Document id" }
            },
            "required": ["id"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let id = required_str(&params, "id")?;
        let refs = query::related(&ctx.snapshot(), id)?;
        Ok(json!({ "documents": refs }))
    }
}

/// Built-in `traverse` tool.
pub struct TraverseTool;

#[async_trait]
impl Tool for TraverseTool {
    fn name(&self) -> &str {
        "traverse"
    }

    fn description(&self) -> &str {
        "Breadth-first walk over reference links from a document"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": { "type": "string", "description": "Start document id" },
                "max_depth": { "type": "integer", "description": "Maximum link depth", "default": 2 }
            },
            "required": ["id"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let id = required_str(&params, "id")?;
        let Some(max_depth) = params["max_depth"].as_u64() else {
            bail!("invalid max_depth: must be a non-negative integer");
        };
        let refs = query::traverse(&ctx.snapshot(), id, max_depth as usize)?;
        Ok(json!({ "documents": refs }))
    }
}

/// Built-in `validate` tool.
pub struct ValidateTool;

#[async_trait]
impl Tool for ValidateTool {
    fn name(&self) -> &str {
        "validate"
    }

    fn description(&self) -> &str {
        "List every validation issue in the current snapshot"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<Value> {
        let snapshot = ctx.snapshot();
        Ok(json!({
            "fingerprint": snapshot.fingerprint,
            "issues": ctx.validate(),
            "load_errors": snapshot.load_errors,
        }))
    }
}

/// Built-in `reindex` tool.
pub struct ReindexTool;

#[async_trait]
impl Tool for ReindexTool {
    fn name(&self) -> &str {
        "reindex"
    }

    fn description(&self) -> &str {
        "Rebuild the snapshot from the corpus root and publish it"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<Value> {
        let snapshot = ctx.reindex().await?;
        Ok(json!({
            "fingerprint": snapshot.fingerprint,
            "documents": snapshot.documents.len(),
            "issues": snapshot.issues.len(),
        }))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════

/// Registry for tools (built-in and custom).
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Registry pre-loaded with the five built-in tools.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(ResolveTool));
        registry.register(Box::new(RelatedTool));
        registry.register(Box::new(TraverseTool));
        registry.register(Box::new(ValidateTool));
        registry.register(Box::new(ReindexTool));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn into_tools(self) -> Vec<Box<dyn Tool>> {
        self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Parameter validation
// ═══════════════════════════════════════════════════════════════════════

/// Check `params` against a tool's JSON Schema and inject defaults.
///
/// Verifies required keys, primitive types, and `enum` membership. Missing
/// optional parameters with a `default` are filled in.
pub fn validate_params(schema: &Value, params: &Value) -> Result<Value> {
    let empty = serde_json::Map::new();
    let given = match params {
        Value::Null => &empty,
        Value::Object(map) => map,
        other => bail!("parameters must be a JSON object, got {}", json_type_name(other)),
    };

    let properties = schema
        .get("properties")
        .and_then(|p| p.as_object())
        .cloned()
        .unwrap_or_default();

    let required = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect::<Vec<_>>())
        .unwrap_or_default();

    for field in required {
        if !given.contains_key(field) {
            bail!("missing required parameter: {}", field);
        }
    }

    let mut result = given.clone();
    for (name, prop) in &properties {
        let Some(value) = given.get(name) else {
            if let Some(default) = prop.get("default") {
                result.insert(name.clone(), default.clone());
            }
            continue;
        };

        if let Some(expected) = prop.get("type").and_then(|t| t.as_str()) {
            let type_ok = match expected {
                "string" => value.is_string(),
                "integer" => value.is_i64() || value.is_u64(),
                "number" => value.is_number(),
                "boolean" => value.is_boolean(),
                "array" => value.is_array(),
                "object" => value.is_object(),
                _ => true,
            };
            if !type_ok {
                bail!(
                    "parameter '{}' must be of type '{}', got {}",
                    name,
                    expected,
                    json_type_name(value)
                );
            }
        }

        if let Some(allowed) = prop.get("enum").and_then(|e| e.as_array()) {
            if !allowed.contains(value) {
                let names: Vec<String> = allowed.iter().map(|v| v.to_string()).collect();
                bail!(
                    "parameter '{}' must be one of [{}], got {}",
                    name,
                    names.join(", "),
                    value
                );
            }
        }
    }

    Ok(Value::Object(result))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
