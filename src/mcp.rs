//! MCP tools over the documentation index.
//!
//! [`DocTools`] implements the three tools once:
//!
//! | Tool | Description |
//! |------|-------------|
//! | `query_docs` | Answer a question from the indexed docs, with sources |
//! | `list_sources` | Categories with document counts, documents by category |
//! | `reingest` | Incremental (or `full`) ingest of the docs tree |
//!
//! [`McpBridge`] exposes them over the MCP JSON-RPC protocol (Streamable
//! HTTP, mounted at `/mcp` by [`crate::server`]); the same server also
//! accepts plain `POST /tools/{name}` calls.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use rmcp::model::*;
use rmcp::{ErrorData as McpError, ServerHandler};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{info, warn};

use doc_rag_core::answer::{Answerer, RagAnswer};
use doc_rag_core::index::IndexReport;
use doc_rag_core::retrieve::RetrieveOptions;
use doc_rag_core::store::VectorStore;

use crate::config::Config;
use crate::ingest;
use crate::parser;
use crate::pipeline;
use crate::sqlite_store::SqliteVectorStore;

/// Documents listed per category by `list_sources`.
const MAX_DOCS_PER_CATEGORY: usize = 10;

/// Name, description and JSON Schema of one tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: serde_json::Value,
    /// Whether calling the tool leaves the index untouched.
    pub read_only: bool,
}

pub fn tool_specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: "query_docs",
            description: "Answer a question from the indexed documentation. \
                          Returns the answer followed by the documents it was drawn from.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "question": {
                        "type": "string",
                        "description": "The question to answer based on the documentation"
                    },
                    "top_k": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Number of chunks to retrieve (defaults to [retrieval].top_k)"
                    },
                    "category": {
                        "type": "string",
                        "description": "Only use chunks in this category (e.g. 'runbook')"
                    }
                },
                "required": ["question"]
            }),
            read_only: true,
        },
        ToolSpec {
            name: "list_sources",
            description: "List the indexed documentation categories and documents.",
            parameters: json!({ "type": "object", "properties": {} }),
            read_only: true,
        },
        ToolSpec {
            name: "reingest",
            description: "Re-index the documentation tree. Set 'full' to re-embed every \
                          document regardless of changes.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "full": {
                        "type": "boolean",
                        "description": "Re-embed all documents, even unchanged ones",
                        "default": false
                    }
                }
            }),
            read_only: false,
        },
    ]
}

pub fn find_tool(name: &str) -> Option<ToolSpec> {
    tool_specs().into_iter().find(|t| t.name == name)
}

#[derive(Debug, Deserialize)]
pub struct QueryDocsParams {
    pub question: String,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReingestParams {
    #[serde(default)]
    pub full: bool,
}

/// Tool implementations shared by every session and transport.
pub struct DocTools {
    config: Config,
    store: Arc<SqliteVectorStore>,
    answerer: Answerer,
    reingest_lock: Mutex<()>,
}

impl DocTools {
    pub fn new(config: Config, store: Arc<SqliteVectorStore>) -> Result<Self> {
        let answerer = pipeline::build_answerer(&config, store.clone())?;
        Ok(Self {
            config,
            store,
            answerer,
            reingest_lock: Mutex::new(()),
        })
    }

    /// Run tool `name` with JSON `params`. Returns the tool's text output.
    pub async fn call(&self, name: &str, params: serde_json::Value) -> Result<String> {
        info!(tool = name, "tool called");
        match name {
            "query_docs" => self.query_docs(parse_params(name, params)?).await,
            "list_sources" => self.list_sources().await,
            "reingest" => self.reingest(parse_params(name, params)?).await,
            other => bail!("tool not found: {}", other),
        }
    }

    pub async fn query_docs(&self, params: QueryDocsParams) -> Result<String> {
        if params.question.trim().is_empty() {
            bail!("question must not be empty");
        }
        let options = RetrieveOptions {
            top_k: params.top_k,
            category: params.category,
            path_prefix: None,
        };
        let answer = self.answerer.answer(&params.question, &options).await?;
        Ok(format_answer(&answer))
    }

    pub async fn list_sources(&self) -> Result<String> {
        let retriever = self.answerer.retriever();
        let categories = retriever.categories().await?;
        let documents = retriever.documents().await?;
        Ok(format_sources(&categories, &documents))
    }

    pub async fn reingest(&self, params: ReingestParams) -> Result<String> {
        let Ok(_guard) = self.reingest_lock.try_lock() else {
            bail!("a reingest is already running");
        };

        let documents = parser::parse_all(&self.config.docs)?;
        if documents.is_empty() {
            return Ok("No documents found to ingest.".to_string());
        }
        let report =
            ingest::index_documents(&self.config, self.store.clone(), &documents, params.full)
                .await?;
        let total = self.store.count().await?;
        Ok(format_reingest(&report, total))
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(tool: &str, params: serde_json::Value) -> Result<T> {
    let params = if params.is_null() { json!({}) } else { params };
    serde_json::from_value(params).with_context(|| format!("invalid parameters for {}", tool))
}

/// Answer text followed by its sources, one line per distinct
/// document and breadcrumb.
pub fn format_answer(answer: &RagAnswer) -> String {
    let mut out = answer.answer.clone();
    if answer.sources.is_empty() {
        return out;
    }

    out.push_str("\n\n**Sources:**");
    let mut seen = BTreeSet::new();
    for source in &answer.sources {
        let path = source.metadata.document_path.as_str();
        let label = source.source_label();
        if seen.insert((path, label)) {
            out.push_str(&format!("\n- {} ({})", label, path));
        }
    }
    out
}

/// Category summary plus up to [`MAX_DOCS_PER_CATEGORY`] paths per category.
///
/// `documents` holds `(document_path, category)` pairs.
pub fn format_sources(categories: &[String], documents: &[(String, String)]) -> String {
    let mut by_category: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (path, category) in documents {
        by_category
            .entry(category.as_str())
            .or_default()
            .push(path.as_str());
    }

    let mut lines = vec!["**Available Documentation Sources**".to_string(), String::new()];
    if !categories.is_empty() {
        lines.push("**Categories:**".to_string());
        for category in categories {
            let count = by_category.get(category.as_str()).map_or(0, Vec::len);
            lines.push(format!("- {}: {} documents", category, count));
        }
    }

    lines.push(String::new());
    lines.push(format!("**Total Documents:** {}", documents.len()));

    if !documents.is_empty() {
        lines.push(String::new());
        lines.push("**Documents:**".to_string());
        for (category, paths) in &by_category {
            lines.push(String::new());
            lines.push(format!("*{}:*", category));
            for path in paths.iter().take(MAX_DOCS_PER_CATEGORY) {
                lines.push(format!("  - {}", path));
            }
            if paths.len() > MAX_DOCS_PER_CATEGORY {
                lines.push(format!(
                    "  - ... and {} more",
                    paths.len() - MAX_DOCS_PER_CATEGORY
                ));
            }
        }
    }
    lines.join("\n")
}

pub fn format_reingest(report: &IndexReport, total_chunks: usize) -> String {
    let mut out = String::from("**Ingestion Complete**\n\n");
    if let Some(mismatch) = &report.model_mismatch {
        out.push_str(&format!(
            "Warning: index was built with '{}' but the active model is '{}'.\n\n",
            mismatch.stored, mismatch.current
        ));
    }
    out.push_str(&format!("- New documents: {}\n", report.new));
    out.push_str(&format!("- Updated documents: {}\n", report.updated));
    out.push_str(&format!("- Skipped (unchanged): {}\n", report.unchanged));
    out.push_str(&format!("- Removed orphans: {}\n", report.orphaned));
    out.push_str(&format!("- Chunks embedded: {}\n", report.chunks_embedded));
    out.push_str(&format!("- Total chunks in database: {}", total_chunks));
    out
}

/// Bridges [`DocTools`] to the MCP JSON-RPC protocol.
///
/// Each MCP session receives a clone; all sessions share one `DocTools`.
#[derive(Clone)]
pub struct McpBridge {
    tools: Arc<DocTools>,
}

impl McpBridge {
    pub fn new(tools: Arc<DocTools>) -> Self {
        Self { tools }
    }

    fn to_mcp_tool(spec: &ToolSpec) -> Tool {
        let input_schema: Arc<serde_json::Map<String, serde_json::Value>> = match &spec.parameters {
            serde_json::Value::Object(map) => Arc::new(map.clone()),
            _ => Arc::new(serde_json::Map::new()),
        };

        Tool {
            name: Cow::Borrowed(spec.name),
            title: None,
            description: Some(Cow::Borrowed(spec.description)),
            input_schema,
            output_schema: None,
            annotations: Some(ToolAnnotations::new().read_only(spec.read_only)),
            execution: None,
            icons: None,
            meta: None,
        }
    }
}

impl ServerHandler for McpBridge {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "doc-rag".to_string(),
                title: Some("doc-rag".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                description: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Question answering over a markdown documentation tree. Use query_docs to \
                 ask a question, list_sources to see what is indexed, and reingest after \
                 the docs change."
                    .to_string(),
            ),
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let tools: Vec<Tool> = tool_specs().iter().map(Self::to_mcp_tool).collect();
        std::future::ready(Ok(ListToolsResult::with_all_items(tools)))
    }

    fn get_tool(&self, name: &str) -> Option<Tool> {
        find_tool(name).as_ref().map(Self::to_mcp_tool)
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        if find_tool(&request.name).is_none() {
            return Err(McpError::new(
                ErrorCode::METHOD_NOT_FOUND,
                format!("no tool registered with name: {}", request.name),
                None,
            ));
        }

        let params = request
            .arguments
            .map(serde_json::Value::Object)
            .unwrap_or(serde_json::Value::Object(serde_json::Map::new()));

        match self.tools.call(&request.name, params).await {
            Ok(text) => Ok(CallToolResult::success(vec![Content::text(text)])),
            Err(e) => {
                warn!(tool = %request.name, error = %format!("{:#}", e), "tool failed");
                Ok(CallToolResult::error(vec![Content::text(format!("{:#}", e))]))
            }
        }
    }
}
