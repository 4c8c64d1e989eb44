//! Declarative agent definition and tool dispatch
//!
//! The agent itself never talks to a model: it describes its tools to the
//! runtime that hosts it and executes the calls that runtime hands back.

use crate::config::AgentConfig;
use crate::error::ToolError;
use crate::tools::{ToolContext, ToolResponse, Toolbox};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;

const INSTRUCTION: &str = "\
You manage and search document corpora stored in Vertex AI RAG Engine, and \
you can turn log files kept in those corpora into charts.

Choose the tool that matches the request:
- Questions about stored documents: `rag_query`.
- Which corpora exist: `list_corpora`. It returns full resource names that \
the other tools accept.
- New corpus: `create_corpus`.
- Adding Google Drive links or gs:// paths: `add_data`. Make sure you know \
the target corpus first.
- Files and metadata of a corpus: `get_corpus_info`.
- Removing one document: `delete_document`, using a file id from \
`get_corpus_info`.
- Removing a whole corpus: `delete_corpus`. Ask the user first and only pass \
confirm=true once they agree.
- Raw text of a file: `get_log_content_by_filename`.
- Saving every file of a corpus to a local JSON file: `export_corpus_files`.
- Error trends, error types, failed and blocked logins: `analyze_logs`. Pass \
either the log text or the name of a file in the corpus. Logs use \
`timestamp|level|message` lines.

Most tools accept an empty corpus_name and then use the corpus the \
conversation last worked with. Every tool answers with a `status` of \
success, error, warning or info; relay error messages to the user as they are \
instead of guessing.";

/// Description of one callable tool, with its arguments as a JSON schema
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

#[derive(Debug, Deserialize)]
struct QueryArgs {
    #[serde(default)]
    corpus_name: String,
    query: String,
}

#[derive(Debug, Deserialize)]
struct CorpusArgs {
    #[serde(default)]
    corpus_name: String,
}

#[derive(Debug, Deserialize)]
struct CreateCorpusArgs {
    corpus_name: String,
}

#[derive(Debug, Deserialize)]
struct AddDataArgs {
    #[serde(default)]
    corpus_name: String,
    paths: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DeleteDocumentArgs {
    #[serde(default)]
    corpus_name: String,
    document_id: String,
}

#[derive(Debug, Deserialize)]
struct DeleteCorpusArgs {
    corpus_name: String,
    #[serde(default)]
    confirm: bool,
}

#[derive(Debug, Deserialize)]
struct FileContentArgs {
    filename: String,
    #[serde(default)]
    corpus_name: String,
}

#[derive(Debug, Deserialize)]
struct ExportArgs {
    #[serde(default)]
    corpus_name: String,
    output_path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct AnalyzeArgs {
    #[serde(default)]
    corpus_name: String,
    log_content: Option<String>,
    filename: Option<String>,
}

fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn tool_specs() -> Vec<ToolSpec> {
    let corpus = json!({
        "type": "string",
        "description": "Corpus display name or full resource name; empty uses the current corpus"
    });

    vec![
        ToolSpec {
            name: "rag_query",
            description: "Query a corpus and return the most relevant text chunks",
            parameters: object_schema(
                json!({
                    "corpus_name": corpus,
                    "query": {"type": "string", "description": "Question to search for"}
                }),
                &["corpus_name", "query"],
            ),
        },
        ToolSpec {
            name: "list_corpora",
            description: "List all available corpora with their resource names",
            parameters: object_schema(json!({}), &[]),
        },
        ToolSpec {
            name: "create_corpus",
            description: "Create a new corpus",
            parameters: object_schema(
                json!({"corpus_name": {"type": "string", "description": "Name of the new corpus"}}),
                &["corpus_name"],
            ),
        },
        ToolSpec {
            name: "add_data",
            description: "Import Google Drive documents or gs:// files into a corpus",
            parameters: object_schema(
                json!({
                    "corpus_name": corpus,
                    "paths": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Google Drive/Docs URLs or gs:// paths"
                    }
                }),
                &["corpus_name", "paths"],
            ),
        },
        ToolSpec {
            name: "get_corpus_info",
            description: "Show the files held by a corpus",
            parameters: object_schema(json!({"corpus_name": corpus}), &["corpus_name"]),
        },
        ToolSpec {
            name: "delete_document",
            description: "Delete one document from a corpus",
            parameters: object_schema(
                json!({
                    "corpus_name": corpus,
                    "document_id": {"type": "string", "description": "File id from get_corpus_info"}
                }),
                &["corpus_name", "document_id"],
            ),
        },
        ToolSpec {
            name: "delete_corpus",
            description: "Delete a corpus and every file in it",
            parameters: object_schema(
                json!({
                    "corpus_name": {"type": "string", "description": "Corpus to delete"},
                    "confirm": {"type": "boolean", "description": "Must be true to delete"}
                }),
                &["corpus_name", "confirm"],
            ),
        },
        ToolSpec {
            name: "get_log_content_by_filename",
            description: "Fetch the raw text of a file stored in a corpus",
            parameters: object_schema(
                json!({
                    "filename": {"type": "string", "description": "Display name, file id or resource name"},
                    "corpus_name": corpus
                }),
                &["filename", "corpus_name"],
            ),
        },
        ToolSpec {
            name: "export_corpus_files",
            description: "Save the content of every file in a corpus to a local JSON file",
            parameters: object_schema(
                json!({
                    "corpus_name": corpus,
                    "output_path": {"type": "string", "description": "Where to write the JSON file"}
                }),
                &["corpus_name", "output_path"],
            ),
        },
        ToolSpec {
            name: "analyze_logs",
            description: "Chart error trends, error types and login failures in a pipe-delimited log",
            parameters: object_schema(
                json!({
                    "corpus_name": {"type": "string", "description": "Corpus the log belongs to; names the chart files"},
                    "log_content": {"type": "string", "description": "Log text in timestamp|level|message lines"},
                    "filename": {"type": "string", "description": "File in the corpus to analyze when no log text is given"}
                }),
                &["corpus_name"],
            ),
        },
    ]
}

/// Decode tool arguments; a missing argument object counts as `{}`
fn decode<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T, ToolError> {
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments {
        tool: tool.to_string(),
        message: e.to_string(),
    })
}

/// The RAG agent: identity, instruction and tools
pub struct Agent {
    config: AgentConfig,
    toolbox: Toolbox,
    tools: Vec<ToolSpec>,
}

impl Agent {
    pub fn new(toolbox: Toolbox) -> Self {
        Self {
            config: toolbox.config().agent.clone(),
            toolbox,
            tools: tool_specs(),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub fn description(&self) -> &str {
        &self.config.description
    }

    pub fn instruction(&self) -> &'static str {
        INSTRUCTION
    }

    /// Tools in the order they are offered to the model
    pub fn tools(&self) -> &[ToolSpec] {
        &self.tools
    }

    pub fn toolbox(&self) -> &Toolbox {
        &self.toolbox
    }

    /// Run a tool call; failures are reported in the response, never raised
    pub async fn invoke(&self, tool: &str, args: Value, ctx: &mut ToolContext) -> ToolResponse {
        debug!("Invoking tool '{}' with {}", tool, args);
        match self.dispatch(tool, args, ctx).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Rejected tool call: {}", e);
                ToolResponse::error(e.to_string()).with("tool", tool)
            }
        }
    }

    async fn dispatch(
        &self,
        tool: &str,
        args: Value,
        ctx: &mut ToolContext,
    ) -> Result<ToolResponse, ToolError> {
        let tools = &self.toolbox;
        let response = match tool {
            "rag_query" => {
                let a: QueryArgs = decode(tool, args)?;
                tools.rag_query(ctx, &a.corpus_name, &a.query).await
            }
            "list_corpora" => tools.list_corpora().await,
            "create_corpus" => {
                let a: CreateCorpusArgs = decode(tool, args)?;
                tools.create_corpus(ctx, &a.corpus_name).await
            }
            "add_data" => {
                let a: AddDataArgs = decode(tool, args)?;
                tools.add_data(ctx, &a.corpus_name, &a.paths).await
            }
            "get_corpus_info" => {
                let a: CorpusArgs = decode(tool, args)?;
                tools.get_corpus_info(ctx, &a.corpus_name).await
            }
            "delete_document" => {
                let a: DeleteDocumentArgs = decode(tool, args)?;
                tools
                    .delete_document(ctx, &a.corpus_name, &a.document_id)
                    .await
            }
            "delete_corpus" => {
                let a: DeleteCorpusArgs = decode(tool, args)?;
                tools.delete_corpus(ctx, &a.corpus_name, a.confirm).await
            }
            "get_log_content_by_filename" => {
                let a: FileContentArgs = decode(tool, args)?;
                tools
                    .get_log_content_by_filename(ctx, &a.filename, &a.corpus_name)
                    .await
            }
            "export_corpus_files" => {
                let a: ExportArgs = decode(tool, args)?;
                tools
                    .export_corpus_files(ctx, &a.corpus_name, &a.output_path)
                    .await
            }
            "analyze_logs" => {
                let a: AnalyzeArgs = decode(tool, args)?;
                tools
                    .analyze_logs(
                        ctx,
                        &a.corpus_name,
                        a.log_content.as_deref(),
                        a.filename.as_deref(),
                    )
                    .await
            }
            other => return Err(ToolError::UnknownTool(other.to_string())),
        };
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::MockRagService;
    use crate::tools::test_support::toolbox;
    use crate::tools::ToolStatus;

    fn agent(service: &MockRagService) -> Agent {
        Agent::new(toolbox(service))
    }

    #[test]
    fn test_agent_identity() {
        let agent = agent(&MockRagService::new());
        assert_eq!(agent.name(), "RagAgent");
        assert_eq!(agent.model(), "gemini-2.5-flash");
        assert!(agent.instruction().contains("rag_query"));
    }

    #[test]
    fn test_every_tool_is_described() {
        let agent = agent(&MockRagService::new());
        let names: Vec<&str> = agent.tools().iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec![
                "rag_query",
                "list_corpora",
                "create_corpus",
                "add_data",
                "get_corpus_info",
                "delete_document",
                "delete_corpus",
                "get_log_content_by_filename",
                "export_corpus_files",
                "analyze_logs",
            ]
        );
        for tool in agent.tools() {
            assert_eq!(tool.parameters["type"], "object");
            assert!(agent.instruction().contains(tool.name), "{}", tool.name);
        }
    }

    #[tokio::test]
    async fn test_invoke_dispatches() {
        let service = MockRagService::new();
        service.add_corpus("logs");
        let agent = agent(&service);
        let mut ctx = ToolContext::new();

        let response = agent.invoke("list_corpora", Value::Null, &mut ctx).await;
        assert!(response.is_success());

        let response = agent
            .invoke("create_corpus", json!({"corpus_name": "logs"}), &mut ctx)
            .await;
        assert_eq!(response.status, ToolStatus::Info);

        let response = agent
            .invoke("delete_corpus", json!({"corpus_name": "logs"}), &mut ctx)
            .await;
        assert!(response.message.unwrap().contains("confirmation"));
    }

    #[tokio::test]
    async fn test_invoke_unknown_tool() {
        let agent = agent(&MockRagService::new());
        let mut ctx = ToolContext::new();
        let response = agent.invoke("format_disk", json!({}), &mut ctx).await;
        assert!(response.is_error());
        assert_eq!(response.message.as_deref(), Some("Unknown tool: format_disk"));
    }

    #[tokio::test]
    async fn test_invoke_bad_arguments() {
        let agent = agent(&MockRagService::new());
        let mut ctx = ToolContext::new();

        let response = agent
            .invoke("rag_query", json!({"corpus_name": "logs"}), &mut ctx)
            .await;
        assert!(response.is_error());
        assert!(response
            .message
            .unwrap()
            .starts_with("Invalid arguments for tool 'rag_query'"));

        let response = agent
            .invoke("add_data", json!({"paths": "gs://b/o"}), &mut ctx)
            .await;
        assert!(response.is_error());
    }
}
