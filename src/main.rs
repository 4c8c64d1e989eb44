use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use corpus_agent::agent::Agent;
use corpus_agent::config::Config;
use corpus_agent::rag::VertexRagService;
use corpus_agent::tools::{ToolContext, ToolResponse, Toolbox};
use log::{error, info};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Command-line arguments for the corpus agent
#[derive(Parser)]
#[command(
    name = "corpus-agent",
    about = "RAG agent tools for Vertex AI corpora, with log analysis charts",
    long_about = "Runs the agent's tools directly: manage and query Vertex AI RAG corpora, \
                  read documents back out of them, and turn pipe-delimited log files into \
                  error and login charts."
)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        global = true,
        value_name = "FILE",
        help = "Configuration file path (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(
        short,
        long,
        global = true,
        help = "Enable verbose logging output (sets RUST_LOG=debug)"
    )]
    verbose: bool,

    /// Session file keeping the current corpus between invocations
    #[arg(long, global = true, value_name = "FILE")]
    session: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum Command {
    /// Query a corpus
    RagQuery {
        query: String,
        #[arg(long, default_value = "")]
        corpus: String,
    },
    /// List all corpora
    ListCorpora,
    /// Create a corpus
    CreateCorpus { name: String },
    /// Import Drive URLs or gs:// paths into a corpus
    AddData {
        #[arg(required = true)]
        paths: Vec<String>,
        #[arg(long, default_value = "")]
        corpus: String,
    },
    /// Show the files of a corpus
    GetCorpusInfo {
        #[arg(long, default_value = "")]
        corpus: String,
    },
    /// Delete one document from a corpus
    DeleteDocument {
        document_id: String,
        #[arg(long, default_value = "")]
        corpus: String,
    },
    /// Delete a corpus and all its files
    DeleteCorpus {
        name: String,
        #[arg(long)]
        confirm: bool,
    },
    /// Print the content of a file stored in a corpus
    GetLogContent {
        filename: String,
        #[arg(long, default_value = "")]
        corpus: String,
    },
    /// Save every file of a corpus to a JSON file
    ExportCorpusFiles {
        output: PathBuf,
        #[arg(long, default_value = "")]
        corpus: String,
    },
    /// Chart a log read from a local file or from a corpus file
    AnalyzeLogs {
        #[arg(long, default_value = "")]
        corpus: String,
        /// Local log file
        #[arg(long, value_name = "PATH", conflicts_with = "filename")]
        file: Option<PathBuf>,
        /// File stored in the corpus
        #[arg(long)]
        filename: Option<String>,
    },
    /// Print the tool descriptions as JSON
    Tools,
    /// Print the agent instruction
    Instruction,
    /// Query a corpus, save the hits, then analyze the corpus' first file
    Pipeline {
        query: String,
        #[arg(long)]
        corpus: String,
        #[arg(long, default_value = "queried_logs.txt")]
        output: PathBuf,
    },
}

impl Command {
    /// Tool name and JSON arguments for commands that map to a single tool call
    fn tool_call(&self) -> Result<Option<(&'static str, Value)>> {
        let call = match self {
            Command::RagQuery { query, corpus } => {
                ("rag_query", json!({"corpus_name": corpus, "query": query}))
            }
            Command::ListCorpora => ("list_corpora", json!({})),
            Command::CreateCorpus { name } => ("create_corpus", json!({"corpus_name": name})),
            Command::AddData { paths, corpus } => {
                ("add_data", json!({"corpus_name": corpus, "paths": paths}))
            }
            Command::GetCorpusInfo { corpus } => {
                ("get_corpus_info", json!({"corpus_name": corpus}))
            }
            Command::DeleteDocument {
                document_id,
                corpus,
            } => (
                "delete_document",
                json!({"corpus_name": corpus, "document_id": document_id}),
            ),
            Command::DeleteCorpus { name, confirm } => (
                "delete_corpus",
                json!({"corpus_name": name, "confirm": confirm}),
            ),
            Command::GetLogContent { filename, corpus } => (
                "get_log_content_by_filename",
                json!({"filename": filename, "corpus_name": corpus}),
            ),
            Command::ExportCorpusFiles { output, corpus } => (
                "export_corpus_files",
                json!({"corpus_name": corpus, "output_path": output}),
            ),
            Command::AnalyzeLogs {
                corpus,
                file,
                filename,
            } => {
                let log_content = match file {
                    Some(path) => Some(
                        std::fs::read_to_string(path)
                            .with_context(|| format!("Failed to read {}", path.display()))?,
                    ),
                    None => None,
                };
                (
                    "analyze_logs",
                    json!({
                        "corpus_name": corpus,
                        "log_content": log_content,
                        "filename": filename,
                    }),
                )
            }
            Command::Tools | Command::Instruction | Command::Pipeline { .. } => return Ok(None),
        };
        Ok(Some(call))
    }
}

impl Cli {
    /// Validate the CLI arguments
    ///
    /// # Returns
    ///
    /// `Ok(())` if all arguments are valid, `Err(String)` with error message otherwise
    fn validate(&self) -> Result<(), String> {
        // Missing files fall back to defaults; only reject paths that exist
        // but are not regular files
        for (label, path) in [("Configuration", &self.config), ("Session", &self.session)] {
            if let Some(path) = path {
                if path.exists() && !path.is_file() {
                    return Err(format!("{} path is not a file: {}", label, path.display()));
                }
            }
        }
        Ok(())
    }

    /// Get the configuration file path
    fn config_path(&self) -> Option<&Path> {
        self.config.as_deref()
    }
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Query, save hits as text, then analyze the first file of the corpus
async fn run_pipeline(
    agent: &Agent,
    ctx: &mut ToolContext,
    corpus: &str,
    query: &str,
    output: &Path,
) -> Result<Vec<ToolResponse>> {
    let mut steps = Vec::new();

    let queried = agent
        .invoke("rag_query", json!({"corpus_name": corpus, "query": query}), ctx)
        .await;
    if !queried.is_success() {
        steps.push(queried);
        return Ok(steps);
    }

    let mut text = String::new();
    if let Some(results) = queried.field("results").and_then(Value::as_array) {
        for entry in results {
            text.push_str(entry["text"].as_str().unwrap_or_default());
            text.push('\n');
        }
    }
    std::fs::write(output, text)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    info!("Query results saved to {}", output.display());
    steps.push(queried);

    let corpus_info = agent
        .invoke("get_corpus_info", json!({"corpus_name": corpus}), ctx)
        .await;
    let first_file = corpus_info
        .field("files")
        .and_then(|files| files.get(0))
        .and_then(|file| file["display_name"].as_str())
        .map(str::to_string);
    let first_file = match first_file {
        Some(name) => name,
        None => {
            let failed = if corpus_info.is_success() {
                ToolResponse::error(format!("Corpus '{}' has no files to analyze", corpus))
            } else {
                corpus_info
            };
            steps.push(failed);
            return Ok(steps);
        }
    };

    let analysis = agent
        .invoke(
            "analyze_logs",
            json!({"corpus_name": corpus, "filename": first_file}),
            ctx,
        )
        .await;
    steps.push(analysis);
    Ok(steps)
}

/// Run the selected command; returns false when a tool reported an error
async fn run(cli: Cli) -> Result<bool> {
    let config = Config::load(cli.config_path()).context("Failed to load configuration")?;
    let service = VertexRagService::new(&config.service)
        .context("Failed to create the retrieval service client")?;
    let agent = Agent::new(Toolbox::new(Arc::new(service), config));
    info!("{} ready ({})", agent.name(), agent.model());

    let mut ctx = match &cli.session {
        Some(path) => ToolContext::load(path)
            .with_context(|| format!("Failed to load session {}", path.display()))?,
        None => ToolContext::new(),
    };

    let ok = match &cli.command {
        Command::Tools => {
            print_json(&serde_json::to_value(agent.tools())?)?;
            true
        }
        Command::Instruction => {
            println!("{}", agent.instruction());
            true
        }
        Command::Pipeline {
            query,
            corpus,
            output,
        } => {
            let steps = run_pipeline(&agent, &mut ctx, corpus, query, output).await?;
            let ok = steps.iter().all(|s| !s.is_error());
            let steps: Vec<Value> = steps.iter().map(ToolResponse::to_json).collect();
            print_json(&Value::Array(steps))?;
            ok
        }
        command => {
            let (tool, args) = command
                .tool_call()?
                .context("Command does not map to a tool")?;
            let response = agent.invoke(tool, args, &mut ctx).await;
            print_json(&response.to_json())?;
            !response.is_error()
        }
    };

    if let Some(path) = &cli.session {
        ctx.save(path)
            .with_context(|| format!("Failed to save session {}", path.display()))?;
    }
    Ok(ok)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    if cli.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    env_logger::init();

    if let Err(e) = cli.validate() {
        error!("Invalid arguments: {}", e);
        eprintln!("Invalid arguments: {}", e);
        std::process::exit(1);
    }

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corpus_agent::rag::{MockRagService, RetrievedContext};
    use tempfile::{NamedTempFile, TempDir};

    const LOG: &str = "\
2024-03-04 09:10:00|ERROR|ERROR_DB connection lost
2024-03-04 09:12:00|WARNING|Failed login for user eve@example.com
2024-03-05 14:00:00|INFO|nightly backup done
";

    fn pipeline_agent(service: &MockRagService, output_dir: &Path) -> Agent {
        let mut config = Config::default();
        config.analysis.output_dir = output_dir.to_path_buf();
        Agent::new(Toolbox::new(Arc::new(service.clone()), config))
    }

    fn hit(text: &str) -> RetrievedContext {
        RetrievedContext {
            source_uri: Some("gs://mock-bucket/app.log".to_string()),
            source_display_name: Some("app.log".to_string()),
            text: text.to_string(),
            score: Some(0.2),
        }
    }

    fn cli(config: Option<PathBuf>, session: Option<PathBuf>) -> Cli {
        Cli {
            config,
            verbose: false,
            session,
            command: Command::ListCorpora,
        }
    }

    #[test]
    fn test_cli_validation_with_existing_file() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "[service]\nproject_id = \"p\"").unwrap();
        assert!(cli(Some(file.path().to_path_buf()), None).validate().is_ok());
    }

    #[test]
    fn test_cli_validation_with_missing_file() {
        // Missing files are handled gracefully
        let cli = cli(Some(PathBuf::from("/nonexistent/config.toml")), None);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_cli_validation_with_directory() {
        let dir = TempDir::new().unwrap();
        assert!(cli(Some(dir.path().to_path_buf()), None).validate().is_err());
        assert!(cli(None, Some(dir.path().to_path_buf())).validate().is_err());
    }

    #[test]
    fn test_cli_validation_no_config() {
        assert!(cli(None, None).validate().is_ok());
        assert_eq!(cli(None, None).config_path(), None);
    }

    #[test]
    fn test_parse_subcommands() {
        let cli = Cli::parse_from([
            "corpus-agent",
            "--verbose",
            "rag-query",
            "what failed",
            "--corpus",
            "logs",
        ]);
        assert!(cli.verbose);
        assert_eq!(
            cli.command,
            Command::RagQuery {
                query: "what failed".to_string(),
                corpus: "logs".to_string()
            }
        );

        let cli = Cli::parse_from(["corpus-agent", "delete-corpus", "logs", "--confirm"]);
        assert_eq!(
            cli.command,
            Command::DeleteCorpus {
                name: "logs".to_string(),
                confirm: true
            }
        );
    }

    #[test]
    fn test_add_data_requires_paths() {
        assert!(Cli::try_parse_from(["corpus-agent", "add-data"]).is_err());
    }

    #[test]
    fn test_tool_call_mapping() {
        let command = Command::AddData {
            paths: vec!["gs://b/o".to_string()],
            corpus: String::new(),
        };
        let (tool, args) = command.tool_call().unwrap().unwrap();
        assert_eq!(tool, "add_data");
        assert_eq!(args, json!({"corpus_name": "", "paths": ["gs://b/o"]}));

        assert!(Command::Tools.tool_call().unwrap().is_none());
    }

    #[test]
    fn test_analyze_reads_local_file() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "2024-01-01 00:00:00|ERROR|ERROR_X boom").unwrap();

        let command = Command::AnalyzeLogs {
            corpus: "c".to_string(),
            file: Some(file.path().to_path_buf()),
            filename: None,
        };
        let (tool, args) = command.tool_call().unwrap().unwrap();
        assert_eq!(tool, "analyze_logs");
        assert_eq!(args["log_content"], "2024-01-01 00:00:00|ERROR|ERROR_X boom");

        let missing = Command::AnalyzeLogs {
            corpus: "c".to_string(),
            file: Some(PathBuf::from("/nonexistent/app.log")),
            filename: None,
        };
        assert!(missing.tool_call().is_err());
    }

    #[tokio::test]
    async fn test_pipeline_saves_hits_and_analyzes_first_file() {
        let dir = TempDir::new().unwrap();
        let service = MockRagService::new();
        let corpus = service.add_corpus("logs");
        service.add_file(&corpus, "app.log", LOG);
        service.set_contexts(
            &corpus,
            vec![hit("ERROR_DB connection lost"), hit("Failed login for user eve")],
        );
        let agent = pipeline_agent(&service, dir.path());
        let mut ctx = ToolContext::new();

        let output = dir.path().join("queried_logs.txt");
        let steps = run_pipeline(&agent, &mut ctx, "logs", "show errors", &output)
            .await
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(&output).unwrap(),
            "ERROR_DB connection lost\nFailed login for user eve\n"
        );
        assert_eq!(steps.len(), 3);
        assert!(steps.iter().all(|s| s.is_success()));

        let summary = steps[2].field("summary").unwrap();
        assert_eq!(summary["records_parsed"], 3);
        assert_eq!(summary["total_errors"], 1);
        assert_eq!(summary["failed_logins"]["eve@example.com"], 1);
        assert!(dir.path().join("logs_error_trends.svg").exists());
    }

    #[tokio::test]
    async fn test_pipeline_stops_when_corpus_has_no_files() {
        let dir = TempDir::new().unwrap();
        let service = MockRagService::new();
        let corpus = service.add_corpus("logs");
        service.set_contexts(&corpus, vec![hit("ERROR_DB connection lost")]);
        let agent = pipeline_agent(&service, dir.path());
        let mut ctx = ToolContext::new();

        let output = dir.path().join("queried_logs.txt");
        let steps = run_pipeline(&agent, &mut ctx, "logs", "show errors", &output)
            .await
            .unwrap();

        assert_eq!(steps.len(), 2);
        assert!(output.exists());
        let last = steps.last().unwrap();
        assert!(last.is_error());
        assert_eq!(
            last.message.as_deref(),
            Some("Corpus 'logs' has no files to analyze")
        );
    }

    #[tokio::test]
    async fn test_pipeline_stops_without_query_hits() {
        let dir = TempDir::new().unwrap();
        let service = MockRagService::new();
        service.add_corpus("logs");
        let agent = pipeline_agent(&service, dir.path());
        let mut ctx = ToolContext::new();

        let output = dir.path().join("queried_logs.txt");
        let steps = run_pipeline(&agent, &mut ctx, "logs", "show errors", &output)
            .await
            .unwrap();

        assert_eq!(steps.len(), 1);
        assert!(!steps[0].is_success());
        assert!(!output.exists());
    }
}
