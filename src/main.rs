mod chunker;
mod config;
mod embedding;
mod error;
mod escalation;
mod extract;
mod index;
mod ingest;
mod llm_client;
mod memory;
mod orchestrator;
mod types;

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use chunker::ChunkParams;
use config::{EngineConfig, IndexConfig};
use embedding::{Embedder, HashEmbedder};
use escalation::TicketLog;
use index::memory::MemoryVectorIndex;
use index::remote::{HttpVectorIndex, RemoteIndex};
use index::KnowledgeIndex;
use ingest::{IngestPipeline, Upload};
use llm_client::build_llm_client_from_env;
use memory::ConversationMemory;
use orchestrator::{ChatRequest, SupportEngine, DEFAULT_SESSION};

#[derive(Parser, Debug)]
#[command(
    name = "deskmind",
    about = "Knowledge ingestion and conversational retrieval engine for customer support"
)]
struct Cli {
    /// Optional one-shot question; if omitted the CLI enters interactive chat.
    #[arg(short, long)]
    prompt: Option<String>,

    /// Session key scoping the conversation memory.
    #[arg(long, default_value = DEFAULT_SESSION)]
    session: String,

    /// Tenant id used to scope knowledge base retrieval.
    #[arg(long)]
    tenant: Option<String>,

    /// Tenant display name used in prompts.
    #[arg(long)]
    tenant_name: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract, chunk, embed, and upsert one document into the knowledge base.
    Ingest {
        /// Path to the file to ingest (pdf, txt, md, markdown).
        path: String,
        /// Owning tenant id.
        #[arg(long)]
        tenant: String,
        /// Knowledge category attached to every chunk.
        #[arg(long)]
        category: Option<String>,
    },
    /// Run a raw similarity search against the knowledge base.
    Search {
        query: String,
        #[arg(long)]
        tenant: Option<String>,
        #[arg(long, default_value_t = 10)]
        top_k: usize,
    },
    /// Show vector counts and dimension for a tenant's knowledge base.
    Stats {
        #[arg(long)]
        tenant: String,
    },
    /// Delete a tenant's knowledge base, optionally one source document.
    DeleteKb {
        #[arg(long)]
        tenant: String,
        /// Restrict the delete to chunks from this source document.
        #[arg(long)]
        source: Option<String>,
    },
    /// Print the stored conversation for a session.
    SessionSummary { session: String },
    /// Forget a session's conversation memory.
    ClearSession { session: String },
}

struct EngineHandles {
    engine: SupportEngine,
    pipeline: IngestPipeline,
    index: Arc<KnowledgeIndex>,
    memory: Arc<ConversationMemory>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let Cli {
        prompt,
        session,
        tenant,
        tenant_name,
        command,
    } = Cli::parse();

    let handles = build_engine()?;

    if let Some(command) = command {
        match command {
            Commands::Ingest {
                path,
                tenant,
                category,
            } => run_ingest(&handles.pipeline, &path, &tenant, category.as_deref()).await?,
            Commands::Search {
                query,
                tenant,
                top_k,
            } => run_search(&handles.index, &query, tenant.as_deref(), top_k).await,
            Commands::Stats { tenant } => {
                let stats = handles.index.stats(&tenant).await;
                println!("{}", serde_json::to_string_pretty(&stats)?);
            }
            Commands::DeleteKb { tenant, source } => {
                let deleted = handles
                    .index
                    .delete_by_tenant(&tenant, source.as_deref())
                    .await;
                println!(
                    "{}",
                    if deleted {
                        "Knowledge base entries deleted."
                    } else {
                        "Delete failed; see logs."
                    }
                );
            }
            Commands::SessionSummary { session } => {
                let summary = handles.memory.summary(&session);
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
            Commands::ClearSession { session } => {
                let existed = handles.memory.clear(&session);
                println!(
                    "{}",
                    if existed {
                        "Session cleared."
                    } else {
                        "No such session."
                    }
                );
            }
        }
        return Ok(());
    }

    if let Some(prompt) = prompt {
        let response = handles
            .engine
            .respond(chat_request(prompt, &session, &tenant, &tenant_name))
            .await;
        print_response(&response);
        return Ok(());
    }

    run_chat_loop(&handles.engine, &session, &tenant, &tenant_name).await
}

fn build_engine() -> anyhow::Result<EngineHandles> {
    let engine_config = EngineConfig::from_env();
    let params = ChunkParams::new(engine_config.chunk_size, engine_config.chunk_overlap)
        .context("Invalid chunking configuration")?;

    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(engine_config.vector_dim));

    let remote: Arc<dyn RemoteIndex> = match IndexConfig::from_env() {
        Ok(index_config) => {
            info!(base_url = %index_config.base_url, "Using remote vector index");
            Arc::new(HttpVectorIndex::new(index_config)?)
        }
        Err(err) => {
            warn!(
                ?err,
                "No vector index endpoint configured; using in-memory index for this process"
            );
            Arc::new(MemoryVectorIndex::default())
        }
    };

    let index = Arc::new(KnowledgeIndex::new(remote, embedder));
    let memory = Arc::new(ConversationMemory::new(engine_config.max_history));
    let tickets = Arc::new(TicketLog::default());
    let llm = build_llm_client_from_env(true).context("LLM client initialization failed")?;

    let engine = SupportEngine::new(llm, index.clone(), memory.clone(), tickets, &engine_config);
    let pipeline = IngestPipeline::new(index.clone(), params);

    Ok(EngineHandles {
        engine,
        pipeline,
        index,
        memory,
    })
}

fn chat_request(
    query: String,
    session: &str,
    tenant: &Option<String>,
    tenant_name: &Option<String>,
) -> ChatRequest {
    let mut request = ChatRequest::new(query);
    request.session_id = session.to_string();
    request.tenant_id = tenant.clone();
    request.tenant_name = tenant_name.clone();
    request
}

async fn run_ingest(
    pipeline: &IngestPipeline,
    path: &str,
    tenant: &str,
    category: Option<&str>,
) -> anyhow::Result<()> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {path}"))?;
    let name = Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(path)
        .to_string();

    let report = pipeline
        .ingest_document(
            Upload {
                name,
                mime_type: None,
                bytes,
            },
            tenant,
            category,
        )
        .await?;

    println!(
        "Successfully processed {} knowledge chunks from {}.",
        report.chunks_processed, report.document.source_name
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run_search(index: &KnowledgeIndex, query: &str, tenant: Option<&str>, top_k: usize) {
    let results = index.search(query, tenant, top_k).await;
    if results.is_empty() {
        println!("No matches.");
        return;
    }
    for result in results {
        println!(
            "[{:.4}] {} ({}) {}",
            result.score, result.title, result.source_document, result.id
        );
    }
}

fn print_response(response: &types::ChatResponse) {
    println!("\nAssistant:\n{}\n", response.answer);
    if response.should_escalate {
        if let Some(ticket_id) = &response.ticket_id {
            println!("[escalated: {ticket_id}]");
        }
    }
    if !response.sources.is_empty() {
        println!("({} knowledge base sources used)", response.sources.len());
    }
}

async fn run_chat_loop(
    engine: &SupportEngine,
    session: &str,
    tenant: &Option<String>,
    tenant_name: &Option<String>,
) -> anyhow::Result<()> {
    println!("DeskMind support chat ready. Type 'exit' to quit.\n");
    let stdin = io::stdin();

    loop {
        print!("You > ");
        io::stdout().flush()?;

        let mut buffer = String::new();
        if stdin.read_line(&mut buffer)? == 0 {
            break;
        }
        let trimmed = buffer.trim();

        if trimmed.is_empty() {
            continue;
        }
        if trimmed.eq_ignore_ascii_case("exit") {
            info!("User exited chat");
            break;
        }

        let response = engine
            .respond(chat_request(
                trimmed.to_string(),
                session,
                tenant,
                tenant_name,
            ))
            .await;
        print_response(&response);
    }

    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_accepts_prompt_flag_headlessly() {
        let cli = Cli::parse_from(["deskmind", "--prompt", "where is my order"]);
        assert_eq!(cli.prompt.as_deref(), Some("where is my order"));
        assert_eq!(cli.session, DEFAULT_SESSION);
        assert!(cli.command.is_none());
    }

    #[test]
    fn cli_parses_ingest_subcommand() {
        let cli = Cli::parse_from([
            "deskmind", "ingest", "docs/faq.md", "--tenant", "acme", "--category", "Billing",
        ]);
        match cli.command {
            Some(Commands::Ingest {
                path,
                tenant,
                category,
            }) => {
                assert_eq!(path, "docs/faq.md");
                assert_eq!(tenant, "acme");
                assert_eq!(category.as_deref(), Some("Billing"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn cli_search_defaults_top_k() {
        let cli = Cli::parse_from(["deskmind", "search", "refund policy"]);
        match cli.command {
            Some(Commands::Search {
                query,
                top_k,
                tenant,
            }) => {
                assert_eq!(query, "refund policy");
                assert_eq!(top_k, 10);
                assert!(tenant.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn cli_help_is_emitted_as_error_kind() {
        let err = Cli::command()
            .try_get_matches_from(["deskmind", "--help"])
            .expect_err("help should short-circuit");
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}
