//! Conversational retrieval orchestration.
//!
//! `respond` is the single entry point the web layer calls per customer
//! message. It never returns an error: language-model failures become a
//! fixed fallback answer and search failures have already degraded to an
//! empty context upstream, so the caller always gets a well-formed envelope.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::config::EngineConfig;
use crate::escalation::{self, TicketLog};
use crate::index::KnowledgeIndex;
use crate::llm_client::SharedLlmClient;
use crate::memory::ConversationMemory;
use crate::types::{ChatResponse, Role};

pub const DEFAULT_SESSION: &str = "default";

const FALLBACK_ANSWER: &str = "I'm sorry, I'm having trouble processing your request right now. Let me connect you with a human agent who can better assist you.";

/// A single conversational turn from a customer.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub query: String,
    pub session_id: String,
    pub tenant_id: Option<String>,
    pub tenant_name: Option<String>,
}

impl ChatRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            session_id: DEFAULT_SESSION.to_string(),
            ..Self::default()
        }
    }
}

pub struct SupportEngine {
    llm: SharedLlmClient,
    index: Arc<KnowledgeIndex>,
    memory: Arc<ConversationMemory>,
    tickets: Arc<TicketLog>,
    top_k: usize,
    max_context_chunks: usize,
    recent_history: usize,
}

impl SupportEngine {
    pub fn new(
        llm: SharedLlmClient,
        index: Arc<KnowledgeIndex>,
        memory: Arc<ConversationMemory>,
        tickets: Arc<TicketLog>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            llm,
            index,
            memory,
            tickets,
            top_k: config.top_k,
            max_context_chunks: config.max_context_chunks,
            recent_history: config.recent_history,
        }
    }

    #[instrument(skip_all, fields(session = %request.session_id))]
    pub async fn respond(&self, request: ChatRequest) -> ChatResponse {
        let session_id = if request.session_id.is_empty() {
            DEFAULT_SESSION
        } else {
            request.session_id.as_str()
        };

        self.memory.append(session_id, Role::Customer, &request.query);
        let conversation = self.memory.recent_block(session_id, self.recent_history);

        let results = self
            .index
            .search(&request.query, request.tenant_id.as_deref(), self.top_k)
            .await;
        let context_chunks: Vec<String> = results
            .into_iter()
            .filter(|result| !result.text.trim().is_empty())
            .take(self.max_context_chunks)
            .map(|result| result.text)
            .collect();
        info!(
            context_chunks = context_chunks.len(),
            "Knowledge base search complete"
        );

        let mut should_escalate = false;
        let mut ticket_id = None;

        let answer = if escalation::should_escalate(&request.query, &context_chunks) {
            let ticket = self.tickets.open(session_id, &request.query);
            info!(ticket = %ticket.ticket_id, "Escalating to a support ticket");
            should_escalate = true;
            let acknowledgment = format!(
                "I understand you need assistance with this matter. I've created a support ticket ({}) and our team will follow up with you shortly. Is there anything else I can help you with in the meantime?",
                ticket.ticket_id
            );
            ticket_id = Some(ticket.ticket_id);
            acknowledgment
        } else {
            let prompt = if context_chunks.is_empty() {
                general_prompt(&request.query, &conversation, request.tenant_name.as_deref())
            } else {
                grounded_prompt(
                    &context_chunks,
                    &request.query,
                    &conversation,
                    request.tenant_name.as_deref(),
                )
            };

            match self.llm.complete(&prompt).await {
                Ok(text) => text.trim().to_string(),
                Err(err) => {
                    warn!(?err, "LLM completion failed; using fallback answer");
                    FALLBACK_ANSWER.to_string()
                }
            }
        };

        self.memory.append(session_id, Role::Assistant, &answer);

        ChatResponse {
            answer,
            sources: context_chunks,
            session_id: session_id.to_string(),
            should_escalate,
            ticket_id,
        }
    }
}

fn tenant_framing(tenant_name: Option<&str>) -> String {
    match tenant_name {
        Some(name) => format!("You are helping customers of {name}."),
        None => "You are helping customers of a business.".to_string(),
    }
}

fn conversation_section(conversation: &str) -> String {
    if conversation.is_empty() {
        String::new()
    } else {
        format!("\nPrevious Conversation:\n{conversation}\n")
    }
}

/// Prompt for answers grounded in retrieved knowledge-base chunks.
fn grounded_prompt(
    context_chunks: &[String],
    question: &str,
    conversation: &str,
    tenant_name: Option<&str>,
) -> String {
    format!(
        "You are a friendly and helpful AI chatbot assisting customers.\n\
{framing}\n\
{conversation}\
Knowledge Base:\n\
{context}\n\
\n\
Customer's Question: {question}\n\
\n\
Instructions:\n\
- Respond in a polite, clear, and helpful tone\n\
- Use plain language and be conversational\n\
- If you can answer based on the knowledge base, provide a comprehensive response\n\
- If you cannot find relevant information, politely say you need to connect them with a human agent\n\
- Do not mention internal tools or technical details\n\
- Keep responses focused and not too lengthy\n\
\n\
Response:",
        framing = tenant_framing(tenant_name),
        conversation = conversation_section(conversation),
        context = context_chunks.join("\n"),
    )
}

/// Prompt for a generic, conversationally appropriate reply when nothing was
/// retrieved. Explicitly avoids claiming specific knowledge.
fn general_prompt(question: &str, conversation: &str, tenant_name: Option<&str>) -> String {
    format!(
        "You are a friendly and helpful AI customer service assistant.\n\
{framing}\n\
{conversation}\
\n\
Customer's Question: {question}\n\
\n\
Instructions:\n\
- Respond in a polite, helpful, and conversational tone\n\
- Try to provide general guidance or suggestions based on the question\n\
- If you cannot provide specific information, offer to help in other ways\n\
- Be empathetic and understanding\n\
- Keep responses concise but helpful\n\
- Do not mention that you lack specific information about the company\n\
- If the question seems like it needs human assistance, suggest they can contact support\n\
\n\
Response:",
        framing = tenant_framing(tenant_name),
        conversation = conversation_section(conversation),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::index::memory::MemoryVectorIndex;
    use crate::llm_client::LlmClient;
    use crate::types::Chunk;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records prompts and returns a fixed answer.
    struct ScriptedLlm {
        prompts: Mutex<Vec<String>>,
        answer: &'static str,
    }

    impl ScriptedLlm {
        fn shared(answer: &'static str) -> Arc<Self> {
            Arc::new(Self {
                prompts: Mutex::new(Vec::new()),
                answer,
            })
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().expect("prompt log poisoned").clone()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
            self.prompts
                .lock()
                .expect("prompt log poisoned")
                .push(prompt.to_string());
            Ok(self.answer.to_string())
        }
    }

    struct FailingLlm;

    #[async_trait]
    impl LlmClient for FailingLlm {
        async fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
            Err(anyhow!("model endpoint unreachable"))
        }
    }

    fn chunk(id: &str, tenant: &str, text: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            tenant_id: tenant.to_string(),
            category: "General Knowledge".into(),
            source_document: "faq.md".into(),
            title: format!("title {id}"),
            text: text.to_string(),
        }
    }

    struct Harness {
        engine: SupportEngine,
        index: Arc<KnowledgeIndex>,
        memory: Arc<ConversationMemory>,
        tickets: Arc<TicketLog>,
    }

    fn engine_with(llm: SharedLlmClient) -> Harness {
        let index = Arc::new(KnowledgeIndex::new(
            Arc::new(MemoryVectorIndex::default()),
            Arc::new(HashEmbedder::new(256)),
        ));
        let memory = Arc::new(ConversationMemory::default());
        let tickets = Arc::new(TicketLog::default());
        let engine = SupportEngine::new(
            llm,
            index.clone(),
            memory.clone(),
            tickets.clone(),
            &EngineConfig::default(),
        );
        Harness {
            engine,
            index,
            memory,
            tickets,
        }
    }

    #[tokio::test]
    async fn grounded_answer_cites_retrieved_sources() {
        let llm = ScriptedLlm::shared("You can return items within thirty days.");
        let harness = engine_with(llm.clone());

        harness
            .index
            .upsert_chunks(&[chunk(
                "returns",
                "acme",
                "customers may return items within thirty days for a full store credit",
            )])
            .await
            .expect("upsert");

        let mut request = ChatRequest::new("can customers return items within thirty days");
        request.tenant_id = Some("acme".into());
        request.tenant_name = Some("Acme".into());
        let response = harness.engine.respond(request).await;

        assert_eq!(response.answer, "You can return items within thirty days.");
        assert!(!response.should_escalate);
        assert!(response.ticket_id.is_none());
        assert_eq!(response.sources.len(), 1);
        assert!(response.sources[0].contains("return items within thirty days"));

        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Knowledge Base:"));
        assert!(prompts[0].contains("You are helping customers of Acme."));
    }

    #[tokio::test]
    async fn empty_context_uses_general_prompt() {
        let llm = ScriptedLlm::shared("Happy to help in general terms.");
        let harness = engine_with(llm.clone());

        let response = harness
            .engine
            .respond(ChatRequest::new("do you sell gift cards"))
            .await;

        assert_eq!(response.answer, "Happy to help in general terms.");
        assert!(response.sources.is_empty());
        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(!prompts[0].contains("Knowledge Base:"));
        assert!(prompts[0].contains("general guidance"));
    }

    #[tokio::test]
    async fn escalation_skips_the_language_model() {
        let llm = ScriptedLlm::shared("should never be used");
        let harness = engine_with(llm.clone());

        let response = harness
            .engine
            .respond(ChatRequest::new("I want a refund"))
            .await;

        assert!(response.should_escalate);
        let ticket_id = response.ticket_id.expect("ticket id");
        assert!(ticket_id.starts_with("TCKT-"));
        assert!(response.answer.contains(&ticket_id));
        assert!(llm.prompts().is_empty());
        assert!(harness.tickets.get(&ticket_id).is_some());
    }

    #[tokio::test]
    async fn llm_failure_degrades_to_fallback_answer() {
        let harness = engine_with(Arc::new(FailingLlm));

        let response = harness
            .engine
            .respond(ChatRequest::new("what are your hours"))
            .await;

        assert_eq!(response.answer, FALLBACK_ANSWER);
        assert!(!response.should_escalate);
        // The interaction is still recorded in memory.
        let summary = harness.memory.summary(DEFAULT_SESSION);
        assert_eq!(summary.total_exchanges, 2);
        assert_eq!(summary.messages[1].content, FALLBACK_ANSWER);
    }

    #[tokio::test]
    async fn conversation_memory_flows_into_the_prompt() {
        let llm = ScriptedLlm::shared("Sure thing.");
        let harness = engine_with(llm.clone());

        let mut first = ChatRequest::new("hello there");
        first.session_id = "s1".into();
        harness.engine.respond(first).await;

        let mut second = ChatRequest::new("and what about shipping");
        second.session_id = "s1".into();
        harness.engine.respond(second).await;

        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].contains("Previous Conversation:"));
        assert!(prompts[1].contains("User: hello there"));
        assert!(prompts[1].contains("Assistant: Sure thing."));
    }

    #[tokio::test]
    async fn empty_session_id_falls_back_to_default() {
        let llm = ScriptedLlm::shared("ok");
        let harness = engine_with(llm);

        let mut request = ChatRequest::new("hello");
        request.session_id = String::new();
        let response = harness.engine.respond(request).await;

        assert_eq!(response.session_id, DEFAULT_SESSION);
        assert_eq!(harness.memory.summary(DEFAULT_SESSION).total_exchanges, 2);
    }
}
