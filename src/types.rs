use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::extract::FileKind;

/// Who authored a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Assistant,
}

impl Role {
    /// Label used when formatting conversation history into a prompt.
    pub fn label(&self) -> &'static str {
        match self {
            Role::Customer => "User",
            Role::Assistant => "Assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Descriptor of a tenant-scoped upload. The raw bytes live in the
/// [`crate::ingest::Upload`] that produced it; once extracted, the document
/// is superseded by its chunks for retrieval purposes.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    /// blake3 hex digest of the raw upload bytes.
    pub id: String,
    pub tenant_id: String,
    pub category: String,
    pub source_name: String,
    pub kind: FileKind,
    pub byte_len: usize,
}

/// A unit of retrievable text carved out of a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub tenant_id: String,
    pub category: String,
    pub source_document: String,
    pub title: String,
    pub text: String,
}

/// One similarity-search hit, hydrated from index metadata. Ephemeral;
/// never persisted by this subsystem.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub id: String,
    pub score: f32,
    pub tenant_id: String,
    pub category: String,
    pub source_document: String,
    pub text: String,
    pub title: String,
}

/// The envelope returned to the conversational caller. Always well-formed;
/// failures inside the engine degrade to fallback answers or escalations.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub answer: String,
    pub sources: Vec<String>,
    pub session_id: String,
    pub should_escalate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub total_exchanges: usize,
    pub messages: Vec<Message>,
}

/// Lightweight record of an escalation. Linking it to a real support ticket
/// belongs to the ticketing subsystem.
#[derive(Debug, Clone, Serialize)]
pub struct TicketStub {
    pub ticket_id: String,
    pub session_id: String,
    pub issue: String,
    pub timestamp: DateTime<Utc>,
}
