//! Bounded per-session conversation memory.
//!
//! Process-scoped and explicitly not durable: restarting the engine forgets
//! every session. The store is injectable (constructed once and shared via
//! `Arc`) so a durable or distributed implementation can replace it later.

use chrono::Utc;
use dashmap::DashMap;

use crate::types::{Message, Role, SessionSummary};

pub const DEFAULT_MAX_HISTORY: usize = 10;
pub const DEFAULT_RECENT_HISTORY: usize = 5;

pub struct ConversationMemory {
    sessions: DashMap<String, Vec<Message>>,
    max_history: usize,
}

impl ConversationMemory {
    pub fn new(max_history: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            max_history: max_history.max(1),
        }
    }

    /// Append a message, evicting the oldest entries past the bound. The
    /// push and the eviction happen under one entry lock, so the bound holds
    /// even with concurrent appends to the same session.
    pub fn append(&self, session_id: &str, role: Role, content: &str) {
        let mut entry = self.sessions.entry(session_id.to_string()).or_default();
        entry.push(Message {
            role,
            content: content.to_string(),
            timestamp: Utc::now(),
        });
        let len = entry.len();
        if len > self.max_history {
            entry.drain(..len - self.max_history);
        }
    }

    /// The last `n` messages for a session, oldest first.
    pub fn recent(&self, session_id: &str, n: usize) -> Vec<Message> {
        self.sessions
            .get(session_id)
            .map(|messages| {
                let start = messages.len().saturating_sub(n);
                messages[start..].to_vec()
            })
            .unwrap_or_default()
    }

    /// The last `n` messages formatted as prompt-ready lines.
    pub fn recent_block(&self, session_id: &str, n: usize) -> String {
        self.recent(session_id, n)
            .iter()
            .map(|message| format!("{}: {}", message.role.label(), message.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Drop a session entirely. Returns whether it existed.
    pub fn clear(&self, session_id: &str) -> bool {
        self.sessions.remove(session_id).is_some()
    }

    pub fn summary(&self, session_id: &str) -> SessionSummary {
        let messages = self
            .sessions
            .get(session_id)
            .map(|messages| messages.value().clone())
            .unwrap_or_default();
        SessionSummary {
            session_id: session_id.to_string(),
            total_exchanges: messages.len(),
            messages,
        }
    }
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_keeps_only_the_most_recent_entries() {
        let memory = ConversationMemory::new(10);
        for i in 0..15 {
            memory.append("s1", Role::Customer, &format!("message {i}"));
        }

        let summary = memory.summary("s1");
        assert_eq!(summary.total_exchanges, 10);
        assert_eq!(summary.messages[0].content, "message 5");
        assert_eq!(summary.messages[9].content, "message 14");
    }

    #[test]
    fn recent_returns_last_n_in_insertion_order() {
        let memory = ConversationMemory::default();
        memory.append("s1", Role::Customer, "hello");
        memory.append("s1", Role::Assistant, "hi, how can I help?");
        memory.append("s1", Role::Customer, "where is my order");

        let recent = memory.recent("s1", 2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "hi, how can I help?");
        assert_eq!(recent[1].content, "where is my order");
    }

    #[test]
    fn recent_block_labels_roles() {
        let memory = ConversationMemory::default();
        memory.append("s1", Role::Customer, "hello");
        memory.append("s1", Role::Assistant, "hi there");

        let block = memory.recent_block("s1", DEFAULT_RECENT_HISTORY);
        assert_eq!(block, "User: hello\nAssistant: hi there");
    }

    #[test]
    fn sessions_are_independent() {
        let memory = ConversationMemory::default();
        memory.append("s1", Role::Customer, "from s1");
        memory.append("s2", Role::Customer, "from s2");

        assert_eq!(memory.recent("s1", 5).len(), 1);
        assert_eq!(memory.recent("s2", 5).len(), 1);
        assert!(memory.recent("s3", 5).is_empty());
    }

    #[test]
    fn clear_reports_whether_session_existed() {
        let memory = ConversationMemory::default();
        memory.append("s1", Role::Customer, "hello");

        assert!(memory.clear("s1"));
        assert!(!memory.clear("s1"));
        assert!(memory.recent("s1", 5).is_empty());
    }

    #[test]
    fn summary_of_unknown_session_is_empty() {
        let memory = ConversationMemory::default();
        let summary = memory.summary("missing");
        assert_eq!(summary.total_exchanges, 0);
        assert!(summary.messages.is_empty());
    }
}
