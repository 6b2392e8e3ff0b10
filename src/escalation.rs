//! Decides when a conversation must reach a human, independent of whatever
//! the language model would have said.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::types::TicketStub;

/// Phrases that signal the customer is explicitly asking for a human.
const HELP_PHRASES: [&str; 13] = [
    "create ticket",
    "need help",
    "contact support",
    "speak to agent",
    "human agent",
    "talk to someone",
    "escalate",
    "complaint",
    "refund",
    "billing issue",
    "account problem",
    "urgent",
    "emergency",
];

/// Queries longer than this that mention a problem, with nothing retrieved,
/// count as complex enough to escalate.
const COMPLEX_QUERY_CHARS: usize = 150;

/// Escalate when the customer explicitly asks for a human, or when a long
/// problem description matched nothing in the knowledge base. Conservative
/// on purpose: the default path is an AI answer, not a ticket.
pub fn should_escalate(query: &str, context_chunks: &[String]) -> bool {
    let lowercase = query.to_lowercase();

    let explicit_help_request = HELP_PHRASES
        .iter()
        .any(|phrase| lowercase.contains(phrase));

    let complex_unmatched_issue = context_chunks.is_empty()
        && query.chars().count() > COMPLEX_QUERY_CHARS
        && lowercase.contains("problem");

    explicit_help_request || complex_unmatched_issue
}

/// `TCKT-<base36 millisecond timestamp, uppercased>`. Collisions are
/// negligible at expected request rates, not cryptographically excluded.
pub fn new_ticket_id(now: DateTime<Utc>) -> String {
    let millis = now.timestamp_millis().max(0) as u64;
    format!("TCKT-{}", to_base36(millis))
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).expect("base36 digits are ASCII")
}

/// In-process record of tickets issued by the escalation path. Handing them
/// over to the real ticketing subsystem is out of scope.
#[derive(Default)]
pub struct TicketLog {
    tickets: Mutex<HashMap<String, TicketStub>>,
}

impl TicketLog {
    pub fn open(&self, session_id: &str, issue: &str) -> TicketStub {
        let timestamp = Utc::now();
        let stub = TicketStub {
            ticket_id: new_ticket_id(timestamp),
            session_id: session_id.to_string(),
            issue: issue.to_string(),
            timestamp,
        };
        self.tickets
            .lock()
            .expect("ticket log poisoned")
            .insert(stub.ticket_id.clone(), stub.clone());
        stub
    }

    /// Look up an issued stub; the ticketing subsystem calls this when it
    /// links the stub to a real ticket.
    #[allow(dead_code)]
    pub fn get(&self, ticket_id: &str) -> Option<TicketStub> {
        self.tickets
            .lock()
            .expect("ticket log poisoned")
            .get(ticket_id)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn chunks(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn explicit_help_phrases_escalate_regardless_of_context() {
        assert!(should_escalate("I need a refund", &[]));
        assert!(should_escalate(
            "I need a refund",
            &chunks(&["refund policy text"])
        ));
        assert!(should_escalate("please ESCALATE this", &[]));
        assert!(should_escalate("let me speak to agent now", &[]));
    }

    #[test]
    fn plain_questions_do_not_escalate() {
        assert!(!should_escalate("hello", &chunks(&["greeting text"])));
        assert!(!should_escalate("what are your opening hours?", &[]));
    }

    #[test]
    fn long_problem_query_escalates_only_without_context() {
        let query = format!(
            "I have a problem with my smart thermostat {}",
            "and it keeps disconnecting from the network every single night ".repeat(3)
        );
        assert!(query.chars().count() > 150);

        assert!(should_escalate(&query, &[]));
        assert!(!should_escalate(&query, &chunks(&["thermostat manual"])));
    }

    #[test]
    fn short_problem_query_does_not_escalate() {
        assert!(!should_escalate("small problem with my invoice layout", &[]));
    }

    #[test]
    fn ticket_ids_are_prefixed_uppercase_base36() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let id = new_ticket_id(now);
        assert!(id.starts_with("TCKT-"));
        let suffix = &id["TCKT-".len()..];
        assert!(!suffix.is_empty());
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));

        // Round-trip back to the original milliseconds.
        let parsed = u64::from_str_radix(suffix, 36).expect("base36");
        assert_eq!(parsed as i64, now.timestamp_millis());
    }

    #[test]
    fn ticket_log_stores_and_returns_stubs() {
        let log = TicketLog::default();
        let stub = log.open("session-1", "my order never arrived");

        let fetched = log.get(&stub.ticket_id).expect("stub present");
        assert_eq!(fetched.session_id, "session-1");
        assert_eq!(fetched.issue, "my order never arrived");
        assert!(log.get("TCKT-UNKNOWN").is_none());
    }
}
