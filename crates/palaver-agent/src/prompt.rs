// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! System prompt assembly.

use palaver_core::types::{KnowledgeChunk, Message, MessageRole};

/// Appended to every agent prompt.
pub const SCHEDULING_INSTRUCTIONS: &str = "\
Scheduling: when the customer confirms an appointment with a specific date and time, \
add exactly one block like the one below to your reply, in addition to your normal answer. \
Use 24-hour time and the customer's own words for the summary. Never mention the block.
[SCHEDULE]
{ \"subject\": \"short title\", \"date\": \"YYYY-MM-DD HH:mm\", \"summary\": \"what was agreed\" }
[/SCHEDULE]
Do not add the block unless date and time are both confirmed.";

/// Role-labelled transcript, oldest first.
pub fn render_history(history: &[Message]) -> String {
    history
        .iter()
        .map(|m| {
            let speaker = match m.role {
                MessageRole::User => "Customer",
                MessageRole::Assistant => "You",
            };
            format!("{speaker}: {}", m.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Agent prompt, then the transcript (when there is one), then the
/// scheduling instructions.
pub fn build_system_prompt(agent_prompt: &str, history: &[Message]) -> String {
    let mut prompt = agent_prompt.trim().to_string();
    if !history.is_empty() {
        prompt.push_str("\n\nConversation so far:\n");
        prompt.push_str(&render_history(history));
    }
    prompt.push_str("\n\n");
    prompt.push_str(SCHEDULING_INSTRUCTIONS);
    prompt
}

/// Retrieved chunks as a bullet list, or `None` when nothing was found.
pub fn render_knowledge(chunks: &[KnowledgeChunk]) -> Option<String> {
    if chunks.is_empty() {
        return None;
    }
    Some(
        chunks
            .iter()
            .map(|c| format!("- {}", c.content.trim()))
            .collect::<Vec<_>>()
            .join("\n"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(role: MessageRole, content: &str) -> Message {
        Message {
            id: content.into(),
            session_id: "s".into(),
            contact_id: "c".into(),
            role,
            content: content.into(),
            created_at: "2026-01-01T00:00:00.000Z".into(),
        }
    }

    #[test]
    fn transcript_labels_roles_in_order() {
        let history = vec![
            message(MessageRole::User, "Do you open Saturday?"),
            message(MessageRole::Assistant, "Yes, 9 to 13."),
        ];
        assert_eq!(
            render_history(&history),
            "Customer: Do you open Saturday?\nYou: Yes, 9 to 13."
        );
    }

    #[test]
    fn prompt_sections_appear_in_order() {
        let history = vec![message(MessageRole::User, "hi")];
        let prompt = build_system_prompt("You are the front desk.", &history);
        let agent = prompt.find("front desk").unwrap();
        let transcript = prompt.find("Customer: hi").unwrap();
        let schedule = prompt.find("[SCHEDULE]").unwrap();
        assert!(agent < transcript && transcript < schedule);
    }

    #[test]
    fn empty_history_has_no_transcript_heading() {
        let prompt = build_system_prompt("Be nice.", &[]);
        assert!(!prompt.contains("Conversation so far"));
        assert!(prompt.ends_with(SCHEDULING_INSTRUCTIONS));
    }

    #[test]
    fn knowledge_renders_as_bullets() {
        assert_eq!(render_knowledge(&[]), None);
        let chunk = KnowledgeChunk {
            id: "k".into(),
            organization_id: "o".into(),
            source: "faq".into(),
            content: " Haircut: $40 ".into(),
            score: 0.7,
        };
        assert_eq!(render_knowledge(&[chunk]).as_deref(), Some("- Haircut: $40"));
    }
}
