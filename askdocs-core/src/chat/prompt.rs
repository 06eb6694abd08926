//! Prompt assembly.
//!
//! Builds the message sequence sent to the chat model: one system message
//! carrying the persona and the retrieved context, a bounded window of
//! conversation history, then the new user question.

use super::history::ChatMessage;
use crate::provider::Message;
use crate::rag::RetrievedChunk;
use std::fmt::Write;

/// The answer the model is told to give when the context cannot support one.
pub const NO_ANSWER_REPLY: &str = "I don't know based on the documents provided.";

/// Marker the model appends before its suggested follow-up questions.
pub const FOLLOWUP_MARKER: &str = "FOLLOWUP:";

/// Assembles prompts under a bounded history window.
pub struct PromptAssembler {
    base_prompt: String,
    history_limit: usize,
}

impl PromptAssembler {
    pub fn new(base_prompt: impl Into<String>, history_limit: usize) -> Self {
        Self {
            base_prompt: base_prompt.into(),
            history_limit,
        }
    }

    /// Builds the full message sequence for one question.
    ///
    /// `system_override` replaces the persona instruction only; the
    /// grounding rules and the follow-up directive are always present.
    /// History beyond the configured window is silently dropped: bounded
    /// memory, not an error.
    pub fn assemble(
        &self,
        query: &str,
        context: &[RetrievedChunk],
        history: &[ChatMessage],
        system_override: Option<&str>,
    ) -> Vec<Message> {
        let persona = match system_override {
            Some(prompt) if !prompt.trim().is_empty() => prompt,
            _ => self.base_prompt.as_str(),
        };

        let mut system = String::new();
        system.push_str(persona);
        system.push_str("\n\n");
        system.push_str("Answer the question based strictly on the provided context.\n");
        let _ = writeln!(system, "If the answer is not in the context, say \"{NO_ANSWER_REPLY}\" Do not invent information.");
        system.push_str("End your reply with one final line of suggested follow-up questions:\n");
        let _ = writeln!(system, "{FOLLOWUP_MARKER} <question 1>|<question 2>|<question 3>");
        system.push('\n');

        if context.is_empty() {
            system.push_str("No relevant context was found in the documents.");
        } else {
            system.push_str("Context:\n");
            system.push_str(&render_context(context));
        }

        let mut messages = vec![Message::system(system)];

        let window_start = history.len().saturating_sub(self.history_limit);
        for msg in &history[window_start..] {
            messages.push(Message {
                role: msg.role.as_str().to_string(),
                content: msg.content.clone(),
            });
        }

        messages.push(Message::user(query));
        messages
    }
}

fn render_context(context: &[RetrievedChunk]) -> String {
    context
        .iter()
        .map(|c| format!("Source: {}\n{}", c.source, c.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::history::ChatMessage;

    fn chunk(source: &str, text: &str) -> RetrievedChunk {
        RetrievedChunk {
            text: text.to_string(),
            source: source.to_string(),
            score: 0.9,
        }
    }

    #[test]
    fn test_system_then_history_then_query() {
        let assembler = PromptAssembler::new("You are a test assistant.", 10);
        let history = vec![ChatMessage::user("earlier"), ChatMessage::assistant("reply")];
        let messages = assembler.assemble("now", &[chunk("doc", "ctx")], &history, None);

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].role, "user");
        assert_eq!(messages[1].content, "earlier");
        assert_eq!(messages[2].role, "assistant");
        assert_eq!(messages[3].role, "user");
        assert_eq!(messages[3].content, "now");
    }

    #[test]
    fn test_context_rendered_with_source_labels() {
        let assembler = PromptAssembler::new("persona", 10);
        let context = vec![chunk("a.txt", "alpha text"), chunk("b.txt", "beta text")];
        let messages = assembler.assemble("q", &context, &[], None);

        let system = &messages[0].content;
        assert!(system.contains("Source: a.txt\nalpha text"));
        assert!(system.contains("Source: b.txt\nbeta text"));
        assert!(system.contains("\n\nSource: b.txt"));
    }

    #[test]
    fn test_history_window_drops_oldest() {
        let assembler = PromptAssembler::new("persona", 3);
        let history: Vec<ChatMessage> = (0..8)
            .map(|i| ChatMessage::user(format!("turn {i}")))
            .collect();
        let messages = assembler.assemble("q", &[], &history, None);

        // system + 3 history + query
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[1].content, "turn 5");
        assert_eq!(messages[3].content, "turn 7");
    }

    #[test]
    fn test_no_context_instruction_always_present() {
        let assembler = PromptAssembler::new("persona", 10);

        let with_ctx = assembler.assemble("q", &[chunk("d", "t")], &[], None);
        assert!(with_ctx[0].content.contains(NO_ANSWER_REPLY));

        let without_ctx = assembler.assemble("q", &[], &[], None);
        assert!(without_ctx[0].content.contains(NO_ANSWER_REPLY));
        assert!(without_ctx[0].content.contains("No relevant context was found"));

        // The override replaces the persona, never the grounding rules.
        let overridden = assembler.assemble("q", &[], &[], Some("Pirate mode."));
        assert!(overridden[0].content.starts_with("Pirate mode."));
        assert!(overridden[0].content.contains(NO_ANSWER_REPLY));
        assert!(overridden[0].content.contains(FOLLOWUP_MARKER));
    }

    #[test]
    fn test_blank_override_falls_back() {
        let assembler = PromptAssembler::new("persona", 10);
        let messages = assembler.assemble("q", &[], &[], Some("   "));
        assert!(messages[0].content.starts_with("persona"));
    }
}
