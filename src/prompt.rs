//! Grounded prompt assembly.
//!
//! Two turns: a fixed system instruction, then a human turn carrying the
//! retrieved context and the question exactly as the user typed it.

use crate::models::{ChatMessage, RetrievedChunk};

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant that can answer questions about the PDF document that uploaded by the user. ";

/// Human turn; `{context}` and `{question}` are substituted.
pub const HUMAN_TEMPLATE: &str = "Here is the document pieces: {context}\nQuestion: {question}";

/// Chunk texts in retrieval order, separated by blank lines. Empty when
/// nothing was retrieved.
pub fn format_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn build_messages(chunks: &[RetrievedChunk], question: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(render_human(&format_context(chunks), question)),
    ]
}

/// Single-pass substitution: placeholder text inside the context or the
/// question is never expanded.
fn render_human(context: &str, question: &str) -> String {
    let mut out = String::with_capacity(HUMAN_TEMPLATE.len() + context.len() + question.len());
    let mut rest = HUMAN_TEMPLATE;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        if let Some(after) = tail.strip_prefix("{context}") {
            out.push_str(context);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{question}") {
            out.push_str(question);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}
