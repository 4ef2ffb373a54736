//! Core data types that flow through ingestion and answering.

use serde::Serialize;
use serde_json::{Map, Value};

/// Chunk metadata as stored alongside each vector.
///
/// Only scalar values (string, number, bool) survive
/// [`sanitize_metadata`]; the index schema has no room for anything else.
pub type Metadata = Map<String, Value>;

/// One loaded unit of a document (a PDF page, or a whole text file).
#[derive(Debug, Clone, PartialEq)]
pub struct SourcePage {
    pub text: String,
    pub metadata: Metadata,
}

/// A span of document text plus its source metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    /// Byte offset of `text` within the page it was cut from.
    pub start_index: usize,
    pub metadata: Metadata,
}

/// A chunk returned from similarity search.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedChunk {
    pub text: String,
    pub metadata: Metadata,
    pub score: f32,
}

/// Name of the bound model and whether the backend currently lists it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelStatus {
    pub name: String,
    pub available: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Drop every metadata value that is not a string, number, or bool.
///
/// Returns the names of the dropped keys so callers can log them.
pub fn sanitize_metadata(metadata: &mut Metadata) -> Vec<String> {
    let dropped: Vec<String> = metadata
        .iter()
        .filter(|(_, v)| !is_scalar(v))
        .map(|(k, _)| k.clone())
        .collect();
    for key in &dropped {
        metadata.remove(key);
    }
    dropped
}

pub(crate) fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}
