//! # PDF Chat
//!
//! A local, single-user document question-answering assistant. Documents
//! are split into overlapping chunks, embedded, and appended to a
//! persistent vector index; questions are answered by retrieving the most
//! similar chunks and handing them, with the question, to a locally
//! installed language model.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────┐   ┌───────────┐   ┌──────────────┐
//! │ extract  │──▶│  chunk  │──▶│ embedding │──▶│ store (SQLite)│
//! │ PDF/DOCX │   │         │   │           │   │  chroma_db/   │
//! └──────────┘   └─────────┘   └───────────┘   └──────┬───────┘
//!                                                     │ search
//!      ┌──────────┐      ┌──────────┐          ┌──────▼───────┐
//!      │ registry │─────▶│ pipeline │◀─────────│    prompt    │
//!      │ (ollama) │      │          │─────────▶│  llm (chat)  │
//!      └──────────┘      └──────────┘          └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! pdfchat models                      # installed Ollama models
//! pdfchat ingest manual.pdf           # index a document
//! pdfchat ask "How long do refunds take?"
//! pdfchat chat --model llama3.2:latest
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error kinds |
//! | [`models`] | Core data types |
//! | [`extract`] | PDF, DOCX and text loading |
//! | [`chunk`] | Recursive character chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`store`] | Persistent vector index |
//! | [`registry`] | Installed-model discovery |
//! | [`llm`] | Chat inference backend |
//! | [`prompt`] | Grounded prompt template |
//! | [`pipeline`] | Answering pipeline |

pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod prompt;
pub mod registry;
pub mod store;

pub use error::{RagError, Result};
pub use pipeline::{IngestReport, Pipeline, PipelineState, NO_DOCUMENT_MESSAGE};
