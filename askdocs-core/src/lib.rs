//! askdocs-core - Retrieval-augmented generation engine
//!
//! Provides the components for answering questions over a private document
//! collection:
//! - LLM provider abstraction (OpenAI-compatible chat + embedding APIs)
//! - RAG pipeline (chunking, embeddings, similarity search, retrieval)
//! - Streamed answer generation with conversational memory
//! - Line-delimited JSON server (primary interface for external frontends)
//!
//! ## Primary API
//!
//! Embedders, stores and engines are constructed from [`Config`]; external
//! frontends talk to the engine through [`Server`].

// Public modules
pub mod chat;
pub mod config;
pub mod models;
pub mod provider;
pub mod rag;
pub mod server;

// Public exports
pub use chat::{ChatEngine, ChatMessage, ChatSettings, Role, StreamEvent};
pub use config::Config;
pub use rag::{IngestReport, RagEngine, RetrievedChunk};
pub use server::Server;

// Provider exports
pub use provider::{ChatRequest, Message, OpenAiCompatProvider, Provider, ProviderError};
