//! LLM provider abstraction layer.
//!
//! This module defines a common interface over hosted model APIs for
//! streaming chat completions and embeddings.

mod openai;
mod types;

// Re-export common types
pub use types::{ChatRequest, Message, Provider, ProviderError, Result};

// Re-export provider implementations
pub use openai::OpenAiCompatProvider;
