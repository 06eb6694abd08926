//! askdocs - Retrieval-augmented question answering over private documents
//!
//! This is the convenience wrapper crate that re-exports the askdocs engine.
//!
//! # Quick Start
//!
//! ```toml
//! [dependencies]
//! askdocs = "0.1"
//! ```

// Re-export core
pub use askdocs_core::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use askdocs_core::chat::{ChatEngine, ChatMessage, ChatSettings, Role, StreamEvent};
    pub use askdocs_core::config::Config;
    pub use askdocs_core::rag::RagEngine;
    pub use askdocs_core::server::Server;
}
