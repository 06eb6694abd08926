use crate::chat::{ChatMessage, ChatSettings};
use serde::{Deserialize, Serialize};

/// Request from a client, one JSON object per line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Request {
    /// Answer a question; the response is a stream of event lines.
    Chat {
        query: String,
        #[serde(default)]
        history: Vec<ChatMessage>,
        #[serde(default)]
        settings: ChatSettings,
    },
    /// Ingest extracted document text under a source name.
    Ingest { text: String, source: String },
    /// List ingested source names.
    Sources,
    /// Remove every chunk of a source.
    Delete { source: String },
    /// Number of stored chunks.
    Count,
}

/// Terminal response for non-streaming requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Reply {
    Done { result: serde_json::Value },
    Error { error: String },
}

impl Reply {
    pub fn done(result: serde_json::Value) -> Self {
        Self::Done { result }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self::Error {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_minimal() {
        let request: Request =
            serde_json::from_str(r#"{"type":"chat","query":"What is this?"}"#).unwrap();
        match request {
            Request::Chat {
                query,
                history,
                settings,
            } => {
                assert_eq!(query, "What is this?");
                assert!(history.is_empty());
                assert!(settings.active_documents.is_empty());
            }
            _ => panic!("expected chat request"),
        }
    }

    #[test]
    fn test_delete_request_round_trip() {
        let request = Request::Delete {
            source: "doc1".to_string(),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"type":"delete","source":"doc1"}"#);
    }

    #[test]
    fn test_reply_wire_format() {
        let reply = Reply::done(serde_json::json!({"chunk_count": 3}));
        let json = serde_json::to_string(&reply).unwrap();
        assert_eq!(json, r#"{"type":"done","result":{"chunk_count":3}}"#);
    }
}
