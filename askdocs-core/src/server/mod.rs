//! Unix socket server exposing the engine to external frontends.
//!
//! The server is organized into separate concerns:
//! - `types`: protocol types for requests and replies
//! - `handler`: routing into the chat and retrieval engines
//! - `transport`: Unix socket communication layer
//!
//! The protocol is line-delimited JSON in both directions. Chat responses
//! are the engine's event stream serialized one event per line; a client
//! that disconnects mid-stream cancels the generation behind it.

mod handler;
mod transport;
mod types;

pub use types::{Reply, Request};

use crate::chat::ChatEngine;
use crate::config::Config;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Main server coordinating transport and request handling.
pub struct Server {
    handler: Arc<handler::RequestHandler>,
    transport: transport::UnixSocketTransport,
}

impl Server {
    /// Creates a server: builds the providers from the environment, opens
    /// the vector snapshot and wires up the engines.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        config.validate()?;

        let chat = Arc::new(ChatEngine::from_config(&config).await?);
        let rag = chat.rag().clone();

        let handler = Arc::new(handler::RequestHandler::new(chat, rag));
        let transport = transport::UnixSocketTransport::new(&config.server.socket_path);

        Ok(Self { handler, transport })
    }

    /// Starts the server and listens for connections until ctrl-c.
    pub async fn start(&self) -> anyhow::Result<()> {
        let listener = self.transport.bind().await?;

        info!("Server listening");

        let shutdown = signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                Ok((stream, _)) = listener.accept() => {
                    let handler = Arc::clone(&self.handler);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, handler).await {
                            error!(error = %e, "Connection error");
                        }
                    });
                }
                _ = &mut shutdown => {
                    info!("Shutting down");
                    self.transport.cleanup();
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Handles a single client connection.
async fn handle_connection(
    mut stream: tokio::net::UnixStream,
    handler: Arc<handler::RequestHandler>,
) -> Result<(), transport::TransportError> {
    let request = transport::read_request(&mut stream).await?;

    match request {
        Request::Chat {
            query,
            history,
            settings,
        } => {
            let (sender, receiver) = mpsc::unbounded_channel();
            let cancel = CancellationToken::new();

            let task_cancel = cancel.clone();
            let task = tokio::spawn(async move {
                handler
                    .handle_chat(&query, &history, &settings, task_cancel, &sender)
                    .await;
                // sender drops here, closing the event stream
            });

            let write_result = transport::write_events(&mut stream, receiver).await;
            if write_result.is_err() {
                // Client went away; stop the generation behind the stream.
                cancel.cancel();
            }
            let _ = task.await;
            write_result
        }
        other => {
            let reply = handler.manage(other).await;
            transport::write_reply(&mut stream, &reply).await
        }
    }
}
