use super::types::{Reply, Request};
use crate::chat::StreamEvent;
use std::path::Path;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Unix socket transport for IPC communication.
pub struct UnixSocketTransport {
    socket_path: String,
}

impl UnixSocketTransport {
    pub fn new(socket_path: impl Into<String>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    /// Binds to the Unix socket and returns a listener.
    pub async fn bind(&self) -> Result<UnixListener> {
        if Path::new(&self.socket_path).exists() {
            std::fs::remove_file(&self.socket_path)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.socket_path, perms)?;
        }

        Ok(listener)
    }

    /// Cleans up the socket file.
    pub fn cleanup(&self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

/// Reads a request line from the stream.
pub async fn read_request(stream: &mut UnixStream) -> Result<Request> {
    let (reader, _) = stream.split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    if reader.read_line(&mut line).await? == 0 {
        return Err(TransportError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "connection closed before a request line",
        )));
    }

    Ok(serde_json::from_str(&line)?)
}

/// Writes stream events to the client, one JSON object per line.
///
/// Returns on channel close (stream finished) or write failure (client went
/// away); the caller uses the failure to cancel the producing task.
pub async fn write_events(
    stream: &mut UnixStream,
    mut receiver: mpsc::UnboundedReceiver<StreamEvent>,
) -> Result<()> {
    while let Some(event) = receiver.recv().await {
        write_line(stream, &event).await?;
    }
    Ok(())
}

/// Writes a single terminal reply line.
pub async fn write_reply(stream: &mut UnixStream, reply: &Reply) -> Result<()> {
    write_line(stream, reply).await
}

async fn write_line<T: serde::Serialize>(stream: &mut UnixStream, value: &T) -> Result<()> {
    let json = serde_json::to_string(value)?;
    stream.write_all(json.as_bytes()).await?;
    stream.write_all(b"\n").await?;
    stream.flush().await?;
    Ok(())
}
