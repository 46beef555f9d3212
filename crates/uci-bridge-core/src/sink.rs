//! Delivery of engine output lines to the host.
//!
//! Sinks are called from the supervisor's reader task, never from the thread
//! that called `start()`, so every implementation must be safe to share
//! across threads. Lines arrive one call per line, in the order the engine
//! wrote them.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, warn};

/// Receives each line the engine writes
#[async_trait]
pub trait OutputSink: Send + Sync {
    async fn emit(&self, line: String);
}

#[async_trait]
impl<T: OutputSink + ?Sized> OutputSink for Arc<T> {
    async fn emit(&self, line: String) {
        (**self).emit(line).await
    }
}

/// Queues lines for the host to drain at its own pace
#[derive(Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<String>,
}

impl ChannelSink {
    pub fn new() -> (Self, UnboundedReceiver<String>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl OutputSink for ChannelSink {
    async fn emit(&self, line: String) {
        if let Err(e) = self.tx.send(line) {
            debug!("Output receiver dropped, discarding line: {}", e.0);
        }
    }
}

/// Hands each line to a host callback, e.g. a plugin signal emitter
pub struct CallbackSink<F> {
    callback: F,
}

impl<F> CallbackSink<F>
where
    F: Fn(String) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

#[async_trait]
impl<F> OutputSink for CallbackSink<F>
where
    F: Fn(String) + Send + Sync,
{
    async fn emit(&self, line: String) {
        (self.callback)(line);
    }
}

/// Writes each line, newline terminated, to a shared writer
pub struct WriterSink(Arc<Mutex<Box<dyn AsyncWrite + Unpin + Sync + Send>>>);

impl Clone for WriterSink {
    fn clone(&self) -> Self {
        WriterSink(self.0.clone())
    }
}

impl WriterSink {
    pub fn new(t: Box<dyn AsyncWrite + Unpin + Sync + Send>) -> WriterSink {
        WriterSink(Arc::new(Mutex::new(t)))
    }

    pub fn stdout() -> WriterSink {
        Self::new(Box::new(tokio::io::stdout()))
    }
}

#[async_trait]
impl OutputSink for WriterSink {
    async fn emit(&self, line: String) {
        let mut lock = self.0.lock().await;
        let mut bytes = line.into_bytes();
        bytes.push(b'\n');
        if let Err(e) = lock.write_all(&bytes).await {
            warn!("Failed to write engine output: {}", e);
            return;
        }
        if let Err(e) = lock.flush().await {
            warn!("Failed to flush engine output: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[tokio::test]
    async fn test_channel_sink_preserves_order() {
        let (sink, mut rx) = ChannelSink::new();
        sink.emit("uciok".to_string()).await;
        sink.emit("readyok".to_string()).await;

        assert_eq!(rx.recv().await.as_deref(), Some("uciok"));
        assert_eq!(rx.recv().await.as_deref(), Some("readyok"));
    }

    #[tokio::test]
    async fn test_channel_sink_tolerates_dropped_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.emit("bestmove e2e4".to_string()).await;
    }

    #[tokio::test]
    async fn test_callback_sink() {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let captured = seen.clone();
        let sink = CallbackSink::new(move |line| captured.lock().unwrap().push(line));

        sink.emit("info depth 1".to_string()).await;
        assert_eq!(*seen.lock().unwrap(), vec!["info depth 1".to_string()]);
    }

    #[tokio::test]
    async fn test_writer_sink_appends_newline() {
        let (client, mut server) = tokio::io::duplex(64);
        let sink = WriterSink::new(Box::new(client));
        sink.emit("uciok".to_string()).await;
        drop(sink);

        let mut out = String::new();
        tokio::io::AsyncReadExt::read_to_string(&mut server, &mut out)
            .await
            .unwrap();
        assert_eq!(out, "uciok\n");
    }
}
