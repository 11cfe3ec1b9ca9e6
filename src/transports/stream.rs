use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;

/// A minimal streaming abstraction that mirrors go-utcp's StreamResult (Next/Close).
#[async_trait]
pub trait StreamResult: Send {
    /// Pull the next value from the stream. Returns Ok(None) on EOF.
    async fn next(&mut self) -> Result<Option<Value>>;
    /// Close the stream and release any underlying resources.
    async fn close(&mut self) -> Result<()>;
}

/// StreamResult backed by a channel of `Result<Value>`.
pub struct ChannelStreamResult {
    rx: mpsc::Receiver<Result<Value>>,
    close_fn: Option<Box<dyn FnOnce() -> Result<()> + Send>>,
}

impl ChannelStreamResult {
    pub fn new(
        rx: mpsc::Receiver<Result<Value>>,
        close_fn: Option<Box<dyn FnOnce() -> Result<()> + Send>>,
    ) -> Self {
        Self { rx, close_fn }
    }
}

#[async_trait]
impl StreamResult for ChannelStreamResult {
    async fn next(&mut self) -> Result<Option<Value>> {
        match self.rx.recv().await {
            Some(Ok(v)) => Ok(Some(v)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(close_fn) = self.close_fn.take() {
            close_fn()?;
        }
        Ok(())
    }
}

/// StreamResult backed by an in-memory vector (useful for adapting eager responses).
pub struct VecStreamResult {
    items: Vec<Value>,
    index: usize,
    close_fn: Option<Box<dyn FnOnce() -> Result<()> + Send>>,
}

impl VecStreamResult {
    pub fn new(
        items: Vec<Value>,
        close_fn: Option<Box<dyn FnOnce() -> Result<()> + Send>>,
    ) -> Self {
        Self {
            items,
            index: 0,
            close_fn,
        }
    }
}

#[async_trait]
impl StreamResult for VecStreamResult {
    async fn next(&mut self) -> Result<Option<Value>> {
        if self.index >= self.items.len() {
            return Ok(None);
        }
        let item = self.items[self.index].clone();
        self.index += 1;
        Ok(Some(item))
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(close_fn) = self.close_fn.take() {
            close_fn()?;
        }
        Ok(())
    }
}

/// Helper to box a channel-backed stream result.
pub fn boxed_channel_stream(
    rx: mpsc::Receiver<Result<Value>>,
    close_fn: Option<Box<dyn FnOnce() -> Result<()> + Send>>,
) -> Box<dyn StreamResult> {
    Box::new(ChannelStreamResult::new(rx, close_fn))
}

/// Helper to box a vector-backed stream result.
pub fn boxed_vec_stream(items: Vec<Value>) -> Box<dyn StreamResult> {
    Box::new(VecStreamResult::new(items, None))
}

/// Epoch-millis wall clock reading for `StreamEvent::Chunk::timestamp`.
fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Identifies the call a stream envelope belongs to, attached to every
/// chunk so a caller multiplexing several streams can tell them apart.
#[derive(Debug, Clone, Serialize)]
pub struct StreamMetadata {
    pub transport: String,
    pub tool: String,
    pub provider: String,
}

/// Normalized event emitted by [`UniversalStream`]. Every transport's raw
/// `StreamResult` is adapted to this shape so callers see one envelope
/// regardless of protocol: a run of `Chunk`s with strictly increasing `seq`
/// starting at 0, terminated by exactly one `End` or `Error`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Chunk {
        seq: u64,
        data: Value,
        timestamp: u64,
        metadata: StreamMetadata,
    },
    End {
        seq: u64,
        metadata: StreamMetadata,
    },
    Error {
        seq: u64,
        message: String,
        metadata: StreamMetadata,
    },
}

/// Wraps a transport's raw [`StreamResult`] into the [`StreamEvent`]
/// envelope. Once an `End` or `Error` has been produced, every subsequent
/// call to `next_event` returns `None`.
pub struct UniversalStream {
    inner: Box<dyn StreamResult>,
    metadata: StreamMetadata,
    seq: u64,
    done: bool,
}

impl UniversalStream {
    pub fn new(inner: Box<dyn StreamResult>, metadata: StreamMetadata) -> Self {
        Self {
            inner,
            metadata,
            seq: 0,
            done: false,
        }
    }

    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        if self.done {
            return None;
        }
        let seq = self.seq;
        self.seq += 1;

        match self.inner.next().await {
            Ok(Some(data)) => Some(StreamEvent::Chunk {
                seq,
                data,
                timestamp: now_millis(),
                metadata: self.metadata.clone(),
            }),
            Ok(None) => {
                self.done = true;
                Some(StreamEvent::End {
                    seq,
                    metadata: self.metadata.clone(),
                })
            }
            Err(e) => {
                self.done = true;
                Some(StreamEvent::Error {
                    seq,
                    message: e.to_string(),
                    metadata: self.metadata.clone(),
                })
            }
        }
    }

    pub async fn close(&mut self) -> Result<()> {
        self.inner.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    };
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn vec_stream_iterates_and_closes() {
        let closed = Arc::new(AtomicBool::new(false));
        let closed_clone = closed.clone();
        let mut stream = VecStreamResult::new(
            vec![json!(1), json!({"two": 2})],
            Some(Box::new(move || {
                closed_clone.store(true, Ordering::SeqCst);
                Ok(())
            })),
        );

        assert_eq!(stream.next().await.unwrap(), Some(json!(1)));
        assert_eq!(stream.next().await.unwrap(), Some(json!({"two": 2})));
        assert_eq!(stream.next().await.unwrap(), None);
        stream.close().await.unwrap();
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn universal_stream_sequences_chunks_then_ends() {
        let inner = boxed_vec_stream(vec![json!(1), json!(2)]);
        let metadata = StreamMetadata {
            transport: "http".to_string(),
            tool: "p.echo".to_string(),
            provider: "p".to_string(),
        };
        let mut stream = UniversalStream::new(inner, metadata);

        match stream.next_event().await.unwrap() {
            StreamEvent::Chunk { seq, data, .. } => {
                assert_eq!(seq, 0);
                assert_eq!(data, json!(1));
            }
            other => panic!("expected chunk, got {other:?}"),
        }
        match stream.next_event().await.unwrap() {
            StreamEvent::Chunk { seq, data, .. } => {
                assert_eq!(seq, 1);
                assert_eq!(data, json!(2));
            }
            other => panic!("expected chunk, got {other:?}"),
        }
        match stream.next_event().await.unwrap() {
            StreamEvent::End { seq, .. } => assert_eq!(seq, 2),
            other => panic!("expected end, got {other:?}"),
        }
        assert!(stream.next_event().await.is_none());
    }

    #[tokio::test]
    async fn universal_stream_terminates_on_error() {
        let (tx, rx) = mpsc::channel(2);
        tx.send(Ok(json!("ok"))).await.unwrap();
        tx.send(Err(anyhow::anyhow!("boom"))).await.unwrap();
        drop(tx);

        let metadata = StreamMetadata {
            transport: "grpc".to_string(),
            tool: "p.echo".to_string(),
            provider: "p".to_string(),
        };
        let mut stream = UniversalStream::new(boxed_channel_stream(rx, None), metadata);

        assert!(matches!(
            stream.next_event().await.unwrap(),
            StreamEvent::Chunk { seq: 0, .. }
        ));
        assert!(matches!(
            stream.next_event().await.unwrap(),
            StreamEvent::Error { seq: 1, .. }
        ));
        assert!(stream.next_event().await.is_none());
    }

    #[tokio::test]
    async fn channel_stream_propagates_error() {
        let (tx, rx) = mpsc::channel(2);
        tx.send(Ok(json!("ok"))).await.unwrap();
        tx.send(Err(anyhow::anyhow!("boom"))).await.unwrap();
        drop(tx);

        let mut stream = ChannelStreamResult::new(rx, None);
        assert_eq!(stream.next().await.unwrap(), Some(json!("ok")));
        let err = stream.next().await.unwrap_err();
        assert!(format!("{err}").contains("boom"));
        assert_eq!(stream.next().await.unwrap(), None);
    }
}
