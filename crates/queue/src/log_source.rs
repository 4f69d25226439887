//! Message source abstraction for the ingest loop (§4.6, §10.4). Mirrors
//! `QueueConsumer` in shape but is scoped to raw bytes in, ack handle out —
//! decoding into a `LogRecord` is the ingest bridge's job, not the source's.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("source connection error: {0}")]
    Connection(String),

    #[error("source closed")]
    Closed,
}

/// A single undecoded message pulled from the bus.
#[derive(Debug, Clone)]
pub struct Message {
    pub body: String,
    pub ack_token: String,
}

/// Message source feeding the ingest loop. One `recv()` returns at most one
/// message; `None` means "nothing available right now", not "closed".
#[async_trait]
pub trait LogSource: Send + Sync {
    async fn recv(&self) -> Result<Option<Message>, IngestError>;
    async fn ack(&self, ack_token: &str) -> Result<(), IngestError>;
}

/// In-memory channel source for tests and local runs without a real bus.
pub struct InMemoryLogSource {
    receiver: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl InMemoryLogSource {
    pub fn new() -> (Self, mpsc::UnboundedSender<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (InMemoryLogSource { receiver: Mutex::new(rx) }, tx)
    }
}

#[async_trait]
impl LogSource for InMemoryLogSource {
    async fn recv(&self) -> Result<Option<Message>, IngestError> {
        let mut rx = self.receiver.lock().await;
        match rx.try_recv() {
            Ok(body) => Ok(Some(Message { ack_token: "memory".to_string(), body })),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(IngestError::Closed),
        }
    }

    async fn ack(&self, _ack_token: &str) -> Result<(), IngestError> {
        Ok(())
    }
}

/// Redis Streams source (requires the `bus-redis` feature). Follows the
/// same per-backend feature gate as `server/src/ingestion/queue_listener.rs`:
/// compiled out entirely, with a stub that errors clearly, when the feature
/// is disabled.
#[cfg(feature = "bus-redis")]
pub mod redis_stream {
    use super::{IngestError, LogSource, Message};
    use async_trait::async_trait;
    use redis::aio::ConnectionManager;
    use redis::AsyncCommands;

    pub struct RedisStreamSource {
        conn: ConnectionManager,
        stream_key: String,
        consumer_group: String,
        consumer_name: String,
    }

    impl RedisStreamSource {
        pub async fn connect(
            url: &str,
            stream_key: impl Into<String>,
            consumer_group: impl Into<String>,
            consumer_name: impl Into<String>,
        ) -> Result<Self, IngestError> {
            let client = redis::Client::open(url)
                .map_err(|e| IngestError::Connection(format!("invalid redis url: {e}")))?;
            let mut conn = client
                .get_connection_manager()
                .await
                .map_err(|e| IngestError::Connection(format!("redis connect failed: {e}")))?;
            let stream_key = stream_key.into();
            let consumer_group = consumer_group.into();

            // Create the consumer group if it doesn't exist yet; ignore the
            // "BUSYGROUP" error that means it already does.
            let _: Result<(), redis::RedisError> = redis::cmd("XGROUP")
                .arg("CREATE")
                .arg(&stream_key)
                .arg(&consumer_group)
                .arg("$")
                .arg("MKSTREAM")
                .query_async(&mut conn)
                .await;

            Ok(RedisStreamSource {
                conn,
                stream_key,
                consumer_group,
                consumer_name: consumer_name.into(),
            })
        }
    }

    #[async_trait]
    impl LogSource for RedisStreamSource {
        async fn recv(&self) -> Result<Option<Message>, IngestError> {
            let mut conn = self.conn.clone();
            let reply: redis::streams::StreamReadReply = conn
                .xread_options(
                    &[&self.stream_key],
                    &[">"],
                    &redis::streams::StreamReadOptions::default()
                        .group(&self.consumer_group, &self.consumer_name)
                        .count(1),
                )
                .await
                .map_err(|e| IngestError::Connection(e.to_string()))?;

            for stream in reply.keys {
                for entry in stream.ids {
                    let body = entry
                        .map
                        .get("body")
                        .and_then(|v| match v {
                            redis::Value::BulkString(b) => String::from_utf8(b.clone()).ok(),
                            _ => None,
                        })
                        .unwrap_or_default();
                    return Ok(Some(Message { body, ack_token: entry.id }));
                }
            }
            Ok(None)
        }

        async fn ack(&self, ack_token: &str) -> Result<(), IngestError> {
            let mut conn = self.conn.clone();
            let _: i64 = conn
                .xack(&self.stream_key, &self.consumer_group, &[ack_token])
                .await
                .map_err(|e| IngestError::Connection(e.to_string()))?;
            Ok(())
        }
    }
}
