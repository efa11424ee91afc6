//! Log Session Manager: opens one cluster-side log stream per call and
//! chunks bytes into UTF-8-boundary-safe frames of at most 64 KiB.
//! Follow sessions are tracked by id so they can be torn down in bulk,
//! e.g. on context switch.

use futures::{Stream, StreamExt};
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, LogParams};
use kube::Client;
use serde::Serialize;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub const MAX_CHUNK_BYTES: usize = 64 * 1024;

pub struct LogRequest {
    pub namespace: String,
    pub pod_name: String,
    pub container: Option<String>,
    pub tail_lines: Option<i64>,
    pub previous: bool,
    pub timestamps: bool,
    pub follow: bool,
}

#[derive(Serialize)]
pub struct LogChunk {
    pub data: String,
}

#[derive(Serialize)]
pub struct LogBuffer {
    pub data: String,
}

/// Process-wide table of live log-follow sessions, plus the client
/// needed to open new ones. Non-follow `capture` calls are one-shot and
/// are not tracked. All follow sessions for the active context are
/// closed wholesale on context switch via [`LogSessionManager::close_all`].
pub struct LogSessionManager {
    client: Client,
    sessions: Mutex<HashMap<Uuid, CancellationToken>>,
}

impl LogSessionManager {
    pub fn new(client: Client) -> Arc<LogSessionManager> {
        Arc::new(LogSessionManager {
            client,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    fn log_params(req: &LogRequest) -> LogParams {
        LogParams {
            container: req.container.clone(),
            follow: req.follow,
            previous: req.previous,
            timestamps: req.timestamps,
            tail_lines: req.tail_lines,
            ..Default::default()
        }
    }

    /// Non-follow: returns the full captured buffer in a single envelope.
    pub async fn capture(&self, req: &LogRequest) -> Result<LogBuffer, kube::Error> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), &req.namespace);
        let text = api.logs(&req.pod_name, &Self::log_params(req)).await?;
        Ok(LogBuffer { data: text })
    }

    /// Follow: a stream of UTF-8-safe chunked frames that lives until the
    /// caller drops it (client disconnect), the cluster stream ends, or
    /// [`Self::close`]/[`Self::close_all`] cancels it.
    pub async fn follow(
        self: &Arc<Self>,
        req: &LogRequest,
    ) -> Result<(Uuid, Pin<Box<dyn Stream<Item = LogChunk> + Send>>), kube::Error> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), &req.namespace);
        let byte_stream = api.log_stream(&req.pod_name, &Self::log_params(req)).await?;

        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        self.sessions.lock().await.insert(id, cancel.clone());

        let chunks = chunk_utf8_safe(byte_stream);
        Ok((id, Box::pin(cancellable(chunks, cancel))))
    }

    /// Cancels one follow session. Returns `false` if no such session is
    /// live.
    pub async fn close(&self, id: Uuid) -> bool {
        if let Some(cancel) = self.sessions.lock().await.remove(&id) {
            cancel.cancel();
            true
        } else {
            false
        }
    }

    /// Cancels every live follow session at once, e.g. on context switch.
    pub async fn close_all(&self) {
        let mut sessions = self.sessions.lock().await;
        for (_, cancel) in sessions.drain() {
            cancel.cancel();
        }
    }
}

/// Stops yielding items the moment `cancel` fires, instead of waiting for
/// the wrapped stream to end on its own.
fn cancellable(
    mut inner: impl Stream<Item = LogChunk> + Send + Unpin + 'static,
    cancel: CancellationToken,
) -> impl Stream<Item = LogChunk> + Send {
    async_stream::stream! {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                next = inner.next() => {
                    let Some(chunk) = next else { break };
                    yield chunk;
                }
            }
        }
    }
}

/// Re-chunks an arbitrary byte stream into frames of at most
/// `MAX_CHUNK_BYTES`, breaking only at valid UTF-8 scalar boundaries.
/// Carries any incomplete trailing sequence over to the next poll;
/// invalid sequences are replaced with the replacement character.
fn chunk_utf8_safe(
    mut byte_stream: impl Stream<Item = Result<bytes::Bytes, kube::Error>> + Send + Unpin + 'static,
) -> impl Stream<Item = LogChunk> + Send + Unpin {
    Box::pin(async_stream::stream! {
        let mut carry: Vec<u8> = Vec::new();
        while let Some(next) = byte_stream.next().await {
            let Ok(bytes) = next else { break };
            carry.extend_from_slice(&bytes);
            while !carry.is_empty() {
                let take = carry.len().min(MAX_CHUNK_BYTES);
                let boundary = utf8_floor(&carry[..take]);
                if boundary == 0 {
                    // not even one full scalar buffered yet; wait for more bytes
                    break;
                }
                let chunk: Vec<u8> = carry.drain(..boundary).collect();
                let text = String::from_utf8_lossy(&chunk).into_owned();
                yield LogChunk { data: text };
            }
        }
        if !carry.is_empty() {
            yield LogChunk { data: String::from_utf8_lossy(&carry).into_owned() };
        }
    })
}

/// Largest prefix length of `buf` that ends on a UTF-8 scalar boundary.
fn utf8_floor(buf: &[u8]) -> usize {
    let mut end = buf.len();
    while end > 0 && (buf[end - 1] & 0b1100_0000) == 0b1000_0000 {
        end -= 1;
    }
    if end == 0 {
        return 0;
    }
    let lead = buf[end - 1];
    let width = if lead & 0b1000_0000 == 0 {
        1
    } else if lead & 0b1110_0000 == 0b1100_0000 {
        2
    } else if lead & 0b1111_0000 == 0b1110_0000 {
        3
    } else if lead & 0b1111_1000 == 0b1111_0000 {
        4
    } else {
        1
    };
    if end - 1 + width <= buf.len() {
        end - 1 + width
    } else {
        end - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_floor_keeps_whole_scalars() {
        let s = "hello \u{1F600}"; // emoji is 4 bytes
        let bytes = s.as_bytes();
        // cut mid-emoji: floor should land before it entirely
        let cut = bytes.len() - 2;
        let floor = utf8_floor(&bytes[..cut]);
        assert!(std::str::from_utf8(&bytes[..floor]).is_ok());
    }

    #[test]
    fn utf8_floor_ascii_is_identity() {
        assert_eq!(utf8_floor(b"hello"), 5);
    }
}
