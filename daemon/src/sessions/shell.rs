//! Shell Session Manager: bridges a client WebSocket to a cluster-side
//! exec stream. Half-close on either side cancels the peer; resize
//! signals are forwarded without interrupting output. Sessions are
//! tracked by id so they can be torn down in bulk, e.g. on context
//! switch.

use axum::extract::ws::{Message, WebSocket};
use base64::Engine;
use futures::{SinkExt, StreamExt};
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, AttachParams, TerminalSize};
use kube::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ClientFrame {
    Input { data: String },
    Resize { cols: u16, rows: u16 },
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ServerFrame {
    Output { data: String },
    Error { data: String },
}

pub struct ShellTarget {
    pub namespace: String,
    pub pod_name: String,
    pub container: Option<String>,
    pub command: Vec<String>,
}

/// Process-wide table of live exec sessions, plus the client needed to
/// open new ones. All sessions for the active context are cancelled
/// wholesale on context switch via [`ShellSessionManager::close_all`].
pub struct ShellSessionManager {
    client: Client,
    sessions: Mutex<HashMap<Uuid, CancellationToken>>,
}

impl ShellSessionManager {
    pub fn new(client: Client) -> Arc<ShellSessionManager> {
        Arc::new(ShellSessionManager {
            client,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    pub async fn run_session(self: &Arc<Self>, target: ShellTarget, socket: WebSocket) {
        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        self.sessions.lock().await.insert(id, cancel.clone());
        run_shell_session(self.client.clone(), target, socket, cancel).await;
        self.sessions.lock().await.remove(&id);
    }

    /// Cancels every live exec session at once, e.g. on context switch.
    pub async fn close_all(&self) {
        let mut sessions = self.sessions.lock().await;
        for (_, cancel) in sessions.drain() {
            cancel.cancel();
        }
    }
}

/// Drives one shell session end to end. Returns once either side closes
/// or `cancel` fires; the last frame sent to the client on an abnormal
/// cluster-side termination is always a `ServerFrame::Error`.
async fn run_shell_session(client: Client, target: ShellTarget, socket: WebSocket, cancel: CancellationToken) {
    let api: Api<Pod> = Api::namespaced(client, &target.namespace);
    let params = AttachParams::default()
        .stdin(true)
        .stdout(true)
        .stderr(false)
        .tty(true)
        .container(target.container.clone().unwrap_or_default());

    let mut process = match api
        .exec(&target.pod_name, target.command.clone(), &params)
        .await
    {
        Ok(p) => p,
        Err(e) => {
            send_error(socket, e.to_string()).await;
            return;
        }
    };

    let mut stdin = process.stdin();
    let mut stdout = process.stdout();
    let resizer = process.terminal_size();

    let (mut ws_tx, mut ws_rx) = socket.split();

    let output_task = tokio::spawn(async move {
        let Some(mut stdout) = stdout.take() else { return };
        let mut buf = [0u8; 8192];
        loop {
            match stdout.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    let frame = ServerFrame::Output {
                        data: base64::engine::general_purpose::STANDARD.encode(&buf[..n]),
                    };
                    if send_frame(&mut ws_tx, &frame).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "shell stdout read failed");
                    let _ = send_frame(&mut ws_tx, &ServerFrame::Error { data: e.to_string() }).await;
                    break;
                }
            }
        }
        ws_tx
    });

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            next = ws_rx.next() => {
                let Some(Ok(msg)) = next else { break };
                let text = match msg {
                    Message::Text(t) => t,
                    Message::Close(_) => break,
                    _ => continue,
                };
                let Ok(frame) = serde_json::from_str::<ClientFrame>(&text) else {
                    continue;
                };
                match frame {
                    ClientFrame::Input { data } => {
                        let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(&data) else {
                            continue;
                        };
                        if let Some(stdin) = stdin.as_mut() {
                            if stdin.write_all(&bytes).await.is_err() {
                                break;
                            }
                        }
                    }
                    ClientFrame::Resize { cols, rows } => {
                        if let Some(resizer) = &resizer {
                            let _ = resizer.send(TerminalSize { width: cols, height: rows });
                        }
                    }
                }
            }
        }
    }

    drop(stdin);
    let _ = process.join().await;
    let _ = output_task.await;
}

async fn send_frame(
    ws_tx: &mut futures::stream::SplitSink<WebSocket, Message>,
    frame: &ServerFrame,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(frame).unwrap_or_default();
    ws_tx.send(Message::Text(text)).await
}

async fn send_error(mut socket: WebSocket, message: String) {
    let frame = ServerFrame::Error { data: message };
    let text = serde_json::to_string(&frame).unwrap_or_default();
    let _ = socket.send(Message::Text(text)).await;
}
