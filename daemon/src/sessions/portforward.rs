//! Port-Forward Session Manager: one local TCP listener plus one
//! cluster-side forwarder per session, keyed by session id, held in a
//! plain `HashMap` since port-forward sessions carry no ordering
//! requirement among themselves.

use k8s_openapi::api::core::v1::{Pod, Service};
use kube::api::Api;
use kview_core::{Session, SessionKind, SessionState};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

async fn transition(session: &Arc<Mutex<Session>>, next: SessionState) {
    let mut guard = session.lock().await;
    let _ = guard.transition(next);
}

#[derive(Clone)]
pub struct PortForwardTarget {
    pub namespace: String,
    /// Either a pod name or a service name; services are resolved to one
    /// backing pod at open time.
    pub name: String,
    pub is_service: bool,
    pub remote_port: u16,
}

pub struct PortForwardHandle {
    pub session: Arc<Mutex<Session>>,
    pub local_addr: SocketAddr,
    cancel: CancellationToken,
}

struct Entry {
    session: Arc<Mutex<Session>>,
    local_addr: SocketAddr,
    cancel: CancellationToken,
}

/// Process-wide table of live port-forward sessions, plus the client
/// needed to open new ones. All sessions for the active context are
/// closed wholesale on context switch via [`PortForwardManager::close_all`].
pub struct PortForwardManager {
    client: kube::Client,
    sessions: Mutex<HashMap<Uuid, Entry>>,
}

impl PortForwardManager {
    pub fn new(client: kube::Client) -> Arc<PortForwardManager> {
        Arc::new(PortForwardManager {
            client,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    /// Resolves `target`, binds a local listener (OS-assigned port when
    /// `local_port` is `None` or `0`), and spawns the forwarding task.
    /// Returns a structured error if the backing pod can't be resolved or
    /// the initial cluster-side stream can't be established; failures
    /// after that point instead move the session to `failed`.
    pub async fn open(
        self: &Arc<Self>,
        target: PortForwardTarget,
        local_port: Option<u16>,
    ) -> Result<PortForwardHandle, kube::Error> {
        let pod_name = if target.is_service {
            resolve_backing_pod(&self.client, &target.namespace, &target.name).await?
        } else {
            target.name.clone()
        };

        let bind_addr: SocketAddr = ([127, 0, 0, 1], local_port.unwrap_or(0)).into();
        let listener = TcpListener::bind(bind_addr).await.map_err(|e| {
            kube::Error::Service(Box::new(std::io::Error::new(e.kind(), e.to_string())))
        })?;
        let local_addr = listener.local_addr().map_err(|e| {
            kube::Error::Service(Box::new(std::io::Error::new(e.kind(), e.to_string())))
        })?;

        let id = Uuid::new_v4();
        let session = Arc::new(Mutex::new(Session::new(
            id.to_string(),
            SessionKind::PortForward,
            format!("{}/{}:{}", target.namespace, target.name, target.remote_port),
        )));
        let cancel = CancellationToken::new();

        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &target.namespace);
        // Probe the initial stream so a bad remote port surfaces as an error here.
        pods.portforward(&pod_name, &[target.remote_port]).await?;

        let manager = self.clone();
        let task_cancel = cancel.clone();
        let task_session = session.clone();
        let remote_port = target.remote_port;
        let namespace = target.namespace.clone();
        tokio::spawn(async move {
            manager
                .drive(listener, pods, pod_name, remote_port, namespace, task_session, task_cancel)
                .await;
        });

        self.sessions.lock().await.insert(
            id,
            Entry {
                session: session.clone(),
                local_addr,
                cancel: cancel.clone(),
            },
        );

        Ok(PortForwardHandle {
            session,
            local_addr,
            cancel,
        })
    }

    async fn drive(
        self: Arc<Self>,
        listener: TcpListener,
        pods: Api<Pod>,
        pod_name: String,
        remote_port: u16,
        namespace: String,
        session: Arc<Mutex<Session>>,
        cancel: CancellationToken,
    ) {
        transition(&session, SessionState::Active).await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = listener.accept() => {
                    let Ok((mut stream, _peer)) = accepted else { break };
                    let pods = pods.clone();
                    let pod_name = pod_name.clone();
                    let namespace = namespace.clone();
                    let session = session.clone();
                    tokio::spawn(async move {
                        let mut forwarder = match pods.portforward(&pod_name, &[remote_port]).await {
                            Ok(f) => f,
                            Err(e) => {
                                warn!(error = %e, namespace, pod_name, "port-forward stream failed after establishment");
                                transition(&session, SessionState::Failed).await;
                                return;
                            }
                        };
                        let Some(mut upstream) = forwarder.take_stream(remote_port) else {
                            transition(&session, SessionState::Failed).await;
                            return;
                        };
                        if let Err(e) = tokio::io::copy_bidirectional(&mut stream, &mut upstream).await {
                            warn!(error = %e, namespace, pod_name, "port-forward connection ended");
                        }
                    });
                }
            }
        }
        transition(&session, SessionState::Closing).await;
        transition(&session, SessionState::Closed).await;
    }

    pub async fn list(&self) -> Vec<(Uuid, Session, SocketAddr)> {
        let sessions = self.sessions.lock().await;
        let mut out = Vec::with_capacity(sessions.len());
        for (id, e) in sessions.iter() {
            out.push((*id, e.session.lock().await.clone(), e.local_addr));
        }
        out
    }

    pub async fn close(&self, id: Uuid) -> bool {
        if let Some(entry) = self.sessions.lock().await.remove(&id) {
            entry.cancel.cancel();
            transition(&entry.session, SessionState::Closing).await;
            transition(&entry.session, SessionState::Closed).await;
            true
        } else {
            false
        }
    }

    /// Closes every live session at once, e.g. on context switch.
    pub async fn close_all(&self) {
        let mut sessions = self.sessions.lock().await;
        for (_, entry) in sessions.drain() {
            entry.cancel.cancel();
            transition(&entry.session, SessionState::Closing).await;
            transition(&entry.session, SessionState::Closed).await;
        }
    }
}

/// Resolves `(namespace, name)` as either a pod or a service (per
/// `is_service`) and reports whether a forward could actually be opened
/// against it right now, i.e. the pod exists (directly, or as a
/// service's backing pod). Used by the `portforwards/available` probe
/// endpoint; never returns an error itself, since "not available" is a
/// normal answer, not a failure.
pub async fn target_is_available(client: &kube::Client, namespace: &str, name: &str, is_service: bool) -> bool {
    if is_service {
        resolve_backing_pod(client, namespace, name).await.is_ok()
    } else {
        let pods: Api<Pod> = Api::namespaced(client.clone(), namespace);
        pods.get(name).await.is_ok()
    }
}

async fn resolve_backing_pod(
    client: &kube::Client,
    namespace: &str,
    service_name: &str,
) -> Result<String, kube::Error> {
    let services: Api<Service> = Api::namespaced(client.clone(), namespace);
    let service = services.get(service_name).await?;
    let selector = service
        .spec
        .and_then(|s| s.selector)
        .unwrap_or_default();

    let label_selector = selector
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",");

    let pods: Api<Pod> = Api::namespaced(client.clone(), namespace);
    let list = pods
        .list(&kube::api::ListParams::default().labels(&label_selector))
        .await?;
    list.items
        .into_iter()
        .find_map(|p| p.metadata.name)
        .ok_or_else(|| {
            kube::Error::Service(Box::new(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no backing pod found for service {service_name}"),
            )))
        })
}
