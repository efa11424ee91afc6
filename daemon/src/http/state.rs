//! Shared application state threaded through every handler via axum's
//! `State` extractor.

use crate::capability::CapabilityProber;
use crate::cluster_client::ClusterClientFacade;
use crate::event_fabric::{ChangeReplayBuffer, EventFabric};
use crate::image::ImageInspector;
use crate::release_ops::ReleaseOps;
use crate::sessions::logs::LogSessionManager;
use crate::sessions::portforward::PortForwardManager;
use crate::sessions::shell::ShellSessionManager;
use kview_core::history::ChangeHistory;
use kview_core::topology::TopologyBuilder;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const CHANGE_REPLAY_CAPACITY: usize = 512;

#[derive(Clone)]
pub struct AppState {
    pub facade: Arc<ClusterClientFacade>,
    pub prober: Arc<CapabilityProber>,
    pub fabric: Arc<EventFabric>,
    pub history: Arc<ChangeHistory>,
    pub topology: Arc<TopologyBuilder>,
    pub replay: Arc<ChangeReplayBuffer>,
    pub port_forwards: Arc<Mutex<Option<Arc<PortForwardManager>>>>,
    pub shells: Arc<Mutex<Option<Arc<ShellSessionManager>>>>,
    pub logs: Arc<Mutex<Option<Arc<LogSessionManager>>>>,
    pub images: Arc<ImageInspector>,
    pub releases: Arc<dyn ReleaseOps>,
    pub read_only: bool,
}

impl AppState {
    /// (Re)builds every session manager (port-forwards, exec, log-follow)
    /// against whatever client is currently active, closing out every
    /// session the previous managers were holding first. Called once at
    /// bootstrap and again after every successful context switch, since
    /// sessions do not survive a switch.
    pub async fn refresh_sessions(&self) {
        let client = self.facade.client().await;

        let mut port_forwards = self.port_forwards.lock().await;
        if let Some(old) = port_forwards.take() {
            old.close_all().await;
        }
        *port_forwards = client.clone().map(PortForwardManager::new);
        drop(port_forwards);

        let mut shells = self.shells.lock().await;
        if let Some(old) = shells.take() {
            old.close_all().await;
        }
        *shells = client.clone().map(ShellSessionManager::new);
        drop(shells);

        let mut logs = self.logs.lock().await;
        if let Some(old) = logs.take() {
            old.close_all().await;
        }
        *logs = client.map(LogSessionManager::new);
    }

    pub async fn port_forwards(&self) -> Option<Arc<PortForwardManager>> {
        self.port_forwards.lock().await.clone()
    }

    pub async fn shells(&self) -> Option<Arc<ShellSessionManager>> {
        self.shells.lock().await.clone()
    }

    pub async fn logs(&self) -> Option<Arc<LogSessionManager>> {
        self.logs.lock().await.clone()
    }
}
