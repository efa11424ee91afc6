// Copyright (c) 2023 Yan Ka, Chiu.
// All rights reserved.
//
// Redistribution and use in source and binary forms, with or without
// modification, are permitted provided that the following conditions
// are met:
// 1. Redistributions of source code must retain the above copyright
//    notice, this list of conditions, and the following disclaimer,
//    without modification, immediately at the beginning of the file.
// 2. The name of the author may not be used to endorse or promote products
//    derived from this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE AUTHOR AND CONTRIBUTORS ``AS IS'' AND
// ANY EXPRESS OR IMPLIED WARRANTIES, INCLUDING, BUT NOT LIMITED TO, THE
// IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE
// ARE DISCLAIMED. IN NO EVENT SHALL THE AUTHOR OR CONTRIBUTORS BE LIABLE FOR
// ANY DIRECT, INDIRECT, INCIDENTAL, SPECIAL, EXEMPLARY, OR CONSEQUENTIAL
// DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS
// OR SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION)
// HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY, WHETHER IN CONTRACT, STRICT
// LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY
// OUT OF THE USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF
// SUCH DAMAGE.

pub mod capability;
pub mod cluster_client;
pub mod config;
pub mod error;
pub mod event_fabric;
pub mod http;
pub mod image;
pub mod release_ops;
pub mod sessions;

use std::path::PathBuf;
use std::sync::Arc;

use kview_core::history::ChangeHistory;
use kview_core::topology::{ClusterStateView, TopologyBuilder};
use tokio::sync::Mutex;
use tracing::info;

use crate::capability::CapabilityProber;
use crate::cluster_client::ClusterClientFacade;
use crate::config::Args;
use crate::event_fabric::{ChangeReplayBuffer, EventFabric};
use crate::http::{router, AppState, CHANGE_REPLAY_CAPACITY};
use crate::image::auth::{Keychain, PullSecretProvider};
use crate::image::layer_cache::LayerCache;
use crate::image::ImageInspector;
use crate::release_ops::CliReleaseOps;

pub async fn run(args: Args) -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    info!(?args, "starting");

    let fabric = EventFabric::new();
    let history = Arc::new(ChangeHistory::new(args.history_limit, args.persist_path()));

    let facade = ClusterClientFacade::new(
        args.credential_path.clone(),
        args.curated_kinds.clone(),
        history.clone(),
        fabric.clone(),
    );
    facade.start().await?;

    let state_view: Arc<dyn ClusterStateView> = facade.clone();
    let topology = TopologyBuilder::new(state_view);
    facade.attach_topology(topology.clone()).await;

    let prober = {
        let facade = facade.clone();
        CapabilityProber::new(move || {
            let facade = facade.clone();
            async move { facade.client().await }
        })
    };

    let keychain = match facade.client().await {
        Some(client) => Keychain::new(Some(PullSecretProvider::new(client, "default".to_string(), "default".to_string()))),
        None => Keychain::new(None),
    };
    let layer_cache_root = dirs_home().map(|h| h.join(".kview").join("layer-cache")).unwrap_or_else(|| PathBuf::from("/tmp/kview-layer-cache"));
    let images = Arc::new(ImageInspector::new(keychain, LayerCache::new(layer_cache_root)));

    let releases: Arc<dyn crate::release_ops::ReleaseOps> = Arc::new(CliReleaseOps::new("helm".to_string()));

    let state = AppState {
        facade: facade.clone(),
        prober,
        fabric: fabric.clone(),
        history,
        topology,
        replay: Arc::new(ChangeReplayBuffer::new(CHANGE_REPLAY_CAPACITY)),
        port_forwards: Arc::new(Mutex::new(None)),
        shells: Arc::new(Mutex::new(None)),
        logs: Arc::new(Mutex::new(None)),
        images,
        releases,
        read_only: args.read_only,
    };
    state.refresh_sessions().await;

    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], args.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, router(state)).await?;

    Ok(())
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

#[cfg(test)]
mod tests {}
