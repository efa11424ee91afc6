//! Image Inspector & Layer Cache: registry pull via
//! `oci_util::distribution::client`, tar reconstruction via `ocitar`.

pub mod auth;
pub mod fs_tree;
pub mod layer_cache;

pub use auth::{CredentialProvider, Keychain};
pub use layer_cache::LayerCache;

use oci_util::distribution::client::{BasicAuth, ClientError, Registry};
use oci_util::image_reference::{ImageReference, ImageTag};
use oci_util::models::{ImageManifest, ManifestVariant};
use thiserror::Error;

use crate::image::auth::BasicCreds;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("registry error: {0}")]
    Registry(#[from] oci_util::distribution::client::ClientError),
    #[error("image not found: {0}")]
    NotFound(String),
    #[error("manifest list has no entry matching the requested platform")]
    NoMatchingPlatform,
    #[error(transparent)]
    Ocitar(#[from] ocitar::OcitarError),
    #[error("no credentials worked for {0}")]
    NoCredentials(String),
}

pub struct ImageInspector {
    keychain: Keychain,
    cache: LayerCache,
}

#[derive(serde::Serialize)]
pub struct ImageMetadata {
    pub reference: String,
    pub digest: String,
    pub media_type: String,
    pub layer_count: usize,
    pub credential_source: String,
}

impl ImageInspector {
    pub fn new(keychain: Keychain, cache: LayerCache) -> ImageInspector {
        ImageInspector { keychain, cache }
    }

    /// Opens an authenticated session against the reference's registry.
    /// Tries anonymous access first; if the registry challenges that with
    /// a 401/403, escalates through the keychain's providers in order
    /// until one authenticates. Returns the manifest the probe itself
    /// fetched alongside the session, so callers don't re-query it.
    async fn open_session(
        &self,
        reference: &ImageReference,
    ) -> Result<(oci_util::distribution::client::Session, String, ManifestVariant), ImageError> {
        let host = reference.hostname.clone().unwrap_or_else(|| "registry-1.docker.io".into());

        if let Some(opened) = self.try_session(&host, reference, None, "anonymous").await? {
            return Ok(opened);
        }

        for provider in self.keychain.providers() {
            if provider.name() == "anonymous" {
                continue;
            }
            let Some(Some(creds)) = provider.credentials_for(&host, &reference.name).await else {
                continue;
            };
            if let Some(opened) = self.try_session(&host, reference, Some(creds), provider.name()).await? {
                return Ok(opened);
            }
        }

        Err(ImageError::NoCredentials(host))
    }

    /// Probes one set of credentials by actually querying the manifest.
    /// `Ok(None)` means the registry rejected the credentials (auth
    /// failure) and the caller should escalate to the next provider; any
    /// other error is fatal and propagates immediately.
    async fn try_session(
        &self,
        host: &str,
        reference: &ImageReference,
        creds: Option<BasicCreds>,
        provider_name: &'static str,
    ) -> Result<Option<(oci_util::distribution::client::Session, String, ManifestVariant)>, ImageError> {
        let auth = creds.map(|c| BasicAuth::new(c.username, c.password));
        let registry = Registry::new(format!("https://{host}"), auth);
        let mut session = registry.new_session(reference.name.clone());
        match session.query_manifest(reference.tag.as_str()).await {
            Ok(Some(variant)) => Ok(Some((session, provider_name.to_string(), variant))),
            Ok(None) => Err(ImageError::NotFound(reference.to_string())),
            Err(e) if is_auth_failure(&e) => Ok(None),
            Err(e) => Err(ImageError::from(e)),
        }
    }

    /// Fetches metadata for one image reference, caching layer tars on
    /// disk under the manager's layer cache so repeated inspections of
    /// the same digest don't re-pull.
    pub async fn metadata(&self, reference: &ImageReference) -> Result<ImageMetadata, ImageError> {
        let (mut session, source, variant) = self.open_session(reference).await?;

        let manifest = match variant {
            ManifestVariant::Manifest(m) => m,
            ManifestVariant::List(list) => {
                let desc = list
                    .manifests
                    .iter()
                    .find(|m| m.platform.os == "linux" && m.platform.architecture == "amd64")
                    .ok_or(ImageError::NoMatchingPlatform)?;
                match session.query_manifest(&desc.digest).await?.ok_or_else(|| {
                    ImageError::NotFound(reference.to_string())
                })? {
                    ManifestVariant::Manifest(m) => m,
                    _ => return Err(ImageError::NoMatchingPlatform),
                }
            }
            ManifestVariant::Artifact(_) => return Err(ImageError::NoMatchingPlatform),
        };

        self.cache.ensure_layers(&mut session, reference, &manifest).await?;

        Ok(ImageMetadata {
            reference: reference.to_string(),
            digest: digest_of(&manifest),
            media_type: manifest.media_type.clone(),
            layer_count: manifest.layers.len(),
            credential_source: source,
        })
    }

    /// Streams one file's bytes from the highest non-whited-out layer
    /// that provides `path`.
    pub async fn get_file(
        &self,
        reference: &ImageReference,
        path: &str,
    ) -> Result<Option<Vec<u8>>, ImageError> {
        let (mut session, _source, variant) = self.open_session(reference).await?;
        let manifest = match variant {
            ManifestVariant::Manifest(m) => m,
            _ => return Err(ImageError::NoMatchingPlatform),
        };
        self.cache.ensure_layers(&mut session, reference, &manifest).await?;
        self.cache.find_file(reference, &manifest, path).map_err(ImageError::from)
    }
}

/// Whether a registry error means "these credentials were rejected" as
/// opposed to a transport failure or an unrelated server error — the
/// signal that escalation to the next keychain provider is worthwhile.
fn is_auth_failure(err: &ClientError) -> bool {
    match err {
        ClientError::UnsuccessfulResponse(response) => {
            matches!(response.status().as_u16(), 401 | 403)
        }
        ClientError::MissingBearerToken => true,
        _ => false,
    }
}

fn digest_of(manifest: &ImageManifest) -> String {
    manifest.config.digest.as_str().to_string()
}

pub fn default_tag(name: &str) -> ImageTag {
    ImageTag::Tag(if name.contains(':') {
        name.rsplit(':').next().unwrap_or("latest").to_string()
    } else {
        "latest".to_string()
    })
}
