//! In-memory registry.
//!
//! Serves manifests, blobs and referrers from maps so the pipeline can be
//! exercised without a network. Missing entries answer with
//! [`PullError::NotFound`], like a registry returning 404.

use std::collections::HashMap;
use std::time::Duration;

use a3s_pull_core::descriptor::{ArtifactManifest, Descriptor, Manifest};
use a3s_pull_core::error::{PullError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::oci::client::{BlobStream, RegistryClient};

#[derive(Debug, Clone)]
struct Referrer {
    descriptor: Descriptor,
    manifest: Option<ArtifactManifest>,
}

/// Registry backed by in-memory maps.
#[derive(Default)]
pub struct MemoryRegistry {
    manifests: HashMap<String, (Descriptor, Manifest)>,
    blobs: HashMap<String, Vec<u8>>,
    referrers: HashMap<String, Vec<Referrer>>,
    discovery_failure: Option<String>,
    fetch_delay: Option<Duration>,
    fetches: Mutex<HashMap<String, usize>>,
    resolved_artifacts: Mutex<Vec<String>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `manifest` for `reference`.
    pub fn with_manifest(mut self, reference: &str, descriptor: Descriptor, manifest: Manifest) -> Self {
        self.manifests.insert(reference.to_string(), (descriptor, manifest));
        self
    }

    /// Serve `data` for `digest`.
    pub fn with_blob(mut self, digest: &str, data: Vec<u8>) -> Self {
        self.blobs.insert(digest.to_string(), data);
        self
    }

    /// Register an artifact manifest referring to `subject`.
    pub fn with_referrer(mut self, subject: &str, descriptor: Descriptor, manifest: ArtifactManifest) -> Self {
        self.referrers
            .entry(subject.to_string())
            .or_default()
            .push(Referrer {
                descriptor,
                manifest: Some(manifest),
            });
        self
    }

    /// List `descriptor` as referring to `subject` without serving its manifest.
    pub fn with_dangling_referrer(mut self, subject: &str, descriptor: Descriptor) -> Self {
        self.referrers
            .entry(subject.to_string())
            .or_default()
            .push(Referrer {
                descriptor,
                manifest: None,
            });
        self
    }

    /// Answer discovery for `subject` with an empty list instead of 404.
    pub fn with_no_referrers(mut self, subject: &str) -> Self {
        self.referrers.entry(subject.to_string()).or_default();
        self
    }

    /// Fail every discovery call with a registry error.
    pub fn with_discovery_failure(mut self, message: &str) -> Self {
        self.discovery_failure = Some(message.to_string());
        self
    }

    /// Sleep before answering each fetch.
    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    /// How often the blob `digest` was fetched.
    pub fn fetch_count(&self, digest: &str) -> usize {
        self.fetches.lock().get(digest).copied().unwrap_or(0)
    }

    /// References passed to `resolve_artifact_manifest`, in call order.
    pub fn resolved_artifacts(&self) -> Vec<String> {
        self.resolved_artifacts.lock().clone()
    }
}

#[async_trait]
impl RegistryClient for MemoryRegistry {
    async fn resolve(&self, reference: &str) -> Result<(Descriptor, Manifest)> {
        self.manifests
            .get(reference)
            .cloned()
            .ok_or_else(|| PullError::NotFound(format!("manifest {}", reference)))
    }

    async fn fetch(&self, descriptor: &Descriptor) -> Result<BlobStream> {
        *self.fetches.lock().entry(descriptor.digest.clone()).or_default() += 1;
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        let data = self
            .blobs
            .get(&descriptor.digest)
            .cloned()
            .ok_or_else(|| PullError::NotFound(format!("blob {}", descriptor.digest)))?;
        Ok(Box::new(std::io::Cursor::new(data)))
    }

    async fn discover_references(
        &self,
        descriptor: &Descriptor,
        artifact_type: Option<&str>,
    ) -> Result<Vec<Descriptor>> {
        if let Some(message) = &self.discovery_failure {
            return Err(PullError::RegistryError {
                registry: "memory".to_string(),
                message: message.clone(),
            });
        }

        let referrers = self
            .referrers
            .get(&descriptor.digest)
            .ok_or_else(|| PullError::NotFound(format!("referrers of {}", descriptor.digest)))?;

        Ok(referrers
            .iter()
            .filter(|r| {
                artifact_type.map_or(true, |t| {
                    r.manifest.as_ref().map_or(false, |m| m.artifact_type == t)
                })
            })
            .map(|r| r.descriptor.clone())
            .collect())
    }

    async fn resolve_artifact_manifest(
        &self,
        reference: &str,
    ) -> Result<(Descriptor, ArtifactManifest)> {
        self.resolved_artifacts.lock().push(reference.to_string());

        let digest = reference
            .rsplit_once('@')
            .map(|(_, d)| d)
            .ok_or_else(|| PullError::ParseError(format!("no digest in {}", reference)))?;

        self.referrers
            .values()
            .flatten()
            .find(|r| r.descriptor.digest == digest)
            .and_then(|r| Some((r.descriptor.clone(), r.manifest.clone()?)))
            .ok_or_else(|| PullError::NotFound(format!("artifact manifest {}", reference)))
    }
}

/// Manifest with one 10-byte config (`sha256:aaa`) and one 20-byte layer
/// (`sha256:bbb`), annotated with the given store coordinates.
pub fn sample_manifest(host: &str, namespace: &str, loc: &str) -> (Descriptor, Manifest) {
    let mut manifest = Manifest {
        schema_version: 2,
        media_type: Some("application/vnd.oci.image.manifest.v1+json".to_string()),
        config: Descriptor::new("application/vnd.oci.image.config.v1+json", "sha256:aaa", 10),
        layers: vec![Descriptor::new("application/vnd.oci.image.layer.v1.tar", "sha256:bbb", 20)],
        ..Default::default()
    };
    manifest.annotations.insert("host".to_string(), host.to_string());
    manifest.annotations.insert("namespace".to_string(), namespace.to_string());
    manifest.annotations.insert("loc".to_string(), loc.to_string());

    let descriptor = Descriptor::new("application/vnd.oci.image.manifest.v1+json", "sha256:m1", 512);
    (descriptor, manifest)
}
