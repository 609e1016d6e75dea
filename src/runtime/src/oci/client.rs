//! Registry client seam.
//!
//! The pipeline only talks to a registry through [`RegistryClient`]. The
//! production implementation is [`OciRegistry`](super::registry::OciRegistry);
//! tests substitute an in-memory registry.

use a3s_pull_core::descriptor::{ArtifactManifest, Descriptor, Manifest};
use a3s_pull_core::error::Result;
use async_trait::async_trait;
use tokio::io::AsyncRead;

/// Byte stream of one blob.
pub type BlobStream = Box<dyn AsyncRead + Send + Unpin>;

/// Operations the pull pipeline needs from a registry.
///
/// Implementations must report a missing resource as
/// [`PullError::NotFound`](a3s_pull_core::PullError::NotFound) so callers
/// can tell it apart from transport failures.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Resolve a reference to its manifest descriptor and body.
    async fn resolve(&self, reference: &str) -> Result<(Descriptor, Manifest)>;

    /// Open the content of a blob.
    async fn fetch(&self, descriptor: &Descriptor) -> Result<BlobStream>;

    /// List manifests referring to `descriptor`, optionally filtered by
    /// artifact type.
    async fn discover_references(
        &self,
        descriptor: &Descriptor,
        artifact_type: Option<&str>,
    ) -> Result<Vec<Descriptor>>;

    /// Resolve a reference to an artifact manifest.
    async fn resolve_artifact_manifest(
        &self,
        reference: &str,
    ) -> Result<(Descriptor, ArtifactManifest)>;
}
