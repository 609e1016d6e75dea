//! Artifact discovery.
//!
//! Finds artifact manifests (signatures, SBOMs, ...) that refer to the
//! resolved manifest and records them next to it as
//! `discovered-artifacts.json`.

use a3s_pull_core::descriptor::{ArtifactManifest, Descriptor};
use a3s_pull_core::error::{PullError, Result};

use super::context::PipelineContext;
use super::locator::StoreLocation;
use crate::oci::client::RegistryClient;
use crate::oci::reference::ImageReference;

/// File the discovered manifest list is written to inside the store location.
pub const DISCOVERED_ARTIFACTS_FILE: &str = "discovered-artifacts.json";

/// Discover artifacts referring to `descriptor`.
///
/// Each referrer is resolved to its full manifest as
/// `<host>/<namespace>@<digest>` using the store location's annotations.
/// A missing-resource response for the referrer list is returned unchanged
/// as [`PullError::NotFound`]; the caller decides whether that is fatal. A
/// listed referrer whose manifest cannot be found is a
/// [`PullError::RegistryError`].
pub async fn discover<R>(
    registry: &R,
    ctx: &PipelineContext,
    location: &StoreLocation,
    descriptor: &Descriptor,
    artifact_type: Option<&str>,
) -> Result<Vec<ArtifactManifest>>
where
    R: RegistryClient + ?Sized,
{
    let references = registry.discover_references(descriptor, artifact_type).await?;

    tracing::debug!(
        digest = %descriptor.digest,
        count = references.len(),
        "Found referrers"
    );

    let mut artifacts = Vec::with_capacity(references.len());
    for reference in &references {
        let artifact_ref =
            ImageReference::for_digest(&location.host, &location.namespace, &reference.digest)?;
        let (_, manifest) = registry
            .resolve_artifact_manifest(&artifact_ref.full_reference())
            .await
            .map_err(|e| match e {
                // listed but unresolvable: not the same as "no artifacts"
                PullError::NotFound(message) => PullError::RegistryError {
                    registry: location.host.clone(),
                    message: format!("referrer {} not found: {}", artifact_ref, message),
                },
                other => other,
            })?;

        tracing::debug!(
            reference = %artifact_ref,
            artifact_type = %manifest.artifact_type,
            blobs = manifest.blobs.len(),
            "Resolved artifact manifest"
        );
        artifacts.push(manifest);
    }

    let path = ctx.output_dir()?.join(DISCOVERED_ARTIFACTS_FILE);
    std::fs::write(&path, serde_json::to_vec_pretty(&artifacts)?)?;

    Ok(artifacts)
}
