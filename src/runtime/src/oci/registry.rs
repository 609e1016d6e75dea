//! OCI registry client backed by `oci-distribution`.
//!
//! Implements [`RegistryClient`] against real container registries (GHCR,
//! Docker Hub, ACR, ...). The wire protocol, token exchange and manifest
//! negotiation are left to `oci-distribution`.

use std::collections::BTreeMap;

use a3s_pull_core::descriptor::{validate_digest, ArtifactManifest, Descriptor, Manifest};
use a3s_pull_core::error::{PullError, Result};
use async_trait::async_trait;
use oci_distribution::client::{ClientConfig, ClientProtocol};
use oci_distribution::errors::OciDistributionError;
use oci_distribution::manifest::{
    ImageIndexEntry, OciDescriptor, OCI_IMAGE_INDEX_MEDIA_TYPE, OCI_IMAGE_MEDIA_TYPE,
};
use oci_distribution::secrets::RegistryAuth as OciRegistryAuth;
use oci_distribution::{Client, Reference, RegistryOperation};
use serde::Deserialize;

use super::client::{BlobStream, RegistryClient};
use super::credentials::CredentialStore;
use super::reference::ImageReference;

/// Media type of an ORAS artifact manifest.
pub const ORAS_ARTIFACT_MANIFEST_MEDIA_TYPE: &str =
    "application/vnd.cncf.oras.artifact.manifest.v1+json";

/// Authentication credentials for a container registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryAuth {
    username: Option<String>,
    password: Option<String>,
}

impl RegistryAuth {
    /// No credentials.
    pub fn anonymous() -> Self {
        Self {
            username: None,
            password: None,
        }
    }

    /// Basic authentication with username and password.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }

    /// Read `REGISTRY_USERNAME` and `REGISTRY_PASSWORD`, anonymous if unset.
    pub fn from_env() -> Self {
        match (
            std::env::var("REGISTRY_USERNAME").ok(),
            std::env::var("REGISTRY_PASSWORD").ok(),
        ) {
            (Some(u), Some(p)) => Self::basic(u, p),
            _ => Self::anonymous(),
        }
    }

    /// Credential store first, then environment, then anonymous.
    pub fn resolve(registry: &str) -> Self {
        let stored = CredentialStore::default_path().and_then(|store| store.get(registry));
        match stored {
            Ok(Some(cred)) => Self::basic(cred.username, cred.password),
            Ok(None) => Self::from_env(),
            Err(e) => {
                tracing::warn!(registry, error = %e, "Ignoring unreadable credential store");
                Self::from_env()
            }
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.username.is_none()
    }

    fn to_oci_auth(&self) -> OciRegistryAuth {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => OciRegistryAuth::Basic(u.clone(), p.clone()),
            _ => OciRegistryAuth::Anonymous,
        }
    }
}

/// Registry client scoped to one repository.
///
/// Blobs and referrers are addressed by digest inside the repository the
/// client was created for.
pub struct OciRegistry {
    client: Client,
    auth: RegistryAuth,
    registry: String,
    repository: String,
}

impl OciRegistry {
    /// Create a client for the repository named by `reference`.
    pub fn new(reference: &ImageReference, auth: RegistryAuth) -> Self {
        let config = ClientConfig {
            protocol: ClientProtocol::Https,
            platform_resolver: Some(Box::new(host_platform_resolver)),
            ..Default::default()
        };

        Self {
            client: Client::new(config),
            auth,
            registry: reference.registry.clone(),
            repository: reference.repository.clone(),
        }
    }

    /// Create a client using stored or environment credentials.
    pub fn with_default_auth(reference: &ImageReference) -> Self {
        let auth = RegistryAuth::resolve(&reference.registry);
        Self::new(reference, auth)
    }

    fn digest_reference(&self, digest: &str) -> Result<Reference> {
        to_oci_reference(&ImageReference::for_digest(&self.registry, &self.repository, digest)?)
    }

    /// Referrers tag schema: `<repo>:<alg>-<encoded>` holds an image index
    /// of the manifests referring to the digest.
    fn referrers_tag_reference(&self, digest: &str) -> Result<Reference> {
        validate_digest(digest)?;
        let reference = ImageReference {
            registry: self.registry.clone(),
            repository: self.repository.clone(),
            tag: Some(referrers_tag(digest)),
            digest: None,
        };
        to_oci_reference(&reference)
    }

    /// Make sure a pull token for the repository is cached by the client.
    async fn authenticate(&self, oci_ref: &Reference) -> Result<()> {
        self.client
            .auth(oci_ref, &self.auth.to_oci_auth(), RegistryOperation::Pull)
            .await
            .map_err(|e| self.classify(e, "authenticate"))?;
        Ok(())
    }

    /// Map a client error, keeping "not found" distinguishable.
    fn classify(&self, err: OciDistributionError, action: &str) -> PullError {
        match err {
            OciDistributionError::ImageManifestNotFoundError(message) => {
                PullError::NotFound(format!("{}: {}", action, message))
            }
            OciDistributionError::ServerError { code: 404, url, .. } => {
                PullError::NotFound(format!("{}: {}", action, url))
            }
            other => PullError::RegistryError {
                registry: self.registry.clone(),
                message: format!("failed to {}: {}", action, other),
            },
        }
    }
}

#[async_trait]
impl RegistryClient for OciRegistry {
    async fn resolve(&self, reference: &str) -> Result<(Descriptor, Manifest)> {
        let parsed = ImageReference::parse(reference)?;
        let oci_ref = to_oci_reference(&parsed)?;

        tracing::debug!(reference = %parsed, "Resolving manifest");

        let (image_manifest, digest) = self
            .client
            .pull_image_manifest(&oci_ref, &self.auth.to_oci_auth())
            .await
            .map_err(|e| self.classify(e, "pull manifest"))?;

        let body = serde_json::to_vec(&image_manifest)?;
        let manifest: Manifest = serde_json::from_slice(&body)?;
        let media_type = manifest
            .media_type
            .clone()
            .unwrap_or_else(|| OCI_IMAGE_MEDIA_TYPE.to_string());

        Ok((Descriptor::new(media_type, digest, body.len() as i64), manifest))
    }

    async fn fetch(&self, descriptor: &Descriptor) -> Result<BlobStream> {
        let oci_ref = self.digest_reference(&descriptor.digest)?;
        self.authenticate(&oci_ref).await?;

        let layer = OciDescriptor {
            media_type: descriptor.media_type.clone(),
            digest: descriptor.digest.clone(),
            size: descriptor.size,
            ..Default::default()
        };

        let mut data: Vec<u8> = Vec::new();
        self.client
            .pull_blob(&oci_ref, &layer, &mut data)
            .await
            .map_err(|e| PullError::FetchFailed {
                digest: descriptor.digest.clone(),
                message: e.to_string(),
            })?;

        Ok(Box::new(std::io::Cursor::new(data)))
    }

    async fn discover_references(
        &self,
        descriptor: &Descriptor,
        artifact_type: Option<&str>,
    ) -> Result<Vec<Descriptor>> {
        let oci_ref = self.referrers_tag_reference(&descriptor.digest)?;

        let (body, _) = self
            .client
            .pull_manifest_raw(&oci_ref, &self.auth.to_oci_auth(), &[OCI_IMAGE_INDEX_MEDIA_TYPE])
            .await
            .map_err(|e| self.classify(e, "list referrers"))?;

        referrers_from_index(&body, artifact_type)
    }

    async fn resolve_artifact_manifest(
        &self,
        reference: &str,
    ) -> Result<(Descriptor, ArtifactManifest)> {
        let oci_ref = to_oci_reference(&ImageReference::parse(reference)?)?;

        let (body, digest) = self
            .client
            .pull_manifest_raw(
                &oci_ref,
                &self.auth.to_oci_auth(),
                &[ORAS_ARTIFACT_MANIFEST_MEDIA_TYPE, OCI_IMAGE_MEDIA_TYPE],
            )
            .await
            .map_err(|e| self.classify(e, "pull artifact manifest"))?;

        let manifest: ArtifactManifest = serde_json::from_slice(&body)?;
        let media_type = manifest
            .media_type
            .clone()
            .unwrap_or_else(|| ORAS_ARTIFACT_MANIFEST_MEDIA_TYPE.to_string());

        Ok((Descriptor::new(media_type, digest, body.len() as i64), manifest))
    }
}

/// Tag the referrers index of `digest` is published under.
fn referrers_tag(digest: &str) -> String {
    digest.replacen(':', "-", 1)
}

#[derive(Debug, Deserialize)]
struct ReferrersIndex {
    #[serde(default)]
    manifests: Vec<ReferrerEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReferrerEntry {
    #[serde(default)]
    media_type: String,
    digest: String,
    #[serde(default)]
    size: i64,
    #[serde(default)]
    artifact_type: Option<String>,
    #[serde(default)]
    annotations: BTreeMap<String, String>,
}

/// Decode a referrers index, keeping entries of `artifact_type` if given.
fn referrers_from_index(body: &[u8], artifact_type: Option<&str>) -> Result<Vec<Descriptor>> {
    let index: ReferrersIndex = serde_json::from_slice(body)?;
    Ok(index
        .manifests
        .into_iter()
        .filter(|entry| artifact_type.map_or(true, |t| entry.artifact_type.as_deref() == Some(t)))
        .map(|entry| Descriptor {
            media_type: entry.media_type,
            digest: entry.digest,
            size: entry.size,
            annotations: entry.annotations,
        })
        .collect())
}

/// Convert an ImageReference to an oci-distribution Reference.
fn to_oci_reference(reference: &ImageReference) -> Result<Reference> {
    let ref_str = reference.full_reference();
    ref_str.parse::<Reference>().map_err(|e| {
        PullError::ParseError(format!("invalid OCI reference '{}': {}", ref_str, e))
    })
}

/// Pick the index entry matching the host OS and CPU architecture.
fn host_platform_resolver(manifests: &[ImageIndexEntry]) -> Option<String> {
    let arch = match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        other => other,
    };
    let os = std::env::consts::OS;

    manifests
        .iter()
        .find(|entry| {
            entry
                .platform
                .as_ref()
                .map_or(false, |p| p.os == os && p.architecture == arch)
        })
        .map(|entry| entry.digest.clone())
}
