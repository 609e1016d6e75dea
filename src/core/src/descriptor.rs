//! Content descriptors and manifests.
//!
//! These mirror the JSON shapes used by OCI registries closely enough to be
//! serialized into the store verbatim (`manifest.json`,
//! `discovered-artifacts.json`). Annotation maps are ordered so that the
//! serialized form of a given manifest is always byte-identical.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{PullError, Result};

/// Annotation key a normalized artifact blob carries its artifact type under.
pub const ARTIFACT_TYPE_ANNOTATION: &str = "artifactType";

/// Identity and metadata for a unit of content.
///
/// Two descriptors with the same digest refer to the same content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    #[serde(default)]
    pub media_type: String,
    pub digest: String,
    #[serde(default)]
    pub size: i64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl Descriptor {
    /// Create a descriptor without annotations.
    pub fn new(media_type: impl Into<String>, digest: impl Into<String>, size: i64) -> Self {
        Self {
            media_type: media_type.into(),
            digest: digest.into(),
            size,
            annotations: BTreeMap::new(),
        }
    }
}

impl PartialEq for Descriptor {
    fn eq(&self, other: &Self) -> bool {
        self.digest == other.digest
    }
}

impl Eq for Descriptor {}

/// Image manifest: one config descriptor plus ordered layers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default = "default_schema_version")]
    pub schema_version: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default)]
    pub config: Descriptor,
    #[serde(default)]
    pub layers: Vec<Descriptor>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl Manifest {
    /// Look up a manifest annotation.
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    /// Config followed by layers, in fetch order.
    ///
    /// A config without a digest is left out.
    pub fn blobs(&self) -> Vec<Descriptor> {
        let config = Some(&self.config).filter(|c| !c.digest.is_empty());
        config.into_iter().chain(self.layers.iter()).cloned().collect()
    }
}

fn default_schema_version() -> u8 {
    2
}

/// Blob entry of an artifact manifest.
///
/// Unlike [`Descriptor`], annotations are optional and the entry may carry
/// its own artifact type, so it is normalized before staging.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactDescriptor {
    #[serde(default)]
    pub media_type: String,
    pub digest: String,
    #[serde(default)]
    pub size: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

impl ArtifactDescriptor {
    /// Convert into the canonical descriptor shape.
    ///
    /// The blob's own artifact type wins; `fallback_type` (the manifest's)
    /// is used when the blob has none. Empty types are not recorded.
    pub fn normalize(&self, fallback_type: &str) -> Descriptor {
        let mut annotations = self.annotations.clone().unwrap_or_default();
        let artifact_type = self
            .artifact_type
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(fallback_type);
        if !artifact_type.is_empty() {
            annotations.insert(ARTIFACT_TYPE_ANNOTATION.to_string(), artifact_type.to_string());
        }

        Descriptor {
            media_type: self.media_type.clone(),
            digest: self.digest.clone(),
            size: self.size,
            annotations,
        }
    }
}

/// Manifest of an artifact that refers to another piece of content.
///
/// Accepts both the ORAS artifact manifest (`blobs`) and OCI 1.1 artifact
/// image manifests (`layers`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default)]
    pub artifact_type: String,
    #[serde(default, alias = "layers")]
    pub blobs: Vec<ArtifactDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Descriptor>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl ArtifactManifest {
    /// Blob list normalized into canonical descriptors, in manifest order.
    pub fn normalized_blobs(&self) -> Vec<Descriptor> {
        self.blobs
            .iter()
            .map(|b| b.normalize(&self.artifact_type))
            .collect()
    }
}

/// Check that a digest can serve as both content identity and file name.
///
/// Accepts `algorithm:encoded`; rejects path separators, NUL, and names
/// that would be hidden or relative.
pub fn validate_digest(digest: &str) -> Result<()> {
    let invalid = |reason: &str| PullError::InvalidDigest(format!("{:?}: {}", digest, reason));

    let (algorithm, encoded) = digest
        .split_once(':')
        .ok_or_else(|| invalid("expected algorithm:encoded"))?;
    if algorithm.is_empty() || encoded.is_empty() {
        return Err(invalid("empty algorithm or encoded part"));
    }
    if digest.starts_with('.') {
        return Err(invalid("leading dot"));
    }
    if digest.contains(['/', '\\', '\0']) {
        return Err(invalid("contains a path separator"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_identity_is_digest() {
        let mut a = Descriptor::new("application/octet-stream", "sha256:aaa", 10);
        let b = Descriptor::new("text/plain", "sha256:aaa", 99);
        a.annotations.insert("k".to_string(), "v".to_string());
        assert_eq!(a, b);
        assert_ne!(a, Descriptor::new("text/plain", "sha256:bbb", 10));
    }

    #[test]
    fn test_manifest_deserialize_oci_shape() {
        let json = r#"{
            "schemaVersion": 2,
            "mediaType": "application/vnd.oci.image.manifest.v1+json",
            "config": {"mediaType": "application/vnd.oci.image.config.v1+json", "digest": "sha256:aaa", "size": 10},
            "layers": [{"mediaType": "application/vnd.oci.image.layer.v1.tar", "digest": "sha256:bbb", "size": 20}],
            "annotations": {"host": "example.com", "namespace": "repo", "loc": "v1"}
        }"#;
        let manifest: Manifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.config.digest, "sha256:aaa");
        assert_eq!(manifest.layers.len(), 1);
        assert_eq!(manifest.annotation("host"), Some("example.com"));
        assert_eq!(manifest.annotation("missing"), None);
    }

    #[test]
    fn test_manifest_blobs_order() {
        let manifest = Manifest {
            config: Descriptor::new("cfg", "sha256:aaa", 10),
            layers: vec![
                Descriptor::new("l", "sha256:bbb", 20),
                Descriptor::new("l", "sha256:ccc", 30),
            ],
            ..Default::default()
        };
        let digests: Vec<_> = manifest.blobs().into_iter().map(|d| d.digest).collect();
        assert_eq!(digests, vec!["sha256:aaa", "sha256:bbb", "sha256:ccc"]);
    }

    #[test]
    fn test_manifest_without_config() {
        let manifest: Manifest = serde_json::from_str(r#"{"schemaVersion": 2, "layers": []}"#).unwrap();
        assert!(manifest.config.digest.is_empty());
        assert!(manifest.blobs().is_empty());
    }

    #[test]
    fn test_manifest_serialization_is_deterministic() {
        let mut manifest = Manifest {
            schema_version: 2,
            config: Descriptor::new("cfg", "sha256:aaa", 10),
            ..Default::default()
        };
        manifest.annotations.insert("namespace".to_string(), "repo".to_string());
        manifest.annotations.insert("host".to_string(), "example.com".to_string());
        manifest.annotations.insert("loc".to_string(), "v1".to_string());

        let first = serde_json::to_string(&manifest).unwrap();
        let second = serde_json::to_string(&manifest.clone()).unwrap();
        assert_eq!(first, second);
        assert!(first.find("\"host\"").unwrap() < first.find("\"loc\"").unwrap());
    }

    #[test]
    fn test_normalize_injects_artifact_type() {
        let blob = ArtifactDescriptor {
            media_type: "application/json".to_string(),
            digest: "sha256:sig".to_string(),
            size: 5,
            artifact_type: None,
            annotations: None,
        };
        let desc = blob.normalize("application/vnd.example.signature");
        assert_eq!(desc.digest, "sha256:sig");
        assert_eq!(
            desc.annotations.get(ARTIFACT_TYPE_ANNOTATION).map(String::as_str),
            Some("application/vnd.example.signature")
        );
    }

    #[test]
    fn test_normalize_prefers_blob_artifact_type() {
        let mut annotations = BTreeMap::new();
        annotations.insert("org.opencontainers.image.title".to_string(), "sbom.json".to_string());
        let blob = ArtifactDescriptor {
            media_type: "application/json".to_string(),
            digest: "sha256:sbom".to_string(),
            size: 5,
            artifact_type: Some("application/spdx+json".to_string()),
            annotations: Some(annotations),
        };
        let desc = blob.normalize("application/vnd.example.signature");
        assert_eq!(desc.annotations.len(), 2);
        assert_eq!(desc.annotations[ARTIFACT_TYPE_ANNOTATION], "application/spdx+json");
    }

    #[test]
    fn test_normalize_skips_empty_artifact_type() {
        let blob = ArtifactDescriptor {
            digest: "sha256:x".to_string(),
            ..Default::default()
        };
        assert!(blob.normalize("").annotations.is_empty());
    }

    #[test]
    fn test_artifact_manifest_accepts_layers_alias() {
        let json = r#"{
            "mediaType": "application/vnd.oci.image.manifest.v1+json",
            "artifactType": "application/vnd.example.sbom",
            "layers": [{"mediaType": "application/json", "digest": "sha256:ccc", "size": 3}]
        }"#;
        let manifest: ArtifactManifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.blobs.len(), 1);
        let blobs = manifest.normalized_blobs();
        assert_eq!(blobs[0].annotations[ARTIFACT_TYPE_ANNOTATION], "application/vnd.example.sbom");
    }

    #[test]
    fn test_validate_digest() {
        assert!(validate_digest("sha256:abc123").is_ok());
        assert!(validate_digest("sha512:ff").is_ok());
        assert!(validate_digest("abc123").is_err());
        assert!(validate_digest(":abc").is_err());
        assert!(validate_digest("sha256:").is_err());
        assert!(validate_digest("sha256:../../etc/passwd").is_err());
        assert!(validate_digest("sha256:a\\b").is_err());
        assert!(validate_digest(".sha256:abc").is_err());
    }
}
