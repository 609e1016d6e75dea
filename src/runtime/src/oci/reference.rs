//! Content reference parsing.
//!
//! Turns strings like `ghcr.io/org/app:v1` or `example.com/repo@sha256:...`
//! into registry, repository, tag and digest. Anything that cannot be
//! parsed is rejected with [`PullError::ParseError`] before any network
//! activity happens.

use a3s_pull_core::descriptor::validate_digest;
use a3s_pull_core::error::{PullError, Result};

/// Registry assumed when the reference names none.
const DEFAULT_REGISTRY: &str = "docker.io";

/// Tag assumed when the reference carries neither tag nor digest.
const DEFAULT_TAG: &str = "latest";

/// Longest tag registries accept.
const MAX_TAG_LEN: usize = 128;

/// Parsed content reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Registry hostname, optionally with port (e.g., "ghcr.io", "localhost:5000")
    pub registry: String,
    /// Repository path (e.g., "library/nginx", "org/app")
    pub repository: String,
    /// Tag, defaulted to "latest" when no digest is given
    pub tag: Option<String>,
    /// Digest (e.g., "sha256:abc123...")
    pub digest: Option<String>,
}

impl ImageReference {
    /// Parse a reference string.
    ///
    /// - `app` → docker.io/library/app:latest
    /// - `org/app:v1` → docker.io/org/app:v1
    /// - `ghcr.io/org/app@sha256:abc` → ghcr.io/org/app@sha256:abc
    /// - `localhost:5000/app:dev` → localhost:5000/app:dev
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(parse_error(reference, "empty reference"));
        }

        let (rest, digest) = match reference.split_once('@') {
            Some((rest, digest)) => {
                validate_digest(digest).map_err(|_| {
                    parse_error(reference, "digest must be algorithm:encoded")
                })?;
                (rest, Some(digest.to_string()))
            }
            None => (reference, None),
        };

        // A tag colon can only appear after the last slash; earlier colons
        // belong to a registry port.
        let last_segment_start = rest.rfind('/').map_or(0, |i| i + 1);
        let (name, tag) = match rest[last_segment_start..].rfind(':') {
            Some(i) => {
                let split = last_segment_start + i;
                (&rest[..split], Some(rest[split + 1..].to_string()))
            }
            None => (rest, None),
        };

        if let Some(tag) = &tag {
            validate_tag(reference, tag)?;
        }

        let (registry, repository) = split_registry(name);
        validate_repository(reference, &repository)?;

        let tag = match (tag, &digest) {
            (None, None) => Some(DEFAULT_TAG.to_string()),
            (tag, _) => tag,
        };

        Ok(Self {
            registry,
            repository,
            tag,
            digest,
        })
    }

    /// Reference to a specific digest within `registry/repository`.
    pub fn for_digest(registry: &str, repository: &str, digest: &str) -> Result<Self> {
        Self::parse(&format!("{}/{}@{}", registry, repository, digest))
    }

    /// Get the full reference string.
    pub fn full_reference(&self) -> String {
        let mut s = format!("{}/{}", self.registry, self.repository);
        if let Some(tag) = &self.tag {
            s.push(':');
            s.push_str(tag);
        }
        if let Some(digest) = &self.digest {
            s.push('@');
            s.push_str(digest);
        }
        s
    }
}

impl std::fmt::Display for ImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.full_reference())
    }
}

impl std::str::FromStr for ImageReference {
    type Err = PullError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Split off the registry if the first path component looks like a host.
fn split_registry(name: &str) -> (String, String) {
    if let Some((first, rest)) = name.split_once('/') {
        if first.contains('.') || first.contains(':') || first == "localhost" {
            return (first.to_string(), rest.to_string());
        }
        return (DEFAULT_REGISTRY.to_string(), name.to_string());
    }
    (DEFAULT_REGISTRY.to_string(), format!("library/{}", name))
}

fn validate_repository(reference: &str, repository: &str) -> Result<()> {
    if repository.is_empty() || repository.split('/').any(str::is_empty) {
        return Err(parse_error(reference, "empty repository component"));
    }
    let allowed = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit() || "._-/".contains(c);
    if !repository.chars().all(allowed) {
        return Err(parse_error(
            reference,
            "repository may only contain lowercase letters, digits, '.', '_', '-' and '/'",
        ));
    }
    Ok(())
}

fn validate_tag(reference: &str, tag: &str) -> Result<()> {
    let valid_start = tag
        .chars()
        .next()
        .map_or(false, |c| c.is_ascii_alphanumeric() || c == '_');
    let valid_chars = tag
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "._-".contains(c));
    if !valid_start || !valid_chars || tag.len() > MAX_TAG_LEN {
        return Err(parse_error(reference, "invalid tag"));
    }
    Ok(())
}

fn parse_error(reference: &str, reason: &str) -> PullError {
    PullError::ParseError(format!("invalid reference '{}': {}", reference, reason))
}
