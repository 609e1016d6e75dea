//! Store location derived from manifest metadata.
//!
//! A manifest carrying the `host`, `namespace` and `loc` annotations lands
//! at `<cache>/<host>/<namespace>/<loc>/<manifest digest>/`. The same
//! manifest always maps to the same directory, and locating it again is a
//! no-op apart from rewriting `manifest.json` with identical content.

use std::path::{Component, Path, PathBuf};

use a3s_pull_core::descriptor::{validate_digest, Descriptor, Manifest};
use a3s_pull_core::error::{PullError, Result};

use super::context::PipelineContext;

/// File the serialized manifest is written to inside the store location.
pub const MANIFEST_FILE: &str = "manifest.json";

pub const HOST_ANNOTATION: &str = "host";
pub const NAMESPACE_ANNOTATION: &str = "namespace";
pub const LOC_ANNOTATION: &str = "loc";

/// Resolved store location for one manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLocation {
    pub host: String,
    pub namespace: String,
    pub loc: String,
    pub digest: String,
    pub path: PathBuf,
}

impl StoreLocation {
    /// Derive the location without touching the filesystem.
    pub fn derive(cache_dir: &Path, descriptor: &Descriptor, manifest: &Manifest) -> Result<Self> {
        let host = required_annotation(manifest, HOST_ANNOTATION)?;
        let namespace = required_annotation(manifest, NAMESPACE_ANNOTATION)?;
        let loc = required_annotation(manifest, LOC_ANNOTATION)?;

        validate_segment(HOST_ANNOTATION, host, false)?;
        validate_segment(NAMESPACE_ANNOTATION, namespace, true)?;
        validate_segment(LOC_ANNOTATION, loc, true)?;
        validate_digest(&descriptor.digest)?;

        let path = cache_dir
            .join(host)
            .join(namespace)
            .join(loc)
            .join(&descriptor.digest);

        Ok(Self {
            host: host.to_string(),
            namespace: namespace.to_string(),
            loc: loc.to_string(),
            digest: descriptor.digest.clone(),
            path,
        })
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.path.join(MANIFEST_FILE)
    }
}

/// Create the store location for `manifest` and point `ctx` at it.
///
/// Creates the store directory and `work_dir` if missing, records the
/// manifest, then fixes the context's directories for the rest of the run.
pub fn locate(
    ctx: &mut PipelineContext,
    cache_dir: &Path,
    work_dir: &Path,
    descriptor: &Descriptor,
    manifest: &Manifest,
) -> Result<StoreLocation> {
    let location = StoreLocation::derive(cache_dir, descriptor, manifest)?;

    if let Ok(meta) = std::fs::metadata(&location.path) {
        if !meta.is_dir() {
            return Err(PullError::NotADirectory(location.path));
        }
    }
    std::fs::create_dir_all(&location.path).map_err(|e| {
        PullError::ConfigError(format!(
            "failed to create store directory {}: {}",
            location.path.display(),
            e
        ))
    })?;
    if !work_dir.exists() {
        std::fs::create_dir_all(work_dir).map_err(|e| {
            PullError::ConfigError(format!(
                "failed to create working directory {}: {}",
                work_dir.display(),
                e
            ))
        })?;
    }

    ctx.set_directories(Some(work_dir), Some(&location.path))?;
    ctx.fix_directories();

    let manifest_json = serde_json::to_vec_pretty(manifest)?;
    std::fs::write(location.manifest_path(), manifest_json)?;

    tracing::info!(
        store = %location.path.display(),
        work_dir = %work_dir.display(),
        digest = %location.digest,
        "Located manifest store"
    );

    Ok(location)
}

fn required_annotation<'a>(manifest: &'a Manifest, key: &str) -> Result<&'a str> {
    manifest
        .annotation(key)
        .ok_or_else(|| PullError::MissingAnnotation(key.to_string()))
}

/// Reject values that would escape or alias the cache directory.
fn validate_segment(key: &str, value: &str, allow_nested: bool) -> Result<()> {
    let invalid = || PullError::InvalidAnnotation {
        key: key.to_string(),
        value: value.to_string(),
    };

    if value.is_empty() || value.contains(['\\', '\0']) {
        return Err(invalid());
    }
    if !allow_nested && value.contains('/') {
        return Err(invalid());
    }
    if value.split('/').any(|s| s.is_empty() || s == "." || s == "..") {
        return Err(invalid());
    }
    let all_normal = Path::new(value)
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if !all_normal {
        return Err(invalid());
    }
    Ok(())
}
