//! Blob staging.
//!
//! Each descriptor is fetched into its own temporary file in the working
//! directory, named `<digest>-<suffix>`, and recorded as a [`StagedItem`]
//! on the pipeline context. Staging never touches the store.

use std::path::{Path, PathBuf};

use a3s_pull_core::descriptor::{validate_digest, Descriptor};
use a3s_pull_core::error::{PullError, Result};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::context::{PipelineContext, StagedItem};
use crate::oci::client::RegistryClient;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Outcome of staging a list of descriptors.
///
/// Staging stops at the first failure; everything staged before it stays
/// recorded on the context and is counted in `bytes`.
#[derive(Debug)]
pub struct StageReport {
    /// Bytes written by the items staged in this call
    pub bytes: u64,
    /// Number of items staged in this call
    pub staged: usize,
    /// First failure, if staging stopped early
    pub error: Option<PullError>,
}

impl StageReport {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    /// Byte total on success, the first failure otherwise.
    pub fn into_result(self) -> Result<u64> {
        match self.error {
            None => Ok(self.bytes),
            Some(e) => Err(e),
        }
    }
}

/// Options controlling how blobs are staged.
#[derive(Debug, Clone, Copy, Default)]
pub struct StageOptions {
    /// Hash content and compare against sha256 digests
    pub verify_digests: bool,
}

/// Stage `descriptors` in order, stopping at the first failure.
pub async fn stage<R>(
    registry: &R,
    ctx: &mut PipelineContext,
    descriptors: &[Descriptor],
    options: StageOptions,
) -> StageReport
where
    R: RegistryClient + ?Sized,
{
    let mut report = StageReport {
        bytes: 0,
        staged: 0,
        error: None,
    };

    let work_dir = ctx.work_dir().to_path_buf();
    for descriptor in descriptors {
        match stage_one(registry, &work_dir, descriptor, options).await {
            Ok(item) => {
                tracing::debug!(
                    digest = %item.digest,
                    bytes = item.bytes,
                    path = %item.path.display(),
                    "Staged blob"
                );
                report.bytes += item.bytes;
                report.staged += 1;
                ctx.record(item);
            }
            Err(e) => {
                tracing::warn!(digest = %descriptor.digest, error = %e, "Staging stopped");
                report.error = Some(e);
                break;
            }
        }
    }

    report
}

async fn stage_one<R>(
    registry: &R,
    work_dir: &Path,
    descriptor: &Descriptor,
    options: StageOptions,
) -> Result<StagedItem>
where
    R: RegistryClient + ?Sized,
{
    let digest = descriptor.digest.as_str();
    validate_digest(digest)?;

    let mut stream = registry.fetch(descriptor).await.map_err(|e| match e {
        PullError::FetchFailed { .. } => e,
        other => PullError::FetchFailed {
            digest: digest.to_string(),
            message: other.to_string(),
        },
    })?;

    let path = temp_path(work_dir, digest);
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .await?;

    let verify = options.verify_digests && digest.starts_with("sha256:");
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut written: u64 = 0;

    loop {
        let n = stream.read(&mut buf).await.map_err(|e| PullError::FetchFailed {
            digest: digest.to_string(),
            message: e.to_string(),
        })?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).await?;
        if verify {
            hasher.update(&buf[..n]);
        }
        written += n as u64;
    }
    file.flush().await?;
    drop(file);

    if written == 0 {
        discard(&path).await;
        return Err(PullError::ShortWrite {
            digest: digest.to_string(),
        });
    }

    if verify {
        let actual = format!("sha256:{}", hex::encode(hasher.finalize()));
        if actual != digest {
            discard(&path).await;
            return Err(PullError::DigestMismatch {
                expected: digest.to_string(),
                actual,
            });
        }
    }

    Ok(StagedItem {
        digest: digest.to_string(),
        path,
        bytes: written,
    })
}

/// `<work_dir>/<digest>-<random suffix>`; repeated digests never collide.
fn temp_path(work_dir: &Path, digest: &str) -> PathBuf {
    work_dir.join(format!("{}-{}", digest, uuid::Uuid::new_v4().simple()))
}

/// Remove a temp file that holds no usable content.
async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::warn!(path = %path.display(), error = %e, "Failed to remove temp file");
    }
}
