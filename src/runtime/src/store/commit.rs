//! Promotion of staged blobs into the store.
//!
//! Staged items are committed in the order they were staged. Each one is
//! copied into a hidden `.<digest>.partial` file in the output directory
//! and renamed to `<digest>`, so a crash never leaves a truncated file
//! under a digest name. Committed paths are written to `out`, one per
//! line, and the temp file is removed.

use std::path::{Path, PathBuf};

use a3s_pull_core::error::{PullError, Result};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::context::{PipelineContext, StagedItem};

/// Commit every pending item, stopping at the first failure.
///
/// On failure the failed item and everything after it stay pending, with
/// their temp files untouched. Items committed before the failure stay in
/// the store. Returns the committed paths.
pub async fn commit<W>(ctx: &mut PipelineContext, out: &mut W) -> Result<Vec<PathBuf>>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let output_dir = ctx.output_dir()?.to_path_buf();
    let mut committed = Vec::with_capacity(ctx.pending().len());

    while let Some(item) = ctx.next_pending() {
        let path = promote(item, &output_dir).await?;

        out.write_all(format!("{}\n", path.display()).as_bytes()).await?;

        if let Err(e) = tokio::fs::remove_file(&item.path).await {
            tracing::warn!(path = %item.path.display(), error = %e, "Failed to remove staged file");
        }
        tracing::debug!(digest = %item.digest, path = %path.display(), "Committed blob");

        ctx.complete_next();
        committed.push(path);
    }
    out.flush().await?;

    Ok(committed)
}

/// Copy one staged item into the store under its digest.
async fn promote(item: &StagedItem, output_dir: &Path) -> Result<PathBuf> {
    let target = output_dir.join(&item.digest);
    let partial = output_dir.join(format!(".{}.partial", item.digest));

    let mut src = tokio::fs::File::open(&item.path).await?;
    let mut dst = tokio::fs::File::create(&partial).await?;
    let written = tokio::io::copy(&mut src, &mut dst).await?;
    dst.sync_all().await?;
    drop(dst);

    if written == 0 {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(PullError::CommitFailed {
            digest: item.digest.clone(),
            path: target,
        });
    }

    tokio::fs::rename(&partial, &target).await?;
    Ok(target)
}
