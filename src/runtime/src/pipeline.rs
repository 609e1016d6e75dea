//! Pull pipeline driver.
//!
//! Sequences one pull:
//!
//! ```text
//! Resolving ─► Locating ─► StagingPrimary ─► Discovering ─► StagingArtifacts ─► Committing ─► Done
//!     │            │             │                │                 │                │
//!     └────────────┴─────────────┴────────────────┴─────────────────┴────────────────┴─► Failed
//! ```
//!
//! A discovery miss (`NotFound`) counts as "no artifacts". Commit only runs
//! when some bytes were staged. Any other error stops the run in `Failed`;
//! staged files are left in the working directory for inspection or a
//! later retry.

use std::path::PathBuf;

use a3s_pull_core::config::PullConfig;
use a3s_pull_core::error::PullError;
use thiserror::Error;
use tokio::io::AsyncWrite;

use crate::oci::client::RegistryClient;
use crate::store::commit::commit;
use crate::store::context::PipelineContext;
use crate::store::discover::discover;
use crate::store::locator::locate;
use crate::store::stager::{stage, StageOptions};

/// Phase of a pull run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelinePhase {
    Resolving,
    Locating,
    StagingPrimary,
    Discovering,
    StagingArtifacts,
    Committing,
    Done,
    Failed,
}

impl std::fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Resolving => "resolve",
            Self::Locating => "locate",
            Self::StagingPrimary => "stage",
            Self::Discovering => "discover",
            Self::StagingArtifacts => "stage artifacts",
            Self::Committing => "commit",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Error of a failed run, tagged with the phase it failed in.
#[derive(Debug, Error)]
#[error("{phase} failed: {error}")]
pub struct PipelineFailure {
    pub phase: PipelinePhase,
    #[source]
    pub error: PullError,
}

/// Summary of a successful run.
#[derive(Debug, Clone)]
pub struct PullReport {
    /// Digest of the resolved manifest
    pub manifest_digest: String,
    /// Store location the run committed into
    pub store_dir: PathBuf,
    /// Bytes staged across all phases
    pub bytes_staged: u64,
    /// Number of artifact manifests discovered
    pub artifacts: usize,
    /// Files committed into the store, in commit order
    pub committed: Vec<PathBuf>,
}

/// One pull run against a registry.
pub struct Pipeline<'a, R: RegistryClient + ?Sized> {
    registry: &'a R,
    config: PullConfig,
    ctx: PipelineContext,
    phase: PipelinePhase,
}

impl<'a, R: RegistryClient + ?Sized> Pipeline<'a, R> {
    pub fn new(registry: &'a R, config: PullConfig) -> Self {
        Self {
            registry,
            config,
            ctx: PipelineContext::new(),
            phase: PipelinePhase::Resolving,
        }
    }

    /// Current phase; `Failed` after an error, `Done` after success.
    pub fn phase(&self) -> PipelinePhase {
        self.phase
    }

    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }

    /// Mutable context.
    ///
    /// Directories set here before [`run`](Self::run) do not survive it:
    /// locating the store replaces them with the configured work dir and
    /// the store location, and fixes them for the rest of the run.
    pub fn context_mut(&mut self) -> &mut PipelineContext {
        &mut self.ctx
    }

    /// Run the pipeline, bounded by the configured timeout.
    ///
    /// Committed file paths are written to `out`, one per line.
    pub async fn run<W>(&mut self, reference: &str, out: &mut W) -> Result<PullReport, PipelineFailure>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let Some(timeout) = self.config.timeout() else {
            return self.run_phases(reference, out).await;
        };

        let outcome = tokio::time::timeout(timeout, self.run_phases(reference, out)).await;
        match outcome {
            Ok(result) => result,
            Err(_) => {
                let failure = PipelineFailure {
                    phase: self.phase,
                    error: PullError::TimeoutError(format!(
                        "pull of {} did not finish within {}s",
                        reference,
                        timeout.as_secs()
                    )),
                };
                self.phase = PipelinePhase::Failed;
                Err(failure)
            }
        }
    }

    async fn run_phases<W>(&mut self, reference: &str, out: &mut W) -> Result<PullReport, PipelineFailure>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let registry = self.registry;
        let options = StageOptions {
            verify_digests: self.config.verify_digests,
        };

        self.enter(PipelinePhase::Resolving);
        let (descriptor, manifest) = registry.resolve(reference).await.map_err(|e| self.fail(e))?;
        tracing::info!(
            reference,
            digest = %descriptor.digest,
            layers = manifest.layers.len(),
            "Resolved manifest"
        );

        self.enter(PipelinePhase::Locating);
        let location = locate(
            &mut self.ctx,
            &self.config.cache_dir,
            &self.config.work_dir,
            &descriptor,
            &manifest,
        )
        .map_err(|e| self.fail(e))?;

        self.enter(PipelinePhase::StagingPrimary);
        stage(registry, &mut self.ctx, &manifest.blobs(), options)
            .await
            .into_result()
            .map_err(|e| self.fail(e))?;

        self.enter(PipelinePhase::Discovering);
        let artifact_type = self.config.artifact_type.clone();
        let discovered = discover(
            registry,
            &self.ctx,
            &location,
            &descriptor,
            artifact_type.as_deref(),
        )
        .await;
        let artifacts = match discovered {
            Ok(artifacts) => artifacts,
            Err(e) if e.is_not_found() => {
                tracing::info!(digest = %descriptor.digest, "No artifacts found");
                Vec::new()
            }
            Err(e) => return Err(self.fail(e)),
        };

        self.enter(PipelinePhase::StagingArtifacts);
        for artifact in &artifacts {
            stage(registry, &mut self.ctx, &artifact.normalized_blobs(), options)
                .await
                .into_result()
                .map_err(|e| self.fail(e))?;
        }

        let bytes_staged = self.ctx.bytes_staged();
        let committed = if bytes_staged > 0 {
            self.enter(PipelinePhase::Committing);
            commit(&mut self.ctx, out).await.map_err(|e| self.fail(e))?
        } else {
            tracing::info!(digest = %descriptor.digest, "Nothing fetched, skipping commit");
            Vec::new()
        };

        self.enter(PipelinePhase::Done);
        tracing::info!(
            reference,
            store = %location.path.display(),
            bytes = bytes_staged,
            committed = committed.len(),
            "Pull complete"
        );

        Ok(PullReport {
            manifest_digest: descriptor.digest,
            store_dir: location.path,
            bytes_staged,
            artifacts: artifacts.len(),
            committed,
        })
    }

    fn enter(&mut self, phase: PipelinePhase) {
        tracing::debug!(from = %self.phase, to = %phase, "Pipeline phase");
        self.phase = phase;
    }

    fn fail(&mut self, error: PullError) -> PipelineFailure {
        let failure = PipelineFailure {
            phase: self.phase,
            error,
        };
        self.phase = PipelinePhase::Failed;
        failure
    }
}

/// Pull `reference` and return a process exit status.
///
/// Committed paths go to `out`; a failure is reported on stderr and
/// yields status 1. A run that fetched nothing still succeeds.
pub async fn run<R, W>(registry: &R, reference: &str, config: PullConfig, out: &mut W) -> i32
where
    R: RegistryClient + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut pipeline = Pipeline::new(registry, config);
    match pipeline.run(reference, out).await {
        Ok(_) => 0,
        Err(failure) => {
            tracing::error!(reference, phase = %failure.phase, error = %failure.error, "Pull failed");
            eprintln!("Error: {}", failure);
            1
        }
    }
}
