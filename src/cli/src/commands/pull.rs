//! `a3s-pull pull` command.

use std::path::PathBuf;

use a3s_pull_core::PullConfig;
use a3s_pull_runtime::{ImageReference, OciRegistry};
use clap::Args;

#[derive(Args)]
pub struct PullArgs {
    /// Reference to pull (e.g., "ghcr.io/org/app:v1", "example.com/repo@sha256:...")
    pub reference: String,

    /// Content store root (default: $A3S_PULL_CACHE_DIR or the user cache dir)
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Staging directory (default: $A3S_PULL_WORK_DIR or ./work)
    #[arg(long, value_name = "DIR")]
    pub work_dir: Option<PathBuf>,

    /// Overall timeout in seconds, 0 for none (default: $A3S_PULL_TIMEOUT or 1200)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Only pull artifacts of this type
    #[arg(long)]
    pub artifact_type: Option<String>,

    /// Check sha256 digests of fetched content
    #[arg(long)]
    pub verify: bool,

    /// Suppress progress output
    #[arg(short, long)]
    pub quiet: bool,
}

impl PullArgs {
    /// Layer command line flags over `base`.
    fn apply(&self, mut base: PullConfig) -> PullConfig {
        if let Some(dir) = &self.cache_dir {
            base.cache_dir = dir.clone();
        }
        if let Some(dir) = &self.work_dir {
            base.work_dir = dir.clone();
        }
        if let Some(secs) = self.timeout {
            base.timeout_secs = secs;
        }
        if self.artifact_type.is_some() {
            base.artifact_type = self.artifact_type.clone();
        }
        base.verify_digests |= self.verify;
        base
    }
}

pub async fn execute(args: PullArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.apply(PullConfig::from_env()?);

    // Parse up front so a malformed reference fails before any network call
    let reference = ImageReference::parse(&args.reference)?;
    let registry = OciRegistry::with_default_auth(&reference);

    tracing::debug!(
        reference = %reference,
        cache_dir = %config.cache_dir.display(),
        work_dir = %config.work_dir.display(),
        "Pull configuration"
    );

    if !args.quiet {
        eprintln!("Pulling {}...", reference);
    }

    let mut stdout = tokio::io::stdout();
    let code = a3s_pull_runtime::run(&registry, &reference.full_reference(), config, &mut stdout).await;
    if code != 0 {
        std::process::exit(code);
    }

    Ok(())
}
