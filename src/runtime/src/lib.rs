//! A3S Pull Runtime - registry pull pipeline.
//!
//! Resolves a reference, places its manifest in the content store, stages
//! the config and layer blobs plus any referring artifacts, and commits
//! them into the store under their digests.

#![allow(clippy::result_large_err)]

pub mod oci;
pub mod pipeline;
pub mod store;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export common types
pub use oci::{CredentialStore, ImageReference, OciRegistry, RegistryAuth, RegistryClient};
pub use pipeline::{run, Pipeline, PipelineFailure, PipelinePhase, PullReport};
pub use store::{PipelineContext, StagedItem, StoreLocation};

/// A3S Pull Runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
