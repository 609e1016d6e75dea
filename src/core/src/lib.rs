//! A3S Pull Core - Foundational Types
//!
//! This module provides the data model, error taxonomy and configuration
//! shared by the pull runtime and the CLI.

pub mod config;
pub mod descriptor;
pub mod error;

// Re-export commonly used types
pub use config::PullConfig;
pub use descriptor::{ArtifactDescriptor, ArtifactManifest, Descriptor, Manifest};
pub use error::{PullError, Result};

/// A3S Pull version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
