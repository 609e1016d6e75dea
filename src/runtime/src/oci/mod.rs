//! Registry access for A3S Pull.
//!
//! - [`client`]: the [`RegistryClient`] trait the pipeline is written against
//! - [`registry`]: an `oci-distribution` implementation for real registries
//! - [`reference`]: reference parsing
//! - [`credentials`]: the on-disk credential store used by login/logout

pub mod client;
pub mod credentials;
pub mod reference;
pub mod registry;

pub use client::{BlobStream, RegistryClient};
pub use credentials::{Credential, CredentialStore};
pub use reference::ImageReference;
pub use registry::{OciRegistry, RegistryAuth};
