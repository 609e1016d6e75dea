//! Content store pipeline stages.
//!
//! ```text
//! <cache>/<host>/<namespace>/<loc>/<manifest digest>/
//! ├── manifest.json                (written by locate)
//! ├── discovered-artifacts.json    (written by discover)
//! └── <digest>                     (one per committed blob)
//!
//! <work dir>/
//! └── <digest>-<suffix>            (staged, removed on commit)
//! ```

pub mod commit;
pub mod context;
pub mod discover;
pub mod locator;
pub mod stager;

pub use commit::commit;
pub use context::{PipelineContext, StagedItem};
pub use discover::{discover, DISCOVERED_ARTIFACTS_FILE};
pub use locator::{locate, StoreLocation, MANIFEST_FILE};
pub use stager::{stage, StageOptions, StageReport};
