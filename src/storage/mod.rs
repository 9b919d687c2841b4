//! Artifact storage for raw fetched pages
//!
//! Every page fetched during a run is written once under a key made of the
//! site, the page's logical name and the run date. A later run for the same
//! day finds the artifact and skips the network, which is what makes an
//! interrupted crawl resumable.

mod artifact;
mod traits;

pub use artifact::FsArtifactCache;
pub use traits::{ArtifactKey, ArtifactStore, StorageError, StorageResult};
