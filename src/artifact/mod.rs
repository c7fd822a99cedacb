//! Artifact retrieval.
//!
//! The source fetches the binary payload; verifiers decide whether the
//! fetched bytes may replace the installed binary.

mod http;
mod integrity;
mod traits;

pub use http::HttpArtifactSource;
pub use integrity::{sha256_file, NoVerification, Sha256Digest};
pub use traits::{ArtifactSource, ArtifactVerifier};
