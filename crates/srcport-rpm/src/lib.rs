//! Source RPM retrieval, signature checks and header inspection
//!
//! [`fetcher`] resolves scheme-addressed package URIs to bytes and verifies
//! their SHA-256 digest; [`signature`] checks the package was signed by a
//! trusted key; [`header`] reads the package identity out of the RPM header
//! so entries can be keyed by their source NEVRA.

pub mod fetcher;
pub mod header;
pub mod signature;
pub mod test_utils;

pub use fetcher::{
    sha256_hex, FetchError, FileFetcher, HttpFetcher, MemoryFetcher, ResourceFetcher,
    SchemeFetcher,
};
pub use header::{PackageHeader, RpmHeaderError};
pub use signature::{SignatureError, TrustedKeys};
