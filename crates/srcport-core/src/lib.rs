//! Core types shared across all srcport crates

pub mod config;
pub mod error;
pub mod error_builder;
pub mod identity;
pub mod names;
pub mod problemdetails;
pub mod types;

pub use problemdetails::Problem;

// Re-export commonly used types
pub use config::*;
pub use error::*;
pub use identity::AuthenticatedIdentity;
pub use names::{NameGenerator, SequentialNameGenerator, UuidNameGenerator};
pub use types::*;
