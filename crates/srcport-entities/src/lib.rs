//! Persistent records for package imports and the worker fleet

pub mod entries;
pub mod types;
pub mod workers;
