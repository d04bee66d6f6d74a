//! Generated resource names (`entries/<id>`, `workers/<id>`)
//!
//! Stores enforce uniqueness on the generated name; the generator is injected
//! so tests can produce predictable names without touching the store.

use std::sync::atomic::{AtomicU64, Ordering};

pub trait NameGenerator: Send + Sync {
    /// Produce a fresh name inside `collection`, e.g. `entries/1f0c...`.
    fn generate(&self, collection: &str) -> String;
}

/// Random UUID v4 suffixes. Default for production.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidNameGenerator;

impl NameGenerator for UuidNameGenerator {
    fn generate(&self, collection: &str) -> String {
        format!("{}/{}", collection, uuid::Uuid::new_v4())
    }
}

/// Monotonic counter suffixes, deterministic within one process.
#[derive(Debug, Default)]
pub struct SequentialNameGenerator {
    next: AtomicU64,
}

impl SequentialNameGenerator {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl NameGenerator for SequentialNameGenerator {
    fn generate(&self, collection: &str) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}/{:08}", collection, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_uuid_names_are_unique() {
        let generator = UuidNameGenerator;
        let names: HashSet<String> = (0..500).map(|_| generator.generate("entries")).collect();
        assert_eq!(names.len(), 500);
        assert!(names.iter().all(|n| n.starts_with("entries/")));
    }

    #[test]
    fn test_sequential_names() {
        let generator = SequentialNameGenerator::new();
        assert_eq!(generator.generate("entries"), "entries/00000001");
        assert_eq!(generator.generate("workers"), "workers/00000002");
    }
}
