//! Test helper modules for bp-connect integration tests
//!
//! Provides reusable test infrastructure components:
//! - fixtures: user profiles, directory entries, and studio seeding
//! - flaky_store: a DocumentStore wrapper with scheduled failures

pub mod fixtures;
pub mod flaky_store;

// Re-export commonly used helpers
pub use fixtures::{artist, person_target, producer, seed_studio, studio_entry};
pub use flaky_store::FlakyStore;
