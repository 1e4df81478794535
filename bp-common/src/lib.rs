//! # BeatPlanner Common Library
//!
//! Shared code for the BeatPlanner connection workflow services including:
//! - Document model types (connection requests, connection edges, studios)
//! - The `DocumentStore` trait with in-memory and SQLite adapters
//! - Live query subscriptions over the store change feed
//! - Configuration loading
//! - Error taxonomy

pub mod collections;
pub mod config;
pub mod error;
pub mod model;
pub mod store;
pub mod time;

pub use error::{Error, Result};
