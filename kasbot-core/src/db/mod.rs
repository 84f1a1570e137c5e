//! Database layer for kasbot
//!
//! This module provides the storage layer using SQLite with:
//! - Schema migrations
//! - Repository pattern for owner-keyed queries
//! - One pending capture per owner, enforced at the schema level

pub mod repo;
pub mod schema;

pub use repo::Database;
