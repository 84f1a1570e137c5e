//! # kasbot-core
//!
//! Core library for kasbot - a bilingual chat bookkeeping assistant for
//! small traders.
//!
//! This library provides:
//! - Language/intent classification for inbound chat messages
//! - A two-tier transaction parser (regex fast path, LLM fallback)
//! - A per-owner slot-filling clarification dialogue
//! - Transaction persistence with derived fields and streak tracking
//! - A Cash Conversion Cycle analytics engine
//!
//! ## Architecture
//!
//! Each inbound message flows through one path:
//! classifier → fast-path parser → (on failure) fallback parser →
//! completeness validator → clarification dialogue → persister → streak
//! tracker. Analytics run independently, on demand, over persisted
//! records. Transport, authentication, and media pre-processing live
//! outside this crate; the pipeline is invoked as a library function per
//! message.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use kasbot_core::{CapturePipeline, Config, Database};
//!
//! # async fn run() -> kasbot_core::Result<()> {
//! let config = Config::load()?;
//! let db = Arc::new(Database::open(&Config::database_path())?);
//! db.migrate()?;
//!
//! let pipeline = CapturePipeline::new(db, &config)?;
//! let reply = pipeline.handle_text("owner-1", "jual nasi goreng 25rb").await?;
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use pipeline::CapturePipeline;
pub use types::*;

// Public modules
pub mod analytics;
pub mod classify;
pub mod config;
pub mod db;
pub mod dialogue;
pub mod error;
pub mod llm;
pub mod logging;
pub mod parse;
pub mod persist;
pub mod pipeline;
pub mod responses;
pub mod streak;
pub mod types;
