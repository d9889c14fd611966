//! Common utilities and shared types for traveltube.
//!
//! This crate provides foundational components used across all traveltube crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: ULID-based unique identifiers via [`IdGenerator`]
//! - **Storage**: Media file storage for uploaded images
//! - **Page Cache**: Short-lived whole-response caching (memory or Redis)
//!
//! # Example
//!
//! ```no_run
//! use traveltube_common::{Config, IdGenerator, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id_gen = IdGenerator::new();
//!     let id = id_gen.generate();
//!     println!("Generated ID: {}", id);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod id;
pub mod page_cache;
pub mod storage;

pub use config::Config;
pub use error::{AppError, AppResult, FieldErrors};
pub use id::IdGenerator;
pub use page_cache::{CachedPage, MemoryPageCache, PageCache, RedisPageCache};
pub use storage::{LocalStorage, MediaKind, StorageBackend, StoredFile, generate_storage_key};
