//! Core types and shared functionality for repodex.
//!
//! This crate provides:
//! - The canonical document model and record sanitizer
//! - A file-backed document cache with integrity checks
//! - An in-memory BM25 index with keyword filters
//! - Normalization of heterogeneous search output
//! - Configuration and unified error types

pub mod cache;
pub mod config;
pub mod document;
pub mod error;
pub mod index;
pub mod normalize;
pub mod sanitize;

pub use cache::{CacheEntry, CacheError, CacheStore};
pub use config::{AppConfig, ConfigError};
pub use document::{Document, Field, SearchResult};
pub use error::Error;
pub use index::{Index, IndexBuilder, SearchQuery};
pub use normalize::{NormalizationError, RawHit};
pub use sanitize::{RawRecord, Sanitizer, sanitize, sanitize_batch};
