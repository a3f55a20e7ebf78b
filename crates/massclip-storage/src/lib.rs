//! Cloudflare R2 object storage.
//!
//! This crate provides:
//! - An S3-compatible R2 client (put/get/delete)
//! - The [`ObjectStore`] seam and an in-memory store for tests (feature `memory`)
//! - The key layout for uploads, chunks and profile pictures
//! - Chunk combination for resumable uploads

pub mod client;
pub mod error;
pub mod keys;
#[cfg(any(test, feature = "memory"))]
pub mod memory;
pub mod object_store;
pub mod operations;

pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
#[cfg(any(test, feature = "memory"))]
pub use memory::MemoryObjectStore;
pub use object_store::{ObjectStore, SharedObjectStore};
pub use operations::{combine_chunks, CombinedObject};
