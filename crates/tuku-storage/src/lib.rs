//! Tuku Storage Library
//!
//! Narrow blob-store abstraction used by the upload pipeline, with a local
//! filesystem backend and an in-memory fake for tests.
//!
//! # Key format
//!
//! Keys are `{area}/{name}` where area is one of `tmp`, `uploads` or `quarantine`
//! (see [`keys`]). Keys must not contain `..` or a leading `/`.

pub mod keys;
pub mod local;
pub mod memory;
pub mod traits;

// Re-export commonly used types
pub use local::LocalBlobStore;
pub use memory::MemoryBlobStore;
pub use traits::{BlobStore, StorageError, StorageResult};
