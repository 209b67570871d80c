//! Persistence for image records
//!
//! Handlers talk to [`ImageRepository`]; Postgres is the production backend and
//! [`InMemoryImageRepository`] stands in for it in tests.

pub mod image;
pub mod memory;
pub mod transaction;

pub use image::{ImageRepository, PgImageRepository, RemoveFile};
pub use memory::InMemoryImageRepository;
pub use transaction::with_transaction;
