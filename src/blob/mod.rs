//! # Binary Store
//!
//! Content-addressed storage of raw payloads for fields declared
//! `binary`.
//!
//! - One copy per unique SHA-256 digest per namespace
//! - Size limits enforced before anything is written
//! - MIME type sniffed from leading bytes
//! - Blobs are never deleted by the engine

mod backend;
mod errors;
mod local;
mod memory;
mod mime;
mod search;
mod store;

pub use backend::BlobBackend;
pub use errors::{BlobError, BlobResult};
pub use local::LocalBackend;
pub use memory::MemoryBackend;
pub use mime::{sniff_mime, MIME_GIF, MIME_JPEG, MIME_OCTET_STREAM, MIME_PDF, MIME_PNG};
pub use search::{similarity, BlobCriteria, BlobPattern, SimilarMatch};
pub use store::{BlobMetadata, BlobStore, BLOB_EXTENSION};
