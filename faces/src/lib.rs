//! Face data model and identity storage.
//!
//! Everything downstream of the external embedding provider works in terms
//! of these types:
//!
//! - [`Detection`]: one observed face in one frame (bounding box + embedding)
//! - [`FaceRecord`]: one stored sample of a known person
//! - [`IdentityStore`]: storage for known identities and in-flight
//!   enrollment samples, with [`MemoryStore`] for tests and [`DirStore`]
//!   for the directory-per-person on-disk layout
//!
//! Embeddings are compared by [`euclidean_distance`], never by equality.

mod dirstore;
mod error;
mod euclidean;
mod store;
mod types;

pub use dirstore::DirStore;
pub use error::FaceStoreError;
pub use euclidean::{center_distance, euclidean_distance};
pub use store::{IdentityStore, MemoryStore};
pub use types::{BoundingBox, Detection, Embedding, FaceRecord};
