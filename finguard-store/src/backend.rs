//! DocumentBackend - The storage seam
//!
//! TigerStyle: One trait, interchangeable implementations, no branching in
//! callers.

use async_trait::async_trait;

use crate::document::{Document, DocumentPath, Fields, Query};
use crate::error::StoreResult;

/// A document database the facade can route calls to.
///
/// Implementations report failures as structured [`crate::BackendError`]s;
/// the facade decides what each kind means for the store mode.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Append a document with a backend-assigned identifier.
    async fn add(&self, collection: &str, fields: Fields) -> StoreResult<Document>;

    /// Read a collection, ordered and limited as the query says. An absent
    /// collection yields an empty vector.
    async fn query(&self, query: &Query) -> StoreResult<Vec<Document>>;

    /// Read one document. `Ok(None)` means the document does not exist.
    async fn get(&self, path: &DocumentPath) -> StoreResult<Option<Document>>;

    /// Write one document. With `merge`, fields are unioned into the existing
    /// document; without it the document is replaced.
    async fn set(&self, path: &DocumentPath, fields: Fields, merge: bool) -> StoreResult<()>;

    /// Cheap connectivity check used once after initialization.
    async fn probe(&self) -> StoreResult<()>;
}
