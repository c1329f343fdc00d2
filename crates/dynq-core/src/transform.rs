//! Conversion between stored records and public documents.

use dynq_proto::Document;

use crate::error::Error;
use crate::storage::Item;

/// Converts records to and from the shape callers see.
///
/// Implementations are pure: the same record always produces the same document.
pub trait Transform: Send + Sync {
    /// Convert a stored record into a document.
    fn read(&self, collection: &str, item: Item) -> Result<Document, Error>;

    /// Convert a document into a record for storage.
    fn write(&self, collection: &str, document: Document) -> Result<Item, Error>;
}

/// Stores documents as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTransform;

impl Transform for JsonTransform {
    fn read(&self, _collection: &str, item: Item) -> Result<Document, Error> {
        Ok(item)
    }

    fn write(&self, _collection: &str, document: Document) -> Result<Item, Error> {
        Ok(document)
    }
}
