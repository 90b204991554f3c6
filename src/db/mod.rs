//! Document store abstraction
//!
//! The service persists recommendations as schema-less JSON documents. The
//! `DocumentStore` trait captures the handful of primitives the persistence
//! gateway needs, so the CouchDB backend and the in-memory backend are
//! interchangeable behind an `Arc<dyn DocumentStore>`.
use serde_json::{json, Map, Value};

pub mod couchdb;
pub mod memory;

pub use couchdb::CouchDbStore;
pub use memory::MemoryStore;

/// Errors raised by document store backends
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Document store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Document store returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Document update conflict: {0}")]
    Conflict(String),

    #[error("Document store unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed document: {0}")]
    Malformed(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A stored JSON document
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    /// Revision token used for optimistic concurrency, if the backend has one
    pub rev: Option<String>,
    /// Document body without the `_id`/`_rev` metadata
    pub fields: Map<String, Value>,
}

impl Document {
    /// Splits a raw store document into metadata and body
    pub fn from_json(value: Value) -> StoreResult<Self> {
        let Value::Object(mut fields) = value else {
            return Err(StoreError::Malformed("document is not an object".to_string()));
        };

        let id = match fields.remove("_id") {
            Some(Value::String(id)) => id,
            _ => return Err(StoreError::Malformed("document has no _id".to_string())),
        };
        let rev = match fields.remove("_rev") {
            Some(Value::String(rev)) => Some(rev),
            _ => None,
        };

        Ok(Self { id, rev, fields })
    }

    /// Reassembles the raw store representation
    pub fn to_json(&self) -> Value {
        let mut raw = self.fields.clone();
        raw.insert("_id".to_string(), Value::String(self.id.clone()));
        if let Some(rev) = &self.rev {
            raw.insert("_rev".to_string(), Value::String(rev.clone()));
        }
        Value::Object(raw)
    }
}

/// Conjunction of `field == value` conditions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selector {
    conditions: Vec<(String, Value)>,
}

impl Selector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn equals(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Renders the selector as a CouchDB Mango selector
    pub fn to_json(&self) -> Value {
        let selector: Map<String, Value> = self
            .conditions
            .iter()
            .map(|(field, value)| (field.clone(), json!({ "$eq": value })))
            .collect();
        Value::Object(selector)
    }

    /// Evaluates the selector against a document body
    pub fn matches(&self, fields: &Map<String, Value>) -> bool {
        self.conditions
            .iter()
            .all(|(field, expected)| fields.get(field) == Some(expected))
    }
}

/// Primitives of a JSON document database
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Checks the backend is reachable
    async fn ping(&self) -> StoreResult<()>;

    /// Inserts a new document and returns it with its generated id
    async fn create_document(&self, fields: Map<String, Value>) -> StoreResult<Document>;

    /// Fetches a document, `None` when it does not exist
    async fn get_document(&self, id: &str) -> StoreResult<Option<Document>>;

    /// Writes a new revision of an existing document
    ///
    /// The document's `rev` must be the latest revision, otherwise
    /// `StoreError::Conflict` is returned.
    async fn update_document(&self, document: Document) -> StoreResult<Document>;

    /// Removes a document at the given revision
    async fn delete_document(&self, document: &Document) -> StoreResult<()>;

    /// Every document in the collection, in store order
    async fn all_documents(&self) -> StoreResult<Vec<Document>>;

    /// Documents matching the selector
    async fn find_documents(&self, selector: &Selector) -> StoreResult<Vec<Document>>;

    /// Backend name for logging and health reporting
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_from_json_splits_metadata() {
        let document = Document::from_json(json!({
            "_id": "a1",
            "_rev": "1-abc",
            "productId": "iPhone"
        }))
        .unwrap();

        assert_eq!(document.id, "a1");
        assert_eq!(document.rev.as_deref(), Some("1-abc"));
        assert_eq!(document.fields.len(), 1);
        assert_eq!(document.to_json()["_rev"], "1-abc");
    }

    #[test]
    fn test_document_without_id_is_malformed() {
        let err = Document::from_json(json!({ "productId": "iPhone" })).unwrap_err();
        assert!(matches!(err, StoreError::Malformed(_)));
    }

    #[test]
    fn test_selector_to_json() {
        let selector = Selector::new()
            .equals("productId", "iPhone")
            .equals("categoryId", "Electronics");
        assert_eq!(
            selector.to_json(),
            json!({
                "productId": { "$eq": "iPhone" },
                "categoryId": { "$eq": "Electronics" }
            })
        );
    }

    #[test]
    fn test_selector_matches() {
        let fields = json!({ "productId": "iPhone", "categoryId": null });
        let fields = fields.as_object().unwrap();

        assert!(Selector::new().matches(fields));
        assert!(Selector::new().equals("productId", "iPhone").matches(fields));
        assert!(!Selector::new().equals("productId", "Table").matches(fields));
        assert!(!Selector::new().equals("suggestionId", "Case").matches(fields));
    }
}
