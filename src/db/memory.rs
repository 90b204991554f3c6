use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{Document, DocumentStore, Selector, StoreError, StoreResult};

/// In-process document store with CouchDB-style revisions
///
/// Used by the test suite and for running the service without a database
/// (`STORE_BACKEND=memory`). Contents are lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    documents: Mutex<BTreeMap<String, Document>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail as if the store were unreachable
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    /// Number of stored documents
    pub async fn len(&self) -> usize {
        self.documents.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.lock().await.is_empty()
    }

    fn check_writable(&self) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable(
                "memory store is rejecting writes".to_string(),
            ));
        }
        Ok(())
    }
}

fn next_rev(current: Option<&str>) -> String {
    let generation = current
        .and_then(|rev| rev.split_once('-'))
        .and_then(|(generation, _)| generation.parse::<u64>().ok())
        .unwrap_or(0);
    format!("{}-{}", generation + 1, Uuid::new_v4().simple())
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn create_document(&self, fields: Map<String, Value>) -> StoreResult<Document> {
        self.check_writable()?;

        let document = Document {
            id: Uuid::new_v4().simple().to_string(),
            rev: Some(next_rev(None)),
            fields,
        };
        self.documents
            .lock()
            .await
            .insert(document.id.clone(), document.clone());

        Ok(document)
    }

    async fn get_document(&self, id: &str) -> StoreResult<Option<Document>> {
        Ok(self.documents.lock().await.get(id).cloned())
    }

    async fn update_document(&self, mut document: Document) -> StoreResult<Document> {
        self.check_writable()?;

        let mut documents = self.documents.lock().await;
        let stored = documents
            .get_mut(&document.id)
            .ok_or_else(|| StoreError::Conflict(format!("document {} is missing", document.id)))?;

        if stored.rev != document.rev {
            return Err(StoreError::Conflict(format!(
                "document {} is at a newer revision",
                document.id
            )));
        }

        document.rev = Some(next_rev(document.rev.as_deref()));
        *stored = document.clone();
        Ok(document)
    }

    async fn delete_document(&self, document: &Document) -> StoreResult<()> {
        self.check_writable()?;

        let mut documents = self.documents.lock().await;
        match documents.get(&document.id) {
            Some(stored) if stored.rev == document.rev => {
                documents.remove(&document.id);
                Ok(())
            }
            Some(_) => Err(StoreError::Conflict(format!(
                "document {} is at a newer revision",
                document.id
            ))),
            None => Err(StoreError::Conflict(format!(
                "document {} is missing",
                document.id
            ))),
        }
    }

    async fn all_documents(&self) -> StoreResult<Vec<Document>> {
        Ok(self.documents.lock().await.values().cloned().collect())
    }

    async fn find_documents(&self, selector: &Selector) -> StoreResult<Vec<Document>> {
        Ok(self
            .documents
            .lock()
            .await
            .values()
            .filter(|document| selector.matches(&document.fields))
            .cloned()
            .collect())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
