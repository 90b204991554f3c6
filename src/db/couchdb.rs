//! CouchDB / Cloudant backend
//!
//! Talks to the database over its HTTP API:
//! - `POST /{db}` creates a document and returns the generated id
//! - `GET|PUT|DELETE /{db}/{id}` reads and writes single documents (writes carry `_rev`)
//! - `GET /{db}/_all_docs?include_docs=true` lists the collection
//! - `POST /{db}/_find` runs Mango selector queries, paginated by bookmark
use async_trait::async_trait;
use reqwest::{Client as HttpClient, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{Document, DocumentStore, Selector, StoreError, StoreResult};
use crate::config::ServiceBinding;

/// Page size for `_find` requests; CouchDB returns 25 rows by default
const FIND_PAGE_SIZE: usize = 200;

#[derive(Clone)]
pub struct CouchDbStore {
    http_client: HttpClient,
    base_url: Url,
    database: String,
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct WriteResponse {
    id: String,
    rev: String,
}

#[derive(Deserialize)]
struct AllDocsResponse {
    rows: Vec<AllDocsRow>,
}

#[derive(Deserialize)]
struct AllDocsRow {
    id: String,
    #[serde(default)]
    doc: Option<Value>,
}

#[derive(Deserialize)]
struct FindResponse {
    docs: Vec<Value>,
    #[serde(default)]
    bookmark: Option<String>,
}

impl CouchDbStore {
    /// Builds a client for `database` without touching the network
    pub fn new(binding: &ServiceBinding, database: &str) -> StoreResult<Self> {
        let mut base_url = Url::parse(&binding.url).map_err(|e| {
            StoreError::Unavailable(format!("invalid store URL {}: {}", binding.url, e))
        })?;

        // Credentials travel as basic auth, not in the URL
        let _ = base_url.set_username("");
        let _ = base_url.set_password(None);

        Ok(Self {
            http_client: HttpClient::new(),
            base_url,
            database: database.to_string(),
            username: binding.username.clone(),
            password: binding.password.clone(),
        })
    }

    /// Connects to the server and opens `database`, creating it when missing
    pub async fn connect(binding: &ServiceBinding, database: &str) -> StoreResult<Self> {
        let store = Self::new(binding, database)?;

        tracing::info!(endpoint = %store.base_url, database = %database, "Connecting to CouchDB");

        store.ping().await.map_err(|e| {
            StoreError::Unavailable(format!(
                "CouchDB service could not be reached at {}: {}",
                store.base_url, e
            ))
        })?;

        if !store.database_exists().await? {
            store.create_database().await?;
            if !store.database_exists().await? {
                return Err(StoreError::Unavailable(format!(
                    "Database [{}] could not be obtained",
                    database
                )));
            }
        }

        Ok(store)
    }

    /// Name of the opened database
    pub fn database(&self) -> &str {
        &self.database
    }

    fn url_for(&self, segments: &[&str]) -> StoreResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                StoreError::Unavailable(format!("{} cannot be used as a base URL", self.base_url))
            })?
            .pop_if_empty()
            .push(&self.database)
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        self.http_client
            .request(method, url)
            .basic_auth(&self.username, Some(&self.password))
    }

    async fn database_exists(&self) -> StoreResult<bool> {
        let response = self
            .request(reqwest::Method::GET, self.url_for(&[])?)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(error_from(response).await),
        }
    }

    async fn create_database(&self) -> StoreResult<()> {
        tracing::info!(database = %self.database, "Creating CouchDB database");

        let response = self
            .request(reqwest::Method::PUT, self.url_for(&[])?)
            .send()
            .await?;

        match response.status() {
            // 412: created concurrently by another instance
            status if status.is_success() || status == StatusCode::PRECONDITION_FAILED => Ok(()),
            _ => Err(error_from(response).await),
        }
    }
}

/// Ids starting with `_` address CouchDB endpoints, never documents
fn is_reserved_id(id: &str) -> bool {
    id.is_empty() || id.starts_with('_')
}

async fn error_from(response: Response) -> StoreError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::CONFLICT {
        StoreError::Conflict(body)
    } else {
        StoreError::Status {
            status: status.as_u16(),
            body,
        }
    }
}

async fn check(response: Response) -> StoreResult<Response> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(error_from(response).await)
    }
}

#[async_trait]
impl DocumentStore for CouchDbStore {
    async fn ping(&self) -> StoreResult<()> {
        let response = self
            .http_client
            .get(self.base_url.clone())
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn create_document(&self, fields: Map<String, Value>) -> StoreResult<Document> {
        let response = self
            .request(reqwest::Method::POST, self.url_for(&[])?)
            .json(&fields)
            .send()
            .await?;
        let created: WriteResponse = check(response).await?.json().await?;

        tracing::debug!(id = %created.id, rev = %created.rev, "Document created");

        Ok(Document {
            id: created.id,
            rev: Some(created.rev),
            fields,
        })
    }

    async fn get_document(&self, id: &str) -> StoreResult<Option<Document>> {
        if is_reserved_id(id) {
            return Ok(None);
        }

        let response = self
            .request(reqwest::Method::GET, self.url_for(&[id])?)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let raw: Value = check(response).await?.json().await?;
        Document::from_json(raw).map(Some)
    }

    async fn update_document(&self, mut document: Document) -> StoreResult<Document> {
        let response = self
            .request(reqwest::Method::PUT, self.url_for(&[document.id.as_str()])?)
            .json(&document.to_json())
            .send()
            .await?;
        let written: WriteResponse = check(response).await?.json().await?;

        document.rev = Some(written.rev);
        Ok(document)
    }

    async fn delete_document(&self, document: &Document) -> StoreResult<()> {
        let rev = document.rev.as_deref().unwrap_or_default();
        let response = self
            .request(reqwest::Method::DELETE, self.url_for(&[document.id.as_str()])?)
            .query(&[("rev", rev)])
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    async fn all_documents(&self) -> StoreResult<Vec<Document>> {
        let response = self
            .request(reqwest::Method::GET, self.url_for(&["_all_docs"])?)
            .query(&[("include_docs", "true")])
            .send()
            .await?;
        let listing: AllDocsResponse = check(response).await?.json().await?;

        listing
            .rows
            .into_iter()
            .filter(|row| !row.id.starts_with("_design/"))
            .filter_map(|row| row.doc)
            .map(Document::from_json)
            .collect()
    }

    async fn find_documents(&self, selector: &Selector) -> StoreResult<Vec<Document>> {
        if selector.is_empty() {
            return self.all_documents().await;
        }

        let url = self.url_for(&["_find"])?;
        let mut documents = Vec::new();
        let mut bookmark: Option<String> = None;

        loop {
            let mut body = json!({
                "selector": selector.to_json(),
                "limit": FIND_PAGE_SIZE,
            });
            if let Some(bookmark) = &bookmark {
                body["bookmark"] = Value::String(bookmark.clone());
            }

            let response = self
                .request(reqwest::Method::POST, url.clone())
                .json(&body)
                .send()
                .await?;
            let page: FindResponse = check(response).await?.json().await?;

            let page_len = page.docs.len();
            for raw in page.docs {
                documents.push(Document::from_json(raw)?);
            }

            match page.bookmark {
                Some(next) if page_len == FIND_PAGE_SIZE => bookmark = Some(next),
                _ => break,
            }
        }

        tracing::debug!(
            selector = %selector.to_json(),
            matched = documents.len(),
            "Selector query completed"
        );

        Ok(documents)
    }

    fn name(&self) -> &'static str {
        "couchdb"
    }
}
