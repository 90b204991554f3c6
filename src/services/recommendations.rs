use std::sync::Arc;

use crate::{
    config::{Config, ServiceBinding, StoreBackend},
    db::{CouchDbStore, Document, DocumentStore, MemoryStore, Selector},
    error::{AppError, AppResult},
    models::{Recommendation, RecommendationField, RecommendationQuery},
};

/// Result of persisting a recommendation with [`RecommendationRepository::save`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Created,
    Updated,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

impl From<&RecommendationQuery> for Selector {
    fn from(query: &RecommendationQuery) -> Self {
        query
            .filters()
            .iter()
            .fold(Selector::new(), |selector, filter| {
                selector.equals(filter.field.key(), filter.value.as_str())
            })
    }
}

/// Persistence gateway for recommendations
///
/// Holds the single shared store handle. Cloning is cheap and every clone
/// talks to the same store, so one repository is created at startup and
/// handed to the HTTP layer.
#[derive(Clone)]
pub struct RecommendationRepository {
    store: Arc<dyn DocumentStore>,
}

impl RecommendationRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Connects the configured backend
    ///
    /// Fails when the store cannot be reached or the database cannot be
    /// created or opened.
    pub async fn connect(config: &Config) -> anyhow::Result<Self> {
        let store: Arc<dyn DocumentStore> = match config.store_backend {
            StoreBackend::CouchDb => {
                let binding = ServiceBinding::from_env()?;
                Arc::new(CouchDbStore::connect(&binding, &config.database_name).await?)
            }
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory store, recommendations will not persist");
                Arc::new(MemoryStore::new())
            }
        };

        tracing::info!(store = store.name(), database = %config.database_name, "Document store connected");

        Ok(Self::new(store))
    }

    /// Releases the store handle
    pub async fn close(self) {
        tracing::info!(store = self.store.name(), "Closing document store connection");
        drop(self.store);
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    pub async fn ping(&self) -> AppResult<()> {
        self.store.ping().await?;
        Ok(())
    }

    /// Creates the record when it has no id, updates it otherwise
    pub async fn save(&self, recommendation: &mut Recommendation) -> AppResult<SaveOutcome> {
        recommendation.validate()?;

        if recommendation.id.is_some() {
            let outcome = match self.update(recommendation).await? {
                UpdateOutcome::Updated => SaveOutcome::Updated,
                UpdateOutcome::NotFound => SaveOutcome::NotFound,
            };
            Ok(outcome)
        } else {
            self.create(recommendation).await?;
            Ok(SaveOutcome::Created)
        }
    }

    /// Inserts the record and assigns the store-generated id
    ///
    /// Any id already on the record is discarded.
    pub async fn create(&self, recommendation: &mut Recommendation) -> AppResult<()> {
        recommendation.validate()?;
        recommendation.id = None;

        let document = self
            .store
            .create_document(recommendation.serialize())
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    product_id = ?recommendation.product_id,
                    "Create failed"
                );
                e
            })?;

        tracing::info!(id = %document.id, product_id = ?recommendation.product_id, "Recommendation created");
        recommendation.id = Some(document.id);
        Ok(())
    }

    /// Overwrites the stored fields of an existing record
    pub async fn update(&self, recommendation: &Recommendation) -> AppResult<UpdateOutcome> {
        recommendation.validate()?;

        let Some(id) = recommendation.id.as_deref() else {
            return Ok(UpdateOutcome::NotFound);
        };

        let Some(mut document) = self.store.get_document(id).await? else {
            tracing::info!(id = %id, "Unable to locate recommendation for update");
            return Ok(UpdateOutcome::NotFound);
        };

        let mut fields = recommendation.serialize();
        fields.remove("_id");
        document.fields.extend(fields);
        self.store.update_document(document).await?;

        tracing::info!(id = %id, "Recommendation updated");
        Ok(UpdateOutcome::Updated)
    }

    pub async fn delete(&self, id: &str) -> AppResult<DeleteOutcome> {
        let Some(document) = self.store.get_document(id).await? else {
            tracing::info!(id = %id, "Unable to delete recommendation, not found");
            return Ok(DeleteOutcome::NotFound);
        };

        self.store.delete_document(&document).await?;

        tracing::info!(id = %id, "Recommendation deleted");
        Ok(DeleteOutcome::Deleted)
    }

    /// Finds a recommendation by id
    pub async fn find(&self, id: &str) -> AppResult<Option<Recommendation>> {
        match self.store.get_document(id).await? {
            Some(document) => Ok(Some(hydrate(document)?)),
            None => Ok(None),
        }
    }

    /// Returns every recommendation, in store order
    pub async fn all(&self) -> AppResult<Vec<Recommendation>> {
        let documents = self.store.all_documents().await?;
        Ok(hydrate_all(documents))
    }

    /// Returns the recommendations matching every filter of the query
    pub async fn find_by(&self, query: &RecommendationQuery) -> AppResult<Vec<Recommendation>> {
        let documents = self.store.find_documents(&Selector::from(query)).await?;
        Ok(hydrate_all(documents))
    }

    pub async fn find_by_product_id(&self, product_id: &str) -> AppResult<Vec<Recommendation>> {
        self.find_by(&RecommendationQuery::by(RecommendationField::ProductId, product_id))
            .await
    }

    pub async fn find_by_category_id(&self, category_id: &str) -> AppResult<Vec<Recommendation>> {
        self.find_by(&RecommendationQuery::by(RecommendationField::CategoryId, category_id))
            .await
    }

    pub async fn find_by_suggestion_id(
        &self,
        suggestion_id: &str,
    ) -> AppResult<Vec<Recommendation>> {
        self.find_by(&RecommendationQuery::by(
            RecommendationField::SuggestionId,
            suggestion_id,
        ))
        .await
    }

    /// Deletes every document in the collection, one at a time
    ///
    /// Stops at the first failure; documents deleted before it stay deleted.
    pub async fn remove_all(&self) -> AppResult<usize> {
        let documents = self.store.all_documents().await?;
        let total = documents.len();

        for document in &documents {
            self.store.delete_document(document).await?;
        }

        tracing::info!(removed = total, "Removed all recommendations");
        Ok(total)
    }

    /// Moves every recommendation in category `from` to category `to`
    ///
    /// Returns the updated records. Stops at the first failure; records
    /// updated before it keep the new category.
    pub async fn reassign_category(
        &self,
        from: &str,
        to: Option<String>,
    ) -> AppResult<Vec<Recommendation>> {
        let matches = self.find_by_category_id(from).await?;
        let mut updated = Vec::with_capacity(matches.len());

        for mut recommendation in matches {
            recommendation.category_id = to.clone();
            match self.update(&recommendation).await? {
                UpdateOutcome::Updated => updated.push(recommendation),
                UpdateOutcome::NotFound => {
                    tracing::warn!(id = ?recommendation.id, "Recommendation vanished during category update");
                }
            }
        }

        tracing::info!(
            from = %from,
            to = ?to,
            updated = updated.len(),
            "Category reassigned"
        );
        Ok(updated)
    }
}

fn hydrate(document: Document) -> AppResult<Recommendation> {
    let id = document.id.clone();
    let mut recommendation = Recommendation {
        id: Some(document.id),
        ..Recommendation::default()
    };

    recommendation
        .deserialize(&serde_json::Value::Object(document.fields))
        .map_err(|e| AppError::Internal(format!("Stored recommendation {} is malformed: {}", id, e)))?;

    Ok(recommendation)
}

/// Hydrates a listing, skipping documents that are not recommendations
fn hydrate_all(documents: Vec<Document>) -> Vec<Recommendation> {
    documents
        .into_iter()
        .filter_map(|document| match hydrate(document) {
            Ok(recommendation) => Some(recommendation),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed document");
                None
            }
        })
        .collect()
}
