use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, AppResult},
    middleware::RequestId,
    models::{category_from, Recommendation, RecommendationField, RecommendationQuery},
    services::{DeleteOutcome, UpdateOutcome},
};

use super::{extract::JsonBody, AppState};

// Request/Response types

/// Optional equality filters for the listing endpoint
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub product_id: Option<String>,
    pub suggestion_id: Option<String>,
    pub category_id: Option<String>,
}

impl ListParams {
    fn into_query(self) -> RecommendationQuery {
        RecommendationQuery::new()
            .and_maybe(RecommendationField::ProductId, self.product_id)
            .and_maybe(RecommendationField::SuggestionId, self.suggestion_id)
            .and_maybe(RecommendationField::CategoryId, self.category_id)
    }
}

/// A recommendation as returned to clients
///
/// Unset fields are rendered as `null`; `_id` is omitted until the record
/// has been stored.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationResponse {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub product_id: Option<String>,
    pub suggestion_id: Option<String>,
    pub category_id: Option<String>,
}

impl From<&Recommendation> for RecommendationResponse {
    fn from(recommendation: &Recommendation) -> Self {
        Self {
            id: recommendation.id.clone(),
            product_id: recommendation.product_id.clone(),
            suggestion_id: recommendation.suggestion_id.clone(),
            category_id: recommendation.category_id.clone(),
        }
    }
}

fn responses(recommendations: &[Recommendation]) -> Vec<RecommendationResponse> {
    recommendations.iter().map(RecommendationResponse::from).collect()
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub store: &'static str,
}

fn not_found(id: &str) -> AppError {
    AppError::NotFound(format!("Recommendation with id '{}' was not found", id))
}

fn location_of(id: &str) -> String {
    format!("/recommendations/{}", id)
}

// Handlers

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.recommendations.store_name();
    match state.recommendations.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                store,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unavailable",
                    store,
                }),
            )
        }
    }
}

/// List recommendations, optionally filtered by field values
///
/// A filter given more than once is a 400 with the usual JSON error body.
pub async fn list_recommendations(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> AppResult<Json<Vec<RecommendationResponse>>> {
    let Query(params) = params.map_err(|e| AppError::InvalidInput(e.body_text()))?;
    let query = params.into_query();

    let recommendations = if query.is_empty() {
        state.recommendations.all().await?
    } else {
        state.recommendations.find_by(&query).await?
    };

    tracing::debug!(count = recommendations.len(), "Listing recommendations");

    Ok(Json(responses(&recommendations)))
}

/// Fetch a single recommendation
pub async fn get_recommendation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<RecommendationResponse>> {
    let recommendation = state
        .recommendations
        .find(&id)
        .await?
        .ok_or_else(|| not_found(&id))?;

    Ok(Json(RecommendationResponse::from(&recommendation)))
}

/// Create a recommendation
pub async fn create_recommendation(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    JsonBody(body): JsonBody,
) -> AppResult<impl IntoResponse> {
    let mut recommendation = Recommendation::default();
    recommendation.deserialize(&body)?;
    state.recommendations.create(&mut recommendation).await?;

    let id = recommendation
        .id
        .clone()
        .ok_or_else(|| AppError::Internal("store did not assign an id".to_string()))?;

    tracing::info!(request_id = %request_id, id = %id, "Recommendation created");

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location_of(&id))],
        Json(RecommendationResponse::from(&recommendation)),
    ))
}

/// Replace suggestion and category of an existing recommendation
///
/// Existence is checked before the body is validated, so an unknown id is a
/// 404 regardless of the payload.
pub async fn update_recommendation(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<String>,
    body: Result<JsonBody, AppError>,
) -> AppResult<Json<RecommendationResponse>> {
    let mut recommendation = state
        .recommendations
        .find(&id)
        .await?
        .ok_or_else(|| not_found(&id))?;

    let JsonBody(body) = body?;
    recommendation.replace_details(&body)?;

    match state.recommendations.update(&recommendation).await? {
        UpdateOutcome::Updated => {
            tracing::info!(request_id = %request_id, id = %id, "Recommendation updated");
            Ok(Json(RecommendationResponse::from(&recommendation)))
        }
        UpdateOutcome::NotFound => Err(not_found(&id)),
    }
}

/// Delete a recommendation; deleting an unknown id still succeeds
pub async fn delete_recommendation(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    match state.recommendations.delete(&id).await? {
        DeleteOutcome::Deleted => {
            tracing::info!(request_id = %request_id, id = %id, "Recommendation deleted");
        }
        DeleteOutcome::NotFound => {
            tracing::info!(request_id = %request_id, id = %id, "Delete of unknown recommendation ignored");
        }
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Delete every recommendation
pub async fn reset_recommendations(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> AppResult<StatusCode> {
    let removed = state.recommendations.remove_all().await?;
    tracing::info!(request_id = %request_id, removed, "Recommendations reset");
    Ok(StatusCode::NO_CONTENT)
}

/// Move every recommendation of a category to a new category
pub async fn reassign_category(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(category_id): Path<String>,
    body: Result<JsonBody, AppError>,
) -> AppResult<Json<Vec<RecommendationResponse>>> {
    let matching = state
        .recommendations
        .find_by_category_id(&category_id)
        .await?;
    if matching.is_empty() {
        return Err(AppError::NotFound(format!(
            "No recommendations with categoryId '{}'",
            category_id
        )));
    }

    let JsonBody(body) = body?;
    let new_category = category_from(&body)?;

    let updated = state
        .recommendations
        .reassign_category(&category_id, new_category)
        .await?;

    tracing::info!(
        request_id = %request_id,
        from = %category_id,
        updated = updated.len(),
        "Category reassigned"
    );

    Ok(Json(responses(&updated)))
}

/// Fallback for unknown routes
pub async fn route_not_found() -> AppError {
    AppError::NotFound("Resource not found".to_string())
}
