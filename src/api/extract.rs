use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
    http::header::CONTENT_TYPE,
};
use serde_json::Value;

use crate::error::AppError;

/// JSON request body that insists on an `application/json` content type
///
/// Unlike `axum::Json`, every rejection is a 400 with the service's JSON
/// error body, including a missing or foreign content type.
#[derive(Debug, Clone)]
pub struct JsonBody(pub Value);

fn is_json_content_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}

#[async_trait]
impl<S> FromRequest<S> for JsonBody
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if !is_json_content_type(&content_type) {
            return Err(AppError::InvalidInput(format!(
                "Content-Type must be application/json, got '{}'",
                content_type
            )));
        }

        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::InvalidInput(format!("Unable to read request body: {}", e)))?;

        let value = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::InvalidInput(format!("Malformed JSON body: {}", e)))?;

        Ok(Self(value))
    }
}
