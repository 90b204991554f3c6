use crate::services::RecommendationRepository;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub recommendations: RecommendationRepository,
}

impl AppState {
    /// Creates the state around an already connected repository
    pub fn new(recommendations: RecommendationRepository) -> Self {
        Self { recommendations }
    }
}
