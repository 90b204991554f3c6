pub mod query;
pub mod recommendation;

pub use query::{FieldFilter, RecommendationField, RecommendationQuery};
pub use recommendation::{category_from, Recommendation, ValidationError};
