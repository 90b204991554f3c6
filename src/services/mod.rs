pub mod recommendations;

pub use recommendations::{DeleteOutcome, RecommendationRepository, SaveOutcome, UpdateOutcome};
