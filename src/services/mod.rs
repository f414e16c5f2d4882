pub mod annotation_scanner;
pub mod consensus;
pub mod dimension_rater;
pub mod llm_service;
pub mod response_normalizer;
pub mod score_aggregator;

pub use consensus::{ConsensusSummary, ConsensusSynthesizer};
pub use dimension_rater::{DimensionFailure, DimensionOutcome, DimensionRater};
pub use llm_service::{InferenceBackend, InferenceRequest, LlmService};
pub use score_aggregator::{aggregate, ScoreSummary};
