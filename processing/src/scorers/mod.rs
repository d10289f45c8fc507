pub mod hybrid;
pub mod rule_based;

pub use hybrid::{HybridOutcome, HybridScorer};
pub use rule_based::{CompositeScorer, MAX_RISK_SCORE, MIN_RISK_SCORE};
