//! Knowledge retrieval: LLM relevance scoring and ranking

pub mod parser;
pub mod ranker;
pub mod scorer;

pub use parser::parse_score;
pub use ranker::{Ranking, RetrievalRanker};
pub use scorer::SemanticScorer;
