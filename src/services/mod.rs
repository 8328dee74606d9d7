pub mod answer_checker;
pub mod query_synthesizer;
pub mod quota;
pub mod relevance_filter;
pub mod retrieval;

pub use answer_checker::AnswerChecker;
pub use query_synthesizer::QuerySynthesizer;
pub use quota::{InMemoryQuotaStore, QuotaStore};
pub use relevance_filter::RelevanceFilter;
pub use retrieval::RetrievalFetcher;
