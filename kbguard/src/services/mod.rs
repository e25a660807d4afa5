mod knowledge;
mod retrieval;

pub use knowledge::KnowledgeService;
pub use retrieval::{RetrievalService, MAX_K};
