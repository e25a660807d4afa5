mod chunker;
mod pipeline;

pub use chunker::TextChunker;
pub use pipeline::ProcessingPipeline;
