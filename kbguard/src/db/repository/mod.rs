mod chunks;
mod items;
mod knowledge;

pub(crate) use chunks::validate_chunk;
pub use chunks::ChunkRepository;
pub use items::ItemRepository;
pub use knowledge::KnowledgeRepository;
