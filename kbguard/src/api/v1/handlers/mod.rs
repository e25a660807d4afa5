pub(crate) mod health;
pub mod knowledge;
pub mod retrieval;

pub use health::health_check;
