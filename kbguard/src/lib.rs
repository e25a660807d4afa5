//! Permission-scoped retrieval for knowledge-base chunks.
//!
//! Every stored chunk carries an access list inside its metadata. Searches
//! run on behalf of a resolved identity (user id plus directory groups) and
//! only ever return chunks that identity may see.

pub mod api;
pub mod codec;
pub mod config;
pub mod db;
pub mod directory;
pub mod embeddings;
pub mod error;
pub mod models;
pub mod processing;
pub mod services;

pub use error::{KbError, Result};
