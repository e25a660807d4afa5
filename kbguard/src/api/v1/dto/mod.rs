//! v1 API Data Transfer Objects.
//!
//! Wire types for the v1 REST API, kept apart from the domain models in
//! `src/models/`.

pub mod knowledge;
pub mod retrieval;

pub use knowledge::*;
pub use retrieval::*;
