mod chunk;
mod common;
mod identity;
mod knowledge;
mod metadata;
mod permissions;

pub use chunk::*;
pub use common::*;
pub use identity::*;
pub use knowledge::*;
pub use metadata::*;
pub use permissions::*;
