//! Core data models shared across the engine

mod account;
mod snapshot;
mod version;

pub use account::*;
pub use snapshot::*;
pub use version::*;
