//! Utility modules

pub mod account_cache;
pub mod memory_storage;
pub mod validation;

pub use account_cache::*;
pub use memory_storage::*;
pub use validation::*;
