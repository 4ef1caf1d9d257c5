//! Database repository implementations

pub mod chat_repository;
mod rows;

pub use chat_repository::*;
