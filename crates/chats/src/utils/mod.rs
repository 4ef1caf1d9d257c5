//! Internal utilities for the chat system.

pub mod permissions;
pub mod validation;

pub use permissions::*;
pub use validation::*;
