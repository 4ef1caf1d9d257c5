//! Client-side services.
//!
//! Typing presence and the cached room directory.

pub mod presence;
pub mod rooms;

pub use presence::{PresenceEntry, TypingDebouncer, TypingTracker};
pub use rooms::RoomDirectory;
