//! Client-side conversation state.
//!
//! One ordered message list per open conversation, keyed by
//! [`ConversationKey`](crate::entities::ConversationKey), with the merge
//! rules that reconcile optimistic entries against confirmed records.

pub mod conversation_state;
pub mod conversation_store;

pub use conversation_state::{ConversationState, MergeOutcome};
pub use conversation_store::ConversationStore;
