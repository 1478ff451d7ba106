//! File-backed node state.
//!
//! A [`PersistentVariable`] is one named JSON file in a folder. Nodes built
//! with [`NodeBuilder::persistent`](crate::pipeline::NodeBuilder::persistent)
//! keep their current value in one, so it survives restarts. The
//! [`DictionaryNode`] builds on that to keep a mapping updated through
//! `["update", {...}]` and `["delete", key | [keys]]` messages.
//!
//! There is no locking across processes: two writers of the same name race
//! and the last rename wins.

pub mod dictionary;
pub mod variable;

pub use dictionary::{DictionaryAction, DictionaryNode, DictionaryNodeBuilder};
pub use variable::PersistentVariable;
