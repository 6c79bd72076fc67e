/// Conversion between domain types and the JSON value tree
pub mod codec;
/// Utilities for interacting with the game's datatable dump
pub mod data;
/// Error definitions
pub mod error;
/// Export of linked weapons and icon sets into the site layout
pub mod export;
/// SQLite FTS index and queries over exported documents
#[cfg(feature = "search")]
pub mod search;
/// Weapon extraction, linking, and hand-authored edits
pub mod weapon;
