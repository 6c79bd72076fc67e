//! Weapon entities and the passes that produce them: extraction from the
//! datatables, linking into complete weapons, and hand-authored edits.

pub mod edit;
pub mod extract;
pub mod link;
pub mod types;

pub use types::{AbilityCategory, AbilityId, AbilityItem, Category, Control, Element, Weapon};
