//! Entity definitions - the cards that declare which ids exist and what type they are.

mod card;
mod index;

pub use card::*;
pub use index::*;
