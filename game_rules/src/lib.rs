//! # Game Rules
//!
//! The "World Bible" crate - the op model, the card index, relation constraints and
//! the rule engine. This crate decides which mutations are legal; it performs no
//! storage and contains no AI logic.
//!
//! ## Core Components
//!
//! - **ops**: the four mutation kinds and all-or-nothing batch decoding
//! - **rules**: declarative relation constraints, derived actions and the rule engine
//! - **admin**: deterministic slash-command translation
//! - **entities**: cards and the entity index
//! - **world_state**: edges, attributes and world-fact snapshots

pub mod admin;
pub mod entities;
pub mod error;
pub mod ops;
pub mod rules;
pub mod world_state;

pub use admin::*;
pub use entities::*;
pub use error::*;
pub use ops::*;
pub use rules::*;
pub use world_state::*;
