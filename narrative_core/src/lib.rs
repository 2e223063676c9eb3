//! # Narrative Core
//!
//! The turn engine of the narrative simulation. This crate owns persistence and
//! orchestration: it reads and writes the two world stores, runs the eight-stage
//! turn pipeline against the `game_rules` engine, and talks to the external
//! planner, narrator and memory store through traits.
//!
//! ## Core Components
//!
//! - **knowledge_base**: SQLite relation-edge store with card bootstrap
//! - **world_store**: SQLite attribute store, last write wins
//! - **snapshot**: per-entity markdown export of both stores
//! - **overlay**: priority-ordered overlay op documents from content roots
//! - **collaborators**: planner/narrator/memory traits and offline implementations
//! - **context_assembler**: card, memory and world-fact retrieval for a turn
//! - **pipeline**: the turn state machine
//! - **session**: save slots, chat history and the turn counter
//! - **config**: runtime settings and save-slot layout
//!
//! ## Design Philosophy
//!
//! - **Best effort**: rule violations are reported on the turn, never abort it
//! - **Explicit configuration**: settings are passed in, never global
//! - **No cross-store atomicity**: each store call commits on its own

pub mod collaborators;
pub mod config;
pub mod context_assembler;
pub mod error;
pub mod knowledge_base;
pub mod overlay;
pub mod pipeline;
pub mod session;
pub mod snapshot;
pub mod world_store;

pub use collaborators::*;
pub use config::*;
pub use context_assembler::*;
pub use error::*;
pub use knowledge_base::*;
pub use overlay::*;
pub use pipeline::*;
pub use session::*;
pub use snapshot::*;
pub use world_store::*;
