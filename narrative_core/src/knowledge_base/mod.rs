//! Knowledge Base module - the persistent relation-edge store.
//!
//! Edges are `(subject, relation, object)` facts with provenance. The store is
//! append-only plus exact-match delete and enforces no uniqueness; cardinality is
//! the rule engine's concern.

mod edge_store;

pub use edge_store::*;
