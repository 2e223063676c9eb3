//! Admin slash commands, translated straight into ops.
//!
//! Recognized forms:
//! - `/give <subject> <object>` adds `subject -(has)-> object`
//! - `/teleport <subject> <location>` adds `subject -(at)-> location`
//! - `/set <entity>.<key> <value>` or `/set <entity> <key>=<value>` sets an attribute
//!
//! Anything else, including malformed forms of the above, yields no ops.

use crate::ops::{EdgeOp, Op, OpSource, SetAttr};

/// Confidence stamped on admin edges.
pub const ADMIN_CONFIDENCE: f64 = 1.0;

/// Parse raw player input. An empty result means "not an admin command".
pub fn parse_admin_command(text: &str) -> Vec<Op> {
    if !text.starts_with('/') {
        return Vec::new();
    }

    let parts: Vec<&str> = text.split_whitespace().collect();
    if parts.len() < 3 {
        return Vec::new();
    }

    let admin_edge = |relation: &str| {
        Op::AddEdge(
            EdgeOp::new(parts[1], relation, parts[2])
                .with_confidence(ADMIN_CONFIDENCE)
                .with_source(OpSource::Admin),
        )
    };

    match parts[0].to_lowercase().as_str() {
        "/give" => vec![admin_edge("has")],
        "/teleport" => vec![admin_edge("at")],
        "/set" => parse_set(parts[1], parts[2])
            .map(|attr| vec![Op::SetAttr(attr.with_source(OpSource::Admin))])
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn parse_set(target: &str, arg: &str) -> Option<SetAttr> {
    if let Some((entity_id, key)) = target.split_once('.') {
        return Some(SetAttr::new(entity_id, key, arg));
    }
    let (key, value) = arg.split_once('=')?;
    Some(SetAttr::new(target, key, value))
}
