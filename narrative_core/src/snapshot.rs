//! Snapshot exporter - renders store contents to one markdown document per entity.
//!
//! Snapshots are for external inspection only and are never read back.

use game_rules::{AttrMap, Edge};
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

/// Render the document for one entity.
///
/// Sections with no entries are omitted. Relations are listed in edge order.
pub fn render_entity_document(entity_id: &str, attrs: &AttrMap, edges: &[Edge]) -> String {
    let mut lines = vec![format!("# {entity_id}"), String::new()];

    if let Some(entity_attrs) = attrs.get(entity_id).filter(|a| !a.is_empty()) {
        lines.push("## Attributes".to_string());
        lines.extend(entity_attrs.iter().map(|(k, v)| format!("- {k}: {v}")));
        lines.push(String::new());
    }

    let outgoing: Vec<String> = edges
        .iter()
        .filter(|e| e.subject_id == entity_id)
        .map(|e| format!("- ({}) -> {}", e.relation, e.object_id))
        .collect();
    if !outgoing.is_empty() {
        lines.push("## Relations (out)".to_string());
        lines.extend(outgoing);
        lines.push(String::new());
    }

    let incoming: Vec<String> = edges
        .iter()
        .filter(|e| e.object_id == entity_id)
        .map(|e| format!("- {} -> ({})", e.subject_id, e.relation))
        .collect();
    if !incoming.is_empty() {
        lines.push("## Relations (in)".to_string());
        lines.extend(incoming);
        lines.push(String::new());
    }

    let mut doc = lines.join("\n").trim().to_string();
    doc.push('\n');
    doc
}

/// File name for an entity's document.
///
/// Path separators and `%` are percent-escaped, so distinct ids never share a file.
pub fn snapshot_file_name(entity_id: &str) -> String {
    let mut name = String::with_capacity(entity_id.len() + 3);
    for c in entity_id.chars() {
        match c {
            '%' => name.push_str("%25"),
            '/' => name.push_str("%2F"),
            '\\' => name.push_str("%5C"),
            c => name.push(c),
        }
    }
    name.push_str(".md");
    name
}

/// Write one document per entity that has an attribute or touches an edge.
///
/// Existing documents for the same entity are overwritten. Returns the written
/// paths in entity order.
pub fn write_snapshot(attrs: &AttrMap, edges: &[Edge], target_dir: &Path) -> io::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(target_dir)?;

    let mut entities: BTreeSet<&str> = attrs.keys().map(String::as_str).collect();
    for edge in edges {
        entities.insert(&edge.subject_id);
        entities.insert(&edge.object_id);
    }

    let mut written = Vec::with_capacity(entities.len());
    for entity_id in entities {
        let path = target_dir.join(snapshot_file_name(entity_id));
        std::fs::write(&path, render_entity_document(entity_id, attrs, edges))?;
        written.push(path);
    }

    tracing::info!(documents = written.len(), dir = %target_dir.display(), "exported snapshot");
    Ok(written)
}
