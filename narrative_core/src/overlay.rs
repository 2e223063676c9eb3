//! Overlay loader - priority-ordered op batches bundled with content roots.
//!
//! Every content root may carry an `_overlay/` directory of `.toml` or `.json`
//! documents tagged `kind = "overlay_ops"`. Their ops are applied every turn.

use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

use game_rules::OpSource;

use crate::error::OverlayError;

/// Reserved subdirectory of a content root holding overlay documents.
pub const OVERLAY_DIR: &str = "_overlay";

/// Document kind that marks an overlay.
pub const OVERLAY_KIND: &str = "overlay_ops";

#[derive(Debug, Deserialize)]
struct OverlayDocument {
    #[serde(default)]
    kind: String,
    #[serde(default)]
    priority: i64,
    #[serde(default)]
    ops: Vec<Value>,
}

/// Reads overlay ops from an ordered list of content roots.
///
/// Roots are visited in order, base content first and enabled packs after.
#[derive(Debug, Clone, Default)]
pub struct OverlayLoader {
    roots: Vec<PathBuf>,
}

impl OverlayLoader {
    /// Create a loader over `roots`, in visiting order.
    pub fn new(roots: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
        }
    }

    /// The content roots, in visiting order.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Load and merge every overlay, sorted by priority ascending.
    ///
    /// Equal priorities keep encounter order. Each op is tagged `source = "overlay"`.
    /// Item structure is not checked here.
    pub fn load(&self) -> Result<Vec<Value>, OverlayError> {
        let mut docs: Vec<(i64, Vec<Value>)> = Vec::new();

        for root in &self.roots {
            let dir = root.join(OVERLAY_DIR);
            if !dir.is_dir() {
                continue;
            }
            let mut files = Vec::new();
            collect_documents(&dir, &mut files)?;

            for path in files {
                let text = std::fs::read_to_string(&path).map_err(|source| OverlayError::Io {
                    path: path.clone(),
                    source,
                })?;
                match parse_document(&path, &text) {
                    Ok(doc) if doc.kind == OVERLAY_KIND => docs.push((doc.priority, doc.ops)),
                    Ok(doc) => {
                        tracing::warn!(path = %path.display(), kind = %doc.kind, "skipping non-overlay document");
                    }
                    Err(reason) => {
                        tracing::warn!(path = %path.display(), %reason, "skipping unreadable overlay document");
                    }
                }
            }
        }

        docs.sort_by_key(|(priority, _)| *priority);

        let ops: Vec<Value> = docs
            .into_iter()
            .flat_map(|(_, ops)| ops)
            .map(tag_overlay_source)
            .collect();
        tracing::debug!(ops = ops.len(), "loaded overlay ops");
        Ok(ops)
    }
}

fn parse_document(path: &Path, text: &str) -> Result<OverlayDocument, String> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(text).map_err(|e| e.to_string()),
        _ => toml::from_str(text).map_err(|e| e.to_string()),
    }
}

fn tag_overlay_source(mut op: Value) -> Value {
    if let Value::Object(map) = &mut op {
        map.insert(
            "source".to_string(),
            Value::String(OpSource::Overlay.as_str().to_string()),
        );
    }
    op
}

/// Recursive walk in sorted path order, keeping `.toml` and `.json` files.
fn collect_documents(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), OverlayError> {
    let io_err = |source| OverlayError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        entries.push(entry.map_err(io_err)?.path());
    }
    entries.sort();

    for path in entries {
        if path.is_dir() {
            collect_documents(&path, out)?;
        } else if matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("toml") | Some("json")
        ) {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, text: &str) {
        let path = root.join(OVERLAY_DIR).join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
    }

    fn ops_doc(priority: i64, marker: &str) -> String {
        format!(
            r#"{{"kind": "overlay_ops", "priority": {priority}, "ops": [
                {{"type": "LogMemory", "text": "{marker}"}}
            ]}}"#
        )
    }

    fn texts(ops: &[Value]) -> Vec<&str> {
        ops.iter().map(|op| op["text"].as_str().unwrap()).collect()
    }

    #[test]
    fn test_priority_order_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.json", &ops_doc(10, "ten"));
        write(dir.path(), "b.json", &ops_doc(5, "five-first"));
        write(dir.path(), "c.json", &ops_doc(5, "five-second"));

        let ops = OverlayLoader::new([dir.path()]).load().unwrap();
        assert_eq!(texts(&ops), vec!["five-first", "five-second", "ten"]);
    }

    #[test]
    fn test_later_roots_follow_earlier_on_ties() {
        let base = tempfile::tempdir().unwrap();
        let pack = tempfile::tempdir().unwrap();
        write(pack.path(), "z.json", &ops_doc(0, "pack"));
        write(base.path(), "nested/deep/z.json", &ops_doc(0, "base"));

        let ops = OverlayLoader::new([base.path(), pack.path()]).load().unwrap();
        assert_eq!(texts(&ops), vec!["base", "pack"]);
    }

    #[test]
    fn test_toml_documents_and_source_tagging() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "weather.toml",
            r#"
kind = "overlay_ops"
priority = 1

[[ops]]
type = "SetAttr"
entity_id = "world"
key = "weather"
value = "rain"
source = "admin"
"#,
        );

        let ops = OverlayLoader::new([dir.path()]).load().unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0]["source"], "overlay");
        assert_eq!(ops[0]["value"], "rain");
    }

    #[test]
    fn test_skips_other_kinds_and_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "card.json", r#"{"kind": "card", "ops": [{"type": "LogMemory", "text": "no"}]}"#);
        write(dir.path(), "broken.json", "{not json");
        write(dir.path(), "notes.md", "ignored");
        write(dir.path(), "ok.json", &ops_doc(0, "yes"));

        let ops = OverlayLoader::new([dir.path()]).load().unwrap();
        assert_eq!(texts(&ops), vec!["yes"]);
    }

    #[test]
    fn test_missing_overlay_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(OverlayLoader::new([dir.path()]).load().unwrap().is_empty());
        assert!(OverlayLoader::default().load().unwrap().is_empty());
    }
}
