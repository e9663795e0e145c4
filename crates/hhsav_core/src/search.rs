//! Find over keys and scalar values. The index is built on first use and
//! dropped whenever the document changes.

use serde::Serialize;
use serde_json::Value;
use tracing::trace;

use crate::document::path::{DocPath, PathSegment};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Key,
    Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub path: DocPath,
    pub kind: MatchKind,
    pub text: String,
}

#[derive(Debug, Clone)]
struct IndexEntry {
    path: DocPath,
    kind: MatchKind,
    text: String,
    folded: String,
}

#[derive(Debug, Default)]
pub struct SearchIndex {
    entries: Option<Vec<IndexEntry>>,
}

impl SearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invalidate(&mut self) {
        self.entries = None;
    }

    pub fn is_built(&self) -> bool {
        self.entries.is_some()
    }

    /// Case-insensitive substring search in document order.
    pub fn find(&mut self, root: &Value, query: &str) -> Vec<SearchHit> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        let entries = self.entries.get_or_insert_with(|| {
            let mut entries = Vec::new();
            index_value(root, &DocPath::root(), &mut entries);
            trace!(entries = entries.len(), "search index rebuilt");
            entries
        });
        entries
            .iter()
            .filter(|entry| entry.folded.contains(&needle))
            .map(|entry| SearchHit {
                path: entry.path.clone(),
                kind: entry.kind,
                text: entry.text.clone(),
            })
            .collect()
    }
}

fn index_value(value: &Value, path: &DocPath, out: &mut Vec<IndexEntry>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let child_path = path.child(PathSegment::Key(key.clone()));
                push(out, &child_path, MatchKind::Key, key.clone());
                index_value(child, &child_path, out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                index_value(child, &path.child(index), out);
            }
        }
        Value::String(s) => push(out, path, MatchKind::Value, s.clone()),
        Value::Number(n) => push(out, path, MatchKind::Value, n.to_string()),
        Value::Bool(b) => push(out, path, MatchKind::Value, b.to_string()),
        Value::Null => {}
    }
}

fn push(out: &mut Vec<IndexEntry>, path: &DocPath, kind: MatchKind, text: String) {
    out.push(IndexEntry {
        path: path.clone(),
        kind,
        folded: text.to_lowercase(),
        text,
    });
}
