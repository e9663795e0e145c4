pub mod path;

use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde_json::Value;

use crate::error::{CoreError, CoreErrorCode};
use path::{DocPath, PathSegment, TreePath, lookup_segment, lookup_segment_mut};

/// Gzip magic bytes; plain JSON files are accepted too.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// The loaded save. Owned by the editor session; mutated only on commit.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveDocument {
    root: Value,
}

impl SaveDocument {
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    pub fn open(path: &Path) -> Result<Self, CoreError> {
        let bytes = fs::read(path).map_err(|e| {
            CoreError::new(
                CoreErrorCode::Io,
                format!("failed to read {}: {e}", path.display()),
            )
        })?;
        Self::from_bytes(&bytes)
    }

    /// Decodes either a gzip `.hhsav` member or plain UTF-8 JSON.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        if bytes.starts_with(&GZIP_MAGIC) {
            return Self::from_gzip_bytes(bytes);
        }
        Self::from_json_bytes(bytes)
    }

    pub fn from_gzip_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        let mut decoder = GzDecoder::new(bytes);
        let mut raw = Vec::new();
        decoder.read_to_end(&mut raw).map_err(|e| {
            CoreError::new(
                CoreErrorCode::Decompress,
                format!("failed to decompress save: {e}"),
            )
        })?;
        Self::from_json_bytes(&raw)
    }

    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        let text = std::str::from_utf8(bytes).map_err(|e| {
            CoreError::new(CoreErrorCode::Parse, format!("save is not UTF-8: {e}"))
        })?;
        let root = serde_json::from_str(text).map_err(|e| {
            CoreError::new(CoreErrorCode::Parse, format!("save is not valid JSON: {e}"))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn get(&self, path: &DocPath) -> Option<&Value> {
        path.segments()
            .iter()
            .try_fold(&self.root, |node, segment| lookup_segment(node, segment))
    }

    /// Replaces the node at `path`. Map entries keep their position.
    pub fn set(&mut self, path: &DocPath, value: Value) -> Result<(), CoreError> {
        let mut node = &mut self.root;
        for segment in path.segments() {
            node = lookup_segment_mut(node, segment).ok_or_else(|| {
                CoreError::new(
                    CoreErrorCode::Path,
                    format!("path {} does not exist in the document", path.label()),
                )
            })?;
        }
        *node = value;
        Ok(())
    }

    /// Text-buffer rendering of a tree row. A group renders its members as a
    /// sequence.
    pub fn render_selection(&self, path: &TreePath) -> Result<String, CoreError> {
        let missing = |at: &DocPath| {
            CoreError::new(
                CoreErrorCode::Path,
                format!("path {} does not exist in the document", at.label()),
            )
        };
        match path {
            TreePath::Node(node) => render_pretty(self.get(node).ok_or_else(|| missing(node))?),
            TreePath::Group { parent, name } => {
                let value = self.get(parent).ok_or_else(|| missing(parent))?;
                let members: Vec<Value> = group_members(value, name)
                    .into_iter()
                    .map(|(_, item)| item.clone())
                    .collect();
                render_pretty(&Value::Array(members))
            }
        }
    }

    /// Deep copy handed to worker threads; they never see the live root.
    pub fn snapshot(&self) -> Value {
        self.root.clone()
    }

    pub fn to_pretty_json(&self) -> Result<String, CoreError> {
        render_pretty(&self.root)
    }

    pub fn to_compact_json(&self) -> Result<String, CoreError> {
        serde_json::to_string(&self.root).map_err(|e| {
            CoreError::new(CoreErrorCode::Parse, format!("failed to encode save: {e}"))
        })
    }

    /// Compact JSON inside a single gzip member at maximum compression.
    pub fn to_gzip_bytes(&self) -> Result<Vec<u8>, CoreError> {
        let compact = self.to_compact_json()?;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
        let compress_error =
            |e: std::io::Error| CoreError::new(CoreErrorCode::Io, format!("failed to compress save: {e}"));
        encoder
            .write_all(compact.as_bytes())
            .map_err(compress_error)?;
        encoder.finish().map_err(compress_error)
    }

    pub fn save_json(&self, path: &Path) -> Result<(), CoreError> {
        let pretty = self.to_pretty_json()?;
        fs::write(path, pretty).map_err(|e| {
            CoreError::new(
                CoreErrorCode::Io,
                format!("failed to write {}: {e}", path.display()),
            )
        })
    }

    pub fn export_save(&self, path: &Path) -> Result<(), CoreError> {
        let bytes = self.to_gzip_bytes()?;
        fs::write(path, bytes).map_err(|e| {
            CoreError::new(
                CoreErrorCode::Io,
                format!("failed to write {}: {e}", path.display()),
            )
        })
    }
}

/// Pretty rendering used for the text buffer: two-space indent, non-ASCII kept.
pub fn render_pretty(value: &Value) -> Result<String, CoreError> {
    serde_json::to_string_pretty(value).map_err(|e| {
        CoreError::new(CoreErrorCode::Parse, format!("failed to render JSON: {e}"))
    })
}

/// Field whose string value buckets sequence items into virtual group rows.
pub const GROUP_FIELD: &str = "type";

/// Distinct group names of a sequence, in first-seen order. Empty unless every
/// item is an object carrying a string [`GROUP_FIELD`].
pub fn group_names(value: &Value) -> Vec<String> {
    let Value::Array(items) = value else {
        return Vec::new();
    };
    let mut names: Vec<String> = Vec::new();
    for item in items {
        let Some(name) = item.get(GROUP_FIELD).and_then(Value::as_str) else {
            return Vec::new();
        };
        if !names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
            names.push(name.to_string());
        }
    }
    names
}

/// Items of a sequence in group `name`, with their indices.
pub fn group_members<'a>(value: &'a Value, name: &str) -> Vec<(usize, &'a Value)> {
    let Value::Array(items) = value else {
        return Vec::new();
    };
    items
        .iter()
        .enumerate()
        .filter(|(_, item)| {
            item.get(GROUP_FIELD)
                .and_then(Value::as_str)
                .is_some_and(|t| t.eq_ignore_ascii_case(name))
        })
        .collect()
}

/// Key of the last segment, or the key of the nearest keyed ancestor for indices.
pub fn nearest_key(path: &DocPath) -> Option<&str> {
    path.segments().iter().rev().find_map(PathSegment::as_key)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::path::{DocPath, TreePath};
    use super::{SaveDocument, group_members, group_names};
    use crate::error::CoreErrorCode;

    #[test]
    fn set_keeps_map_key_position() {
        let mut doc = SaveDocument::new(json!({"a": 1, "b": 2, "c": 3}));
        doc.set(&DocPath::root().child("b"), json!({"x": true}))
            .expect("set should succeed");
        let keys: Vec<&str> = doc
            .root()
            .as_object()
            .expect("root should be an object")
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn set_rejects_missing_path() {
        let mut doc = SaveDocument::new(json!({"a": [1]}));
        let err = doc
            .set(&DocPath::root().child("a").child(4usize), json!(2))
            .expect_err("index 4 does not exist");
        assert_eq!(err.code, CoreErrorCode::Path);
        assert_eq!(doc.root(), &json!({"a": [1]}));
    }

    #[test]
    fn gzip_roundtrip_preserves_unicode_and_order() {
        let doc = SaveDocument::new(json!({"zeta": "héllo ✓", "alpha": [1, 2.5, null]}));
        let bytes = doc.to_gzip_bytes().expect("compress");
        let loaded = SaveDocument::from_bytes(&bytes).expect("decompress");
        assert_eq!(loaded, doc);
        let pretty = loaded.to_pretty_json().expect("pretty");
        assert!(pretty.contains("héllo ✓"));
        assert!(pretty.starts_with("{\n  \"zeta\""));
    }

    #[test]
    fn corrupt_gzip_is_a_decompression_error() {
        let err = SaveDocument::from_bytes(&[0x1f, 0x8b, 0x08, 0x00, 0x01])
            .expect_err("truncated member should fail");
        assert_eq!(err.code, CoreErrorCode::Decompress);
    }

    #[test]
    fn groups_follow_type_field() {
        let hosts = json!([
            {"type": "router", "ip": "10.0.0.1"},
            {"type": "Server", "ip": "10.0.0.2"},
            {"type": "ROUTER", "ip": "10.0.0.3"}
        ]);
        assert_eq!(group_names(&hosts), ["router", "Server"]);
        let routers: Vec<usize> = group_members(&hosts, "router").iter().map(|(i, _)| *i).collect();
        assert_eq!(routers, [0, 2]);
        assert!(group_names(&json!([{"type": "a"}, 3])).is_empty());
    }

    #[test]
    fn group_selection_renders_members_only() {
        let doc = SaveDocument::new(json!({
            "hosts": [{"type": "router", "id": 1}, {"type": "server", "id": 2}]
        }));
        let group = TreePath::Group {
            parent: DocPath::root().child("hosts"),
            name: "server".to_string(),
        };
        let text = doc.render_selection(&group).expect("render");
        assert_eq!(text, "[\n  {\n    \"type\": \"server\",\n    \"id\": 2\n  }\n]");
        let missing = TreePath::Node(DocPath::root().child("nope"));
        assert_eq!(
            doc.render_selection(&missing).expect_err("missing").code,
            CoreErrorCode::Path
        );
    }
}
