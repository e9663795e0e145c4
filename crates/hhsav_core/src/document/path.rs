use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Marker used as the first element of a virtual tree group path.
pub const GROUP_MARKER: &str = "__group__";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Index(usize),
    Key(String),
}

impl PathSegment {
    pub fn as_key(&self) -> Option<&str> {
        match self {
            Self::Key(key) => Some(key.as_str()),
            Self::Index(_) => None,
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// Location of a node inside the document. The empty path is the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocPath(Vec<PathSegment>);

impl DocPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first_key(&self) -> Option<&str> {
        self.0.first().and_then(PathSegment::as_key)
    }

    pub fn last(&self) -> Option<&PathSegment> {
        self.0.last()
    }

    pub fn parent(&self) -> Option<DocPath> {
        if self.0.is_empty() {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    pub fn child(&self, segment: impl Into<PathSegment>) -> DocPath {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    pub fn join(&self, tail: &[PathSegment]) -> DocPath {
        let mut segments = self.0.clone();
        segments.extend_from_slice(tail);
        Self(segments)
    }

    /// Human label such as `Bank > accounts > 0`; the root renders as `(root)`.
    pub fn label(&self) -> String {
        if self.0.is_empty() {
            return "(root)".to_string();
        }
        self.0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" > ")
    }

    /// Parses the slash form used on the command line (`Bank/accounts/0`).
    ///
    /// Digit-only segments are resolved against `root`: they become indices
    /// when the node they address is a sequence, keys otherwise.
    pub fn parse_slash(raw: &str, root: &Value) -> DocPath {
        let mut segments = Vec::new();
        let mut node = Some(root);
        for part in raw.split('/').filter(|part| !part.is_empty()) {
            let segment = match (node, part.parse::<usize>()) {
                (Some(Value::Array(_)), Ok(index)) => PathSegment::Index(index),
                _ => PathSegment::Key(part.to_string()),
            };
            node = node.and_then(|value| lookup_segment(value, &segment));
            segments.push(segment);
        }
        Self(segments)
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl From<Vec<PathSegment>> for DocPath {
    fn from(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }
}

/// A row address in the tree view. Group rows are virtual and never editable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TreePath {
    Node(DocPath),
    Group { parent: DocPath, name: String },
}

impl TreePath {
    pub fn is_editable(&self) -> bool {
        matches!(self, Self::Node(_))
    }

    pub fn as_node(&self) -> Option<&DocPath> {
        match self {
            Self::Node(path) => Some(path),
            Self::Group { .. } => None,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::Node(path) => path.label(),
            Self::Group { parent, name } => format!("{GROUP_MARKER} {} [{name}]", parent.label()),
        }
    }
}

pub(crate) fn lookup_segment<'a>(value: &'a Value, segment: &PathSegment) -> Option<&'a Value> {
    match (value, segment) {
        (Value::Object(map), PathSegment::Key(key)) => map.get(key),
        (Value::Array(items), PathSegment::Index(index)) => items.get(*index),
        _ => None,
    }
}

pub(crate) fn lookup_segment_mut<'a>(
    value: &'a mut Value,
    segment: &PathSegment,
) -> Option<&'a mut Value> {
    match (value, segment) {
        (Value::Object(map), PathSegment::Key(key)) => map.get_mut(key),
        (Value::Array(items), PathSegment::Index(index)) => items.get_mut(*index),
        _ => None,
    }
}
