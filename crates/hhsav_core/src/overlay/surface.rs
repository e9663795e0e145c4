//! The editing surface the core drives. A real window implements
//! [`EditorSurface`]; [`MemorySurface`] backs tests and the command line.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::diagnostics::DiagnosticAction;
use crate::document::path::{DocPath, TreePath};

/// Buffer position: 1-based line, 0-based character column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TextPos {
    pub line: usize,
    pub col: usize,
}

impl TextPos {
    pub fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }
}

/// Widget-relative pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Popover {
    pub title: String,
    pub message: String,
    pub actions: Vec<DiagnosticAction>,
    pub anchor_line: usize,
    /// Top-left corner inside the text widget.
    pub position: (i32, i32),
}

pub trait EditorSurface {
    fn selected_path(&self) -> TreePath;
    fn set_selected_path(&mut self, path: TreePath);
    fn text_buffer(&self) -> String;
    fn set_text_buffer(&mut self, text: &str);
    fn tag_range(&mut self, name: &str, start: TextPos, end: TextPos);
    fn clear_tag(&mut self, name: &str);
    fn caret(&self) -> TextPos;
    fn set_caret(&mut self, pos: TextPos);
    fn show_popover(&mut self, popover: Popover);
    fn dismiss_popover(&mut self);
    fn set_status(&mut self, status: &str);
    /// Visible widget size in pixels.
    fn widget_size(&self) -> (i32, i32);
    /// Pixel box of a line, or `None` when it is scrolled out of view.
    fn line_bbox(&self, line: usize) -> Option<Rect>;
}

const LINE_HEIGHT: i32 = 18;
const CHAR_WIDTH: i32 = 8;

/// In-memory surface with fixed-pitch geometry.
#[derive(Debug, Clone)]
pub struct MemorySurface {
    selected: TreePath,
    buffer: String,
    tags: BTreeMap<String, Vec<(TextPos, TextPos)>>,
    caret: TextPos,
    popover: Option<Popover>,
    statuses: Vec<String>,
    size: (i32, i32),
    first_visible_line: usize,
}

impl Default for MemorySurface {
    fn default() -> Self {
        Self::new(TreePath::Node(DocPath::root()), "")
    }
}

impl MemorySurface {
    pub fn new(selected: TreePath, buffer: &str) -> Self {
        Self {
            selected,
            buffer: buffer.to_string(),
            tags: BTreeMap::new(),
            caret: TextPos::new(1, 0),
            popover: None,
            statuses: Vec::new(),
            size: (800, 600),
            first_visible_line: 1,
        }
    }

    pub fn with_size(mut self, width: i32, height: i32) -> Self {
        self.size = (width, height);
        self
    }

    pub fn scroll_to(&mut self, first_visible_line: usize) {
        self.first_visible_line = first_visible_line.max(1);
    }

    pub fn tags(&self, name: &str) -> &[(TextPos, TextPos)] {
        self.tags.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn popover(&self) -> Option<&Popover> {
        self.popover.as_ref()
    }

    pub fn status(&self) -> Option<&str> {
        self.statuses.last().map(String::as_str)
    }

    pub fn status_history(&self) -> &[String] {
        &self.statuses
    }
}

impl EditorSurface for MemorySurface {
    fn selected_path(&self) -> TreePath {
        self.selected.clone()
    }

    fn set_selected_path(&mut self, path: TreePath) {
        self.selected = path;
    }

    fn text_buffer(&self) -> String {
        self.buffer.clone()
    }

    fn set_text_buffer(&mut self, text: &str) {
        self.buffer = text.to_string();
    }

    fn tag_range(&mut self, name: &str, start: TextPos, end: TextPos) {
        self.tags
            .entry(name.to_string())
            .or_default()
            .push((start, end));
    }

    fn clear_tag(&mut self, name: &str) {
        self.tags.remove(name);
    }

    fn caret(&self) -> TextPos {
        self.caret
    }

    fn set_caret(&mut self, pos: TextPos) {
        self.caret = pos;
    }

    fn show_popover(&mut self, popover: Popover) {
        self.popover = Some(popover);
    }

    fn dismiss_popover(&mut self) {
        self.popover = None;
    }

    fn set_status(&mut self, status: &str) {
        self.statuses.push(status.to_string());
    }

    fn widget_size(&self) -> (i32, i32) {
        self.size
    }

    fn line_bbox(&self, line: usize) -> Option<Rect> {
        if line < self.first_visible_line {
            return None;
        }
        let row = i32::try_from(line - self.first_visible_line).ok()?;
        let y = row * LINE_HEIGHT;
        if y + LINE_HEIGHT > self.size.1 {
            return None;
        }
        let chars = self.buffer.split('\n').nth(line - 1)?.chars().count();
        let width = i32::try_from(chars).ok()?.saturating_mul(CHAR_WIDTH);
        Some(Rect {
            x: 0,
            y,
            width: width.min(self.size.0),
            height: LINE_HEIGHT,
        })
    }
}
