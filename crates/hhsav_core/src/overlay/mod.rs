//! Paints a diagnostic onto an [`EditorSurface`] and keeps focus on the
//! offending line until the problem is resolved or dismissed.

pub mod placement;
pub mod surface;

use serde::Serialize;
use tracing::trace;

use crate::diagnostics::{BufferScan, Diagnostic, DiagnosticAction};
pub use placement::{MarkerSpan, POPOVER_SIZE, caret_target, marker_span, popover_position};
pub use surface::{EditorSurface, MemorySurface, Popover, Rect, TextPos};

pub const TAG_ERROR: &str = "json_error";
pub const TAG_ERROR_LINE: &str = "json_error_line";
pub const TAG_ERROR_SUBTLE: &str = "json_error_subtle";
pub const TAG_ERROR_PIN: &str = "json_error_pin";

const ALL_TAGS: [&str; 4] = [TAG_ERROR, TAG_ERROR_LINE, TAG_ERROR_SUBTLE, TAG_ERROR_PIN];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    /// Explicit apply: the caret always jumps to the marker.
    Apply,
    /// Validation while typing: a caret already on the error line stays put.
    Live,
}

/// What the popover shows and where it is pinned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverlayState {
    pub title: String,
    pub message: String,
    pub actions: Vec<DiagnosticAction>,
    pub anchor_line: usize,
    pub visible: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusEvent {
    /// Keyboard caret movement to a position.
    Navigate(TextPos),
    Click(TextPos),
    /// A character typed or deleted at a position.
    Edit(TextPos),
    PopoverClick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusOutcome {
    Allowed,
    Consumed,
}

#[derive(Debug, Clone)]
struct ActiveHighlight {
    diagnostic: Diagnostic,
    marker: MarkerSpan,
    caret: TextPos,
}

#[derive(Debug, Default)]
pub struct HighlightController {
    active: Option<ActiveHighlight>,
    overlay: Option<OverlayState>,
}

impl HighlightController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_diagnostic(&self) -> Option<&Diagnostic> {
        self.active.as_ref().map(|a| &a.diagnostic)
    }

    pub fn overlay(&self) -> Option<&OverlayState> {
        self.overlay.as_ref()
    }

    /// Line the caret is held on while a highlight is active.
    pub fn anchor_line(&self) -> Option<usize> {
        self.active.as_ref().map(|a| a.marker.line())
    }

    pub fn apply(&mut self, diagnostic: &Diagnostic, surface: &mut dyn EditorSurface, mode: ApplyMode) {
        clear_tags(surface);

        let text = surface.text_buffer();
        let scan = BufferScan::new(&text);
        let marker = marker_span(&scan, diagnostic);
        let line = marker.line();

        surface.tag_range(
            TAG_ERROR_LINE,
            TextPos::new(line, 0),
            TextPos::new(line, scan.line_len(line)),
        );
        surface.tag_range(TAG_ERROR, marker.start, marker.end);
        if let Some((start, end)) = marker.subtle {
            surface.tag_range(TAG_ERROR_SUBTLE, start, end);
        }
        surface.tag_range(TAG_ERROR_PIN, marker.start, marker.start);

        let target = caret_target(diagnostic, &marker);
        let keep_caret = mode == ApplyMode::Live && surface.caret().line == line;
        let caret = if keep_caret { surface.caret() } else { target };
        surface.set_caret(caret);

        let position = popover_position(surface.widget_size(), surface.line_bbox(line), POPOVER_SIZE);
        let overlay = OverlayState {
            title: diagnostic.header.clone(),
            message: popover_message(diagnostic),
            actions: diagnostic.actions.clone(),
            anchor_line: line,
            visible: true,
        };
        surface.show_popover(Popover {
            title: overlay.title.clone(),
            message: overlay.message.clone(),
            actions: overlay.actions.clone(),
            anchor_line: line,
            position,
        });
        trace!(note = diagnostic.note.as_str(), line, col = caret.col, "highlight applied");

        self.overlay = Some(overlay);
        self.active = Some(ActiveHighlight {
            diagnostic: diagnostic.clone(),
            marker,
            caret,
        });
    }

    pub fn clear(&mut self, surface: &mut dyn EditorSurface) {
        clear_tags(surface);
        surface.dismiss_popover();
        self.active = None;
        self.overlay = None;
    }

    /// Keeps the caret on the error line. Off-line navigation and edits are
    /// consumed and the caret is put back; a click on the popover dismisses it.
    pub fn enforce_focus(&mut self, event: FocusEvent, surface: &mut dyn EditorSurface) -> FocusOutcome {
        let Some(active) = self.active.as_mut() else {
            return FocusOutcome::Allowed;
        };
        let line = active.marker.line();
        match event {
            FocusEvent::PopoverClick => {
                surface.dismiss_popover();
                if let Some(overlay) = self.overlay.as_mut() {
                    overlay.visible = false;
                }
                FocusOutcome::Consumed
            }
            FocusEvent::Navigate(pos) | FocusEvent::Click(pos) | FocusEvent::Edit(pos) => {
                if pos.line == line {
                    active.caret = pos;
                    FocusOutcome::Allowed
                } else {
                    surface.set_caret(active.caret);
                    FocusOutcome::Consumed
                }
            }
        }
    }
}

fn clear_tags(surface: &mut dyn EditorSurface) {
    for tag in ALL_TAGS {
        surface.clear_tag(tag);
    }
}

fn popover_message(diagnostic: &Diagnostic) -> String {
    if diagnostic.after.is_empty() || diagnostic.after == diagnostic.before {
        format!("Before: {}", diagnostic.before)
    } else {
        format!("Before: {}\nAfter:  {}", diagnostic.before, diagnostic.after)
    }
}
