//! Where the error marker, caret and popover go for a diagnostic.

use super::surface::{Rect, TextPos};
use crate::diagnostics::{BufferScan, Diagnostic, Note};

/// Tagged positions for one diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerSpan {
    pub start: TextPos,
    pub end: TextPos,
    /// One-character cue painted before an insertion point.
    pub subtle: Option<(TextPos, TextPos)>,
}

impl MarkerSpan {
    pub fn line(&self) -> usize {
        self.start.line
    }
}

pub const POPOVER_SIZE: (i32, i32) = (340, 110);
const POPOVER_GAP: i32 = 6;

pub fn marker_span(scan: &BufferScan<'_>, diagnostic: &Diagnostic) -> MarkerSpan {
    let line = diagnostic.line;
    if !diagnostic.insertion_only() {
        return MarkerSpan {
            start: TextPos::new(line, diagnostic.start_col),
            end: TextPos::new(line, diagnostic.end_col),
            subtle: None,
        };
    }

    if diagnostic.note.is_eof_insertion() {
        let last = scan.last_non_empty_line().unwrap_or(line);
        let len = scan.line_len(last);
        return MarkerSpan {
            start: TextPos::new(last, len.saturating_sub(1)),
            end: TextPos::new(last, len),
            subtle: None,
        };
    }

    let point = if diagnostic.note == Note::MissingKeyOpenQuote {
        TextPos::new(line, scan.indent_of(line))
    } else if diagnostic.start_col == 0 && scan.is_blank(line) {
        match scan.previous_non_empty_line(line) {
            Some(prev) => TextPos::new(prev, scan.line_len(prev)),
            None => TextPos::new(line, 0),
        }
    } else {
        TextPos::new(line, diagnostic.start_col)
    };

    MarkerSpan {
        start: point,
        end: point,
        subtle: subtle_marker(scan, point),
    }
}

fn subtle_marker(scan: &BufferScan<'_>, point: TextPos) -> Option<(TextPos, TextPos)> {
    let mut col = point.col.checked_sub(1)?;
    if scan.char_at(point.line, col) == Some(',') {
        col = col.checked_sub(1)?;
    }
    Some((
        TextPos::new(point.line, col),
        TextPos::new(point.line, col + 1),
    ))
}

/// Range spans put the caret after the span (before it for comma notes);
/// insertions put it at the insertion point.
pub fn caret_target(diagnostic: &Diagnostic, marker: &MarkerSpan) -> TextPos {
    if marker.start == marker.end || diagnostic.note.is_eof_insertion() {
        return marker.end;
    }
    if diagnostic.note.caret_before_span() {
        marker.start
    } else {
        marker.end
    }
}

/// Below the line, else right of it, else the nearest visible corner.
pub fn popover_position(widget: (i32, i32), line: Option<Rect>, size: (i32, i32)) -> (i32, i32) {
    let (width, height) = widget;
    let (pw, ph) = size;
    let max_x = (width - pw).max(0);
    let max_y = (height - ph).max(0);
    let Some(bbox) = line else {
        return (0, 0);
    };

    let below = (bbox.x.clamp(0, max_x), bbox.y + bbox.height + POPOVER_GAP);
    if below.1 + ph <= height {
        return below;
    }
    let right = (bbox.x + bbox.width + POPOVER_GAP, bbox.y);
    if right.0 + pw <= width && right.1 >= 0 && right.1 + ph <= height {
        return right;
    }

    let center = (bbox.x + bbox.width / 2, bbox.y + bbox.height / 2);
    let corners = [(0, 0), (max_x, 0), (0, max_y), (max_x, max_y)];
    corners
        .into_iter()
        .min_by_key(|(x, y)| {
            let dx = i64::from(x + pw / 2 - center.0);
            let dy = i64::from(y + ph / 2 - center.1);
            dx * dx + dy * dy
        })
        .unwrap_or((0, 0))
}

#[cfg(test)]
mod tests {
    use super::{POPOVER_SIZE, caret_target, marker_span, popover_position};
    use crate::diagnostics::{BufferScan, Diagnostic, Note};
    use crate::overlay::surface::{Rect, TextPos};

    #[test]
    fn insertion_on_blank_line_moves_to_previous_line_end() {
        let text = "[\n  1,\n  2\n\n}";
        let scan = BufferScan::new(text);
        let diag = Diagnostic::insertion(Note::MissingListClose, "h", 4, "", 0, "]");
        let marker = marker_span(&scan, &diag);
        assert_eq!(marker.start, TextPos::new(3, 3));
        assert_eq!(marker.subtle, Some((TextPos::new(3, 2), TextPos::new(3, 3))));
    }

    #[test]
    fn subtle_marker_skips_a_comma() {
        let text = "  \"url\": \"x,";
        let scan = BufferScan::new(text);
        let diag = Diagnostic::insertion(Note::MissingValueCloseQuote, "h", 1, text, 12, "");
        let marker = marker_span(&scan, &diag);
        assert_eq!(marker.subtle, Some((TextPos::new(1, 10), TextPos::new(1, 11))));
        assert_eq!(caret_target(&diag, &marker), TextPos::new(1, 12));
    }

    #[test]
    fn key_open_quote_marks_first_non_blank() {
        let text = "{\n    name\": 1\n}";
        let scan = BufferScan::new(text);
        let diag = Diagnostic::insertion(Note::MissingKeyOpenQuote, "h", 2, "    name\": 1", 0, "");
        let marker = marker_span(&scan, &diag);
        assert_eq!(marker.start, TextPos::new(2, 4));
    }

    #[test]
    fn eof_insertion_tags_last_character() {
        let text = "{\n  \"a\": 1\n\n";
        let scan = BufferScan::new(text);
        let diag = Diagnostic::insertion(Note::MissingObjectCloseEof, "h", 2, "  \"a\": 1", 8, "");
        let marker = marker_span(&scan, &diag);
        assert_eq!((marker.start, marker.end), (TextPos::new(2, 7), TextPos::new(2, 8)));
        assert_eq!(marker.subtle, None);
    }

    #[test]
    fn comma_notes_keep_caret_before_span() {
        let text = "[1, 2,]";
        let scan = BufferScan::new(text);
        let diag = Diagnostic::new(Note::SymbolCommaBeforeCloser, "h", 1, text, 5, 6, "[1, 2]");
        let marker = marker_span(&scan, &diag);
        assert_eq!(caret_target(&diag, &marker), TextPos::new(1, 5));
        let diag = Diagnostic::new(Note::LiteralTypo, "h", 1, text, 1, 2, "");
        assert_eq!(caret_target(&diag, &marker_span(&scan, &diag)), TextPos::new(1, 2));
    }

    #[test]
    fn popover_prefers_below_then_right_then_corner() {
        let line = Rect {
            x: 0,
            y: 20,
            width: 100,
            height: 18,
        };
        assert_eq!(popover_position((800, 600), Some(line), POPOVER_SIZE), (0, 44));

        let low = Rect { y: 480, ..line };
        assert_eq!(popover_position((800, 600), Some(low), POPOVER_SIZE), (106, 480));

        let wide = Rect { width: 700, ..low };
        assert_eq!(popover_position((800, 600), Some(wide), POPOVER_SIZE), (0, 490));

        let bottom = Rect { y: 560, ..line };
        assert_eq!(popover_position((800, 600), Some(bottom), POPOVER_SIZE), (0, 490));
        assert_eq!(popover_position((800, 600), None, POPOVER_SIZE), (0, 0));
    }
}
