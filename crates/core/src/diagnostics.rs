//! The one diagnostic format every pipeline stage prints through:
//!
//! ```text
//! error: <path> (line N): <message>
//!     <source line>
//!     <offset>↑
//! ```
//!
//! Tabs in the source line are copied into the marker line verbatim (and
//! every other column is rendered as a space) so the caret lines up under
//! the offending column regardless of the terminal's tab width.

use crate::translation_unit::TranslationUnit;

/// `column` is 1-indexed, matching `Token`'s column field.
pub fn format_diagnostic(tu: &TranslationUnit, line: usize, column: usize, message: &str) -> String {
    let source_line = tu.line(line);
    let offset = offset_string(source_line, column.saturating_sub(1));
    format!("error: {} (line {line}): {message}\n\t{source_line}\n\t{offset}\u{2191}", tu.path())
}

fn offset_string(line: &str, offset: usize) -> String {
    line.chars()
        .take(offset)
        .map(|c| if c == '\t' { '\t' } else { ' ' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligns_caret_under_offending_column() {
        let tu = TranslationUnit::new("main.cu", "let x = ;");
        let rendered = format_diagnostic(&tu, 1, 9, "Expect expression");
        assert!(rendered.starts_with("error: main.cu (line 1): Expect expression\n"));
        assert!(rendered.contains("let x = ;"));
        assert!(rendered.ends_with('\u{2191}'));
    }

    #[test]
    fn preserves_tabs_in_marker_line() {
        let tu = TranslationUnit::new("main.cu", "\tlet x = ;");
        let rendered = format_diagnostic(&tu, 1, 10, "Expect expression");
        let marker_line = rendered.lines().nth(2).unwrap();
        assert!(marker_line.starts_with("\t\t"));
    }
}
