//! Errors for reading layout input

use ariadne::{Color, Label, Report, ReportKind, Source};
use serde_json::Value;
use thiserror::Error;

/// Character range in source text
pub type Span = std::ops::Range<usize>;

#[derive(Error, Debug)]
pub enum InputError {
    #[error("invalid JSON at line {line}, column {column}: {message}")]
    Json {
        line: usize,
        column: usize,
        span: Span,
        message: String,
    },
}

impl InputError {
    /// Format the error with source context using ariadne
    pub fn format(&self, source: &str, filename: &str) -> String {
        let mut buf = Vec::new();
        match self {
            InputError::Json { span, message, .. } => {
                let written = Report::build(ReportKind::Error, filename, span.start)
                    .with_message("invalid layout JSON")
                    .with_label(
                        Label::new((filename, span.clone()))
                            .with_message(message)
                            .with_color(Color::Red),
                    )
                    .finish()
                    .write((filename, Source::from(source)), &mut buf);
                if written.is_err() {
                    return self.to_string();
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }
}

/// Parse JSON text, keeping enough position information for a diagnostic
pub fn parse_json(source: &str) -> Result<Value, InputError> {
    serde_json::from_str(source).map_err(|e| {
        let (line, column) = (e.line(), e.column());
        let start = char_offset(source, line, column);
        let end = (start + 1).min(source.chars().count()).max(start);
        InputError::Json {
            line,
            column,
            span: start..end,
            message: e.to_string(),
        }
    })
}

/// Char offset of a 1-based line/column pair, clamped to the source
fn char_offset(source: &str, line: usize, column: usize) -> usize {
    let mut offset = 0;
    for (i, text) in source.split_inclusive('\n').enumerate() {
        if i + 1 == line {
            let len = text.chars().count();
            return offset + column.saturating_sub(1).min(len);
        }
        offset += text.chars().count();
    }
    offset
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_ok() {
        let value = parse_json(r#"{ "existing_widget": 3 }"#).unwrap();
        assert_eq!(value["existing_widget"], 3);
    }

    #[test]
    fn test_error_position() {
        let source = "{\n  \"split\": \"vertical\",\n  \"ratio\": ,\n}";
        let err = parse_json(source).unwrap_err();
        let InputError::Json { line, span, .. } = &err;
        assert_eq!(*line, 3);
        // Offset lands inside the third line
        let third_line_start = "{\n  \"split\": \"vertical\",\n".chars().count();
        assert!(span.start >= third_line_start);
    }

    #[test]
    fn test_format_mentions_file() {
        let source = "{ \"leaf\": }";
        let err = parse_json(source).unwrap_err();
        let report = err.format(source, "layout.json");
        assert!(report.contains("layout.json"));
    }

    #[test]
    fn test_char_offset_clamps() {
        assert_eq!(char_offset("ab\ncd", 2, 1), 3);
        assert_eq!(char_offset("ab\ncd", 2, 99), 5);
        assert_eq!(char_offset("ab", 7, 1), 2);
    }
}
