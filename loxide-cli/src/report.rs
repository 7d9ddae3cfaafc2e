use ariadne::{Color, Label, Report, ReportKind, Source};
use loxide::{LoxError, Span};
use std::io::Write;

/// 1-based line of the span's end; tokens report the line they end on.
fn line_for(source: &str, span: &Span) -> usize {
    source[..span.end.min(source.len())].matches('\n').count() + 1
}

/// Converts a byte span to a character span for ariadne
fn byte_to_char_span(source: &str, byte_span: &Span) -> Span {
    let start = source[..byte_span.start.min(source.len())].chars().count();
    let end = source[..byte_span.end.min(source.len())].chars().count();
    start..end
}

/// Renders a LoxError as a span-labelled ariadne report
pub fn report_error<W: Write>(
    error: &LoxError,
    source: &str,
    filename: Option<&str>,
    mut writer: W,
) {
    let span = match error {
        LoxError::Scan { span, .. }
        | LoxError::Parse { span, .. }
        | LoxError::Resolution { span, .. }
        | LoxError::Runtime { span, .. } => span,
        LoxError::Io(_) => {
            writeln!(writer, "{}", error).ok();
            return;
        }
        // Internal control flow, never shown to users
        LoxError::Return(_) | LoxError::ScriptFailed => return,
    };
    let message = match error {
        LoxError::Scan { message, .. }
        | LoxError::Parse { message, .. }
        | LoxError::Resolution { message, .. }
        | LoxError::Runtime { message, .. } => message,
        _ => unreachable!(),
    };

    let name = filename.unwrap_or("");
    let src = (name, Source::from(source));
    let char_span = byte_to_char_span(source, span);

    Report::build(ReportKind::Error, (name, char_span.clone()))
        .with_message(format!("{} on line {}", error, line_for(source, span)))
        .with_label(
            Label::new((name, char_span))
                .with_message(message)
                .with_color(Color::Red),
        )
        .finish()
        .write(src, &mut writer)
        .ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_for_counts_newlines_before_span_end() {
        let source = "print 1;\nprint 2;\nprint 3;";
        assert_eq!(line_for(source, &(0..8)), 1);
        assert_eq!(line_for(source, &(9..17)), 2);
        assert_eq!(line_for(source, &(18..26)), 3);
    }

    #[test]
    fn line_for_multiline_token_reports_end_line() {
        let source = "\"line one\nline two\"";
        assert_eq!(line_for(source, &(0..source.len())), 2);
    }

    #[test]
    fn line_for_clamps_past_the_end() {
        assert_eq!(line_for("x", &(0..100)), 1);
    }

    #[test]
    fn byte_to_char_span_ascii_unchanged() {
        let source = "hello world";
        assert_eq!(byte_to_char_span(source, &(0..5)), 0..5);
        assert_eq!(byte_to_char_span(source, &(6..11)), 6..11);
    }

    #[test]
    fn byte_to_char_span_converts_multibyte() {
        // 'é' is two bytes, one char
        let source = "aé b";
        assert_eq!(byte_to_char_span(source, &(0..3)), 0..2);
        assert_eq!(byte_to_char_span(source, &(4..5)), 3..4);
    }

    fn strip_ansi(s: &str) -> String {
        let mut result = String::new();
        let mut in_escape = false;
        for c in s.chars() {
            if c == '\x1b' {
                in_escape = true;
            } else if in_escape {
                if c == 'm' {
                    in_escape = false;
                }
            } else {
                result.push(c);
            }
        }
        result
    }

    #[test]
    fn scan_error_report_names_the_stratum_and_line() {
        let error = LoxError::Scan {
            message: "Unexpected character '@'.".to_string(),
            span: 10..11,
        };
        let source = "print 1;\n@ print 2;";
        let mut output = Vec::new();
        report_error(&error, source, None, &mut output);
        let rendered = strip_ansi(&String::from_utf8(output).unwrap());
        assert!(rendered.contains("lexical error on line 2"));
        assert!(rendered.contains("Unexpected character '@'."));
    }

    #[test]
    fn runtime_error_report_shows_the_offending_span() {
        let error = LoxError::Runtime {
            message: "operands must be numbers".to_string(),
            span: 8..9,
        };
        let source = "print 1 + \"two\";";
        let mut output = Vec::new();
        report_error(&error, source, None, &mut output);
        let rendered = strip_ansi(&String::from_utf8(output).unwrap());
        assert!(rendered.contains("runtime error on line 1"));
        assert!(rendered.contains("operands must be numbers"));
    }

    #[test]
    fn file_reports_include_the_filename() {
        let error = LoxError::Parse {
            message: "Expect ';' after value.".to_string(),
            span: 7..8,
        };
        let mut output = Vec::new();
        report_error(&error, "print 1", Some("script.lox"), &mut output);
        let rendered = strip_ansi(&String::from_utf8(output).unwrap());
        assert!(rendered.contains("script.lox"));
    }

    #[test]
    fn io_error_prints_plainly() {
        let error: LoxError =
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file").into();
        let mut output = Vec::new();
        report_error(&error, "", None, &mut output);
        let rendered = String::from_utf8(output).unwrap();
        assert!(rendered.contains("could not read script"));
    }

    #[test]
    fn control_flow_variants_render_nothing() {
        use loxide::{Literal, Value};
        let mut output = Vec::new();
        report_error(
            &LoxError::Return(Value::Literal(Literal::Nil)),
            "",
            None,
            &mut output,
        );
        report_error(&LoxError::ScriptFailed, "", None, &mut output);
        assert!(output.is_empty());
    }
}
