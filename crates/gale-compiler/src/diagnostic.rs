//! Diagnostic rendering
//!
//! Turns a [`CompileError`] into a source-annotated report.

use codespan_reporting::diagnostic::{Diagnostic, Label};
use codespan_reporting::files::SimpleFile;
use codespan_reporting::term;
use termcolor::Buffer;

use crate::ast::Pos;
use crate::error::{CompileError, ErrorKind};

/// Error code for a compile error
pub fn error_code(error: &CompileError) -> &'static str {
    match error {
        CompileError::IdentifierNotFound { .. } => "C1001",
        CompileError::UnresolvedType { .. } => "C1002",
        CompileError::MissingBase { .. } => "C1003",
        CompileError::Dependency { .. } => "C1004",
        CompileError::CyclicInheritance { .. } => "C2001",
        CompileError::ShadowsNativeClass { .. } => "C2002",
        CompileError::MalformedCallee { .. } => "C2003",
        CompileError::Internal { .. } => "C9000",
    }
}

/// Build a codespan diagnostic for an error located in `source`
pub fn to_diagnostic(error: &CompileError, source: &str) -> Diagnostic<()> {
    let label_message = match error.kind() {
        ErrorKind::Resolution => "could not be resolved",
        ErrorKind::Structural => "invalid here",
        ErrorKind::Internal => "unexpected node",
    };
    let mut diagnostic = Diagnostic::error()
        .with_message(error.to_string())
        .with_code(error_code(error));
    if let Some(range) = byte_range(source, error.pos()) {
        diagnostic = diagnostic.with_labels(vec![Label::primary((), range).with_message(label_message)]);
    }
    if error.kind() == ErrorKind::Internal {
        diagnostic = diagnostic.with_notes(vec!["the analyzed tree violates the compiler input contract".to_string()]);
    }
    diagnostic
}

/// Render an error as plain text
pub fn render(error: &CompileError, file_name: &str, source: &str) -> String {
    let file = SimpleFile::new(file_name, source);
    let diagnostic = to_diagnostic(error, source);
    let mut buffer = Buffer::no_color();
    let config = term::Config::default();
    if term::emit(&mut buffer, &config, &file, &diagnostic).is_err() {
        return format!("{}:{}: error: {}", file_name, error.pos(), error);
    }
    String::from_utf8_lossy(buffer.as_slice()).into_owned()
}

/// Byte range of the token starting at `pos` (to the end of the word)
fn byte_range(source: &str, pos: Pos) -> Option<std::ops::Range<usize>> {
    if pos.line == 0 {
        return None;
    }
    let line_start = source
        .split_inclusive('\n')
        .take(pos.line as usize - 1)
        .map(str::len)
        .sum::<usize>();
    let line = source[line_start..].lines().next()?;
    let column = (pos.column.max(1) as usize - 1).min(line.len());
    let rest = &line[column..];
    let width = rest
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(rest.len())
        .max(1)
        .min(rest.len().max(1));
    let start = line_start + column;
    Some(start..(start + width).min(source.len()))
}
