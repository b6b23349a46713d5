//! Shared error utilities used across the compilation pipeline.
//!
//! Diagnostics follow the chibicc layout: the offending source line prefixed
//! with `file:line:`, followed by a caret under the offending byte.

use std::path::PathBuf;

use snafu::Snafu;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CompileError {
  #[snafu(display("{expr_line}\n{marker} {message}"))]
  WithLocation {
    expr_line: String,
    marker: String,
    message: String,
  },

  #[snafu(display("cannot open {}: {source}", path.display()))]
  ReadSource {
    path: PathBuf,
    source: std::io::Error,
  },

  #[snafu(display("cannot write {}: {source}", path.display()))]
  WriteOutput {
    path: PathBuf,
    source: std::io::Error,
  },
}

/// The input being compiled: a display name and its full text.
#[derive(Debug, Clone, Copy)]
pub struct SourceFile<'a> {
  pub name: &'a str,
  pub text: &'a str,
}

impl<'a> SourceFile<'a> {
  pub fn new(name: &'a str, text: &'a str) -> Self {
    Self { name, text }
  }
}

impl CompileError {
  /// Construct an error anchored at a specific byte offset in the source.
  pub fn at(file: SourceFile<'_>, loc: usize, message: impl Into<String>) -> Self {
    let text = file.text;
    let mut loc = loc.min(text.len());
    while !text.is_char_boundary(loc) {
      loc -= 1;
    }

    let line_start = text[..loc].rfind('\n').map_or(0, |pos| pos + 1);
    let line_end = text[loc..].find('\n').map_or(text.len(), |pos| loc + pos);
    let line_no = text[..line_start].matches('\n').count() + 1;

    let prefix = format!("{}:{line_no}: ", file.name);
    let expr_line = format!("{prefix}{}", &text[line_start..line_end]);
    let column = prefix.chars().count() + text[line_start..loc].chars().count();
    let marker = format!("{}^", " ".repeat(column));
    Self::WithLocation {
      expr_line,
      marker,
      message: message.into(),
    }
  }

  /// The bare diagnostic text, without the source excerpt.
  pub fn message(&self) -> String {
    match self {
      Self::WithLocation { message, .. } => message.clone(),
      other => other.to_string(),
    }
  }
}
