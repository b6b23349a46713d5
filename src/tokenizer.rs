//! Lexical analysis: turns the raw input string into a vector of tokens.
//!
//! Multi-character punctuators are matched before single-character ones to
//! avoid ambiguity. Keywords are scanned as identifiers and reclassified once
//! the whole input has been split.

use log::trace;

use crate::error::{CompileError, CompileResult, SourceFile};
use crate::ty::{Type, array_of};

const KEYWORDS: [&str; 8] = ["return", "if", "else", "for", "int", "char", "var", "func"];

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  Punctuator,
  Ident,
  Keyword,
  Num,
  Str,
  Eof,
}

/// Thin wrapper for lexical information needed by later stages.
#[derive(Debug, Clone)]
pub struct Token {
  pub kind: TokenKind,
  pub value: Option<i64>,
  pub loc: usize,
  pub len: usize,
  /// Decoded bytes of a string literal, terminating NUL included.
  pub str_data: Option<Vec<u8>>,
  pub ty: Option<Type>,
}

impl Token {
  /// Convenience constructor to keep the `tokenize` loop readable.
  pub fn new(kind: TokenKind, loc: usize, len: usize, value: Option<i64>) -> Self {
    Self {
      kind,
      value,
      loc,
      len,
      str_data: None,
      ty: None,
    }
  }

  fn string(loc: usize, len: usize, data: Vec<u8>) -> Self {
    let ty = array_of(Type::char(), data.len() as i64);
    Self {
      str_data: Some(data),
      ty: Some(ty),
      ..Self::new(TokenKind::Str, loc, len, None)
    }
  }
}

fn is_ident1(c: u8) -> bool {
  c.is_ascii_alphabetic() || c == b'_'
}

fn is_ident2(c: u8) -> bool {
  is_ident1(c) || c.is_ascii_digit()
}

/// Lex the input into a flat vector of tokens terminated by an `Eof` marker.
pub fn tokenize(file: SourceFile<'_>) -> CompileResult<Vec<Token>> {
  let input = file.text;
  let mut tokens = Vec::new();
  let bytes = input.as_bytes();
  let mut i = 0;

  while i < bytes.len() {
    let c = bytes[i];
    if c.is_ascii_whitespace() {
      i += 1;
      continue;
    }

    if input[i..].starts_with("//") {
      i = input[i..].find('\n').map_or(bytes.len(), |end| i + end);
      continue;
    }

    if input[i..].starts_with("/*") {
      let Some(end) = input[i + 2..].find("*/") else {
        return Err(CompileError::at(file, i, "unclosed block comment"));
      };
      i += end + 4;
      continue;
    }

    if c.is_ascii_digit() {
      let start = i;
      i += 1;
      while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
      }
      let text = &input[start..i];
      let value = text
        .parse::<i64>()
        .map_err(|err| CompileError::at(file, start, format!("invalid number: {err}")))?;
      tokens.push(Token::new(TokenKind::Num, start, i - start, Some(value)));
      continue;
    }

    if c == b'"' {
      let (token, end) = read_string_literal(file, i)?;
      tokens.push(token);
      i = end;
      continue;
    }

    if is_ident1(c) {
      let start = i;
      i += 1;
      while i < bytes.len() && is_ident2(bytes[i]) {
        i += 1;
      }
      tokens.push(Token::new(TokenKind::Ident, start, i - start, None));
      continue;
    }

    if let Some(op) = ["==", "!=", "<=", ">="]
      .into_iter()
      .find(|op| input[i..].starts_with(op))
    {
      tokens.push(Token::new(TokenKind::Punctuator, i, op.len(), None));
      i += op.len();
      continue;
    }

    if matches!(
      c,
      b'+'
        | b'-'
        | b'*'
        | b'/'
        | b'('
        | b')'
        | b'<'
        | b'>'
        | b';'
        | b'='
        | b'{'
        | b'}'
        | b'&'
        | b','
        | b'['
        | b']'
    ) {
      tokens.push(Token::new(TokenKind::Punctuator, i, 1, None));
      i += 1;
      continue;
    }

    let invalid_char = input[i..].chars().next().unwrap_or('\0');
    return Err(CompileError::at(
      file,
      i,
      format!("invalid token: '{invalid_char}'"),
    ));
  }

  tokens.push(Token::new(TokenKind::Eof, input.len(), 0, None));
  convert_keywords(&mut tokens, input);
  trace!("{}: {} tokens", file.name, tokens.len());
  Ok(tokens)
}

fn convert_keywords(tokens: &mut [Token], source: &str) {
  for token in tokens
    .iter_mut()
    .filter(|token| token.kind == TokenKind::Ident)
  {
    if KEYWORDS.contains(&token_text(token, source)) {
      token.kind = TokenKind::Keyword;
    }
  }
}

/// Scan a string literal whose opening quote sits at `start`. Returns the
/// token and the offset just past the closing quote.
fn read_string_literal(file: SourceFile<'_>, start: usize) -> CompileResult<(Token, usize)> {
  let bytes = file.text.as_bytes();
  let mut data = Vec::new();
  let mut i = start + 1;

  loop {
    match bytes.get(i) {
      None | Some(b'\n') => {
        return Err(CompileError::at(file, start, "unclosed string literal"));
      }
      Some(b'"') => break,
      Some(b'\\') => {
        let (byte, width) = read_escaped_char(&bytes[i + 1..]);
        if width == 0 {
          return Err(CompileError::at(file, start, "unclosed string literal"));
        }
        data.push(byte);
        i += 1 + width;
      }
      Some(&byte) => {
        data.push(byte);
        i += 1;
      }
    }
  }

  data.push(0);
  let end = i + 1;
  Ok((Token::string(start, end - start, data), end))
}

/// Decode the escape sequence following a backslash, returning the byte and
/// how many input bytes it consumed.
fn read_escaped_char(rest: &[u8]) -> (u8, usize) {
  let Some(&first) = rest.first() else {
    return (0, 0);
  };

  if (b'0'..=b'7').contains(&first) {
    let mut value: u32 = 0;
    let mut width = 0;
    while width < 3 && rest.get(width).is_some_and(|c| (b'0'..=b'7').contains(c)) {
      value = value * 8 + u32::from(rest[width] - b'0');
      width += 1;
    }
    return (value as u8, width);
  }

  let byte = match first {
    b'a' => 0x07,
    b'b' => 0x08,
    b't' => b'\t',
    b'n' => b'\n',
    b'v' => 0x0b,
    b'f' => 0x0c,
    b'r' => b'\r',
    b'e' => 0x1b,
    other => other,
  };
  (byte, 1)
}

/// Return the slice from the source that produced this token.
pub fn token_text<'a>(token: &Token, source: &'a str) -> &'a str {
  let end = token.loc + token.len;
  &source[token.loc..end]
}

/// Human-friendly description used in diagnostics.
pub fn describe_token(token: Option<&Token>, source: &str) -> String {
  match token {
    Some(t) => match t.kind {
      TokenKind::Eof => "EOF".to_string(),
      _ => token_text(t, source).to_string(),
    },
    None => "EOF".to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  fn lex(text: &str) -> Vec<Token> {
    tokenize(SourceFile::new("test.go", text)).unwrap()
  }

  fn kinds(text: &str) -> Vec<TokenKind> {
    lex(text).iter().map(|t| t.kind).collect()
  }

  #[test]
  fn reclassifies_keywords() {
    use TokenKind::*;
    assert_eq!(
      kinds("func main() int { var x int; return x; }"),
      vec![
        Keyword, Ident, Punctuator, Punctuator, Keyword, Punctuator, Keyword, Ident, Keyword,
        Punctuator, Keyword, Ident, Punctuator, Punctuator, Eof
      ]
    );
    assert_eq!(kinds("returned"), vec![Ident, Eof]);
  }

  #[test]
  fn two_character_punctuators_win() {
    let src = "a<=b==c!=d>=e<f";
    let texts: Vec<_> = lex(src)
      .iter()
      .map(|t| token_text(t, src).to_string())
      .collect();
    assert_eq!(
      texts,
      vec!["a", "<=", "b", "==", "c", "!=", "d", ">=", "e", "<", "f", ""]
    );
  }

  #[test]
  fn numbers_carry_their_value() {
    let tokens = lex("  123 0");
    assert_eq!(tokens[0].value, Some(123));
    assert_eq!(tokens[0].loc, 2);
    assert_eq!(tokens[0].len, 3);
    assert_eq!(tokens[1].value, Some(0));
  }

  #[test]
  fn string_literals_are_decoded_and_typed() {
    let tokens = lex(r#""a\n\"b\101\0""#);
    let token = &tokens[0];
    assert_eq!(token.kind, TokenKind::Str);
    assert_eq!(
      token.str_data.as_deref(),
      Some(&[b'a', b'\n', b'"', b'b', b'A', 0, 0][..])
    );
    let ty = token.ty.as_ref().unwrap();
    assert!(ty.is_array());
    assert_eq!(ty.array_len, 7);
    assert_eq!(token.len, 14);
  }

  #[test]
  fn skips_comments() {
    use TokenKind::*;
    assert_eq!(kinds("1 // two\n/* three */ 4"), vec![Num, Num, Eof]);
  }

  #[test]
  fn rejects_unknown_characters() {
    let err = tokenize(SourceFile::new("test.go", "1 $ 2")).unwrap_err();
    assert_eq!(err.message(), "invalid token: '$'");
  }

  #[test]
  fn rejects_unterminated_strings() {
    let err = tokenize(SourceFile::new("test.go", "\"abc\n\"")).unwrap_err();
    assert_eq!(err.message(), "unclosed string literal");
    let err = tokenize(SourceFile::new("test.go", "/* open")).unwrap_err();
    assert_eq!(err.message(), "unclosed block comment");
  }
}
