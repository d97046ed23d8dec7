// SPDX-FileCopyrightText: 2026 Tocsin Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tokenizer for rule expressions.

use crate::error::ExpressionError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Int(i64),
    Str(String),
    Ident(String),
    True,
    False,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Dot,
    Hash,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,
    Eof,
}

/// A token and the byte range it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub len: usize,
}

impl Token {
    pub fn span(&self) -> (usize, usize) {
        (self.start, self.len)
    }
}

/// Split `src` into tokens, ending with [`TokenKind::Eof`].
pub fn tokenize(src: &str) -> Result<Vec<Token>, ExpressionError> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }
        let start = pos;

        let kind = match c {
            b'(' => single(&mut pos, TokenKind::LParen),
            b')' => single(&mut pos, TokenKind::RParen),
            b'[' => single(&mut pos, TokenKind::LBracket),
            b']' => single(&mut pos, TokenKind::RBracket),
            b'{' => single(&mut pos, TokenKind::LBrace),
            b'}' => single(&mut pos, TokenKind::RBrace),
            b',' => single(&mut pos, TokenKind::Comma),
            b'.' => single(&mut pos, TokenKind::Dot),
            b'#' => single(&mut pos, TokenKind::Hash),
            b'+' => single(&mut pos, TokenKind::Plus),
            b'-' => single(&mut pos, TokenKind::Minus),
            b'*' => single(&mut pos, TokenKind::Star),
            b'/' => single(&mut pos, TokenKind::Slash),
            b'%' => single(&mut pos, TokenKind::Percent),
            b'=' if peek(bytes, pos + 1) == Some(b'=') => double(&mut pos, TokenKind::EqEq),
            b'!' if peek(bytes, pos + 1) == Some(b'=') => double(&mut pos, TokenKind::NotEq),
            b'!' => single(&mut pos, TokenKind::Not),
            b'<' if peek(bytes, pos + 1) == Some(b'=') => double(&mut pos, TokenKind::Le),
            b'<' => single(&mut pos, TokenKind::Lt),
            b'>' if peek(bytes, pos + 1) == Some(b'=') => double(&mut pos, TokenKind::Ge),
            b'>' => single(&mut pos, TokenKind::Gt),
            b'&' if peek(bytes, pos + 1) == Some(b'&') => double(&mut pos, TokenKind::And),
            b'|' if peek(bytes, pos + 1) == Some(b'|') => double(&mut pos, TokenKind::Or),
            b'"' | b'\'' => lex_string(src, &mut pos)?,
            b'0'..=b'9' => lex_int(src, &mut pos)?,
            c if c.is_ascii_alphabetic() || c == b'_' => lex_word(src, &mut pos),
            _ => {
                let ch = src[pos..].chars().next().unwrap_or('?');
                return Err(ExpressionError::syntax(
                    format!("unexpected character `{ch}`"),
                    (pos, ch.len_utf8()),
                ));
            }
        };
        tokens.push(Token {
            kind,
            start,
            len: pos - start,
        });
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        start: src.len(),
        len: 0,
    });
    Ok(tokens)
}

fn peek(bytes: &[u8], at: usize) -> Option<u8> {
    bytes.get(at).copied()
}

fn single(pos: &mut usize, kind: TokenKind) -> TokenKind {
    *pos += 1;
    kind
}

fn double(pos: &mut usize, kind: TokenKind) -> TokenKind {
    *pos += 2;
    kind
}

fn lex_int(src: &str, pos: &mut usize) -> Result<TokenKind, ExpressionError> {
    let start = *pos;
    let end = src[start..]
        .find(|c: char| !c.is_ascii_digit())
        .map_or(src.len(), |off| start + off);
    *pos = end;
    src[start..end]
        .parse::<i64>()
        .map(TokenKind::Int)
        .map_err(|_| ExpressionError::syntax("integer literal out of range", (start, end - start)))
}

fn lex_word(src: &str, pos: &mut usize) -> TokenKind {
    let start = *pos;
    let end = src[start..]
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .map_or(src.len(), |off| start + off);
    *pos = end;
    match &src[start..end] {
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "not" => TokenKind::Not,
        word => TokenKind::Ident(word.to_string()),
    }
}

fn lex_string(src: &str, pos: &mut usize) -> Result<TokenKind, ExpressionError> {
    let start = *pos;
    let mut chars = src[start..].char_indices();
    let Some((_, quote)) = chars.next() else {
        return Err(ExpressionError::syntax("expected string", (start, 0)));
    };

    let mut out = String::new();
    while let Some((off, ch)) = chars.next() {
        match ch {
            c if c == quote => {
                *pos = start + off + c.len_utf8();
                return Ok(TokenKind::Str(out));
            }
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, c @ ('\\' | '"' | '\''))) => out.push(c),
                Some((esc_off, c)) => {
                    return Err(ExpressionError::syntax(
                        format!("unknown escape `\\{c}`"),
                        (start + esc_off - 1, c.len_utf8() + 1),
                    ));
                }
                None => break,
            },
            c => out.push(c),
        }
    }
    Err(ExpressionError::syntax(
        "unterminated string literal",
        (start, src.len() - start),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_calls_and_operators() {
        use TokenKind::*;
        assert_eq!(
            kinds("len(last(3, UseCode(Error))) >= 2 && !x"),
            vec![
                Ident("len".into()),
                LParen,
                Ident("last".into()),
                LParen,
                Int(3),
                Comma,
                Ident("UseCode".into()),
                LParen,
                Ident("Error".into()),
                RParen,
                RParen,
                RParen,
                Ge,
                Int(2),
                And,
                Not,
                Ident("x".into()),
                Eof,
            ]
        );
    }

    #[test]
    fn word_operators_and_predicates() {
        use TokenKind::*;
        assert_eq!(
            kinds("all(xs, {#.Code == Ok}) and not false"),
            vec![
                Ident("all".into()),
                LParen,
                Ident("xs".into()),
                Comma,
                LBrace,
                Hash,
                Dot,
                Ident("Code".into()),
                EqEq,
                Ident("Ok".into()),
                RBrace,
                RParen,
                And,
                Not,
                False,
                Eof,
            ]
        );
    }

    #[test]
    fn strings_with_escapes() {
        assert_eq!(
            kinds(r#"'2024-01-01T00:00:00Z' "a\"b""#),
            vec![
                TokenKind::Str("2024-01-01T00:00:00Z".into()),
                TokenKind::Str("a\"b".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unterminated_string_is_syntax_error() {
        let err = tokenize("UseTimeFrom('2024").unwrap_err();
        assert!(matches!(err, ExpressionError::Syntax { .. }));
    }

    #[test]
    fn stray_character_reports_position() {
        match tokenize("1 @ 2").unwrap_err() {
            ExpressionError::Syntax { span, .. } => assert_eq!(span.offset(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn single_ampersand_is_rejected() {
        assert!(tokenize("a & b").is_err());
    }
}
