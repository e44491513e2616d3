//! Lexer for the command-tree DSL.
//!
//! Produces position-tagged tokens lazily, one `next_token` call at a time.
//! A lex failure never aborts the stream: the problem is appended to the
//! diagnostic sink and a [`TokenKind::Recover`] token is returned so the
//! parser can keep collecting errors over the rest of the source.

use std::fmt;
use std::str::CharIndices;

use serde::{Deserialize, Serialize};

use crate::diagnostics::{Diagnostics, Span};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenKind {
    // literals/idents
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    // punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Equals,
    Pipe,
    Dot,
    At,
    /// Stands in for input the lexer could not tokenize. Already reported.
    Recover,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Ident(name) => write!(f, "identifier '{}'", name),
            TokenKind::Str(_) => f.write_str("string"),
            TokenKind::Int(_) | TokenKind::Float(_) => f.write_str("number"),
            TokenKind::LParen => f.write_str("'('"),
            TokenKind::RParen => f.write_str("')'"),
            TokenKind::LBrace => f.write_str("'{'"),
            TokenKind::RBrace => f.write_str("'}'"),
            TokenKind::LBracket => f.write_str("'['"),
            TokenKind::RBracket => f.write_str("']'"),
            TokenKind::Comma => f.write_str("','"),
            TokenKind::Equals => f.write_str("'='"),
            TokenKind::Pipe => f.write_str("'|'"),
            TokenKind::Dot => f.write_str("'.'"),
            TokenKind::At => f.write_str("'@'"),
            TokenKind::Recover => f.write_str("invalid input"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    fn new(kind: TokenKind, start: usize, end: usize) -> Self {
        Self {
            kind,
            span: Span::new(start, end),
        }
    }

    /// True for identifier tokens with exactly this text.
    pub fn is_ident(&self, text: &str) -> bool {
        matches!(&self.kind, TokenKind::Ident(name) if name == text)
    }
}

pub struct Lexer<'a> {
    src: &'a str,
    iter: CharIndices<'a>,
    peeked: Option<(usize, char)>,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            iter: src.char_indices(),
            peeked: None,
        }
    }

    /// Whether another token is available. Trivia ahead of it is consumed;
    /// an unterminated block comment is reported here.
    pub fn has_next(&mut self, diags: &mut Diagnostics) -> bool {
        self.skip_trivia(diags);
        self.peek().is_some()
    }

    /// Produce the next token. Call only after `has_next` returned true.
    pub fn next_token(&mut self, diags: &mut Diagnostics) -> Token {
        self.skip_trivia(diags);
        let (start, c) = match self.bump() {
            Some(pair) => pair,
            None => {
                // Callers respect has_next; this keeps the contract total.
                return Token::new(TokenKind::Recover, self.src.len(), self.src.len());
            }
        };

        match c {
            '(' => Token::new(TokenKind::LParen, start, start + 1),
            ')' => Token::new(TokenKind::RParen, start, start + 1),
            '{' => Token::new(TokenKind::LBrace, start, start + 1),
            '}' => Token::new(TokenKind::RBrace, start, start + 1),
            '[' => Token::new(TokenKind::LBracket, start, start + 1),
            ']' => Token::new(TokenKind::RBracket, start, start + 1),
            ',' => Token::new(TokenKind::Comma, start, start + 1),
            '=' => Token::new(TokenKind::Equals, start, start + 1),
            '|' => Token::new(TokenKind::Pipe, start, start + 1),
            '.' => Token::new(TokenKind::Dot, start, start + 1),
            '@' => Token::new(TokenKind::At, start, start + 1),
            '"' | '\'' => self.string(start, c, diags),
            '-' => match self.peek() {
                Some((_, d)) if d.is_ascii_digit() => self.number(start, diags),
                _ => {
                    diags.error("unexpected character '-'", Span::new(start, start + 1));
                    Token::new(TokenKind::Recover, start, start + 1)
                }
            },
            c if c.is_ascii_digit() => self.number(start, diags),
            c if is_ident_start(c) => self.ident(start),
            other => {
                diags.error(
                    format!("unexpected character '{}'", other),
                    Span::new(start, start + other.len_utf8()),
                );
                Token::new(TokenKind::Recover, start, start + other.len_utf8())
            }
        }
    }

    fn bump(&mut self) -> Option<(usize, char)> {
        if let Some(p) = self.peeked.take() {
            Some(p)
        } else {
            self.iter.next()
        }
    }

    fn peek(&mut self) -> Option<(usize, char)> {
        if self.peeked.is_none() {
            self.peeked = self.iter.next();
        }
        self.peeked
    }

    fn peek_second(&mut self) -> Option<char> {
        let (i, _) = self.peek()?;
        self.src.get(i..).and_then(|s| s.chars().nth(1))
    }

    /// Consume whitespace, `//` line comments, and `/* */` block comments.
    /// Comments are skipped, never tokenized.
    fn skip_trivia(&mut self, diags: &mut Diagnostics) {
        loop {
            let mut progressed = false;
            while let Some((_, c)) = self.peek() {
                if c.is_whitespace() {
                    self.bump();
                    progressed = true;
                } else {
                    break;
                }
            }
            if let Some((start, '/')) = self.peek() {
                match self.peek_second() {
                    Some('/') => {
                        self.bump();
                        self.bump();
                        while let Some((_, c)) = self.peek() {
                            self.bump();
                            if c == '\n' {
                                break;
                            }
                        }
                        progressed = true;
                    }
                    Some('*') => {
                        self.bump();
                        self.bump();
                        let mut closed = false;
                        while let Some((_, c)) = self.bump() {
                            if c == '*' {
                                if let Some((_, '/')) = self.peek() {
                                    self.bump();
                                    closed = true;
                                    break;
                                }
                            }
                        }
                        if !closed {
                            diags.error(
                                "unterminated block comment",
                                Span::new(start, self.src.len()),
                            );
                        }
                        progressed = true;
                    }
                    _ => {
                        // A bare '/' is not trivia; next_token reports it.
                        break;
                    }
                }
            }
            if !progressed {
                break;
            }
        }
    }

    fn string(&mut self, start: usize, quote: char, diags: &mut Diagnostics) -> Token {
        let mut text = String::new();
        while let Some((i, c)) = self.bump() {
            match c {
                c if c == quote => {
                    return Token::new(TokenKind::Str(text), start, i + 1);
                }
                '\\' => match self.bump() {
                    Some((_, 'n')) => text.push('\n'),
                    Some((_, 't')) => text.push('\t'),
                    Some((_, esc)) => text.push(esc),
                    None => break,
                },
                '\n' => {
                    // Strings do not span lines; treat the break as the
                    // point of failure and resume on the next line.
                    diags.error("unterminated string", Span::new(start, i));
                    return Token::new(TokenKind::Recover, start, i);
                }
                c => text.push(c),
            }
        }
        diags.error("unterminated string", Span::new(start, self.src.len()));
        Token::new(TokenKind::Recover, start, self.src.len())
    }

    fn number(&mut self, start: usize, diags: &mut Diagnostics) -> Token {
        let mut end = start + 1;
        let mut is_float = false;
        while let Some((i, c)) = self.peek() {
            if c.is_ascii_digit() {
                self.bump();
                end = i + 1;
            } else if c == '.' && !is_float && self.peek_second().is_some_and(|d| d.is_ascii_digit())
            {
                is_float = true;
                self.bump();
                end = i + 1;
            } else {
                break;
            }
        }
        let text = &self.src[start..end];
        if is_float {
            match text.parse::<f64>() {
                Ok(v) => Token::new(TokenKind::Float(v), start, end),
                Err(_) => {
                    diags.error(
                        format!("invalid numeric literal '{}'", text),
                        Span::new(start, end),
                    );
                    Token::new(TokenKind::Recover, start, end)
                }
            }
        } else {
            match text.parse::<i64>() {
                Ok(v) => Token::new(TokenKind::Int(v), start, end),
                Err(_) => {
                    diags.error(
                        format!("integer literal '{}' out of range", text),
                        Span::new(start, end),
                    );
                    Token::new(TokenKind::Recover, start, end)
                }
            }
        }
    }

    fn ident(&mut self, start: usize) -> Token {
        let mut end = start + 1;
        while let Some((i, c)) = self.peek() {
            if is_ident_continue(c) {
                self.bump();
                end = i + 1;
            } else {
                break;
            }
        }
        Token::new(
            TokenKind::Ident(self.src[start..end].to_string()),
            start,
            end,
        )
    }
}

#[inline]
fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_ascii_alphabetic()
}

#[inline]
fn is_ident_continue(c: char) -> bool {
    c == '_' || c.is_ascii_alphanumeric()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> (Vec<Token>, Diagnostics) {
        let mut diags = Diagnostics::new();
        let mut lexer = Lexer::new(src);
        let mut tokens = Vec::new();
        while lexer.has_next(&mut diags) {
            tokens.push(lexer.next_token(&mut diags));
        }
        (tokens, diags)
    }

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex(src).0.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_punctuation() {
        assert_eq!(
            kinds("(){},=|.@[]"),
            vec![
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::LBrace,
                TokenKind::RBrace,
                TokenKind::Comma,
                TokenKind::Equals,
                TokenKind::Pipe,
                TokenKind::Dot,
                TokenKind::At,
                TokenKind::LBracket,
                TokenKind::RBracket,
            ]
        );
    }

    #[test]
    fn test_idents_and_variable_refs() {
        assert_eq!(
            kinds("literal @speed_2"),
            vec![
                TokenKind::Ident("literal".into()),
                TokenKind::At,
                TokenKind::Ident("speed_2".into()),
            ]
        );
    }

    #[test]
    fn test_strings_with_escapes() {
        assert_eq!(
            kinds(r#""a\"b" 'c\n'"#),
            vec![
                TokenKind::Str("a\"b".into()),
                TokenKind::Str("c\n".into()),
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("1 -5 2.75"),
            vec![
                TokenKind::Int(1),
                TokenKind::Int(-5),
                TokenKind::Float(2.75),
            ]
        );
    }

    #[test]
    fn test_dot_after_int_is_not_a_float() {
        assert_eq!(
            kinds("a.b"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Dot,
                TokenKind::Ident("b".into()),
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        let (tokens, diags) = lex("a // to end of line\n/* block\nspanning */ b");
        assert!(diags.is_empty());
        assert_eq!(
            tokens.into_iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![TokenKind::Ident("a".into()), TokenKind::Ident("b".into())]
        );
    }

    #[test]
    fn test_unterminated_block_comment_reported() {
        let (tokens, diags) = lex("a /* never closed");
        assert_eq!(tokens.len(), 1);
        assert_eq!(diags.error_count(), 1);
    }

    #[test]
    fn test_unknown_char_yields_recovery_token() {
        let (tokens, diags) = lex("a ? b");
        assert_eq!(diags.error_count(), 1);
        assert_eq!(
            tokens.into_iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Recover,
                TokenKind::Ident("b".into()),
            ]
        );
    }

    #[test]
    fn test_unterminated_string_recovers_at_newline() {
        let (tokens, diags) = lex("'open\nliteral");
        assert_eq!(diags.error_count(), 1);
        assert_eq!(
            tokens.into_iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![TokenKind::Recover, TokenKind::Ident("literal".into())]
        );
    }

    #[test]
    fn test_spans_are_absolute_offsets() {
        let (tokens, _) = lex("ab 'cd'");
        assert_eq!(tokens[0].span, Span::new(0, 2));
        assert_eq!(tokens[1].span, Span::new(3, 7));
    }
}
