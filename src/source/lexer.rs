//! QML tokenizer
//!
//! Produces a flat token stream with source ranges. Newlines are kept as tokens
//! because QML uses them to terminate bindings; comments are dropped (a block
//! comment spanning lines still yields one newline).

use crate::symbol::{Position, TextRange};
use crate::{Error, Result};

// ---------------------------------------------------------------------------
// Token types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Ident(String),
    Number(String),
    /// String literal contents without the surrounding quotes
    Str(String),
    Punct(char),
    Newline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub range: TextRange,
}

impl Token {
    pub fn is_punct(&self, c: char) -> bool {
        self.kind == TokenKind::Punct(c)
    }

    pub fn ident(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Ident(name) => Some(name),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

struct Lexer {
    chars: Vec<char>,
    index: usize,
    line: u32,
    column: u32,
}

pub fn tokenize(text: &str) -> Result<Vec<Token>> {
    let mut lexer = Lexer {
        chars: text.chars().collect(),
        index: 0,
        line: 0,
        column: 0,
    };
    lexer.run()
}

impl Lexer {
    fn run(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();

        while let Some(c) = self.peek() {
            let start = self.position();
            match c {
                '\n' => {
                    self.bump();
                    tokens.push(Token {
                        kind: TokenKind::Newline,
                        range: TextRange::new(start, self.position()),
                    });
                }
                c if c.is_whitespace() => {
                    self.bump();
                }
                '/' if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                '/' if self.peek_at(1) == Some('*') => {
                    let spans_lines = self.skip_block_comment(start)?;
                    if spans_lines {
                        tokens.push(Token {
                            kind: TokenKind::Newline,
                            range: TextRange::new(start, self.position()),
                        });
                    }
                }
                '"' | '\'' | '`' => {
                    let value = self.read_string(c, start)?;
                    tokens.push(Token {
                        kind: TokenKind::Str(value),
                        range: TextRange::new(start, self.position()),
                    });
                }
                c if is_ident_start(c) => {
                    let value = self.take_while(is_ident_continue);
                    tokens.push(Token {
                        kind: TokenKind::Ident(value),
                        range: TextRange::new(start, self.position()),
                    });
                }
                c if c.is_ascii_digit() => {
                    let value = self.take_while(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_');
                    tokens.push(Token {
                        kind: TokenKind::Number(value),
                        range: TextRange::new(start, self.position()),
                    });
                }
                other => {
                    self.bump();
                    tokens.push(Token {
                        kind: TokenKind::Punct(other),
                        range: TextRange::new(start, self.position()),
                    });
                }
            }
        }

        Ok(tokens)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.index).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.index + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.index += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            out.push(c);
            self.bump();
        }
        out
    }

    /// Returns whether the comment contained a line break
    fn skip_block_comment(&mut self, start: Position) -> Result<bool> {
        self.bump();
        self.bump();
        let mut spans_lines = false;
        loop {
            match self.bump() {
                Some('*') if self.peek() == Some('/') => {
                    self.bump();
                    return Ok(spans_lines);
                }
                Some('\n') => spans_lines = true,
                Some(_) => {}
                None => {
                    return Err(Error::Parse(format!(
                        "unterminated block comment starting at {}:{}",
                        start.line + 1,
                        start.character + 1
                    )));
                }
            }
        }
    }

    fn read_string(&mut self, quote: char, start: Position) -> Result<String> {
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(value),
                Some('\\') => {
                    if let Some(escaped) = self.bump() {
                        value.push('\\');
                        value.push(escaped);
                    }
                }
                Some('\n') if quote != '`' => {
                    return Err(Error::Parse(format!(
                        "unterminated string starting at {}:{}",
                        start.line + 1,
                        start.character + 1
                    )));
                }
                Some(c) => value.push(c),
                None => {
                    return Err(Error::Parse(format!(
                        "unterminated string starting at {}:{}",
                        start.line + 1,
                        start.character + 1
                    )));
                }
            }
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        tokenize(text).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_import_line() {
        assert_eq!(
            kinds("import QtQuick.Controls 2.15 as C\n"),
            vec![
                TokenKind::Ident("import".into()),
                TokenKind::Ident("QtQuick".into()),
                TokenKind::Punct('.'),
                TokenKind::Ident("Controls".into()),
                TokenKind::Number("2.15".into()),
                TokenKind::Ident("as".into()),
                TokenKind::Ident("C".into()),
                TokenKind::Newline,
            ]
        );
    }

    #[test]
    fn test_comments_are_dropped() {
        assert_eq!(
            kinds("a // trailing\n/* one\ntwo */ b"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Newline,
                TokenKind::Newline,
                TokenKind::Ident("b".into()),
            ]
        );
    }

    #[test]
    fn test_string_ranges() {
        let tokens = tokenize("x: \"./B.qml\"").unwrap();
        assert_eq!(tokens[2].kind, TokenKind::Str("./B.qml".into()));
        assert_eq!(tokens[2].range.start, Position::new(0, 3));
        assert_eq!(tokens[2].range.end, Position::new(0, 12));
    }

    #[test]
    fn test_unterminated_input_fails() {
        assert!(tokenize("\"open").is_err());
        assert!(tokenize("'line\nbreak'").is_err());
        assert!(tokenize("/* never closed").is_err());
        assert!(tokenize("`multi\nline`").is_ok());
    }
}
