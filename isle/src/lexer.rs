//! Lexer for the ISLE pattern DSL.
//!
//! Tokenizes one named source file at a time. Position is tracked as `(file, line, column)` so
//! later stages can produce diagnostics that point back at the `.isle` source.

use crate::error::{Error, Result};
use std::rc::Rc;

/// A source position: which file, and a 1-based line/column within it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pos {
    /// Index into the file-name table passed to the lexer.
    pub file: u32,
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number.
    pub col: u32,
}

/// One lexical token together with the position it started at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `@`
    At,
    /// A signed integer literal, e.g. `42`, `-1`, `0xff`.
    Int(i128),
    /// A bare identifier/symbol, e.g. `iadd`, `ty`, `Reg`.
    Sym(Rc<str>),
    /// A double-quoted string literal.
    Str(Rc<str>),
}

/// A lexer over one named source buffer.
pub struct Lexer<'a> {
    file: u32,
    src: &'a [u8],
    pos: usize,
    line: u32,
    col: u32,
}

/// A token with its starting position, as returned by the lexer.
pub struct Spanned {
    /// The token itself.
    pub token: Token,
    /// Its starting position.
    pub pos: Pos,
}

impl<'a> Lexer<'a> {
    /// Create a lexer for `src`, tagging every position with `file` (an index the caller assigns
    /// to identify this source file in diagnostics).
    pub fn new(file: u32, src: &'a str) -> Self {
        Self {
            file,
            src: src.as_bytes(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn here(&self) -> Pos {
        Pos {
            file: self.file,
            line: self.line,
            col: self.col,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
            self.col = 1;
        } else if c == b'\r' {
            // Normalize \r and \r\n to a single line break; \n alone is handled above.
            if self.peek() == Some(b'\n') {
                // Don't double count; the following \n bump will advance the line.
            } else {
                self.line += 1;
                self.col = 1;
            }
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match self.peek() {
                Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r') => {
                    self.bump();
                }
                Some(b';') => {
                    while let Some(c) = self.peek() {
                        if c == b'\n' || c == b'\r' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some(b'(') if self.peek_at(1) == Some(b';') => {
                    let start = self.here();
                    self.bump();
                    self.bump();
                    let mut depth = 1usize;
                    while depth > 0 {
                        match self.peek() {
                            None => {
                                return Err(Error::Lex {
                                    pos: start,
                                    message: "unterminated block comment".into(),
                                });
                            }
                            Some(b'(') if self.peek_at(1) == Some(b';') => {
                                self.bump();
                                self.bump();
                                depth += 1;
                            }
                            Some(b';') if self.peek_at(1) == Some(b')') => {
                                self.bump();
                                self.bump();
                                depth -= 1;
                            }
                            Some(_) => {
                                self.bump();
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn lex_string(&mut self, start: Pos) -> Result<Token> {
        self.bump(); // opening quote
        let mut s = String::new();
        loop {
            match self.bump() {
                None => {
                    return Err(Error::Lex {
                        pos: start,
                        message: "unterminated string literal".into(),
                    });
                }
                Some(b'"') => break,
                Some(b'\\') => match self.bump() {
                    Some(b'n') => s.push('\n'),
                    Some(b't') => s.push('\t'),
                    Some(b'"') => s.push('"'),
                    Some(b'\\') => s.push('\\'),
                    Some(c) => s.push(c as char),
                    None => {
                        return Err(Error::Lex {
                            pos: start,
                            message: "unterminated escape in string literal".into(),
                        });
                    }
                },
                Some(c) => s.push(c as char),
            }
        }
        Ok(Token::Str(s.into()))
    }

    fn is_sym_char(c: u8) -> bool {
        !matches!(c, b'(' | b')' | b';' | b' ' | b'\t' | b'\n' | b'\r' | b'"' | b'@')
    }

    /// Lex the next token, or `None` at end of input.
    pub fn next(&mut self) -> Result<Option<Spanned>> {
        self.skip_trivia()?;
        let start = self.here();
        let tok = match self.peek() {
            None => return Ok(None),
            Some(b'(') => {
                self.bump();
                Token::LParen
            }
            Some(b')') => {
                self.bump();
                Token::RParen
            }
            Some(b'@') => {
                self.bump();
                Token::At
            }
            Some(b'"') => self.lex_string(start)?,
            Some(c) => {
                let begin = self.pos;
                while self.peek().map(Self::is_sym_char).unwrap_or(false) {
                    self.bump();
                }
                let text = std::str::from_utf8(&self.src[begin..self.pos]).unwrap();
                if text.is_empty() {
                    return Err(Error::Lex {
                        pos: start,
                        message: format!("unexpected character {:?}", c as char),
                    });
                }
                if let Ok(i) = parse_int(text) {
                    Token::Int(i)
                } else {
                    Token::Sym(text.into())
                }
            }
        };
        Ok(Some(Spanned { token: tok, pos: start }))
    }
}

fn parse_int(text: &str) -> core::result::Result<i128, ()> {
    let (neg, rest) = match text.strip_prefix('-') {
        Some(r) => (true, r),
        None => (false, text),
    };
    if rest.is_empty() {
        return Err(());
    }
    let val = if let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        i128::from_str_radix(hex, 16).map_err(|_| ())?
    } else {
        if !rest.bytes().all(|b| b.is_ascii_digit()) {
            return Err(());
        }
        rest.parse::<i128>().map_err(|_| ())?
    };
    Ok(if neg { -val } else { val })
}

/// Tokenize an entire source buffer into a flat vector.
pub fn lex_all(file: u32, src: &str) -> Result<Vec<Spanned>> {
    let mut lexer = Lexer::new(file, src);
    let mut out = Vec::new();
    while let Some(tok) = lexer.next()? {
        out.push(tok);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(src: &str) -> Vec<Token> {
        lex_all(0, src).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn basic_tokens() {
        assert_eq!(
            toks("(rule (iadd x y) (add x y))"),
            vec![
                Token::LParen,
                Token::Sym("rule".into()),
                Token::LParen,
                Token::Sym("iadd".into()),
                Token::Sym("x".into()),
                Token::Sym("y".into()),
                Token::RParen,
                Token::LParen,
                Token::Sym("add".into()),
                Token::Sym("x".into()),
                Token::Sym("y".into()),
                Token::RParen,
                Token::RParen,
            ]
        );
    }

    #[test]
    fn comments_and_integers() {
        assert_eq!(
            toks("; line comment\n(; block (; nested ;) comment ;) (foo 42 -1 0xff)"),
            vec![
                Token::LParen,
                Token::Sym("foo".into()),
                Token::Int(42),
                Token::Int(-1),
                Token::Int(255),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn at_binding_and_strings() {
        assert_eq!(
            toks(r#"(x @ "hi")"#),
            vec![
                Token::LParen,
                Token::Sym("x".into()),
                Token::At,
                Token::Str("hi".into()),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn line_terminator_variants_all_separate_tokens() {
        for src in ["(a b)", "(a\nb)", "(a\r\nb)", "(a\rb)"] {
            assert_eq!(
                toks(src),
                vec![
                    Token::LParen,
                    Token::Sym("a".into()),
                    Token::Sym("b".into()),
                    Token::RParen,
                ],
                "failed for {:?}",
                src
            );
        }
    }
}
