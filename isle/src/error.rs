//! Error types produced while lexing, parsing, type-checking, or compiling an ISLE program.

use crate::lexer::Pos;
use std::fmt;

/// Any error that can arise from [`crate::compile`].
#[derive(Debug)]
pub enum Error {
    /// A lexical error: a malformed token, unterminated string, or unterminated block comment.
    Lex {
        /// Where the error was detected.
        pos: Pos,
        /// A human-readable description.
        message: String,
    },
    /// A syntactic error: the token stream did not match any production.
    Parse {
        /// Where the error was detected.
        pos: Pos,
        /// A human-readable description.
        message: String,
    },
    /// A pattern or RHS expression referenced a term that was never declared.
    UndefinedTerm {
        /// Where the reference occurs.
        pos: Pos,
        /// The undefined term's name.
        name: String,
    },
    /// A pattern or RHS expression's type does not match its declared context.
    TypeMismatch {
        /// Where the mismatch occurs.
        pos: Pos,
        /// The type that was expected.
        expected: String,
        /// The type that was found.
        found: String,
    },
    /// A term was applied to the wrong number of arguments.
    ArityMismatch {
        /// Where the mismatch occurs.
        pos: Pos,
        /// The term's name.
        name: String,
        /// The number of arguments the term's signature declares.
        expected: usize,
        /// The number of arguments actually supplied.
        found: usize,
    },
    /// The same variable name is bound twice in one pattern.
    DuplicateBinding {
        /// Where the duplicate binding occurs.
        pos: Pos,
        /// The variable name.
        name: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Lex { pos, message } => {
                write!(f, "{}:{}:{}: lex error: {}", pos.file, pos.line, pos.col, message)
            }
            Error::Parse { pos, message } => {
                write!(f, "{}:{}:{}: parse error: {}", pos.file, pos.line, pos.col, message)
            }
            Error::UndefinedTerm { pos, name } => write!(
                f,
                "{}:{}:{}: undefined term `{}`",
                pos.file, pos.line, pos.col, name
            ),
            Error::TypeMismatch {
                pos,
                expected,
                found,
            } => write!(
                f,
                "{}:{}:{}: type mismatch: expected `{}`, found `{}`",
                pos.file, pos.line, pos.col, expected, found
            ),
            Error::ArityMismatch {
                pos,
                name,
                expected,
                found,
            } => write!(
                f,
                "{}:{}:{}: `{}` expects {} argument(s), found {}",
                pos.file, pos.line, pos.col, name, expected, found
            ),
            Error::DuplicateBinding { pos, name } => write!(
                f,
                "{}:{}:{}: variable `{}` is bound more than once in this pattern",
                pos.file, pos.line, pos.col, name
            ),
        }
    }
}

impl std::error::Error for Error {}

/// Convenience result alias used throughout this crate.
pub type Result<T> = core::result::Result<T, Error>;
