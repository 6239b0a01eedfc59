//! ISLE: Instruction Selection and Lowering Expressions.
//!
//! A small domain-specific language for writing prioritized term-rewriting rules, and a compiler
//! that turns those rules into a decision trie and then into plain Rust matcher functions. This
//! crate implements the front end (lexer, parser, semantic analysis) and the trie/codegen back
//! end; it does not itself know anything about instructions or registers; all of that is supplied
//! by the embedding crate's `Context` trait and the `.isle` source it feeds in.
//!
//! Typical use from a `build.rs`:
//!
//! ```ignore
//! let code = cranelift_isle::compile_files(&["inst.isle", "lower.isle"])?;
//! std::fs::write(out_path, code)?;
//! ```

#![deny(missing_docs)]

pub mod ast;
pub mod codegen;
pub mod error;
pub mod lexer;
pub mod sema;
pub mod trie;

pub use error::{Error, Result};

use ast::Program;

/// Compile a set of in-memory `.isle` source strings (each paired with a name used only for
/// diagnostics) into a single generated Rust source string.
pub fn compile(sources: &[(&str, &str)]) -> Result<String> {
    let mut prog = Program::default();
    for (i, (_name, src)) in sources.iter().enumerate() {
        ast::parse_into(i as u32, src, &mut prog)?;
    }
    let (type_env, term_env) = sema::analyze(&prog)?;
    Ok(codegen::generate(&type_env, &term_env))
}

/// Compile `.isle` files on disk into a single generated Rust source string. Intended for use
/// from a crate's `build.rs`.
pub fn compile_files<P: AsRef<std::path::Path>>(paths: &[P]) -> Result<String> {
    let mut sources = Vec::with_capacity(paths.len());
    let mut contents = Vec::with_capacity(paths.len());
    for p in paths {
        let text = std::fs::read_to_string(p).map_err(|e| Error::Parse {
            pos: lexer::Pos {
                file: 0,
                line: 0,
                col: 0,
            },
            message: format!("failed to read {}: {}", p.as_ref().display(), e),
        })?;
        contents.push((p.as_ref().display().to_string(), text));
    }
    for (name, text) in &contents {
        sources.push((name.as_str(), text.as_str()));
    }
    compile(&sources)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_to_end_compiles_a_tiny_rule_set() {
        let src = "\
(type Value primitive)
(decl iadd (Value Value) Value)
(extern constructor iadd emit_iadd)
(decl iconst (Value) Value)
(extern constructor iconst emit_iconst)
(extern extractor iconst_unwrap emit_iconst_unwrap)
(decl add (Value Value) Value)
(rule 1 (add (x @ (iconst n)) y) (iadd n y))
(rule 0 (add x y) (iadd x y))
";
        let generated = compile(&[("t.isle", src)]).unwrap();
        assert!(generated.contains("pub fn constructor_add"));
        assert!(generated.contains("pub fn constructor_iadd"));
    }

    #[test]
    fn reports_lex_errors_with_position() {
        let err = compile(&[("t.isle", "(decl foo (Value \"unterminated)")]).unwrap_err();
        match err {
            Error::Lex { .. } => {}
            other => panic!("expected a lex error, got {:?}", other),
        }
    }
}
