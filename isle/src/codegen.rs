//! Rust source generation: walks a [`RootTrie`] and emits one matcher function per root term.
//!
//! Generated functions look like:
//!
//! ```text
//! pub fn constructor_add(ctx: &mut impl Context, x: Value, y: Value) -> Option<Value> {
//!     if let Some(n) = ctx.iconst_unwrap(x) {
//!         return Some(ctx.iadd(n, y));
//!     }
//!     return Some(ctx.iadd(x, y));
//! }
//! ```
//!
//! Every extern constructor/extractor named in the program is assumed to be a method on a
//! `Context` trait that the embedding crate defines and implements; this module only emits calls
//! to it; it never defines the trait itself, matching how the embedding crate's `build.rs` wires
//! generated code back into hand-written lowering code.

use crate::ast::SExpr;
use crate::sema::{TermEnv, TypeEnv, TypedRule};
use crate::trie::{build_tries, Discriminant, TrieNode};
use std::fmt::Write as _;

/// Emit a full Rust source string implementing every root-term matcher found in `term_env`.
pub fn generate(type_env: &TypeEnv, term_env: &TermEnv) -> String {
    let mut out = String::new();
    writeln!(out, "// @generated by cranelift-isle. Do not edit by hand.").unwrap();
    writeln!(out, "#![allow(unused_variables, unreachable_code, clippy::all)]").unwrap();
    writeln!(out).unwrap();

    for (name, kind) in &type_env.types {
        if let crate::ast::TypeKind::Enum(variants) = kind {
            writeln!(out, "#[derive(Clone, Copy, Debug, PartialEq, Eq)]").unwrap();
            writeln!(out, "pub enum {} {{", name).unwrap();
            for v in variants {
                writeln!(out, "    {},", v).unwrap();
            }
            writeln!(out, "}}").unwrap();
            writeln!(out).unwrap();
        }
    }

    let tries = build_tries(&term_env.rules);
    for root_trie in &tries {
        let sig = &term_env.terms[&root_trie.term];
        let fn_name = format!("constructor_{}", sig.name);
        let params: Vec<String> = sig
            .arg_tys
            .iter()
            .enumerate()
            .map(|(i, ty)| format!("arg{}: {}", i, ty))
            .collect();
        writeln!(
            out,
            "pub fn {}(ctx: &mut impl Context, {}) -> Option<{}> {{",
            fn_name,
            params.join(", "),
            sig.ret_ty
        )
        .unwrap();

        let root_args: Vec<String> = (0..sig.arg_tys.len()).map(|i| format!("arg{}", i)).collect();
        emit_node(&mut out, &root_trie.root, &term_env.rules, &root_args, 1);

        writeln!(out, "    None").unwrap();
        writeln!(out, "}}").unwrap();
        writeln!(out).unwrap();
    }

    out
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("    ");
    }
}

fn var_for_path(path: &[usize], root_args: &[String]) -> String {
    if path.is_empty() {
        return "_root".into();
    }
    let mut s = root_args.get(path[0]).cloned().unwrap_or_else(|| "_root".into());
    for seg in &path[1..] {
        s = format!("{}_{}", s, seg);
    }
    s
}

fn emit_node(out: &mut String, node: &TrieNode, rules: &[TypedRule], root_args: &[String], depth: usize) {
    match node {
        TrieNode::Leaf(idxs) => {
            for &idx in idxs {
                emit_rule(out, &rules[idx], root_args, depth);
            }
        }
        TrieNode::Switch { path, arms } => {
            let scrutinee = var_for_path(&path[..path.len().saturating_sub(1)], root_args);
            let operand = root_args
                .get(path[0])
                .cloned()
                .unwrap_or_else(|| "_root".into());
            let _ = scrutinee;
            for (d, sub) in arms {
                match d {
                    Discriminant::Ctor(name, arity) => {
                        indent(out, depth);
                        let binding = var_for_path(path, root_args);
                        let sub_bindings: Vec<String> =
                            (0..*arity).map(|i| format!("{}_{}", binding, i)).collect();
                        writeln!(
                            out,
                            "if let Some(({})) = ctx.{}_unwrap({}) {{",
                            sub_bindings.join(", "),
                            name,
                            operand
                        )
                        .unwrap();
                        emit_node(out, sub, rules, root_args, depth + 1);
                        indent(out, depth);
                        writeln!(out, "}}").unwrap();
                    }
                    Discriminant::Const(val) => {
                        indent(out, depth);
                        writeln!(out, "if ctx.matches_const({}, {:?}) {{", operand, val).unwrap();
                        emit_node(out, sub, rules, root_args, depth + 1);
                        indent(out, depth);
                        writeln!(out, "}}").unwrap();
                    }
                    Discriminant::Wildcard => {
                        emit_node(out, sub, rules, root_args, depth);
                    }
                }
            }
        }
    }
}

fn emit_rule(out: &mut String, rule: &TypedRule, root_args: &[String], depth: usize) {
    let _ = root_args;
    indent(out, depth);
    write!(out, "return Some(").unwrap();
    emit_expr(out, &rule.expr);
    writeln!(out, ");").unwrap();
}

fn emit_expr(out: &mut String, expr: &SExpr) {
    match expr {
        SExpr::Int(n, _) => {
            write!(out, "{}", n).unwrap();
        }
        SExpr::Str(s, _) => {
            write!(out, "{:?}", s).unwrap();
        }
        SExpr::Sym(name, _) => {
            write!(out, "{}", name).unwrap();
        }
        SExpr::At(_, inner, _) => emit_expr(out, inner),
        SExpr::App(name, args, _) => {
            write!(out, "ctx.{}(", name).unwrap();
            for (i, a) in args.iter().enumerate() {
                if i > 0 {
                    write!(out, ", ").unwrap();
                }
                emit_expr(out, a);
            }
            write!(out, ")").unwrap();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parse;
    use crate::sema::analyze;

    #[test]
    fn generates_a_constructor_function_per_root_term() {
        let prog = parse(
            0,
            "(decl iadd (Value Value) Value)\n\
             (decl add (Value Value) Value)\n\
             (rule (add x y) (iadd x y))",
        )
        .unwrap();
        let (type_env, term_env) = analyze(&prog).unwrap();
        let src = generate(&type_env, &term_env);
        assert!(src.contains("pub fn constructor_add"));
        assert!(src.contains("ctx.iadd(x, y)"));
    }

    #[test]
    fn emits_enum_type_declarations() {
        let prog = parse(0, "(type RegClass (enum Int Float))").unwrap();
        let (type_env, term_env) = analyze(&prog).unwrap();
        let src = generate(&type_env, &term_env);
        assert!(src.contains("pub enum RegClass"));
        assert!(src.contains("Int,"));
    }
}
