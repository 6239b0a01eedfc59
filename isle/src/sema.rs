//! Semantic analysis: binds names to declarations and type-checks every rule.
//!
//! Two environments are built up from the parsed [`Program`]:
//!
//! - the *type environment*, mapping type names to their [`TypeKind`], and
//! - the *term environment*, mapping term names to their declared signature.
//!
//! Each rule's pattern and right-hand side are then checked against those environments: every
//! term reference must resolve, argument counts must match declared arity, and the inferred type
//! of the right-hand side must match the pattern's root return type. A single pattern may not
//! bind the same variable name twice (shadowing would make later trie construction ambiguous
//! about which binding a use refers to).

use crate::ast::{Decl, Program, SExpr, TypeDecl, TypeKind};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::rc::Rc;

/// A fully resolved term signature.
#[derive(Clone, Debug)]
pub struct TermSig {
    /// The term's name.
    pub name: Rc<str>,
    /// Argument types, in declared order.
    pub arg_tys: Vec<Rc<str>>,
    /// Return type.
    pub ret_ty: Rc<str>,
    /// Whether this term's implementation is supplied externally (a Rust function) rather than
    /// solely by `rule`s.
    pub is_extern: bool,
}

/// A type-checked rule, ready for trie construction.
#[derive(Clone, Debug)]
pub struct TypedRule {
    /// Rule priority (higher fires first).
    pub priority: i64,
    /// The left-hand side pattern, unchanged from parsing; already verified well-typed.
    pub pattern: SExpr,
    /// The right-hand side expression.
    pub expr: SExpr,
    /// Variable bindings introduced by the pattern, in the order they're bound, each tagged with
    /// its type.
    pub bindings: Vec<(Rc<str>, Rc<str>)>,
}

/// The result of semantic analysis: resolved types, terms, and type-checked rules.
pub struct TypeEnv {
    /// Every declared type, by name.
    pub types: HashMap<Rc<str>, TypeKind>,
}

/// The result of semantic analysis: resolved term signatures and type-checked rules.
pub struct TermEnv {
    /// Every declared term's signature, by name.
    pub terms: HashMap<Rc<str>, TermSig>,
    /// Every rule, fully type-checked.
    pub rules: Vec<TypedRule>,
}

struct Checker<'a> {
    types: &'a HashMap<Rc<str>, TypeKind>,
    terms: &'a HashMap<Rc<str>, TermSig>,
    bindings: Vec<(Rc<str>, Rc<str>)>,
}

impl<'a> Checker<'a> {
    fn bind(&mut self, name: &Rc<str>, ty: &Rc<str>, pos: crate::lexer::Pos) -> Result<()> {
        if self.bindings.iter().any(|(n, _)| n == name) {
            return Err(Error::DuplicateBinding {
                pos,
                name: name.to_string(),
            });
        }
        self.bindings.push((name.clone(), ty.clone()));
        Ok(())
    }

    fn lookup_binding(&self, name: &Rc<str>) -> Option<Rc<str>> {
        self.bindings
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t.clone())
    }

    /// Check a pattern against an expected type, returning nothing (patterns don't synthesize;
    /// they're checked against the type their position requires).
    fn check_pattern(&mut self, pat: &SExpr, expected: &Rc<str>) -> Result<()> {
        match pat {
            SExpr::Sym(name, pos) => {
                if &**name == "_" {
                    return Ok(());
                }
                // A bare symbol that names a declared 0-arity term is a constructor reference;
                // otherwise it's a fresh variable binding.
                if let Some(sig) = self.terms.get(name) {
                    if !sig.arg_tys.is_empty() {
                        return Err(Error::ArityMismatch {
                            pos: *pos,
                            name: name.to_string(),
                            expected: sig.arg_tys.len(),
                            found: 0,
                        });
                    }
                    if &sig.ret_ty != expected {
                        return Err(Error::TypeMismatch {
                            pos: *pos,
                            expected: expected.to_string(),
                            found: sig.ret_ty.to_string(),
                        });
                    }
                    Ok(())
                } else {
                    self.bind(name, expected, *pos)
                }
            }
            SExpr::Int(_, _) => Ok(()),
            SExpr::Str(_, _) => Ok(()),
            SExpr::At(name, inner, pos) => {
                self.bind(name, expected, *pos)?;
                self.check_pattern(inner, expected)
            }
            SExpr::App(name, args, pos) => {
                let sig = self
                    .terms
                    .get(name)
                    .cloned()
                    .ok_or_else(|| Error::UndefinedTerm {
                        pos: *pos,
                        name: name.to_string(),
                    })?;
                if sig.arg_tys.len() != args.len() {
                    return Err(Error::ArityMismatch {
                        pos: *pos,
                        name: name.to_string(),
                        expected: sig.arg_tys.len(),
                        found: args.len(),
                    });
                }
                if &sig.ret_ty != expected {
                    return Err(Error::TypeMismatch {
                        pos: *pos,
                        expected: expected.to_string(),
                        found: sig.ret_ty.to_string(),
                    });
                }
                for (arg, arg_ty) in args.iter().zip(sig.arg_tys.iter()) {
                    self.check_pattern(arg, arg_ty)?;
                }
                Ok(())
            }
        }
    }

    /// Infer the type of a right-hand side expression.
    fn infer_expr(&self, expr: &SExpr) -> Result<Rc<str>> {
        match expr {
            SExpr::Int(_, pos) => Err(Error::TypeMismatch {
                pos: *pos,
                expected: "a declared type".into(),
                found: "integer literal in untyped position".into(),
            }),
            SExpr::Str(_, pos) => Err(Error::TypeMismatch {
                pos: *pos,
                expected: "a declared type".into(),
                found: "string literal in untyped position".into(),
            }),
            SExpr::Sym(name, pos) => {
                if let Some(ty) = self.lookup_binding(name) {
                    return Ok(ty);
                }
                if let Some(sig) = self.terms.get(name) {
                    if sig.arg_tys.is_empty() {
                        return Ok(sig.ret_ty.clone());
                    }
                    return Err(Error::ArityMismatch {
                        pos: *pos,
                        name: name.to_string(),
                        expected: sig.arg_tys.len(),
                        found: 0,
                    });
                }
                Err(Error::UndefinedTerm {
                    pos: *pos,
                    name: name.to_string(),
                })
            }
            SExpr::At(_, inner, _) => self.infer_expr(inner),
            SExpr::App(name, args, pos) => {
                let sig = self
                    .terms
                    .get(name)
                    .cloned()
                    .ok_or_else(|| Error::UndefinedTerm {
                        pos: *pos,
                        name: name.to_string(),
                    })?;
                if sig.arg_tys.len() != args.len() {
                    return Err(Error::ArityMismatch {
                        pos: *pos,
                        name: name.to_string(),
                        expected: sig.arg_tys.len(),
                        found: args.len(),
                    });
                }
                for (arg, arg_ty) in args.iter().zip(sig.arg_tys.iter()) {
                    let found = self.infer_expr(arg)?;
                    if &found != arg_ty {
                        return Err(Error::TypeMismatch {
                            pos: arg.pos(),
                            expected: arg_ty.to_string(),
                            found: found.to_string(),
                        });
                    }
                }
                Ok(sig.ret_ty.clone())
            }
        }
    }
}

/// Build the type and term environments from a parsed program, then type-check every rule.
pub fn analyze(prog: &Program) -> Result<(TypeEnv, TermEnv)> {
    let mut types = HashMap::new();
    for TypeDecl { name, kind, .. } in &prog.types {
        types.insert(name.clone(), kind.clone());
    }

    let mut terms = HashMap::new();
    for Decl {
        name,
        arg_tys,
        ret_ty,
        is_extern,
        ..
    } in &prog.decls
    {
        terms.insert(
            name.clone(),
            TermSig {
                name: name.clone(),
                arg_tys: arg_tys.clone(),
                ret_ty: ret_ty.clone(),
                is_extern: *is_extern,
            },
        );
    }

    let mut rules = Vec::with_capacity(prog.rules.len());
    for rule in &prog.rules {
        let root_ty = pattern_root_ty(&rule.pattern, &terms)?;
        let mut checker = Checker {
            types: &types,
            terms: &terms,
            bindings: Vec::new(),
        };
        checker.check_pattern(&rule.pattern, &root_ty)?;
        let expr_ty = checker.infer_expr(&rule.expr)?;
        if expr_ty != root_ty {
            return Err(Error::TypeMismatch {
                pos: rule.expr.pos(),
                expected: root_ty.to_string(),
                found: expr_ty.to_string(),
            });
        }
        rules.push(TypedRule {
            priority: rule.priority,
            pattern: rule.pattern.clone(),
            expr: rule.expr.clone(),
            bindings: checker.bindings,
        });
    }

    Ok((TypeEnv { types }, TermEnv { terms, rules }))
}

fn pattern_root_ty(pat: &SExpr, terms: &HashMap<Rc<str>, TermSig>) -> Result<Rc<str>> {
    match pat {
        SExpr::App(name, _, pos) => terms
            .get(name)
            .map(|s| s.ret_ty.clone())
            .ok_or_else(|| Error::UndefinedTerm {
                pos: *pos,
                name: name.to_string(),
            }),
        other => Err(Error::Parse {
            pos: other.pos(),
            message: "a rule's top-level pattern must be a term application".into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parse;

    #[test]
    fn well_typed_rule_passes() {
        let prog = parse(
            0,
            "(decl iadd (Value Value) Value)\n\
             (decl add (Value Value) Value)\n\
             (rule (add x y) (iadd x y))",
        )
        .unwrap();
        let (_, term_env) = analyze(&prog).unwrap();
        assert_eq!(term_env.rules.len(), 1);
        assert_eq!(term_env.rules[0].bindings.len(), 2);
    }

    #[test]
    fn undefined_term_is_rejected() {
        let prog = parse(0, "(decl add (Value Value) Value)\n(rule (add x y) (bogus x y))").unwrap();
        let err = analyze(&prog).unwrap_err();
        assert!(matches!(err, Error::UndefinedTerm { .. }));
    }

    #[test]
    fn arity_mismatch_is_rejected() {
        let prog = parse(
            0,
            "(decl iadd (Value Value) Value)\n\
             (decl add (Value Value) Value)\n\
             (rule (add x y) (iadd x))",
        )
        .unwrap();
        let err = analyze(&prog).unwrap_err();
        assert!(matches!(err, Error::ArityMismatch { .. }));
    }

    #[test]
    fn duplicate_binding_is_rejected() {
        let prog = parse(
            0,
            "(decl add (Value Value) Value)\n(rule (add x x) x)",
        )
        .unwrap();
        let err = analyze(&prog).unwrap_err();
        assert!(matches!(err, Error::DuplicateBinding { .. }));
    }

    #[test]
    fn type_mismatch_between_pattern_and_rhs_is_rejected() {
        let prog = parse(
            0,
            "(decl add (Value Value) Value)\n\
             (decl flag () Bool)\n\
             (rule (add x y) (flag))",
        )
        .unwrap();
        let err = analyze(&prog).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }
}
