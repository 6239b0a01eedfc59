//! Prioritized decision-trie construction.
//!
//! Rules that share a root term are grouped and compiled into a single matching trie: at each
//! node we pick the operand position that discriminates the most rules (breaking ties by operand
//! index, so construction is deterministic), branch on the distinct sub-patterns found there, and
//! recurse. Rules are tried in priority order (highest first), then source order, matching the
//! same tie-break the embedder sees when more than one rule could fire.

use crate::ast::SExpr;
use crate::sema::TypedRule;
use std::collections::BTreeMap;
use std::rc::Rc;

/// One edge out of a trie node: match discriminant `ctor` at the current operand, or fall through
/// to a bound variable that accepts anything.
#[derive(Clone, Debug)]
pub enum Discriminant {
    /// Match a nullary symbol or literal exactly.
    Const(Rc<str>),
    /// Match any `(term ...)` application by its head, recursing into its arguments.
    Ctor(Rc<str>, usize),
    /// Matches anything; binds the operand to a variable (handled by the source rule already).
    Wildcard,
}

/// A node in the decision trie for one root term.
pub enum TrieNode {
    /// Branch on the sub-pattern found at a given path into the scrutinee.
    Switch {
        /// Path (sequence of argument indices) from the root scrutinee to the value being tested.
        path: Vec<usize>,
        /// Arms, in the order they should be tested; `Wildcard` arms (if present) always come
        /// last regardless of where they appeared in construction.
        arms: Vec<(Discriminant, TrieNode)>,
    },
    /// No further discrimination needed or possible: the rules remaining at this node, ordered by
    /// priority then source order, are tried in turn.
    Leaf(Vec<usize>),
}

/// All rules sharing a root term, organized into one matching trie.
pub struct RootTrie {
    /// The term these rules construct.
    pub term: Rc<str>,
    /// The trie over indices into the original rule list's subset for this term.
    pub root: TrieNode,
}

/// Indexes `rules` by root term and builds one trie per term.
pub fn build_tries(rules: &[TypedRule]) -> Vec<RootTrie> {
    let mut by_term: BTreeMap<Rc<str>, Vec<usize>> = BTreeMap::new();
    for (i, rule) in rules.iter().enumerate() {
        if let SExpr::App(name, _, _) = &rule.pattern {
            by_term.entry(name.clone()).or_default().push(i);
        }
    }

    let mut order: Vec<usize> = (0..rules.len()).collect();
    order.sort_by(|&a, &b| {
        rules[b]
            .priority
            .cmp(&rules[a].priority)
            .then(a.cmp(&b))
    });
    let rank: BTreeMap<usize, usize> = order.iter().enumerate().map(|(r, &i)| (i, r)).collect();

    by_term
        .into_iter()
        .map(|(term, mut idxs)| {
            idxs.sort_by_key(|i| rank[i]);
            let root = build_node(rules, &idxs, &[]);
            RootTrie { term, root }
        })
        .collect()
}

fn arg_at<'a>(pattern: &'a SExpr, path: &[usize]) -> &'a SExpr {
    let mut cur = strip_at(pattern);
    for &i in path {
        cur = match cur {
            SExpr::App(_, args, _) => strip_at(&args[i]),
            _ => cur,
        };
    }
    cur
}

fn strip_at(e: &SExpr) -> &SExpr {
    match e {
        SExpr::At(_, inner, _) => strip_at(inner),
        other => other,
    }
}

fn discriminant_of(e: &SExpr) -> Option<(Discriminant, usize)> {
    match strip_at(e) {
        SExpr::App(name, args, _) => Some((Discriminant::Ctor(name.clone(), args.len()), args.len())),
        SExpr::Int(n, _) => Some((Discriminant::Const(format!("{}", n).into()), 0)),
        SExpr::Str(s, _) => Some((Discriminant::Const(s.clone()), 0)),
        SExpr::Sym(name, _) if &**name != "_" => None, // treat as wildcard unless it's a literal
        _ => None,
    }
}

fn discriminant_key(d: &Discriminant) -> Rc<str> {
    match d {
        Discriminant::Const(s) => s.clone(),
        Discriminant::Ctor(s, arity) => format!("{}/{}", s, arity).into(),
        Discriminant::Wildcard => "_".into(),
    }
}

/// Find the argument path that splits `idxs` into the most distinct groups, preferring the
/// lowest-indexed path on ties. Returns `None` if every rule is already fully discriminated (all
/// patterns reduce to variables/wildcards at every remaining position).
fn best_path(rules: &[TypedRule], idxs: &[usize], base: &[usize]) -> Option<Vec<usize>> {
    // Determine arity at `base` from the first rule (all rules at a node share the same ctor by
    // construction once we've branched down to here, except at the very root where they share
    // the root term and thus the same arity too).
    let arity = match arg_at(&rules[idxs[0]].pattern, base) {
        SExpr::App(_, args, _) => args.len(),
        _ => 0,
    };

    let mut best: Option<(Vec<usize>, usize)> = None;
    for i in 0..arity {
        let mut path = base.to_vec();
        path.push(i);
        let mut groups: BTreeMap<Rc<str>, usize> = BTreeMap::new();
        let mut any_discriminating = false;
        for &idx in idxs {
            let sub = arg_at(&rules[idx].pattern, &path);
            if let Some((d, _)) = discriminant_of(sub) {
                any_discriminating = true;
                *groups.entry(discriminant_key(&d)).or_default() += 1;
            }
        }
        if !any_discriminating {
            continue;
        }
        let score = groups.len();
        if best.as_ref().map(|(_, s)| score > *s).unwrap_or(true) {
            best = Some((path, score));
        }
    }
    best.map(|(p, _)| p)
}

fn build_node(rules: &[TypedRule], idxs: &[usize], base: &[usize]) -> TrieNode {
    if idxs.len() <= 1 {
        return TrieNode::Leaf(idxs.to_vec());
    }
    match best_path(rules, idxs, base) {
        None => TrieNode::Leaf(idxs.to_vec()),
        Some(path) => {
            let mut groups: BTreeMap<Rc<str>, (Discriminant, Vec<usize>)> = BTreeMap::new();
            let mut wildcards = Vec::new();
            for &idx in idxs {
                let sub = arg_at(&rules[idx].pattern, &path);
                match discriminant_of(sub) {
                    Some((d, _)) => {
                        let key = discriminant_key(&d);
                        groups.entry(key).or_insert_with(|| (d, Vec::new())).1.push(idx);
                    }
                    None => wildcards.push(idx),
                }
            }
            let mut arms: Vec<(Discriminant, TrieNode)> = Vec::new();
            for (_, (d, mut members)) in groups {
                // Wildcard rules also match at this discriminant; fold them in, preserving the
                // overall priority order already encoded in `idxs`.
                members.extend(wildcards.iter().copied());
                members.sort_by_key(|m| idxs.iter().position(|x| x == m).unwrap());
                arms.push((d, build_node(rules, &members, &path)));
            }
            if !wildcards.is_empty() {
                arms.push((Discriminant::Wildcard, build_node(rules, &wildcards, &path)));
            }
            TrieNode::Switch { path, arms }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parse;
    use crate::sema::analyze;

    fn rules_for(src: &str) -> Vec<TypedRule> {
        let prog = parse(0, src).unwrap();
        let (_, term_env) = analyze(&prog).unwrap();
        term_env.rules
    }

    #[test]
    fn single_rule_is_a_leaf() {
        let rules = rules_for(
            "(decl iadd (Value Value) Value)\n\
             (decl add (Value Value) Value)\n\
             (rule (add x y) (iadd x y))",
        );
        let tries = build_tries(&rules);
        assert_eq!(tries.len(), 1);
        assert!(matches!(tries[0].root, TrieNode::Leaf(_)));
    }

    #[test]
    fn discriminates_on_constant_argument() {
        let rules = rules_for(
            "(decl iadd (Value Value) Value)\n\
             (decl iconst (Value) Value)\n\
             (decl add (Value Value) Value)\n\
             (rule 1 (add (iconst x) y) (iadd x y))\n\
             (rule 0 (add x y) (iadd x y))",
        );
        let tries = build_tries(&rules);
        assert_eq!(tries.len(), 1);
        match &tries[0].root {
            TrieNode::Switch { arms, .. } => {
                assert!(arms.iter().any(|(d, _)| matches!(d, Discriminant::Ctor(n, _) if &**n == "iconst")));
            }
            TrieNode::Leaf(_) => panic!("expected a switch node"),
        }
    }

    #[test]
    fn priority_orders_leaf_members() {
        let rules = rules_for(
            "(decl iadd (Value Value) Value)\n\
             (decl isub (Value Value) Value)\n\
             (decl add (Value Value) Value)\n\
             (rule 0 (add x y) (iadd x y))\n\
             (rule 10 (add x y) (isub x y))",
        );
        let tries = build_tries(&rules);
        match &tries[0].root {
            TrieNode::Leaf(idxs) => assert_eq!(idxs[0], 1, "higher priority rule should come first"),
            TrieNode::Switch { .. } => panic!("expected a leaf"),
        }
    }
}
