//! `constraint_to_si`: given a boolean formula over a single "interesting"
//! free variable, derive the tightest `StridedInterval` that variable must
//! lie in for the formula to hold.
//!
//! Formulas frequently arrive with a boolean test re-encoded as a 1-bit
//! (or wider, zero-extended) bitvector — `Extract(0, 0, ZeroExt(n,
//! If(P(v), 1, 0))) == 1` — rather than as `P(v)` directly. This module
//! peels that encoding off before looking for the comparison it actually
//! constrains.

use std::rc::Rc;

use crate::bitvec::{from_signed_wide, mask, to_signed};
use crate::error::DomainError;
use crate::eval::{eval, Environment, Expr};
use crate::policy::Policy;
use crate::strided_interval::StridedInterval;

/// Derive the strided interval `var_name` must occupy for `formula` to be
/// satisfiable, starting from `domain` (the variable's prior known range).
/// Returns `domain` unchanged when the formula doesn't constrain
/// `var_name` in a pattern this module recognizes — refinement here is a
/// precision improvement, never a soundness requirement, so "give up and
/// return the input" is always a safe answer.
pub fn constraint_to_si(
    formula: &dyn Expr,
    var_name: &str,
    domain: &StridedInterval,
    policy: &Policy,
) -> Result<StridedInterval, DomainError> {
    let unwrapped = unwrap_bool_as_bitvector(formula);
    refine(unwrapped.as_ref(), var_name, domain, policy, false)
}

/// Peel an `Eq(X, 1)` / `Eq(X, 0)` / `Ne(X, 1)` / `Ne(X, 0)` wrapper off a
/// boolean re-encoded as a bitvector, where `X` is some chain of
/// `Extract`/`ZeroExt`/`Concat` around an `If(cond, 1, 0)` node. `Ne(X, c)`
/// is just `Eq(X, 1 - c)` for a 1-bit `X`, so both comparison mnemonics
/// resolve to the same `cond`/`Not(cond)` choice. Returns `cond` (wrapped
/// in a `Not` when the resolved equality is against `0`), or a structural
/// copy of `formula` unchanged if the pattern doesn't match.
fn unwrap_bool_as_bitvector(formula: &dyn Expr) -> Rc<dyn Expr> {
    let op = formula.op_name();
    if op == "Eq" || op == "Ne" {
        let ops = formula.operands();
        if ops.len() == 2 {
            if let Some(rhs_const) = ops[1].as_constant() {
                if let Some(cond) = find_if_condition(ops[0].as_ref()) {
                    // Eq(X,1) and Ne(X,0) both mean "X is true"; Eq(X,0)
                    // and Ne(X,1) both mean "X is false".
                    let wants_true = match (op, rhs_const) {
                        ("Eq", 1) | ("Ne", 0) => Some(true),
                        ("Eq", 0) | ("Ne", 1) => Some(false),
                        _ => None,
                    };
                    return match wants_true {
                        Some(true) => cond,
                        Some(false) => Rc::new(NotNode(cond)),
                        None => Owned::copy_of(formula),
                    };
                }
            }
        }
    }
    Owned::copy_of(formula)
}

/// Walk down through `Extract`/`ZeroExt`/`SignExt`/`Concat` nodes looking
/// for an `If(cond, 1, 0)` (or `If(cond, 0, 1)`, negated here) at the
/// bottom.
fn find_if_condition(expr: &dyn Expr) -> Option<Rc<dyn Expr>> {
    match expr.op_name() {
        "If" => {
            let ops = expr.operands();
            if ops.len() == 3 {
                match (ops[1].as_constant(), ops[2].as_constant()) {
                    (Some(1), Some(0)) => return Some(ops[0].clone()),
                    (Some(0), Some(1)) => return Some(Rc::new(NotNode(ops[0].clone()))),
                    _ => {}
                }
            }
            None
        }
        "Extract" | "ZeroExt" | "SignExt" => {
            expr.operands().first().and_then(|child| find_if_condition(child.as_ref()))
        }
        "Concat" => expr
            .operands()
            .iter()
            .find(|o| o.as_constant() != Some(0))
            .and_then(|child| find_if_condition(child.as_ref())),
        _ => None,
    }
}

/// A boolean negation of some other node, built only by this module so it
/// can hand `refine` a single logical node without mutating the caller's
/// tree.
struct NotNode(Rc<dyn Expr>);

impl Expr for NotNode {
    fn op_name(&self) -> &str {
        "Not"
    }
    fn operands(&self) -> Vec<Rc<dyn Expr>> {
        vec![self.0.clone()]
    }
    fn bit_width(&self) -> u32 {
        self.0.bit_width()
    }
}

/// Structural, owned copy of a borrowed `&dyn Expr` tree's direct shape,
/// deep enough for `refine` to dispatch on `op_name`/`operands` without
/// requiring the original borrowed tree to be `'static`.
enum Owned {
    Leaf {
        width: u32,
        constant: Option<u64>,
        var: Option<String>,
    },
    Node {
        op: String,
        width: u32,
        kids: Vec<Rc<dyn Expr>>,
    },
}

impl Owned {
    fn copy_of(expr: &dyn Expr) -> Rc<dyn Expr> {
        if expr.as_constant().is_some() || expr.variable_name().is_some() {
            Rc::new(Owned::Leaf {
                width: expr.bit_width(),
                constant: expr.as_constant(),
                var: expr.variable_name().map(str::to_owned),
            })
        } else {
            Rc::new(Owned::Node {
                op: expr.op_name().to_owned(),
                width: expr.bit_width(),
                kids: expr.operands(),
            })
        }
    }
}

impl Expr for Owned {
    fn op_name(&self) -> &str {
        match self {
            Owned::Leaf { .. } => "BVV",
            Owned::Node { op, .. } => op,
        }
    }
    fn operands(&self) -> Vec<Rc<dyn Expr>> {
        match self {
            Owned::Leaf { .. } => vec![],
            Owned::Node { kids, .. } => kids.clone(),
        }
    }
    fn bit_width(&self) -> u32 {
        match self {
            Owned::Leaf { width, .. } | Owned::Node { width, .. } => *width,
        }
    }
    fn as_constant(&self) -> Option<u64> {
        match self {
            Owned::Leaf { constant, .. } => *constant,
            Owned::Node { .. } => None,
        }
    }
    fn variable_name(&self) -> Option<&str> {
        match self {
            Owned::Leaf { var, .. } => var.as_deref(),
            Owned::Node { .. } => None,
        }
    }
}

/// Recursively refine `domain` against `formula`. `negated` flips the
/// sense of any comparison reached (propagated through `Not`, and through
/// De Morgan's laws at `And`/`Or`).
fn refine(
    formula: &dyn Expr,
    var_name: &str,
    domain: &StridedInterval,
    policy: &Policy,
    negated: bool,
) -> Result<StridedInterval, DomainError> {
    match formula.op_name() {
        "Not" => refine(formula.operands()[0].as_ref(), var_name, domain, policy, !negated),
        // De Morgan: ¬(A ∧ B) = ¬A ∨ ¬B, so a negated And behaves like Or.
        "And" if !negated => {
            let mut acc = domain.clone();
            for op in formula.operands() {
                acc = refine(op.as_ref(), var_name, &acc, policy, negated)?;
            }
            Ok(acc)
        }
        "Or" if negated => {
            let mut acc = domain.clone();
            for op in formula.operands() {
                acc = refine(op.as_ref(), var_name, &acc, policy, negated)?;
            }
            Ok(acc)
        }
        "And" | "Or" => {
            let mut joined: Option<StridedInterval> = None;
            for op in formula.operands() {
                let branch = refine(op.as_ref(), var_name, domain, policy, negated)?;
                joined = Some(match joined {
                    None => branch,
                    Some(acc) => acc.union(&branch),
                });
            }
            Ok(joined.unwrap_or_else(|| domain.clone()))
        }
        cmp if is_comparison(cmp) => refine_comparison(cmp, formula, var_name, domain, policy, negated),
        _ => Ok(domain.clone()),
    }
}

fn is_comparison(op: &str) -> bool {
    matches!(
        op,
        "Eq" | "Ne" | "ULT" | "ULE" | "UGT" | "UGE" | "SLT" | "SLE" | "SGT" | "SGE"
    )
}

/// Only handles the case where one operand is exactly the variable leaf
/// and the other evaluates to a concrete constant; anything richer on
/// either side falls back to leaving `domain` unrefined.
fn refine_comparison(
    op: &str,
    formula: &dyn Expr,
    var_name: &str,
    domain: &StridedInterval,
    policy: &Policy,
    negated: bool,
) -> Result<StridedInterval, DomainError> {
    let ops = formula.operands();
    if ops.len() != 2 {
        return Ok(domain.clone());
    }
    let w = domain.width();
    let env = Environment::new();
    let op = if negated { negated_op(op) } else { op };
    let lhs_is_var = ops[0].variable_name() == Some(var_name);
    let rhs_is_var = ops[1].variable_name() == Some(var_name);

    if lhs_is_var {
        let rhs = eval(ops[1].as_ref(), &env, policy)?.to_si();
        Ok(intersect_with_bound(domain, op, &rhs, true, w))
    } else if rhs_is_var {
        let lhs = eval(ops[0].as_ref(), &env, policy)?.to_si();
        Ok(intersect_with_bound(domain, op, &lhs, false, w))
    } else {
        Ok(domain.clone())
    }
}

fn negated_op(op: &str) -> &'static str {
    match op {
        "Eq" => "Ne",
        "Ne" => "Eq",
        "ULT" => "UGE",
        "ULE" => "UGT",
        "UGT" => "ULE",
        "UGE" => "ULT",
        "SLT" => "SGE",
        "SLE" => "SGT",
        "SGT" => "SLE",
        "SGE" => "SLT",
        // Only ever called on a mnemonic `is_comparison` already accepted.
        _ => "Ne",
    }
}

/// Intersect `domain` with the range implied by `var OP bound` (when
/// `var_is_lhs`) or `bound OP var` otherwise, for a constant `bound`.
fn intersect_with_bound(domain: &StridedInterval, op: &str, bound: &StridedInterval, var_is_lhs: bool, w: u32) -> StridedInterval {
    if !bound.is_singleton() {
        return domain.clone();
    }
    let c = bound.lower();
    let range = match (op, var_is_lhs) {
        ("Eq", _) => StridedInterval::singleton(w, c),
        ("Ne", _) => return exclude_singleton(domain, w, c),
        ("ULT", true) | ("UGT", false) => bounded_unsigned(w, 0, c.wrapping_sub(1)),
        ("ULE", true) | ("UGE", false) => bounded_unsigned(w, 0, c),
        ("UGT", true) | ("ULT", false) => bounded_unsigned(w, c.wrapping_add(1), mask(w)),
        ("UGE", true) | ("ULE", false) => bounded_unsigned(w, c, mask(w)),
        ("SLT", true) | ("SGT", false) => bounded_signed(w, signed_min(w), to_signed(w, c) - 1),
        ("SLE", true) | ("SGE", false) => bounded_signed(w, signed_min(w), to_signed(w, c)),
        ("SGT", true) | ("SLT", false) => bounded_signed(w, to_signed(w, c) + 1, signed_max(w)),
        ("SGE", true) | ("SLE", false) => bounded_signed(w, to_signed(w, c), signed_max(w)),
        _ => return domain.clone(),
    };
    domain.intersection(&range)
}

fn signed_min(w: u32) -> i64 {
    if w >= 64 {
        i64::MIN
    } else {
        -(1i64 << (w - 1))
    }
}

fn signed_max(w: u32) -> i64 {
    if w >= 64 {
        i64::MAX
    } else {
        (1i64 << (w - 1)) - 1
    }
}

/// `domain` with `c` removed from its stride-progression. Exact when `c` is
/// one of `domain`'s two endpoints (the progression just shrinks by one
/// stride step from that end); when `c` is an interior element, a single
/// `StridedInterval` can't represent the resulting hole, so `domain` is
/// returned unrefined — sound, just less precise (see module doc: giving up
/// here is always a safe answer).
fn exclude_singleton(domain: &StridedInterval, w: u32, c: u64) -> StridedInterval {
    if !domain.contains(c) {
        return domain.clone();
    }
    if domain.is_singleton() {
        return StridedInterval::empty(w);
    }
    let stride = domain.stride();
    if c == domain.lower() {
        let new_lower = domain.lower().wrapping_add(stride) & mask(w);
        return StridedInterval::new(w, stride, new_lower, domain.upper()).unwrap_or_else(|_| StridedInterval::empty(w));
    }
    if c == domain.upper() {
        let new_upper = domain.upper().wrapping_sub(stride) & mask(w);
        return StridedInterval::new(w, stride, domain.lower(), new_upper).unwrap_or_else(|_| StridedInterval::empty(w));
    }
    domain.clone()
}

fn bounded_unsigned(w: u32, lo: u64, hi: u64) -> StridedInterval {
    if lo > hi {
        return StridedInterval::empty(w);
    }
    StridedInterval::new(w, 1, lo, hi).unwrap_or_else(|_| StridedInterval::top(w))
}

fn bounded_signed(w: u32, lo: i64, hi: i64) -> StridedInterval {
    if lo > hi {
        return StridedInterval::empty(w);
    }
    let lo_u = from_signed_wide(w, lo as i128);
    let hi_u = from_signed_wide(w, hi as i128);
    StridedInterval::new(w, 1, lo_u, hi_u).unwrap_or_else(|_| StridedInterval::top(w))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    struct Leaf {
        width: u32,
        constant: Option<u64>,
        var: Option<String>,
    }
    struct Bin {
        op: &'static str,
        width: u32,
        a: Rc<dyn Expr>,
        b: Rc<dyn Expr>,
    }

    impl Expr for Leaf {
        fn op_name(&self) -> &str {
            "BVV"
        }
        fn operands(&self) -> Vec<Rc<dyn Expr>> {
            vec![]
        }
        fn bit_width(&self) -> u32 {
            self.width
        }
        fn as_constant(&self) -> Option<u64> {
            self.constant
        }
        fn variable_name(&self) -> Option<&str> {
            self.var.as_deref()
        }
    }
    impl Expr for Bin {
        fn op_name(&self) -> &str {
            self.op
        }
        fn operands(&self) -> Vec<Rc<dyn Expr>> {
            vec![self.a.clone(), self.b.clone()]
        }
        fn bit_width(&self) -> u32 {
            self.width
        }
    }

    fn var(width: u32, name: &str) -> Rc<dyn Expr> {
        Rc::new(Leaf {
            width,
            constant: None,
            var: Some(name.to_string()),
        })
    }

    fn konst(width: u32, value: u64) -> Rc<dyn Expr> {
        Rc::new(Leaf {
            width,
            constant: Some(value),
            var: None,
        })
    }

    #[test]
    fn refines_unsigned_less_than() {
        let formula = Bin {
            op: "ULT",
            width: 1,
            a: var(32, "x"),
            b: konst(32, 10),
        };
        let domain = StridedInterval::top(32);
        let refined = constraint_to_si(&formula, "x", &domain, &Policy::default()).unwrap();
        assert_eq!(refined.lower(), 0);
        assert_eq!(refined.upper(), 9);
    }

    #[test]
    fn equality_collapses_to_singleton() {
        let formula = Bin {
            op: "Eq",
            width: 1,
            a: var(8, "x"),
            b: konst(8, 5),
        };
        let domain = StridedInterval::top(8);
        let refined = constraint_to_si(&formula, "x", &domain, &Policy::default()).unwrap();
        assert!(refined.identical(&StridedInterval::singleton(8, 5)));
    }

    #[test]
    fn negated_less_than_becomes_greater_equal() {
        let formula = Bin {
            op: "ULT",
            width: 1,
            a: var(8, "x"),
            b: konst(8, 10),
        };
        let not_formula = NotNode(Rc::new(formula));
        let domain = StridedInterval::top(8);
        let refined = constraint_to_si(&not_formula, "x", &domain, &Policy::default()).unwrap();
        assert_eq!(refined.lower(), 10);
        assert_eq!(refined.upper(), 0xff);
    }

    #[test]
    fn conjunction_intersects_both_bounds() {
        let lower = Bin {
            op: "UGE",
            width: 1,
            a: var(8, "x"),
            b: konst(8, 5),
        };
        let upper = Bin {
            op: "ULT",
            width: 1,
            a: var(8, "x"),
            b: konst(8, 20),
        };
        struct And2(Rc<dyn Expr>, Rc<dyn Expr>);
        impl Expr for And2 {
            fn op_name(&self) -> &str {
                "And"
            }
            fn operands(&self) -> Vec<Rc<dyn Expr>> {
                vec![self.0.clone(), self.1.clone()]
            }
            fn bit_width(&self) -> u32 {
                1
            }
        }
        let formula = And2(Rc::new(lower), Rc::new(upper));
        let domain = StridedInterval::top(8);
        let refined = constraint_to_si(&formula, "x", &domain, &Policy::default()).unwrap();
        assert_eq!(refined.lower(), 5);
        assert_eq!(refined.upper(), 19);
    }

    #[test]
    fn ne_excludes_endpoint_shrinks_progression() {
        let formula = Bin {
            op: "Ne",
            width: 1,
            a: var(32, "x"),
            b: konst(32, 0),
        };
        let domain = StridedInterval::new(32, 1, 0, 2).unwrap();
        let refined = constraint_to_si(&formula, "x", &domain, &Policy::default()).unwrap();
        assert!(refined.identical(&StridedInterval::new(32, 1, 1, 2).unwrap()));
    }

    struct IfNode {
        cond: Rc<dyn Expr>,
        t: u64,
        f: u64,
    }
    impl Expr for IfNode {
        fn op_name(&self) -> &str {
            "If"
        }
        fn operands(&self) -> Vec<Rc<dyn Expr>> {
            vec![
                self.cond.clone(),
                Rc::new(Leaf {
                    width: 1,
                    constant: Some(self.t),
                    var: None,
                }),
                Rc::new(Leaf {
                    width: 1,
                    constant: Some(self.f),
                    var: None,
                }),
            ]
        }
        fn bit_width(&self) -> u32 {
            1
        }
    }

    struct ZeroExtNode {
        inner: Rc<dyn Expr>,
        amount: u32,
        width: u32,
    }
    impl Expr for ZeroExtNode {
        fn op_name(&self) -> &str {
            "ZeroExt"
        }
        fn operands(&self) -> Vec<Rc<dyn Expr>> {
            vec![self.inner.clone()]
        }
        fn bit_width(&self) -> u32 {
            self.width
        }
        fn extend_amount(&self) -> Option<u32> {
            Some(self.amount)
        }
    }

    #[test]
    fn ne_reencoded_false_side_refines_to_complement() {
        // The false side of a re-encoded boolean arrives as
        // `Ne(ZeroExt(If(cond, 1, 0)), 1)` rather than `Eq(..., 0)`; both
        // must refine the domain to cond's complement.
        let cond = Bin {
            op: "ULT",
            width: 1,
            a: var(64, "x"),
            b: konst(64, 100),
        };
        let if_node = IfNode {
            cond: Rc::new(cond),
            t: 1,
            f: 0,
        };
        let zext = ZeroExtNode {
            inner: Rc::new(if_node),
            amount: 63,
            width: 64,
        };
        let outer = Bin {
            op: "Ne",
            width: 1,
            a: Rc::new(zext),
            b: konst(64, 1),
        };
        let domain = StridedInterval::top(64);
        let refined = constraint_to_si(&outer, "x", &domain, &Policy::default()).unwrap();
        assert_eq!(refined.lower(), 100);
        assert_eq!(refined.upper(), mask(64));
    }
}
