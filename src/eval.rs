//! Recursive evaluation of an externally-owned expression tree into the
//! abstract domain. The tree itself — node representation, hash-consing,
//! parsing — is someone else's concern; this module only needs the shape
//! described in `Expr`.

use std::collections::HashMap;
use std::rc::Rc;

use crate::abstract_value::AbstractValue;
use crate::bool_result::BoolResult;
use crate::error::DomainError;
use crate::policy::Policy;
use crate::strided_interval::StridedInterval;

/// The minimal surface a foreign expression node must expose for this
/// crate to fold it into an `AbstractValue`. Leaves are either a concrete
/// constant ([`Expr::as_constant`]) or a free variable
/// ([`Expr::variable_name`]); everything else is an `op_name` applied to
/// `operands`.
pub trait Expr {
    /// Operator mnemonic, e.g. `"Add"`, `"Extract"`, `"If"`. Leaves (both
    /// constants and variables) report `"BVV"` / `"BVS"` respectively by
    /// convention, but this module only inspects `op_name` for internal
    /// nodes — leaves are recognized via `as_constant`/`variable_name`
    /// first.
    fn op_name(&self) -> &str;

    /// Child nodes, in operator-defined order.
    fn operands(&self) -> Vec<Rc<dyn Expr>>;

    /// Result width of this node, in bits.
    fn bit_width(&self) -> u32;

    /// `Some(v)` if this node is a concrete constant.
    fn as_constant(&self) -> Option<u64> {
        None
    }

    /// `Some(name)` if this node is a free (symbolic) variable; distinct
    /// occurrences of the same name denote the same unknown value.
    fn variable_name(&self) -> Option<&str> {
        None
    }

    /// For an `Extract` node: `(high_bit, low_bit)` inclusive.
    fn extract_bounds(&self) -> Option<(u32, u32)> {
        None
    }

    /// For a `ZeroExt`/`SignExt` node: how many bits are being added.
    fn extend_amount(&self) -> Option<u32> {
        None
    }
}

/// Bindings for free variables seen during evaluation. A variable absent
/// from the environment evaluates to `Top` at its node's declared width.
#[derive(Debug, Default, Clone)]
pub struct Environment {
    bindings: HashMap<String, AbstractValue>,
}

impl Environment {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, name: impl Into<String>, value: AbstractValue) {
        self.bindings.insert(name.into(), value);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AbstractValue> {
        self.bindings.get(name)
    }
}

/// Fold `expr` into an `AbstractValue` under `env` and `policy`. Unknown
/// operator names degrade to `Top` at the node's width rather than erroring:
/// an opaque expression language necessarily outgrows whatever operator set
/// this module special-cases.
pub fn eval(expr: &dyn Expr, env: &Environment, policy: &Policy) -> Result<AbstractValue, DomainError> {
    let w = expr.bit_width();

    if let Some(c) = expr.as_constant() {
        return Ok(AbstractValue::Si(StridedInterval::singleton(w, c)));
    }
    if let Some(name) = expr.variable_name() {
        return Ok(env.get(name).cloned().unwrap_or_else(|| AbstractValue::Si(StridedInterval::top(w))));
    }

    let op = expr.op_name();
    let operands = expr.operands();

    match op {
        "Extract" => {
            let (hi, lo) = expr.extract_bounds().ok_or_else(|| DomainError::InvalidSi {
                reason: "Extract node missing bit bounds".into(),
            })?;
            let inner = eval(operands[0].as_ref(), env, policy)?;
            Ok(AbstractValue::Si(inner.to_si().extract(hi, lo)?))
        }
        "ZeroExt" => {
            let n = expr.extend_amount().unwrap_or(0);
            let inner = eval(operands[0].as_ref(), env, policy)?;
            Ok(AbstractValue::Si(inner.to_si().zero_extend(n)))
        }
        "SignExt" => {
            let n = expr.extend_amount().unwrap_or(0);
            let inner = eval(operands[0].as_ref(), env, policy)?;
            Ok(AbstractValue::Si(inner.to_si().sign_extend(n)))
        }
        "Concat" => {
            let hi = eval(operands[0].as_ref(), env, policy)?;
            let lo = eval(operands[1].as_ref(), env, policy)?;
            Ok(AbstractValue::Si(hi.to_si().concat(&lo.to_si())?))
        }
        "Not" | "BitNot" | "__invert__" => {
            let inner = eval(operands[0].as_ref(), env, policy)?;
            Ok(AbstractValue::Si(inner.to_si().bitnot()))
        }
        "If" => {
            let cond = eval(operands[0].as_ref(), env, policy)?;
            let t = eval(operands[1].as_ref(), env, policy)?;
            let f = eval(operands[2].as_ref(), env, policy)?;
            let cond_br = cond_to_bool_result(&cond);
            Ok(AbstractValue::from(crate::if_proxy::IfProxy::new(cond_br, t.to_si(), f.to_si())))
        }
        binary_arith if BINARY_ARITH_OPS.contains(&binary_arith) => {
            let a = eval(operands[0].as_ref(), env, policy)?;
            let b = eval(operands[1].as_ref(), env, policy)?;
            a.binop(&b, policy, arith_fn(binary_arith))
        }
        comparison if COMPARISON_OPS.contains(&comparison) => {
            let a = eval(operands[0].as_ref(), env, policy)?;
            let b = eval(operands[1].as_ref(), env, policy)?;
            let result = compare(comparison, &a, &b)?;
            Ok(AbstractValue::Si(bool_result_to_si(result)))
        }
        _ => {
            tracing::trace!(op = op, width = w, "unknown operator, degrading to Top");
            Ok(AbstractValue::Si(StridedInterval::top(w)))
        }
    }
}

const BINARY_ARITH_OPS: &[&str] = &[
    "Add", "Sub", "Mul", "UDiv", "URem", "Shl", "LShr", "And", "Or", "Xor",
];

const COMPARISON_OPS: &[&str] = &[
    "Eq", "Ne", "ULT", "ULE", "UGT", "UGE", "SLT", "SLE", "SGT", "SGE",
];

type SiBinOp = fn(&StridedInterval, &StridedInterval) -> Result<StridedInterval, DomainError>;

fn arith_fn(name: &str) -> SiBinOp {
    match name {
        "Add" => StridedInterval::add,
        "Sub" => StridedInterval::sub,
        "Mul" => StridedInterval::mul,
        "UDiv" => StridedInterval::udiv,
        "URem" => StridedInterval::urem,
        "And" => StridedInterval::bitand,
        "Or" => StridedInterval::bitor,
        "Xor" => StridedInterval::bitxor,
        "Shl" => shl_from_singleton,
        "LShr" => lshr_from_singleton,
        _ => unreachable!("arith_fn called with non-arithmetic op {name}"),
    }
}

fn shl_from_singleton(a: &StridedInterval, b: &StridedInterval) -> Result<StridedInterval, DomainError> {
    let k = b.lower().min(u32::MAX as u64) as u32;
    a.shl(k)
}

fn lshr_from_singleton(a: &StridedInterval, b: &StridedInterval) -> Result<StridedInterval, DomainError> {
    let k = b.lower().min(u32::MAX as u64) as u32;
    a.lshr(k)
}

fn compare(name: &str, a: &AbstractValue, b: &AbstractValue) -> Result<BoolResult, DomainError> {
    let sa = a.to_si();
    let sb = b.to_si();
    match name {
        "Eq" => sa.eq_si(&sb),
        "Ne" => sa.ne_si(&sb),
        "ULT" => sa.ult(&sb),
        "ULE" => sa.ule(&sb),
        "UGT" => sa.ugt(&sb),
        "UGE" => sa.uge(&sb),
        "SLT" => sa.slt(&sb),
        "SLE" => sa.sle(&sb),
        "SGT" => sa.sgt(&sb),
        "SGE" => sa.sge(&sb),
        _ => unreachable!("compare called with non-comparison op {name}"),
    }
}

fn bool_result_to_si(b: BoolResult) -> StridedInterval {
    match b {
        BoolResult::True => StridedInterval::singleton(1, 1),
        BoolResult::False => StridedInterval::singleton(1, 0),
        BoolResult::Maybe => StridedInterval::top(1),
    }
}

fn cond_to_bool_result(cond: &AbstractValue) -> BoolResult {
    let si = cond.to_si();
    if si.is_singleton() {
        BoolResult::from_bool(si.lower() != 0)
    } else if !si.contains(0) {
        BoolResult::True
    } else if si.cardinality() == 1 {
        BoolResult::False
    } else {
        BoolResult::Maybe
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Leaf {
        width: u32,
        constant: Option<u64>,
        var: Option<String>,
    }

    struct Node {
        op: &'static str,
        width: u32,
        kids: Vec<Rc<dyn Expr>>,
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

    impl Expr for Node {
        fn op_name(&self) -> &str {
            self.op
        }
        fn operands(&self) -> Vec<Rc<dyn Expr>> {
            self.kids.clone()
        }
        fn bit_width(&self) -> u32 {
            self.width
        }
    }

    #[test]
    fn evaluates_constant_addition() {
        let a: Rc<dyn Expr> = Rc::new(Leaf {
            width: 32,
            constant: Some(10),
            var: None,
        });
        let b: Rc<dyn Expr> = Rc::new(Leaf {
            width: 32,
            constant: Some(5),
            var: None,
        });
        let add = Node {
            op: "Add",
            width: 32,
            kids: vec![a, b],
        };
        let env = Environment::new();
        let result = eval(&add, &env, &Policy::default()).unwrap();
        assert!(result.to_si().identical(&StridedInterval::singleton(32, 15)));
    }

    #[test]
    fn unbound_variable_is_top() {
        let leaf = Leaf {
            width: 16,
            constant: None,
            var: Some("x".into()),
        };
        let env = Environment::new();
        let result = eval(&leaf, &env, &Policy::default()).unwrap();
        assert!(result.to_si().is_top());
    }

    #[test]
    fn unknown_op_degrades_to_top() {
        let leaf: Rc<dyn Expr> = Rc::new(Leaf {
            width: 8,
            constant: Some(1),
            var: None,
        });
        let node = Node {
            op: "FancyFutureOp",
            width: 8,
            kids: vec![leaf],
        };
        let env = Environment::new();
        let result = eval(&node, &env, &Policy::default()).unwrap();
        assert!(result.to_si().is_top());
    }
}
