//! `IfProxy`: a three-valued conditional wrapper `⟨cond, trueexpr,
//! falseexpr⟩` that distributes arithmetic and bitwise operations through
//! both of its branches without forcing the condition to resolve.

use crate::bool_result::BoolResult;
use crate::error::DomainError;
use crate::strided_interval::StridedInterval;

/// Wraps a condition together with the value each branch of that condition
/// would take. A crisp (`True`/`False`) condition collapses immediately to
/// the matching branch; a `Maybe` condition keeps both branches live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfProxy {
    cond: BoolResult,
    trueexpr: StridedInterval,
    falseexpr: StridedInterval,
}

impl IfProxy {
    /// Construct `⟨cond, trueexpr, falseexpr⟩`, collapsing immediately if
    /// `cond` is crisp (a crisp `IfProxy` carries no information the
    /// matching branch alone doesn't).
    #[must_use]
    pub fn new(cond: BoolResult, trueexpr: StridedInterval, falseexpr: StridedInterval) -> Self {
        Self {
            cond,
            trueexpr,
            falseexpr,
        }
    }

    #[must_use]
    pub fn cond(&self) -> BoolResult {
        self.cond
    }

    #[must_use]
    pub fn true_expr(&self) -> &StridedInterval {
        &self.trueexpr
    }

    #[must_use]
    pub fn false_expr(&self) -> &StridedInterval {
        &self.falseexpr
    }

    /// Collapse to a single `StridedInterval`: the matching branch if the
    /// condition is crisp, otherwise the join of both branches (the sound
    /// over-approximation once the condition's truth is unknown).
    #[must_use]
    pub fn resolve(&self) -> StridedInterval {
        match self.cond {
            BoolResult::True => self.trueexpr.clone(),
            BoolResult::False => self.falseexpr.clone(),
            BoolResult::Maybe => self.trueexpr.union(&self.falseexpr),
        }
    }

    fn width(&self) -> u32 {
        self.trueexpr.width().max(self.falseexpr.width())
    }

    /// Apply a unary `StridedInterval` operation to both branches,
    /// preserving the condition.
    pub fn map(&self, f: impl Fn(&StridedInterval) -> Result<StridedInterval, DomainError>) -> Result<Self, DomainError> {
        Ok(Self::new(self.cond, f(&self.trueexpr)?, f(&self.falseexpr)?))
    }

    /// Binary op between an `IfProxy` and a plain `StridedInterval`:
    /// distribute over both branches, same condition.
    pub fn map_with(
        &self,
        other: &StridedInterval,
        f: impl Fn(&StridedInterval, &StridedInterval) -> Result<StridedInterval, DomainError>,
    ) -> Result<Self, DomainError> {
        Ok(Self::new(self.cond, f(&self.trueexpr, other)?, f(&self.falseexpr, other)?))
    }

    /// Binary op between two `IfProxy`s. When the conditions agree (both
    /// crisp-equal, or structurally identical), the branch structure is
    /// preserved; otherwise the four-way cross product is joined per
    /// branch outcome, since no single condition describes the result.
    pub fn combine(
        &self,
        other: &Self,
        f: impl Fn(&StridedInterval, &StridedInterval) -> Result<StridedInterval, DomainError>,
    ) -> Result<Self, DomainError> {
        if self.cond == other.cond {
            return Ok(Self::new(
                self.cond,
                f(&self.trueexpr, &other.trueexpr)?,
                f(&self.falseexpr, &other.falseexpr)?,
            ));
        }
        // Conditions differ or are independent: fall back to the
        // conservative merge across all four branch pairings, with the
        // combined condition treated as unknown.
        let tt = f(&self.trueexpr, &other.trueexpr)?;
        let tf = f(&self.trueexpr, &other.falseexpr)?;
        let ft = f(&self.falseexpr, &other.trueexpr)?;
        let ff = f(&self.falseexpr, &other.falseexpr)?;
        let true_branch = tt.union(&tf);
        let false_branch = ft.union(&ff);
        Ok(Self::new(BoolResult::Maybe, true_branch, false_branch))
    }

    #[must_use]
    pub fn is_top(&self) -> bool {
        self.width() == self.trueexpr.width() && self.trueexpr.is_top() && self.falseexpr.is_top()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crisp_true_collapses() {
        let p = IfProxy::new(
            BoolResult::True,
            StridedInterval::singleton(32, 1),
            StridedInterval::singleton(32, 2),
        );
        assert!(p.resolve().identical(&StridedInterval::singleton(32, 1)));
    }

    #[test]
    fn maybe_join_covers_both_branches() {
        let p = IfProxy::new(
            BoolResult::Maybe,
            StridedInterval::singleton(32, 1),
            StridedInterval::singleton(32, 100),
        );
        let r = p.resolve();
        assert!(r.contains(1));
        assert!(r.contains(100));
    }

    #[test]
    fn map_with_distributes_addition() {
        let p = IfProxy::new(
            BoolResult::Maybe,
            StridedInterval::singleton(32, 1),
            StridedInterval::singleton(32, 100),
        );
        let offset = StridedInterval::singleton(32, 5);
        let r = p.map_with(&offset, |a, b| a.add(b)).unwrap();
        assert!(r.true_expr().identical(&StridedInterval::singleton(32, 6)));
        assert!(r.false_expr().identical(&StridedInterval::singleton(32, 105)));
    }

    #[test]
    fn combine_same_condition_preserves_branches() {
        let cond = BoolResult::Maybe;
        let a = IfProxy::new(cond, StridedInterval::singleton(32, 1), StridedInterval::singleton(32, 2));
        let b = IfProxy::new(cond, StridedInterval::singleton(32, 10), StridedInterval::singleton(32, 20));
        let r = a.combine(&b, |x, y| x.add(y)).unwrap();
        assert_eq!(r.cond(), cond);
        assert!(r.true_expr().identical(&StridedInterval::singleton(32, 11)));
        assert!(r.false_expr().identical(&StridedInterval::singleton(32, 22)));
    }
}
