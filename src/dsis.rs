//! `DiscreteStridedIntervalSet`: a bounded disjunction of
//! [`StridedInterval`]s, used when a join would otherwise lose more
//! precision than the active [`Policy`] is willing to pay for.

use itertools::Itertools;

use crate::bool_result::BoolResult;
use crate::error::DomainError;
use crate::policy::Policy;
use crate::strided_interval::StridedInterval;

/// A set of strided intervals, all at the same bit-width, none of which is
/// the empty interval. Once the member count would exceed the policy's
/// `dsis_limit`, the set collapses to a single joined `StridedInterval`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscreteStridedIntervalSet {
    width: u32,
    members: Vec<StridedInterval>,
}

impl DiscreteStridedIntervalSet {
    /// Build a set from member intervals, deduplicating and sorting for a
    /// canonical representation. All members must share `w`; returns
    /// `DomainError::WidthMismatch` otherwise. Empty members are dropped
    /// silently (an empty SI contributes nothing to the union).
    pub fn new(width: u32, members: impl IntoIterator<Item = StridedInterval>) -> Result<Self, DomainError> {
        let mut out: Vec<StridedInterval> = Vec::new();
        for m in members {
            if m.width() != width {
                return Err(DomainError::WidthMismatch {
                    lhs: width,
                    rhs: m.width(),
                });
            }
            if m.is_empty() {
                continue;
            }
            if !out.iter().any(|existing| existing.identical(&m)) {
                out.push(m);
            }
        }
        out.sort_by(|a, b| (a.lower(), a.upper(), a.stride()).cmp(&(b.lower(), b.upper(), b.stride())));
        Ok(Self { width, members: out })
    }

    #[must_use]
    pub fn singleton_si(si: StridedInterval) -> Self {
        let width = si.width();
        if si.is_empty() {
            Self { width, members: vec![] }
        } else {
            Self {
                width,
                members: vec![si],
            }
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn members(&self) -> &[StridedInterval] {
        &self.members
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether this set has already collapsed to (at most) one member
    /// spanning everything, i.e. behaves exactly like a bare
    /// `StridedInterval` from here on.
    #[must_use]
    pub fn is_collapsed(&self) -> bool {
        self.members.len() <= 1
    }

    /// The single strided interval this set collapses to: the join of all
    /// members.
    #[must_use]
    pub fn collapse(&self) -> StridedInterval {
        let mut iter = self.members.iter();
        match iter.next() {
            None => StridedInterval::empty(self.width),
            Some(first) => iter.fold(first.clone(), |acc, m| acc.union(m)),
        }
    }

    #[must_use]
    pub fn cardinality(&self) -> u128 {
        self.members.iter().map(StridedInterval::cardinality).sum()
    }

    #[must_use]
    pub fn contains(&self, v: u64) -> bool {
        self.members.iter().any(|m| m.contains(v))
    }

    /// Join two sets under `policy`: union the member lists, then collapse
    /// to a single SI if the result would exceed `dsis_limit` or if
    /// `allow_dsis` is false.
    #[must_use]
    pub fn join(&self, other: &Self, policy: &Policy) -> Self {
        if self.width != other.width {
            return Self::singleton_si(StridedInterval::top(self.width.max(other.width)));
        }
        let mut all: Vec<StridedInterval> = self.members.iter().chain(other.members.iter()).cloned().collect();
        all = coalesce(all);
        if !policy.allow_dsis || all.len() > policy.dsis_limit {
            let joined = all.into_iter().reduce(|a, b| a.union(&b)).unwrap_or_else(|| StridedInterval::empty(self.width));
            tracing::trace!(width = self.width, "discrete strided interval set collapsed on join");
            return Self::singleton_si(joined);
        }
        Self::new(self.width, all).expect("widths already checked equal")
    }

    /// Apply a fallible unary `StridedInterval` operation to every member,
    /// re-coalescing the results (used by extract/zero_extend/sign_extend
    /// style callers through the dispatch layer).
    pub fn map(&self, f: impl Fn(&StridedInterval) -> Result<StridedInterval, DomainError>) -> Result<Self, DomainError> {
        let mut out = Vec::with_capacity(self.members.len());
        for m in &self.members {
            out.push(f(m)?);
        }
        let width = out.first().map(StridedInterval::width).unwrap_or(self.width);
        Self::new(width, out)
    }

    /// Cross-product a binary `StridedInterval` operation over every pair
    /// of members from `self` and `other`, re-coalescing afterward under
    /// `policy`.
    pub fn cross(
        &self,
        other: &Self,
        policy: &Policy,
        f: impl Fn(&StridedInterval, &StridedInterval) -> Result<StridedInterval, DomainError>,
    ) -> Result<Self, DomainError> {
        let mut out = Vec::with_capacity(self.members.len() * other.members.len());
        for a in &self.members {
            for b in &other.members {
                out.push(f(a, b)?);
            }
        }
        let width = out.first().map(StridedInterval::width).unwrap_or(self.width.max(other.width));
        let built = Self::new(width, out)?;
        if !policy.allow_dsis || built.members.len() > policy.dsis_limit {
            return Ok(Self::singleton_si(built.collapse()));
        }
        Ok(built)
    }

    /// Cross-product comparison, joining every pairwise `BoolResult` via
    /// Kleene `or` (true if *any* pair satisfies it, `Maybe` if some pairs
    /// disagree, `False` only if every pair disagrees).
    pub fn cross_compare(
        &self,
        other: &Self,
        f: impl Fn(&StridedInterval, &StridedInterval) -> Result<BoolResult, DomainError>,
    ) -> Result<BoolResult, DomainError> {
        let mut any_true = false;
        let mut any_false = false;
        for a in &self.members {
            for b in &other.members {
                match f(a, b)? {
                    BoolResult::True => any_true = true,
                    BoolResult::False => any_false = true,
                    BoolResult::Maybe => {
                        any_true = true;
                        any_false = true;
                    }
                }
            }
        }
        Ok(match (any_true, any_false) {
            (true, false) => BoolResult::True,
            (false, true) => BoolResult::False,
            _ => BoolResult::Maybe,
        })
    }
}

/// Merge members that are identical, keeping the member list from growing
/// with redundant entries across repeated joins.
fn coalesce(members: Vec<StridedInterval>) -> Vec<StridedInterval> {
    members
        .into_iter()
        .filter(|m| !m.is_empty())
        .unique_by(|m| (m.width(), m.stride(), m.lower(), m.upper()))
        .collect_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_stays_discrete_under_limit() {
        let a = DiscreteStridedIntervalSet::singleton_si(StridedInterval::singleton(8, 5));
        let b = DiscreteStridedIntervalSet::singleton_si(StridedInterval::singleton(8, 200));
        let policy = Policy::default();
        let joined = a.join(&b, &policy);
        assert_eq!(joined.members().len(), 2);
        assert!(joined.contains(5));
        assert!(joined.contains(200));
        assert!(!joined.contains(6));
    }

    #[test]
    fn join_collapses_past_limit() {
        let policy = Policy::new(true, 2);
        let a = DiscreteStridedIntervalSet::new(
            8,
            [StridedInterval::singleton(8, 1), StridedInterval::singleton(8, 2)],
        )
        .unwrap();
        let b = DiscreteStridedIntervalSet::singleton_si(StridedInterval::singleton(8, 3));
        let joined = a.join(&b, &policy);
        assert!(joined.is_collapsed());
        assert!(joined.contains(1));
        assert!(joined.contains(2));
        assert!(joined.contains(3));
    }

    #[test]
    fn join_disabled_by_policy_always_collapses() {
        let policy = Policy::new(false, 10);
        let a = DiscreteStridedIntervalSet::singleton_si(StridedInterval::singleton(8, 1));
        let b = DiscreteStridedIntervalSet::singleton_si(StridedInterval::singleton(8, 2));
        let joined = a.join(&b, &policy);
        assert!(joined.is_collapsed());
    }

    #[test]
    fn cross_product_arithmetic() {
        let a = DiscreteStridedIntervalSet::new(
            8,
            [StridedInterval::singleton(8, 1), StridedInterval::singleton(8, 10)],
        )
        .unwrap();
        let b = DiscreteStridedIntervalSet::singleton_si(StridedInterval::singleton(8, 5));
        let policy = Policy::default();
        let result = a.cross(&b, &policy, |x, y| x.add(y)).unwrap();
        assert!(result.contains(6));
        assert!(result.contains(15));
    }
}
