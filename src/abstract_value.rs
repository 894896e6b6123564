//! `AbstractValue`: a tagged union of every abstract domain element, used
//! where the source relied on dynamic dispatch across `StridedInterval`,
//! `DiscreteStridedIntervalSet`, `ValueSet` and `IfProxy` subclasses.
//! Per the redesign note, that polymorphism is replaced here with an enum
//! and explicit per-variant dispatch.

use crate::bool_result::BoolResult;
use crate::dsis::DiscreteStridedIntervalSet;
use crate::error::DomainError;
use crate::if_proxy::IfProxy;
use crate::policy::Policy;
use crate::strided_interval::StridedInterval;
use crate::value_set::ValueSet;

/// Any value the domain can produce or consume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbstractValue {
    Si(StridedInterval),
    Dsis(DiscreteStridedIntervalSet),
    Vs(ValueSet),
    If(Box<IfProxy>),
}

impl From<StridedInterval> for AbstractValue {
    fn from(si: StridedInterval) -> Self {
        Self::Si(si)
    }
}

impl From<DiscreteStridedIntervalSet> for AbstractValue {
    fn from(d: DiscreteStridedIntervalSet) -> Self {
        Self::Dsis(d)
    }
}

impl From<ValueSet> for AbstractValue {
    fn from(v: ValueSet) -> Self {
        Self::Vs(v)
    }
}

impl From<IfProxy> for AbstractValue {
    fn from(p: IfProxy) -> Self {
        Self::If(Box::new(p))
    }
}

impl AbstractValue {
    #[must_use]
    pub fn width(&self) -> u32 {
        match self {
            Self::Si(si) => si.width(),
            Self::Dsis(d) => d.width(),
            Self::Vs(v) => v.width(),
            Self::If(p) => p.true_expr().width().max(p.false_expr().width()),
        }
    }

    /// Lower this value to a single `StridedInterval`, the most-collapsed
    /// common ground every variant can produce (used when a caller asks
    /// for a plain numeric answer regardless of which variant it holds).
    #[must_use]
    pub fn to_si(&self) -> StridedInterval {
        match self {
            Self::Si(si) => si.clone(),
            Self::Dsis(d) => d.collapse(),
            Self::Vs(v) => v.get_si(crate::value_set::GLOBAL_REGION),
            Self::If(p) => p.resolve(),
        }
    }

    /// Whether precision has degraded to the point of carrying no useful
    /// information: a `Top` SI, an already-collapsed-to-Top DSIS, or an
    /// `IfProxy` whose branches are both `Top`.
    #[must_use]
    pub fn is_top(&self) -> bool {
        match self {
            Self::Si(si) => si.is_top(),
            Self::Dsis(d) => d.is_collapsed() && d.collapse().is_top(),
            Self::Vs(_) => false,
            Self::If(p) => p.is_top(),
        }
    }

    /// Join two values under `policy`. Mismatched variants are lowered to
    /// `StridedInterval` before joining, mirroring the widening any
    /// dynamic-dispatch join would have to perform once it hits two
    /// genuinely different runtime types.
    #[must_use]
    pub fn join(&self, other: &Self, policy: &Policy) -> Self {
        match (self, other) {
            (Self::Si(a), Self::Si(b)) => Self::Si(a.union(b)),
            (Self::Dsis(a), Self::Dsis(b)) => Self::Dsis(a.join(b, policy)),
            (Self::Si(a), Self::Dsis(b)) | (Self::Dsis(b), Self::Si(a)) => {
                Self::Dsis(DiscreteStridedIntervalSet::singleton_si(a.clone()).join(b, policy))
            }
            (Self::Vs(a), Self::Vs(b)) => a
                .union(b)
                .map(Self::Vs)
                .unwrap_or_else(|_| Self::Si(StridedInterval::top(a.width().max(b.width())))),
            (Self::If(a), Self::If(b)) => {
                let resolved_a = a.resolve();
                let resolved_b = b.resolve();
                Self::Si(resolved_a.union(&resolved_b))
            }
            _ => Self::Si(self.to_si().union(&other.to_si())),
        }
    }

    /// Apply a named binary arithmetic/bitwise operation, dispatching on
    /// variant. Operations between a `ValueSet` and a bare `StridedInterval`
    /// are interpreted as "offset the pointer by this many bytes, keeping
    /// its region".
    pub fn binop(
        &self,
        other: &Self,
        policy: &Policy,
        f: impl Fn(&StridedInterval, &StridedInterval) -> Result<StridedInterval, DomainError> + Copy,
    ) -> Result<Self, DomainError> {
        match (self, other) {
            (Self::Si(a), Self::Si(b)) => Ok(Self::Si(f(a, b)?)),
            (Self::Dsis(a), Self::Dsis(b)) => Ok(Self::Dsis(a.cross(b, policy, f)?)),
            (Self::Si(a), Self::Dsis(b)) => {
                Ok(Self::Dsis(DiscreteStridedIntervalSet::singleton_si(a.clone()).cross(b, policy, f)?))
            }
            (Self::Dsis(a), Self::Si(b)) => {
                Ok(Self::Dsis(a.cross(&DiscreteStridedIntervalSet::singleton_si(b.clone()), policy, f)?))
            }
            (Self::Vs(a), Self::Si(b)) => {
                Ok(Self::Vs(a.combine_same_region(&ValueSet::from_si(b.clone()), f)?))
            }
            (Self::Si(a), Self::Vs(b)) => {
                Ok(Self::Vs(ValueSet::from_si(a.clone()).combine_same_region(b, f)?))
            }
            (Self::Vs(a), Self::Dsis(b)) => {
                Ok(Self::Vs(a.combine_same_region(&ValueSet::from_si(b.collapse()), f)?))
            }
            (Self::Dsis(a), Self::Vs(b)) => {
                Ok(Self::Vs(ValueSet::from_si(a.collapse()).combine_same_region(b, f)?))
            }
            (Self::If(p), other_val) if !matches!(other_val, Self::If(_)) => {
                let other_si = other_val.to_si();
                Ok(Self::If(Box::new(p.map_with(&other_si, f)?)))
            }
            (self_val, Self::If(p)) if !matches!(self_val, Self::If(_)) => {
                let self_si = self_val.to_si();
                let flipped = p.map_with(&self_si, move |branch, s| f(s, branch))?;
                Ok(Self::If(Box::new(flipped)))
            }
            (Self::If(a), Self::If(b)) => Ok(Self::If(Box::new(a.combine(b, f)?))),
            (Self::Vs(_), Self::Vs(_)) => Err(DomainError::RegionMismatch),
        }
    }

    /// Three-valued equality, dispatching on variant; mismatched variants
    /// fall back to comparing their `StridedInterval` lowering.
    pub fn eq_value(&self, other: &Self) -> Result<BoolResult, DomainError> {
        match (self, other) {
            (Self::Si(a), Self::Si(b)) => a.eq_si(b),
            (Self::Vs(a), Self::Vs(b)) => a.eq_vs(b),
            (Self::Dsis(a), Self::Dsis(b)) => {
                let sa = DiscreteStridedIntervalSet::singleton_si(a.collapse());
                let sb = DiscreteStridedIntervalSet::singleton_si(b.collapse());
                sa.cross_compare(&sb, |x, y| x.eq_si(y))
            }
            (Self::If(a), Self::If(b)) => a.resolve().eq_si(&b.resolve()),
            _ => self.to_si().eq_si(&other.to_si()),
        }
    }
}
