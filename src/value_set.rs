//! `ValueSet`: a region-tagged collection of [`StridedInterval`]s, used to
//! model pointer values whose base region (stack frame, heap object,
//! global segment, ...) matters independently of their numeric offset.

use std::collections::BTreeMap;

use crate::bool_result::BoolResult;
use crate::error::DomainError;
use crate::strided_interval::StridedInterval;

/// `{ region -> StridedInterval }`, all intervals sharing one bit-width.
/// A region absent from the map denotes "no known value in that region"
/// (bottom for that region), not "everything".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueSet {
    width: u32,
    regions: BTreeMap<String, StridedInterval>,
}

/// The region name used for plain, region-less numeric values lifted into
/// a `ValueSet` (e.g. via [`ValueSet::from_si`]).
pub const GLOBAL_REGION: &str = "global";

impl ValueSet {
    #[must_use]
    pub fn empty(width: u32) -> Self {
        Self {
            width,
            regions: BTreeMap::new(),
        }
    }

    /// Lift a bare strided interval into the `GLOBAL_REGION`.
    #[must_use]
    pub fn from_si(si: StridedInterval) -> Self {
        let width = si.width();
        let mut regions = BTreeMap::new();
        if !si.is_empty() {
            regions.insert(GLOBAL_REGION.to_string(), si);
        }
        Self { width, regions }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn regions(&self) -> impl Iterator<Item = &str> {
        self.regions.keys().map(String::as_str)
    }

    #[must_use]
    pub fn get_si(&self, region: &str) -> StridedInterval {
        self.regions
            .get(region)
            .cloned()
            .unwrap_or_else(|| StridedInterval::empty(self.width))
    }

    /// Join `si` into `region`, creating the region if absent.
    pub fn merge_si(&mut self, region: &str, si: StridedInterval) -> Result<(), DomainError> {
        if si.width() != self.width {
            return Err(DomainError::WidthMismatch {
                lhs: self.width,
                rhs: si.width(),
            });
        }
        if si.is_empty() {
            return Ok(());
        }
        let merged = match self.regions.get(region) {
            Some(existing) => existing.union(&si),
            None => si,
        };
        self.regions.insert(region.to_string(), merged);
        Ok(())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    fn check_width(&self, other: &Self) -> Result<u32, DomainError> {
        if self.width != other.width {
            Err(DomainError::WidthMismatch {
                lhs: self.width,
                rhs: other.width,
            })
        } else {
            Ok(self.width)
        }
    }

    /// Per-region union: each side's region contributes its own interval,
    /// joined where both sides hold the same region.
    pub fn union(&self, other: &Self) -> Result<Self, DomainError> {
        let w = self.check_width(other)?;
        let mut out = self.clone();
        out.width = w;
        for (region, si) in &other.regions {
            out.merge_si(region, si.clone())?;
        }
        Ok(out)
    }

    /// Apply a same-region arithmetic/bitwise operation: `self`'s regions
    /// combine only with an `other` value anchored to the *same* region,
    /// plus `other`'s `GLOBAL_REGION` offset applies to every region of
    /// `self` (pointer + integer offset keeps the pointer's region).
    pub fn combine_same_region(
        &self,
        other: &Self,
        f: impl Fn(&StridedInterval, &StridedInterval) -> Result<StridedInterval, DomainError>,
    ) -> Result<Self, DomainError> {
        let w = self.check_width(other)?;
        let mut out = Self::empty(w);
        let other_global = other.regions.get(GLOBAL_REGION);
        let self_global = self.regions.get(GLOBAL_REGION);
        for (region, si) in &self.regions {
            if let Some(other_si) = other.regions.get(region) {
                out.merge_si(region, f(si, other_si)?)?;
            }
            if region != GLOBAL_REGION {
                if let Some(g) = other_global {
                    out.merge_si(region, f(si, g)?)?;
                }
            }
        }
        if let Some(g) = self_global {
            for (region, other_si) in &other.regions {
                if region == GLOBAL_REGION {
                    out.merge_si(GLOBAL_REGION, f(g, other_si)?)?;
                } else {
                    out.merge_si(region, f(g, other_si)?)?;
                }
            }
        }
        Ok(out)
    }

    /// A same-region binary op between two `ValueSet`s where differing,
    /// non-global regions on both sides have no sound combination (e.g.
    /// subtracting two different pointers is meaningless without a common
    /// region). Returns `DomainError::RegionMismatch` in that case.
    pub fn require_common_region(&self, other: &Self) -> Result<(), DomainError> {
        self.check_width(other)?;
        let self_nonglobal: Vec<&str> = self.regions.keys().map(String::as_str).filter(|r| *r != GLOBAL_REGION).collect();
        let other_nonglobal: Vec<&str> = other.regions.keys().map(String::as_str).filter(|r| *r != GLOBAL_REGION).collect();
        if !self_nonglobal.is_empty() && !other_nonglobal.is_empty() && self_nonglobal != other_nonglobal {
            return Err(DomainError::RegionMismatch);
        }
        Ok(())
    }

    /// Three-valued equality: `True` only when both sides denote exactly
    /// one region with certainly-equal offsets; disjoint region sets yield
    /// `False`; anything else is `Maybe`.
    pub fn eq_vs(&self, other: &Self) -> Result<BoolResult, DomainError> {
        self.check_width(other)?;
        let shared: Vec<&String> = self.regions.keys().filter(|r| other.regions.contains_key(*r)).collect();
        if shared.is_empty() {
            return Ok(BoolResult::False);
        }
        let mut result = BoolResult::False;
        for region in shared {
            let a = &self.regions[region];
            let b = &other.regions[region];
            result = result.or(a.eq_si(b)?);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_joins_within_region() {
        let mut vs = ValueSet::empty(32);
        vs.merge_si("stack", StridedInterval::singleton(32, 10)).unwrap();
        vs.merge_si("stack", StridedInterval::singleton(32, 20)).unwrap();
        let si = vs.get_si("stack");
        assert!(si.contains(10));
        assert!(si.contains(20));
    }

    #[test]
    fn distinct_regions_stay_separate() {
        let mut vs = ValueSet::empty(32);
        vs.merge_si("stack", StridedInterval::singleton(32, 10)).unwrap();
        vs.merge_si("heap", StridedInterval::singleton(32, 999)).unwrap();
        assert!(vs.get_si("stack").contains(10));
        assert!(!vs.get_si("stack").contains(999));
        assert!(vs.get_si("heap").contains(999));
    }

    #[test]
    fn pointer_plus_global_offset_keeps_region() {
        let mut vs = ValueSet::empty(32);
        vs.merge_si("stack", StridedInterval::singleton(32, 100)).unwrap();
        let offset = ValueSet::from_si(StridedInterval::singleton(32, 4));
        let result = vs.combine_same_region(&offset, |a, b| a.add(b)).unwrap();
        assert!(result.get_si("stack").contains(104));
    }

    #[test]
    fn common_region_check_rejects_distinct_pointers() {
        let mut a = ValueSet::empty(32);
        a.merge_si("stack_a", StridedInterval::singleton(32, 1)).unwrap();
        let mut b = ValueSet::empty(32);
        b.merge_si("stack_b", StridedInterval::singleton(32, 2)).unwrap();
        assert!(a.require_common_region(&b).is_err());
    }
}
