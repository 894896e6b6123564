//! `StridedInterval`: a wrapped, modular interval over `w`-bit machine
//! integers, `⟨w⟩s[l, u]` denoting `{ (l + k·s) mod 2^w : 0 ≤ k ≤ card-1 }`.

use crate::bitvec::{
    complement, from_signed_wide, gcd as bv_gcd, mask, to_signed, wrap, wrapping_negate,
};
use crate::bool_result::BoolResult;
use crate::error::DomainError;

/// A strided interval, or the distinguished empty set at a given width.
///
/// `Empty` carries its width because every operation in the domain needs a
/// width even when it denotes no values (e.g. `Empty(32) + x` is still a
/// 32-bit operation).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StridedInterval {
    Empty(u32),
    Interval(Interval),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interval {
    width: u32,
    stride: u64,
    lower: u64,
    upper: u64,
    uninitialized: bool,
}

impl StridedInterval {
    /// The empty strided interval at width `w`.
    #[must_use]
    pub fn empty(w: u32) -> Self {
        Self::Empty(w)
    }

    /// `Top_w`, the unique `⟨w, 1, 0, 2^w-1⟩`.
    #[must_use]
    pub fn top(w: u32) -> Self {
        Self::build(w, 1, 0, mask(w))
    }

    /// A singleton strided interval from a concrete value (masked to `w`
    /// bits). Also serves as `BVV`: the source distinguishes a "concrete
    /// bitvector" tag from a generic singleton, but both denote exactly one
    /// value and every operation here treats them identically.
    #[must_use]
    pub fn singleton(w: u32, value: u64) -> Self {
        Self::build(w, 0, value, value)
    }

    /// Construct an explicit `⟨w, stride, lower, upper⟩`, validating the
    /// canonical-form invariants from the data model.
    pub fn new(w: u32, stride: u64, lower: u64, upper: u64) -> Result<Self, DomainError> {
        if !(1..=64).contains(&w) {
            return Err(DomainError::InvalidSi {
                reason: format!("width {w} out of range 1..=64"),
            });
        }
        let lower = wrap(w, lower);
        let upper = wrap(w, upper);
        if stride == 0 {
            if lower != upper {
                return Err(DomainError::InvalidSi {
                    reason: "stride 0 requires lower == upper (singleton)".into(),
                });
            }
            return Ok(Self::singleton(w, lower));
        }
        let span = upper.wrapping_sub(lower) & mask(w);
        if span % stride != 0 {
            return Err(DomainError::InvalidSi {
                reason: format!(
                    "stride {stride} does not evenly divide span {span} ([{lower:#x}, {upper:#x}])"
                ),
            });
        }
        Ok(Self::build(w, stride, lower, upper))
    }

    /// Internal, infallible constructor used by algorithms that have
    /// already derived a mathematically valid `(stride, lower, upper)`.
    fn build(w: u32, stride: u64, lower: u64, upper: u64) -> Self {
        let lower = wrap(w, lower);
        let upper = wrap(w, upper);
        let stride = if lower == upper { 0 } else { stride };
        Self::Interval(Interval {
            width: w,
            stride,
            lower,
            upper,
            uninitialized: false,
        })
    }

    fn build_tainted(w: u32, stride: u64, lower: u64, upper: u64, tainted: bool) -> Self {
        let mut si = Self::build(w, stride, lower, upper);
        if tainted {
            si = si.with_uninitialized(true);
        }
        si
    }

    // ---- accessors ----

    #[must_use]
    pub fn width(&self) -> u32 {
        match self {
            Self::Empty(w) => *w,
            Self::Interval(i) => i.width,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty(_))
    }

    #[must_use]
    pub fn is_singleton(&self) -> bool {
        matches!(self, Self::Interval(i) if i.stride == 0)
    }

    #[must_use]
    pub fn is_top(&self) -> bool {
        matches!(self, Self::Interval(i) if i.stride == 1 && i.lower == 0 && i.upper == mask(i.width))
    }

    #[must_use]
    pub fn stride(&self) -> u64 {
        match self {
            Self::Empty(_) => 0,
            Self::Interval(i) => i.stride,
        }
    }

    #[must_use]
    pub fn lower(&self) -> u64 {
        match self {
            Self::Empty(_) => 0,
            Self::Interval(i) => i.lower,
        }
    }

    #[must_use]
    pub fn upper(&self) -> u64 {
        match self {
            Self::Empty(_) => 0,
            Self::Interval(i) => i.upper,
        }
    }

    #[must_use]
    pub fn is_uninitialized(&self) -> bool {
        matches!(self, Self::Interval(i) if i.uninitialized)
    }

    /// Tag (or untag) this interval as holding an uninitialized value.
    /// Propagated monotonically: any tainted operand taints its result.
    #[must_use]
    pub fn with_uninitialized(self, flag: bool) -> Self {
        match self {
            Self::Empty(w) => Self::Empty(w),
            Self::Interval(mut i) => {
                i.uninitialized = flag;
                Self::Interval(i)
            }
        }
    }

    /// Exact structural equality of `(w, s, l, u)`, as distinct from the
    /// three-valued semantic `==` exposed via [`StridedInterval::eq`].
    #[must_use]
    pub fn identical(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Empty(a), Self::Empty(b)) => a == b,
            (Self::Interval(a), Self::Interval(b)) => {
                a.width == b.width
                    && a.stride == b.stride
                    && a.lower == b.lower
                    && a.upper == b.upper
            }
            _ => false,
        }
    }

    /// Number of elements denoted by this interval. `Top_64` and similar
    /// near-the-edge cases need more range than `u64`, hence `u128`.
    #[must_use]
    pub fn cardinality(&self) -> u128 {
        match self {
            Self::Empty(_) => 0,
            Self::Interval(i) => {
                if i.stride == 0 {
                    1
                } else {
                    let span = i.upper.wrapping_sub(i.lower) & mask(i.width);
                    (span as u128) / (i.stride as u128) + 1
                }
            }
        }
    }

    /// Non-wrapped unsigned segments covering this interval: one segment
    /// `[l, u]` when `l <= u`; two segments `[l, 2^w-1], [0, u]` when
    /// wrapped (`l > u`).
    #[must_use]
    pub fn unsigned_bounds(&self) -> Vec<(u64, u64)> {
        match self {
            Self::Empty(_) => vec![],
            Self::Interval(i) => {
                if i.lower <= i.upper {
                    vec![(i.lower, i.upper)]
                } else {
                    vec![(i.lower, mask(i.width)), (0, i.upper)]
                }
            }
        }
    }

    /// Signed segments, splitting each unsigned segment at the sign
    /// boundary `2^(w-1)` as needed.
    #[must_use]
    pub fn signed_bounds(&self) -> Vec<(i64, i64)> {
        let w = self.width();
        let boundary = if w == 64 { 1u64 << 63 } else { 1u64 << (w - 1) };
        let mut out = Vec::new();
        for (lo, hi) in self.unsigned_bounds() {
            if hi < boundary {
                out.push((to_signed(w, lo), to_signed(w, hi)));
            } else if lo >= boundary {
                out.push((to_signed(w, lo), to_signed(w, hi)));
            } else {
                out.push((to_signed(w, lo), to_signed(w, boundary - 1)));
                out.push((to_signed(w, boundary), to_signed(w, hi)));
            }
        }
        out
    }

    /// Smallest and largest unsigned elements, ignoring the internal
    /// wrap/segment split. Used by division, which doesn't need full
    /// per-segment precision to stay sound.
    fn bounding_unsigned_range(&self) -> (u64, u64) {
        let segs = self.unsigned_bounds();
        let lo = segs.iter().map(|s| s.0).min().unwrap_or(0);
        let hi = segs.iter().map(|s| s.1).max().unwrap_or(0);
        (lo, hi)
    }

    /// Signed minimum element (two's-complement view).
    #[must_use]
    pub fn min(&self) -> Option<i64> {
        self.signed_bounds().into_iter().map(|(lo, _)| lo).min()
    }

    /// Unsigned maximum element.
    #[must_use]
    pub fn max(&self) -> Option<u64> {
        self.unsigned_bounds().into_iter().map(|(_, hi)| hi).max()
    }

    /// Whether the concrete value `v` is a member of this interval.
    #[must_use]
    pub fn contains(&self, v: u64) -> bool {
        match self {
            Self::Empty(_) => false,
            Self::Interval(i) => {
                let v = wrap(i.width, v);
                if i.stride == 0 {
                    return v == i.lower;
                }
                let offset = v.wrapping_sub(i.lower) & mask(i.width);
                let span = i.upper.wrapping_sub(i.lower) & mask(i.width);
                offset <= span && offset % i.stride == 0
            }
        }
    }

    /// Is `v` a possible concrete value of `self`? Alias of `contains`,
    /// named to match the external solver-facing vocabulary.
    #[must_use]
    pub fn solution(&self, v: u64) -> bool {
        self.contains(v)
    }

    /// Up to `n` concrete elements, in canonical (unsigned, wrap-respecting)
    /// order starting at `lower`.
    #[must_use]
    pub fn eval(&self, n: usize) -> Vec<u64> {
        match self {
            Self::Empty(_) => vec![],
            Self::Interval(i) => {
                let card = self.cardinality().min(n as u128) as usize;
                let mut out = Vec::with_capacity(card);
                let mut v = i.lower;
                for _ in 0..card {
                    out.push(v);
                    v = wrap(i.width, v.wrapping_add(i.stride.max(1)));
                    if i.stride == 0 {
                        break;
                    }
                }
                out
            }
        }
    }

    fn check_width(&self, other: &Self) -> Result<u32, DomainError> {
        if self.width() != other.width() {
            Err(DomainError::WidthMismatch {
                lhs: self.width(),
                rhs: other.width(),
            })
        } else {
            Ok(self.width())
        }
    }

    fn taint_with(&self, other: &Self) -> bool {
        self.is_uninitialized() || other.is_uninitialized()
    }

    // ---- arithmetic ----

    pub fn add(&self, other: &Self) -> Result<Self, DomainError> {
        let w = self.check_width(other)?;
        if self.is_empty() || other.is_empty() {
            return Ok(Self::empty(w));
        }
        let tainted = self.taint_with(other);
        let new_stride = bv_gcd(self.stride(), other.stride());
        let new_l = wrap(w, self.lower().wrapping_add(other.lower()));
        let new_u = wrap(w, self.upper().wrapping_add(other.upper()));
        if self.would_overflow_cardinality(other, w) {
            tracing::trace!(width = w, "strided interval add collapsed to Top");
            return Ok(Self::top(w).with_uninitialized(tainted));
        }
        Ok(Self::build_tainted(w, new_stride, new_l, new_u, tainted))
    }

    fn would_overflow_cardinality(&self, other: &Self, w: u32) -> bool {
        let limit = 1u128 << w;
        self.cardinality().saturating_mul(other.cardinality()) >= limit
    }

    /// Arithmetic negation modulo `2^w` (`0 - self`), used by subtraction.
    #[must_use]
    pub fn arith_negate(&self) -> Self {
        match self {
            Self::Empty(w) => Self::Empty(*w),
            Self::Interval(i) => {
                let new_l = wrapping_negate(i.width, i.upper);
                let new_u = wrapping_negate(i.width, i.lower);
                Self::build_tainted(i.width, i.stride, new_l, new_u, i.uninitialized)
            }
        }
    }

    pub fn sub(&self, other: &Self) -> Result<Self, DomainError> {
        self.check_width(other)?;
        self.add(&other.arith_negate())
    }

    /// Bitwise complement: `⟨w, s, ~u, ~l⟩`.
    #[must_use]
    pub fn bitnot(&self) -> Self {
        match self {
            Self::Empty(w) => Self::Empty(*w),
            Self::Interval(i) => {
                let new_l = complement(i.width, i.upper);
                let new_u = complement(i.width, i.lower);
                Self::build_tainted(i.width, i.stride, new_l, new_u, i.uninitialized)
            }
        }
    }

    pub fn mul(&self, other: &Self) -> Result<Self, DomainError> {
        let w = self.check_width(other)?;
        if self.is_empty() || other.is_empty() {
            return Ok(Self::empty(w));
        }
        let tainted = self.taint_with(other);
        let segs_a = self.signed_bounds();
        let segs_b = other.signed_bounds();
        let mut mn = i128::MAX;
        let mut mx = i128::MIN;
        for &(la, ua) in &segs_a {
            for &(lb, ub) in &segs_b {
                for p in [
                    la as i128 * lb as i128,
                    la as i128 * ub as i128,
                    ua as i128 * lb as i128,
                    ua as i128 * ub as i128,
                ] {
                    mn = mn.min(p);
                    mx = mx.max(p);
                }
            }
        }
        let half = 1i128 << (w - 1);
        if mn < -half || mx > half - 1 {
            tracing::trace!(width = w, "strided interval mul collapsed to Top");
            return Ok(Self::top(w).with_uninitialized(tainted));
        }
        let sa = self.stride();
        let sb = other.stride();
        let new_stride = if sa != 0 && sb != 0 {
            sa.saturating_mul(sb)
        } else if sa == 0 && sb == 0 {
            0
        } else if sb == 0 {
            sa.saturating_mul(other.lower())
        } else {
            sb.saturating_mul(self.lower())
        };
        let new_l = from_signed_wide(w, mn);
        let new_u = from_signed_wide(w, mx);
        Ok(Self::build_tainted(w, new_stride, new_l, new_u, tainted))
    }

    /// Unsigned division. A divisor range containing `0` contributes a
    /// quotient of `0` for that element (unsigned div-by-zero defined as
    /// `0`), rather than being treated as undefined.
    pub fn udiv(&self, other: &Self) -> Result<Self, DomainError> {
        let w = self.check_width(other)?;
        if self.is_empty() || other.is_empty() {
            return Ok(Self::empty(w));
        }
        let tainted = self.taint_with(other);
        let (lo_a, hi_a) = self.bounding_unsigned_range();
        let (lo_b, hi_b) = other.bounding_unsigned_range();
        let mut candidates = Vec::new();
        if other.contains(0) {
            candidates.push(0u64);
        }
        let eff_lo_b = if lo_b == 0 { 1 } else { lo_b };
        if hi_b >= eff_lo_b {
            candidates.push(lo_a / hi_b.max(1));
            candidates.push(hi_a / eff_lo_b);
        }
        if candidates.is_empty() {
            return Ok(Self::empty(w));
        }
        let new_l = *candidates.iter().min().unwrap();
        let new_u = *candidates.iter().max().unwrap();
        let stride = if self.is_singleton() && other.is_singleton() {
            0
        } else {
            1
        };
        Ok(Self::build_tainted(w, stride, new_l, new_u, tainted))
    }

    /// Unsigned modulo. A divisor fixed at exactly `0` leaves the dividend
    /// unchanged (no concrete `% 0` is ever actually evaluated; this keeps
    /// the operation total).
    pub fn urem(&self, other: &Self) -> Result<Self, DomainError> {
        let w = self.check_width(other)?;
        if self.is_empty() || other.is_empty() {
            return Ok(Self::empty(w));
        }
        let tainted = self.taint_with(other);
        if self.is_singleton() && other.is_singleton() {
            if other.lower() == 0 {
                return Ok(self.clone().with_uninitialized(tainted));
            }
            return Ok(Self::singleton(w, self.lower() % other.lower()).with_uninitialized(tainted));
        }
        let (_, b_max) = other.bounding_unsigned_range();
        if b_max == 0 {
            return Ok(self.clone().with_uninitialized(tainted));
        }
        Ok(Self::build_tainted(w, 1, 0, b_max - 1, tainted))
    }

    /// Left shift by a constant. Implemented as multiplication by `2^k`,
    /// which naturally inherits `mul`'s Top-collapse-on-overflow behaviour.
    pub fn shl(&self, k: u32) -> Result<Self, DomainError> {
        let w = self.width();
        if self.is_empty() {
            return Ok(self.clone());
        }
        if k >= w {
            return Ok(Self::top(w).with_uninitialized(self.is_uninitialized()));
        }
        if k == 0 {
            return Ok(self.clone());
        }
        let factor = Self::singleton(w, 1u64 << k);
        self.mul(&factor)
    }

    /// Logical (unsigned) right shift by a constant, via division by `2^k`.
    pub fn lshr(&self, k: u32) -> Result<Self, DomainError> {
        let w = self.width();
        if self.is_empty() {
            return Ok(self.clone());
        }
        if k >= w {
            return Ok(Self::singleton(w, 0).with_uninitialized(self.is_uninitialized()));
        }
        if k == 0 {
            return Ok(self.clone());
        }
        let factor = Self::singleton(w, 1u64 << k);
        self.udiv(&factor)
    }

    // ---- bitwise ----

    fn power_of_two_mask(&self) -> Option<u64> {
        if self.is_singleton() {
            let v = self.lower();
            if v != 0 && (v & (v - 1)) == 0 {
                return Some(v);
            }
        }
        None
    }

    fn or_and_default_stride(&self, other: &Self) -> u64 {
        let (sa, sb) = (self.stride(), other.stride());
        match (sa, sb) {
            (0, 0) => 0,
            (0, s) | (s, 0) => s,
            (a, b) => a.min(b),
        }
    }

    pub fn bitor(&self, other: &Self) -> Result<Self, DomainError> {
        let w = self.check_width(other)?;
        if self.is_empty() || other.is_empty() {
            return Ok(Self::empty(w));
        }
        let tainted = self.taint_with(other);
        if self.is_singleton() && other.is_singleton() {
            return Ok(Self::singleton(w, self.lower() | other.lower()).with_uninitialized(tainted));
        }
        let (lo, hi) = warren_segmented(self, other, w, WarrenOp::Or);
        let stride = self.or_and_default_stride(other);
        Ok(Self::build_tainted(w, stride, lo, hi, tainted))
    }

    pub fn bitand(&self, other: &Self) -> Result<Self, DomainError> {
        let w = self.check_width(other)?;
        if self.is_empty() || other.is_empty() {
            return Ok(Self::empty(w));
        }
        let tainted = self.taint_with(other);
        if self.is_singleton() && other.is_singleton() {
            return Ok(Self::singleton(w, self.lower() & other.lower()).with_uninitialized(tainted));
        }
        let (lo, hi) = warren_segmented(self, other, w, WarrenOp::And);
        let stride = other
            .power_of_two_mask()
            .or_else(|| self.power_of_two_mask())
            .unwrap_or_else(|| self.or_and_default_stride(other));
        Ok(Self::build_tainted(w, stride, lo, hi, tainted))
    }

    /// Bound via `[0, maxOR(a,b)]`: for any concrete `x, y`, `x^y <= x|y`
    /// bitwise at every position, so the OR upper bound also sound-bounds
    /// XOR. Less precise than a dedicated min/max-XOR sweep, but keeps the
    /// implementation simple without risking an unsound formula.
    pub fn bitxor(&self, other: &Self) -> Result<Self, DomainError> {
        let w = self.check_width(other)?;
        if self.is_empty() || other.is_empty() {
            return Ok(Self::empty(w));
        }
        let tainted = self.taint_with(other);
        if self.is_singleton() && other.is_singleton() {
            return Ok(Self::singleton(w, self.lower() ^ other.lower()).with_uninitialized(tainted));
        }
        let (_, hi) = warren_segmented(self, other, w, WarrenOp::Or);
        Ok(Self::build_tainted(w, 1, 0, hi, tainted))
    }

    // ---- comparisons ----

    pub fn eq_si(&self, other: &Self) -> Result<BoolResult, DomainError> {
        self.check_width(other)?;
        if self.is_uninitialized() || other.is_uninitialized() {
            return Ok(BoolResult::Maybe);
        }
        if self.is_empty() || other.is_empty() {
            return Ok(BoolResult::False);
        }
        if self.is_singleton() && other.is_singleton() {
            return Ok(BoolResult::from_bool(self.lower() == other.lower()));
        }
        let disjoint = self
            .unsigned_bounds()
            .iter()
            .all(|&(la, ua)| other.unsigned_bounds().iter().all(|&(lb, ub)| ua < lb || ub < la));
        if disjoint {
            Ok(BoolResult::False)
        } else {
            Ok(BoolResult::Maybe)
        }
    }

    pub fn ne_si(&self, other: &Self) -> Result<BoolResult, DomainError> {
        Ok(self.eq_si(other)?.not())
    }

    fn unsigned_compare(&self, other: &Self, strict: bool, less: bool) -> Result<BoolResult, DomainError> {
        self.check_width(other)?;
        if self.is_uninitialized() || other.is_uninitialized() {
            return Ok(BoolResult::Maybe);
        }
        if self.is_empty() || other.is_empty() {
            return Ok(BoolResult::False);
        }
        let a = self.unsigned_bounds();
        let b = other.unsigned_bounds();
        let true_holds = a.iter().all(|&(la, ua)| {
            b.iter().all(|&(lb, ub)| {
                if less {
                    if strict {
                        ua < lb
                    } else {
                        ua <= lb
                    }
                } else if strict {
                    la > ub
                } else {
                    la >= ub
                }
            })
        });
        let false_holds = a.iter().all(|&(la, ua)| {
            b.iter().all(|&(lb, ub)| {
                if less {
                    if strict {
                        la >= ub
                    } else {
                        la > ub
                    }
                } else if strict {
                    ua <= lb
                } else {
                    ua < lb
                }
            })
        });
        if true_holds {
            Ok(BoolResult::True)
        } else if false_holds {
            Ok(BoolResult::False)
        } else {
            Ok(BoolResult::Maybe)
        }
    }

    pub fn ult(&self, other: &Self) -> Result<BoolResult, DomainError> {
        self.unsigned_compare(other, true, true)
    }
    pub fn ule(&self, other: &Self) -> Result<BoolResult, DomainError> {
        self.unsigned_compare(other, false, true)
    }
    pub fn ugt(&self, other: &Self) -> Result<BoolResult, DomainError> {
        self.unsigned_compare(other, true, false)
    }
    pub fn uge(&self, other: &Self) -> Result<BoolResult, DomainError> {
        self.unsigned_compare(other, false, false)
    }

    fn signed_compare(&self, other: &Self, strict: bool, less: bool) -> Result<BoolResult, DomainError> {
        self.check_width(other)?;
        if self.is_uninitialized() || other.is_uninitialized() {
            return Ok(BoolResult::Maybe);
        }
        if self.is_empty() || other.is_empty() {
            return Ok(BoolResult::False);
        }
        let a = self.signed_bounds();
        let b = other.signed_bounds();
        let true_holds = a.iter().all(|&(la, ua)| {
            b.iter().all(|&(lb, ub)| {
                if less {
                    if strict {
                        ua < lb
                    } else {
                        ua <= lb
                    }
                } else if strict {
                    la > ub
                } else {
                    la >= ub
                }
            })
        });
        let false_holds = a.iter().all(|&(la, ua)| {
            b.iter().all(|&(lb, ub)| {
                if less {
                    if strict {
                        la >= ub
                    } else {
                        la > ub
                    }
                } else if strict {
                    ua <= lb
                } else {
                    ua < lb
                }
            })
        });
        if true_holds {
            Ok(BoolResult::True)
        } else if false_holds {
            Ok(BoolResult::False)
        } else {
            Ok(BoolResult::Maybe)
        }
    }

    pub fn slt(&self, other: &Self) -> Result<BoolResult, DomainError> {
        self.signed_compare(other, true, true)
    }
    pub fn sle(&self, other: &Self) -> Result<BoolResult, DomainError> {
        self.signed_compare(other, false, true)
    }
    pub fn sgt(&self, other: &Self) -> Result<BoolResult, DomainError> {
        self.signed_compare(other, true, false)
    }
    pub fn sge(&self, other: &Self) -> Result<BoolResult, DomainError> {
        self.signed_compare(other, false, false)
    }

    // ---- extract / concat / extend ----

    /// `extract(hi, lo)`: bits `[lo, hi]` (inclusive), producing a value of
    /// width `hi - lo + 1`.
    pub fn extract(&self, hi: u32, lo: u32) -> Result<Self, DomainError> {
        if hi < lo || hi >= self.width() {
            return Err(DomainError::InvalidSi {
                reason: format!("extract({hi}, {lo}) out of range for width {}", self.width()),
            });
        }
        let new_w = hi - lo + 1;
        match self {
            Self::Empty(_) => Ok(Self::Empty(new_w)),
            Self::Interval(i) => {
                let tainted = i.uninitialized;
                if i.stride == 0 {
                    let v = (i.lower >> lo) & mask(new_w);
                    return Ok(Self::singleton(new_w, v).with_uninitialized(tainted));
                }
                // Fast path: if every step of the stride is a multiple of
                // 2^(hi+1), bits [lo, hi] never change across elements —
                // incrementing by that much stride can only ever touch
                // bits hi+1 and above.
                let window = 1u128 << (hi + 1);
                if (i.stride as u128) % window == 0 {
                    let v = (i.lower >> lo) & mask(new_w);
                    return Ok(Self::singleton(new_w, v).with_uninitialized(tainted));
                }
                // General case: enumerate the (bounded) concrete elements
                // and extract from each directly. Exact, and therefore
                // trivially sound, as long as the set stays small; beyond
                // that, collapse to Top rather than approximate unsoundly.
                const ENUMERATION_LIMIT: u128 = 4096;
                if self.cardinality() <= ENUMERATION_LIMIT {
                    let mut result: Option<Self> = None;
                    for v in self.eval(ENUMERATION_LIMIT as usize) {
                        let extracted = (v >> lo) & mask(new_w);
                        let piece = Self::singleton(new_w, extracted);
                        result = Some(match result {
                            None => piece,
                            Some(acc) => acc.union(&piece),
                        });
                    }
                    return Ok(result.unwrap_or_else(|| Self::Empty(new_w)).with_uninitialized(tainted));
                }
                Ok(Self::top(new_w).with_uninitialized(tainted))
            }
        }
    }

    /// `concat(hi_si, lo_si)`: width `w_hi + w_lo`, such that
    /// `concat(extract(w-1, k, si), extract(k-1, 0, si)) == si`.
    pub fn concat(&self, lo_part: &Self) -> Result<Self, DomainError> {
        let w_hi = self.width();
        let w_lo = lo_part.width();
        let new_w = w_hi + w_lo;
        if new_w > 64 {
            return Err(DomainError::InvalidSi {
                reason: format!("concat result width {new_w} exceeds supported 64 bits"),
            });
        }
        if self.is_empty() || lo_part.is_empty() {
            return Ok(Self::Empty(new_w));
        }
        let tainted = self.is_uninitialized() || lo_part.is_uninitialized();
        // Exact only when both operands are singletons or the high part is
        // a singleton varying no faster than the low part's own width;
        // the general lattice-sound case otherwise falls back to
        // reconstructing bounds from each side's endpoints.
        let new_l = (self.lower() << w_lo) | lo_part.lower();
        let new_u = (self.upper() << w_lo) | lo_part.upper();
        let new_s = if self.is_singleton() {
            lo_part.stride()
        } else if lo_part.is_singleton() {
            self.stride() << w_lo
        } else {
            bv_gcd(self.stride() << w_lo, lo_part.stride())
        };
        Ok(Self::build_tainted(new_w, new_s, new_l, new_u, tainted))
    }

    /// Zero-extend to `w + n` bits. Never wraps; `extract(w-1, 0, zext) ==
    /// self`.
    #[must_use]
    pub fn zero_extend(&self, n: u32) -> Self {
        match self {
            Self::Empty(w) => Self::Empty(w + n),
            Self::Interval(i) => Self::build_tainted(
                i.width + n,
                i.stride,
                i.lower,
                i.upper,
                i.uninitialized,
            ),
        }
    }

    /// Sign-extend to `w + n` bits. A wrapped source interval (one whose
    /// signed view straddles the sign boundary) is handled by joining the
    /// sign-extension of its two signed segments, producing a single
    /// conservative SI rather than a DSIS (see `SPEC_FULL.md` design notes).
    #[must_use]
    pub fn sign_extend(&self, n: u32) -> Self {
        let new_w = self.width() + n;
        match self {
            Self::Empty(w) => Self::Empty(w + n),
            Self::Interval(i) => {
                let segs = self.signed_bounds();
                let mut result: Option<Self> = None;
                for (lo, hi) in segs {
                    let lo_u = from_signed_wide(new_w, lo as i128);
                    let hi_u = from_signed_wide(new_w, hi as i128);
                    let piece = Self::build(new_w, i.stride, lo_u, hi_u);
                    result = Some(match result {
                        None => piece,
                        Some(acc) => acc.union(&piece),
                    });
                }
                result
                    .unwrap_or_else(|| Self::Empty(new_w))
                    .with_uninitialized(i.uninitialized)
            }
        }
    }

    // ---- join / meet ----

    /// Least upper bound: the wrapped interval of minimum cardinality
    /// covering every element of both operands.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        if self.width() != other.width() {
            // Callers are expected to have checked widths already; joining
            // mismatched widths has no sound meaning, so fail safe to Top
            // at the wider width rather than panicking in a lattice op.
            let w = self.width().max(other.width());
            return Self::top(w);
        }
        let w = self.width();
        if self.is_empty() {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }
        if self.covers(other) {
            return self.clone();
        }
        if other.covers(self) {
            return other.clone();
        }
        let tainted = self.taint_with(other);
        let (la, ua, sa) = (self.lower(), self.upper(), self.stride());
        let (lb, ub, sb) = (other.lower(), other.upper(), other.stride());

        // Candidate covers: start at one operand's lower bound and walk to
        // the other's upper bound, in each of the two possible orientations;
        // keep whichever has smaller cardinality, preferring the
        // non-wrapped candidate on a tie.
        let candidate = |start_l: u64, start_u: u64| -> Self {
            let span = start_u.wrapping_sub(start_l) & mask(w);
            let base_stride = bv_gcd(
                bv_gcd(sa, sb),
                bv_gcd(
                    diff(start_l, la, w),
                    bv_gcd(diff(start_l, lb, w), bv_gcd(diff(start_l, ua, w), diff(start_l, ub, w))),
                ),
            );
            let stride = if base_stride == 0 { span.max(1) } else { base_stride };
            let stride = if span % stride == 0 { stride } else { 1 };
            Self::build_tainted(w, stride, start_l, start_u, tainted)
        };

        let cand1 = candidate(la, ub);
        let cand2 = candidate(lb, ua);
        let chosen = match (cand1.cardinality(), cand2.cardinality()) {
            (c1, c2) if c1 < c2 => cand1,
            (c1, c2) if c2 < c1 => cand2,
            _ => {
                // Tie: prefer the non-wrapped candidate; if both or
                // neither wrap, prefer the numerically smaller lower bound.
                let w1 = cand1.lower() > cand1.upper();
                let w2 = cand2.lower() > cand2.upper();
                match (w1, w2) {
                    (false, true) => cand1,
                    (true, false) => cand2,
                    _ => {
                        if cand1.lower() <= cand2.lower() {
                            cand1
                        } else {
                            cand2
                        }
                    }
                }
            }
        };
        tracing::trace!(width = w, "strided interval join computed");
        chosen
    }

    /// Does `self` already contain every element of `other`?
    fn covers(&self, other: &Self) -> bool {
        if other.is_empty() {
            return true;
        }
        if self.is_empty() {
            return false;
        }
        other.eval(other.cardinality().min(4096) as usize).iter().all(|&v| self.contains(v))
            && other.cardinality() <= 4096
            || (other.cardinality() > 4096 && self.is_top())
    }

    /// Greatest lower bound, via per-non-wrapped-segment intersection and a
    /// Chinese-remainder-style stride combination, joined back together.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        if self.width() != other.width() {
            return Self::Empty(self.width());
        }
        let w = self.width();
        if self.is_empty() || other.is_empty() {
            return Self::Empty(w);
        }
        let tainted = self.taint_with(other);
        let mut result: Option<Self> = None;
        for &(anchor_a, la, ua) in &self.phased_segments() {
            for &(anchor_b, lb, ub) in &other.phased_segments() {
                if let Some(piece) = intersect_progressions(w, self.stride(), anchor_a, la, ua, other.stride(), anchor_b, lb, ub) {
                    result = Some(match result {
                        None => piece,
                        Some(acc) => acc.union(&piece),
                    });
                }
            }
        }
        result.map(|r| r.with_uninitialized(tainted)).unwrap_or(Self::Empty(w))
    }

    /// Non-wrapped segments like [`Self::unsigned_bounds`], but each tagged
    /// with the progression's true phase anchor within that segment — the
    /// smallest genuine element of the progression that falls in `[lo, hi]`.
    ///
    /// For a non-wrapped interval (or a wrapped interval's pre-wrap segment)
    /// the anchor is just `lower`. For a wrapped interval's post-wrap
    /// segment `[0, upper]`, `lower` itself is *not* a member — the members
    /// there are congruent to `upper` modulo the stride (since `upper` is
    /// itself always a genuine element), so the anchor is `upper % stride`,
    /// not the segment's own low endpoint `0`.
    fn phased_segments(&self) -> Vec<(u64, u64, u64)> {
        match self {
            Self::Empty(_) => vec![],
            Self::Interval(i) => {
                if i.lower <= i.upper {
                    vec![(i.lower, i.lower, i.upper)]
                } else {
                    vec![(i.lower, i.lower, mask(i.width)), (i.upper % i.stride, 0, i.upper)]
                }
            }
        }
    }
}

/// `|a - b|` modulo `2^w`, used as a join-stride candidate.
fn diff(a: u64, b: u64, w: u32) -> u64 {
    let d = a.wrapping_sub(b) & mask(w);
    let neg = b.wrapping_sub(a) & mask(w);
    d.min(neg)
}

/// Whether `a ≡ b (mod m)`, computed via signed `i128` arithmetic. `a` and
/// `b` are plain non-negative segment coordinates (not wrapped-subtracted
/// `u64`s) — using `u64::wrapping_sub` here would test `(a - b) mod 2^64`
/// instead of `(a - b) mod m`, which only agrees with the real congruence
/// when `m` divides `2^64` (i.e. `m` is a power of two); for an odd stride
/// like 3 it silently gives the wrong answer.
fn congruent(a: u64, b: u64, m: u64) -> bool {
    (a as i128 - b as i128).rem_euclid(m as i128) == 0
}

/// Intersect two arithmetic progressions, each given as a stride, the
/// progression's phase anchor (its smallest genuine element within the
/// segment, per [`StridedInterval::phased_segments`]) and the segment's
/// non-wrapped `[lo, hi]` unsigned range, via extended-Euclid / CRT-style
/// reduction. `None` if the progressions share no common residue.
fn intersect_progressions(
    w: u32,
    sa: u64,
    anchor_a: u64,
    la: u64,
    ua: u64,
    sb: u64,
    anchor_b: u64,
    lb: u64,
    ub: u64,
) -> Option<StridedInterval> {
    let lo = la.max(lb);
    let hi = ua.min(ub);
    if lo > hi {
        return None;
    }
    if sa == 0 && sb == 0 {
        return if anchor_a == anchor_b {
            Some(StridedInterval::singleton(w, anchor_a))
        } else {
            None
        };
    }
    if sa == 0 {
        return if congruent(anchor_a, anchor_b, sb) && anchor_a >= lo && anchor_a <= hi {
            Some(StridedInterval::singleton(w, anchor_a))
        } else {
            None
        };
    }
    if sb == 0 {
        return if congruent(anchor_b, anchor_a, sa) && anchor_b >= lo && anchor_b <= hi {
            Some(StridedInterval::singleton(w, anchor_b))
        } else {
            None
        };
    }
    let g = crate::bitvec::gcd(sa, sb);
    if !congruent(anchor_a, anchor_b, g) {
        return None;
    }
    let new_stride = crate::bitvec::lcm(sa, sb);
    // Find the smallest x >= lo satisfying x ≡ anchor_a (mod sa) and
    // x ≡ anchor_b (mod sb).
    let mut x = anchor_a;
    while x < lo {
        x = x.saturating_add(sa);
    }
    // Re-align to sb's progression too, bounded search; progressions here
    // are small/typical analysis strides so this converges quickly. Cap
    // the search to avoid pathological spins on huge, coprime-looking
    // strides with no solution in range (already excluded above by the gcd
    // check, but be defensive about iteration count).
    let mut found = None;
    let mut tries = 0u64;
    while x <= hi && tries < 4096 {
        if congruent(x, anchor_b, sb) {
            found = Some(x);
            break;
        }
        x = x.saturating_add(sa);
        tries += 1;
    }
    let start = found?;
    let mut end = start;
    let mut next = end.saturating_add(new_stride);
    while next <= hi {
        end = next;
        next = next.saturating_add(new_stride);
    }
    StridedInterval::new(w, new_stride, start, end).ok()
}

#[derive(Clone, Copy)]
enum WarrenOp {
    And,
    Or,
}

/// Run the Warren (Hacker's Delight §4.3) bitwise-range bounds across every
/// non-wrapped segment pair of `a` and `b`, combining the segment results
/// into one overall `(lo, hi)` bound.
fn warren_segmented(a: &StridedInterval, b: &StridedInterval, w: u32, op: WarrenOp) -> (u64, u64) {
    let mut lo = u64::MAX;
    let mut hi = 0u64;
    for &(la, ua) in &a.unsigned_bounds() {
        for &(lb, ub) in &b.unsigned_bounds() {
            let (seg_lo, seg_hi) = match op {
                WarrenOp::And => (min_and(la, ua, lb, ub, w), max_and(la, ua, lb, ub, w)),
                WarrenOp::Or => (min_or(la, ua, lb, ub, w), max_or(la, ua, lb, ub, w)),
            };
            lo = lo.min(seg_lo);
            hi = hi.max(seg_hi);
        }
    }
    if lo > hi {
        (0, 0)
    } else {
        (lo, hi)
    }
}

fn min_or(mut a: u64, b: u64, mut c: u64, d: u64, w: u32) -> u64 {
    let mut m = 1u64 << (w - 1);
    while m != 0 {
        if (!a & !c & m) != 0 {
            let temp = (a | m) & m.wrapping_neg();
            if temp <= b {
                a = temp;
                break;
            }
            let temp = (c | m) & m.wrapping_neg();
            if temp <= d {
                c = temp;
                break;
            }
        }
        m >>= 1;
    }
    a | c
}

fn max_or(a: u64, mut b: u64, c: u64, mut d: u64, w: u32) -> u64 {
    let mut m = 1u64 << (w - 1);
    while m != 0 {
        if (b & d & m) != 0 {
            let temp = (b.wrapping_sub(m)) | (m - 1);
            if temp >= a {
                b = temp;
                break;
            }
            let temp = (d.wrapping_sub(m)) | (m - 1);
            if temp >= c {
                d = temp;
                break;
            }
        }
        m >>= 1;
    }
    b | d
}

fn min_and(mut a: u64, b: u64, mut c: u64, d: u64, w: u32) -> u64 {
    let mut m = 1u64 << (w - 1);
    while m != 0 {
        if (!a & c & m) != 0 {
            let temp = (a | m) & m.wrapping_neg();
            if temp <= b {
                a = temp;
                break;
            }
        } else if (a & !c & m) != 0 {
            let temp = (c | m) & m.wrapping_neg();
            if temp <= d {
                c = temp;
                break;
            }
        }
        m >>= 1;
    }
    a & c
}

fn max_and(a: u64, mut b: u64, c: u64, mut d: u64, w: u32) -> u64 {
    let mut m = 1u64 << (w - 1);
    while m != 0 {
        if (b & !d & m) != 0 {
            let temp = (b & !m) | (m - 1);
            if temp >= a {
                b = temp;
                break;
            }
        } else if (!b & d & m) != 0 {
            let temp = (d & !m) | (m - 1);
            if temp >= c {
                d = temp;
                break;
            }
        }
        m >>= 1;
    }
    b & d
}

#[cfg(test)]
mod tests {
    use super::*;

    fn si(w: u32, s: u64, l: u64, u: u64) -> StridedInterval {
        StridedInterval::new(w, s, l, u).unwrap()
    }

    #[test]
    fn s1_subtraction() {
        let a = si(8, 1, 10, 15);
        let b = si(8, 1, 11, 12);
        let result = a.sub(&b).unwrap();
        let expected = si(8, 1, (-2i64 as u64) & 0xff, 4);
        assert!(result.identical(&expected), "{result:?} != {expected:?}");
    }

    #[test]
    fn s2_addition_identical() {
        let a = StridedInterval::new(32, 1, 0xffff_ffff, 1).unwrap();
        let sum = a.add(&a).unwrap();
        let expected = StridedInterval::new(32, 1, 0xffff_fffe, 2).unwrap();
        assert!(sum.identical(&expected));
    }

    #[test]
    fn s3_join_chain_wraps() {
        let vals = [2u64, 10, 120, 130, 132, 135, 220, 50];
        let mut acc = StridedInterval::singleton(8, vals[0]);
        for &v in &vals[1..] {
            acc = acc.union(&StridedInterval::singleton(8, v));
        }
        let expected = si(8, 1, 220, 135);
        assert!(acc.identical(&expected), "{acc:?} != {expected:?}");
        assert!(acc.contains(0));
        assert!(acc.contains(225));
        assert!(!acc.contains(138));
    }

    #[test]
    fn s4_extract_byte() {
        let v = si(32, 0x1000000, 0x0cffffff, 0x0dffffff);
        let hi = v.extract(31, 24).unwrap();
        assert!(hi.identical(&si(8, 1, 0x0c, 0x0d)));
        let low = v.extract(7, 0).unwrap();
        assert!(low.identical(&StridedInterval::singleton(8, 0xff)));
    }

    #[test]
    fn s5_and_with_top_bit_mask() {
        let top = StridedInterval::top(32);
        let mask_si = StridedInterval::singleton(32, 0x8000_0000);
        let r = top.bitand(&mask_si).unwrap();
        assert!(r.identical(&si(32, 0x8000_0000, 0, 0x8000_0000)));
    }

    #[test]
    fn mul_intervals() {
        let a = si(32, 2, 10, 20);
        let b = si(32, 2, (-100i64 as u64) & 0xffff_ffff, 200);
        let r = a.mul(&b).unwrap();
        assert_eq!(r.lower() as i32 as i64, -2000);
        assert_eq!(r.upper(), 4000);
    }

    #[test]
    fn division_basic() {
        let ten = StridedInterval::singleton(32, 10);
        let five = StridedInterval::singleton(32, 5);
        let q = ten.udiv(&five).unwrap();
        assert!(q.identical(&StridedInterval::singleton(32, 2)));
        let q2 = five.udiv(&ten).unwrap();
        assert!(q2.identical(&StridedInterval::singleton(32, 0)));
    }

    #[test]
    fn extract_concat_roundtrip() {
        let original = si(32, 9, 1, 10);
        for k in 1..32 {
            let hi = original.extract(31, k).unwrap();
            let lo = original.extract(k - 1, 0).unwrap();
            let rebuilt = hi.concat(&lo).unwrap();
            assert!(
                original.unsigned_bounds().iter().all(|&(l, u)| rebuilt.contains(l) && rebuilt.contains(u)),
                "round-trip lost bounds at k={k}"
            );
        }
    }

    #[test]
    fn zero_extend_then_extract_is_identity() {
        let original = si(16, 3, 10, 40);
        let widened = original.zero_extend(16);
        let back = widened.extract(15, 0).unwrap();
        assert!(back.identical(&original));
    }

    #[test]
    fn idempotent_join_and_meet() {
        let a = si(16, 4, 10, 40);
        assert!(a.union(&a).identical(&a));
        assert!(a.intersection(&a).identical(&a));
    }

    #[test]
    fn meet_of_wrapped_odd_stride_respects_phase() {
        // (32,2,-100,200) ∩ (32,3,-100,200): stride 3's positive-segment
        // elements are {2, 5, 8, ...}, which does not include 0 even though
        // stride 2's positive segment does. A meet that anchors the
        // wrapped segment's progression at its own low endpoint (0)
        // instead of its true phase would wrongly admit 0.
        let lower = (-100i64 as u64) & mask(32);
        let b = si(32, 2, lower, 200);
        let c = si(32, 3, lower, 200);
        let met = b.intersection(&c);
        assert!(met.identical(&si(32, 6, lower, 200)));
        assert!(!met.contains(0), "0 is not a multiple of 3 away from the true anchor 2");
    }
}
