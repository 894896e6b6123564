//! Fatal-error variants surfaced by the domain.
//!
//! `PrecisionDegraded` and `Uninitialized` from the design are not errors:
//! they're observable via `StridedInterval::is_top` /
//! `DiscreteStridedIntervalSet::is_collapsed` / `StridedInterval::is_uninitialized`
//! rather than through this enum.

use thiserror::Error;

/// Errors a caller of the domain can hit; all are fatal (soundness bugs in
/// the caller, not recoverable precision losses).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A binary operation was attempted between values of differing
    /// bit-width.
    #[error("width mismatch: {lhs} bits vs {rhs} bits")]
    WidthMismatch {
        /// Bit-width of the left-hand operand.
        lhs: u32,
        /// Bit-width of the right-hand operand.
        rhs: u32,
    },
    /// A strided interval was constructed with an invalid stride/bound
    /// combination (e.g. a non-singleton stride that doesn't evenly divide
    /// the span, or bounds outside `[0, 2^w)`).
    #[error("invalid strided interval: {reason}")]
    InvalidSi {
        /// Human-readable description of which invariant was violated.
        reason: String,
    },
    /// An operation between a [`crate::value_set::ValueSet`] and a bare
    /// [`crate::strided_interval::StridedInterval`] was attempted without a
    /// region to anchor it to.
    #[error("region mismatch: operation requires an explicit region context")]
    RegionMismatch,
}
