//! Explicit analysis-wide configuration.
//!
//! The source design treats `allow_dsis`/`DSIS_LIMIT` as process-wide
//! globals; per the redesign note ("global configuration -> explicit
//! context") this crate instead threads a [`Policy`] value into every
//! operation that can make the join-vs-DSIS decision.

/// Default bound on how many strided intervals a
/// [`crate::dsis::DiscreteStridedIntervalSet`] may hold before it collapses.
pub const DEFAULT_DSIS_LIMIT: usize = 10;

/// Read-only configuration for one analysis pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    /// Whether a join that would lose precision may instead produce a
    /// [`crate::dsis::DiscreteStridedIntervalSet`].
    pub allow_dsis: bool,
    /// Maximum member count for a `DiscreteStridedIntervalSet`.
    pub dsis_limit: usize,
}

impl Policy {
    #[must_use]
    pub fn new(allow_dsis: bool, dsis_limit: usize) -> Self {
        Self {
            allow_dsis,
            dsis_limit,
        }
    }
}

impl Default for Policy {
    /// Matches the source's default: DSIS formation enabled, capped at
    /// [`DEFAULT_DSIS_LIMIT`].
    fn default() -> Self {
        Self {
            allow_dsis: true,
            dsis_limit: DEFAULT_DSIS_LIMIT,
        }
    }
}
