#![allow(clippy::too_many_arguments)]

pub mod abstract_value;
pub mod bitvec;
pub mod bool_result;
pub mod constraint;
pub mod dsis;
pub mod error;
pub mod eval;
pub mod if_proxy;
pub mod policy;
pub mod strided_interval;
pub mod value_set;

pub mod prelude {
    pub use crate::abstract_value::AbstractValue;
    pub use crate::bool_result::BoolResult;
    pub use crate::constraint::constraint_to_si;
    pub use crate::dsis::DiscreteStridedIntervalSet;
    pub use crate::error::DomainError;
    pub use crate::eval::{eval, Environment, Expr};
    pub use crate::if_proxy::IfProxy;
    pub use crate::policy::Policy;
    pub use crate::strided_interval::StridedInterval;
    pub use crate::value_set::ValueSet;
}
