//! Limits and policy applied to every entity reference.

pub use budget::{ExpansionBudget, Limit, LimitExceeded};
pub use policy::ExternalResolutionPolicy;

mod budget;
mod policy;
