//! Parameter transforms
//!
//! Pure conversions between bound, free and curvilinear parameterizations
//! and the curvilinear Jacobians, including the grazing-incidence branch.

pub mod angles;
pub mod bound_free;
pub mod curvilinear;

pub use angles::*;
pub use bound_free::*;
pub use curvilinear::*;
