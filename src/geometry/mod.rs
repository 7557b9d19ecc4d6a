//! Surface frame provider
//!
//! Geometry capabilities consumed by the transport engine: placement and
//! local reference frames of surfaces, path-length sensitivity, and the
//! bound↔free Jacobians.
//!
//! Geometry is built once and then shared read-only. Surfaces hold only weak
//! handles to their [`detector::DetectorElement`] and [`detector::Layer`].

pub mod bounds;
pub mod context;
pub mod detector;
pub mod jacobians;
pub mod material;
pub mod surface;

pub use bounds::*;
pub use context::*;
pub use detector::*;
pub use jacobians::*;
pub use material::*;
pub use surface::*;
