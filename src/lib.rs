//! covtransport: Covariance transport for charged-particle track parameters
//!
//! Converts a trajectory's nominal parameters and covariance between the
//! surface-local (bound), global (free) and curvilinear representations as a
//! track is propagated through detector geometry.
//!
//! # Features
//!
//! - **Type Safety**: Parameter spaces encoded in the type system, so bound and
//!   free vectors, covariances and Jacobians cannot be mixed up
//! - **Analytic Jacobians**: Exact bound↔free and free→curvilinear derivatives,
//!   including the grazing-incidence branch near the polar axis
//! - **Nonlinearity Correction**: Sigma-point resampling through the exact
//!   coordinate maps, reported alongside the first-order result
//! - **Explicit Failures**: Every fallible geometric operation returns a
//!   `Result`; nothing panics on recoverable conditions
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use covtransport::prelude::*;
//!
//! let gctx = GeometryContext::nominal();
//! let surface: SurfaceHandle<f64> = Arc::new(PlaneSurface::from_center_normal(
//!     nalgebra::Vector3::new(0.0, 0.0, 100.0),
//!     nalgebra::Vector3::new(0.0, 0.0, 1.0),
//! ));
//!
//! let bound = BoundVector::new(1.0, -2.0, 0.3, 0.2, 0.5, 0.0);
//! let free = bound_to_free(&gctx, surface.as_ref(), &bound);
//! let back = free_to_bound(&gctx, surface.as_ref(), &free, 1e-4).unwrap();
//! assert!((back.phi() - 0.3).abs() < 1e-12);
//! ```

pub mod conversions;
pub mod geometry;
pub mod propagator;
pub mod types;

pub mod prelude {
    pub use crate::conversions::*;
    pub use crate::geometry::*;
    pub use crate::propagator::*;
    pub use crate::types::gaussian::*;
    pub use crate::types::parameters::*;
    pub use crate::types::spaces::*;
    pub use crate::types::transforms::*;
    pub use crate::{CorrectionError, ProjectionError, TransportError};
}

/// Failure to express a global state in a surface's local coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ProjectionError {
    /// Global position is farther from the surface than the tolerance
    #[error("global position is not on the surface within tolerance")]
    OffSurface,
    /// Direction lies in the surface plane, so path length cannot be corrected
    #[error("direction is parallel to the surface")]
    ParallelIncidence,
    /// Projection produced non-finite local coordinates
    #[error("projection onto the surface is singular")]
    SingularProjection,
    /// Direction is aligned with the polar axis (sin(theta) = 0)
    #[error("direction is aligned with the polar axis")]
    DegenerateDirection,
}

/// Reasons a sigma-point correction batch was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CorrectionError {
    /// Tuning parameter kappa must be positive
    #[error("kappa must be positive")]
    InvalidKappa,
    /// Covariance has a significantly negative eigenvalue
    #[error("covariance is not positive semi-definite")]
    NotPositiveSemiDefinite,
    /// Covariance or mean contains non-finite entries
    #[error("input moments are not finite")]
    NonFiniteInput,
    /// The exact transform failed for one sample
    #[error("sigma point {index} could not be transformed: {source}")]
    InvalidSample {
        index: usize,
        #[source]
        source: ProjectionError,
    },
    /// The exact transform produced non-finite parameters for one sample
    #[error("sigma point {index} produced non-finite parameters")]
    NonFiniteSample { index: usize },
}

/// Error types for the library
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    /// A bound/free conversion could not complete (recoverable)
    #[error("geometry projection failed: {0}")]
    Projection(#[from] ProjectionError),
    /// The nonlinear correction was unavailable (first-order result stays valid)
    #[error("nonlinear correction unavailable: {0}")]
    CorrectionUnavailable(#[from] CorrectionError),
    /// The propagated state cannot be placed locally by the geometry at all
    #[error("propagated state cannot be placed on its reference surface: {0}")]
    FatalGeometryInconsistency(ProjectionError),
    /// Configuration rejected by validation
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(&'static str),
}

impl TransportError {
    /// Returns true if the error must abort the whole trajectory.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransportError::FatalGeometryInconsistency(_))
    }
}

pub type Result<T> = ::core::result::Result<T, TransportError>;
