//! Track parameters
//!
//! Produced trajectory states: bound parameters carry a shared handle to
//! their reference surface, curvilinear parameters carry their global
//! position and direction and derive the frame from the direction.
//!
//! Units follow the usual tracking conventions: lengths in mm, angles in
//! rad, momenta in GeV, time in ns.

use nalgebra::{RealField, Vector3, Vector4};

use super::spaces::{BoundCovariance, BoundVector, FreeVector};
use super::transforms::BoundToFreeJacobian;
use crate::conversions::angles::{angles_from_direction, direction_from_angles};
use crate::conversions::bound_free::bound_to_free;
use crate::conversions::curvilinear::{curvilinear_bound_to_free_jacobian, DEFAULT_CURVILINEAR_TOLERANCE};
use crate::geometry::context::GeometryContext;
use crate::geometry::surface::{PlaneSurface, SurfaceHandle};
use crate::ProjectionError;

// ============================================================================
// Shared Accessors
// ============================================================================

/// Magnitude of the momentum for a given charge over momentum.
#[inline]
fn momentum_from_q_over_p<T: RealField + Copy>(q_over_p: T) -> T {
    T::one() / q_over_p.abs()
}

/// Sign of the charge: `-1`, `0` or `+1`.
#[inline]
fn charge_sign<T: RealField + Copy>(q_over_p: T) -> T {
    if q_over_p > T::zero() {
        T::one()
    } else if q_over_p < T::zero() {
        -T::one()
    } else {
        T::zero()
    }
}

// ============================================================================
// Bound Track Parameters
// ============================================================================

/// Track parameters bound to a reference surface.
///
/// The covariance is optional: `None` means no covariance was transported,
/// which is distinct from an explicit all-zero matrix.
#[derive(Debug, Clone)]
pub struct BoundTrackParameters<T: RealField> {
    surface: SurfaceHandle<T>,
    parameters: BoundVector<T>,
    covariance: Option<BoundCovariance<T>>,
}

impl<T: RealField + Copy> BoundTrackParameters<T> {
    /// Creates bound parameters on `surface`.
    pub fn new(
        surface: SurfaceHandle<T>,
        parameters: BoundVector<T>,
        covariance: Option<BoundCovariance<T>>,
    ) -> Self {
        Self {
            surface,
            parameters,
            covariance,
        }
    }

    /// Reference surface.
    #[inline]
    pub fn surface(&self) -> &SurfaceHandle<T> {
        &self.surface
    }

    /// Bound parameter vector.
    #[inline]
    pub fn parameters(&self) -> &BoundVector<T> {
        &self.parameters
    }

    /// Covariance, if one was provided or transported.
    #[inline]
    pub fn covariance(&self) -> Option<&BoundCovariance<T>> {
        self.covariance.as_ref()
    }

    /// Free representation of the parameters.
    pub fn free_parameters(&self, gctx: &GeometryContext) -> FreeVector<T> {
        bound_to_free(gctx, self.surface.as_ref(), &self.parameters)
    }

    /// Global position.
    pub fn position(&self, gctx: &GeometryContext) -> Vector3<T> {
        self.free_parameters(gctx).position()
    }

    /// Unit direction.
    pub fn direction(&self) -> Vector3<T> {
        direction_from_angles(self.parameters.phi(), self.parameters.theta())
    }

    /// Time coordinate.
    #[inline]
    pub fn time(&self) -> T {
        self.parameters.time()
    }

    /// Momentum magnitude.
    #[inline]
    pub fn absolute_momentum(&self) -> T {
        momentum_from_q_over_p(self.parameters.q_over_p())
    }

    /// Momentum vector.
    pub fn momentum(&self) -> Vector3<T> {
        self.direction() * self.absolute_momentum()
    }

    /// Charge sign.
    #[inline]
    pub fn charge(&self) -> T {
        charge_sign(self.parameters.q_over_p())
    }
}

// ============================================================================
// Curvilinear Track Parameters
// ============================================================================

/// Track parameters expressed in the curvilinear frame of their direction.
///
/// In that frame both local coordinates are zero by construction.
#[derive(Debug, Clone, PartialEq)]
pub struct CurvilinearTrackParameters<T: RealField> {
    four_position: Vector4<T>,
    direction: Vector3<T>,
    q_over_p: T,
    covariance: Option<BoundCovariance<T>>,
}

impl<T: RealField + Copy> CurvilinearTrackParameters<T> {
    /// Creates curvilinear parameters.
    ///
    /// The direction is normalized; a zero or non-finite direction is
    /// rejected with `SingularProjection`.
    pub fn new(
        four_position: Vector4<T>,
        direction: Vector3<T>,
        q_over_p: T,
        covariance: Option<BoundCovariance<T>>,
    ) -> Result<Self, ProjectionError> {
        let norm = direction.norm();
        if !norm.is_finite() || norm == T::zero() {
            return Err(ProjectionError::SingularProjection);
        }
        Ok(Self {
            four_position,
            direction: direction / norm,
            q_over_p,
            covariance,
        })
    }

    /// Creates curvilinear parameters at the point described by `free`.
    pub fn from_free(
        free: &FreeVector<T>,
        covariance: Option<BoundCovariance<T>>,
    ) -> Result<Self, ProjectionError> {
        Self::new(free.four_position(), free.direction(), free.q_over_p(), covariance)
    }

    /// Position and time.
    #[inline]
    pub fn four_position(&self) -> &Vector4<T> {
        &self.four_position
    }

    /// Global position.
    #[inline]
    pub fn position(&self) -> Vector3<T> {
        self.four_position.xyz()
    }

    #[inline]
    pub fn time(&self) -> T {
        self.four_position.w
    }

    #[inline]
    pub fn direction(&self) -> &Vector3<T> {
        &self.direction
    }

    #[inline]
    pub fn q_over_p(&self) -> T {
        self.q_over_p
    }

    /// Covariance in the curvilinear frame, if present.
    #[inline]
    pub fn covariance(&self) -> Option<&BoundCovariance<T>> {
        self.covariance.as_ref()
    }

    #[inline]
    pub fn absolute_momentum(&self) -> T {
        momentum_from_q_over_p(self.q_over_p)
    }

    pub fn momentum(&self) -> Vector3<T> {
        self.direction * self.absolute_momentum()
    }

    #[inline]
    pub fn charge(&self) -> T {
        charge_sign(self.q_over_p)
    }

    /// Bound vector in the curvilinear frame: `[0, 0, phi, theta, q/p, t]`.
    pub fn bound_parameters(&self) -> BoundVector<T> {
        let (phi, theta) = angles_from_direction(&self.direction).unwrap_or((T::zero(), T::zero()));
        BoundVector::new(T::zero(), T::zero(), phi, theta, self.q_over_p, self.time())
    }

    /// Free representation of the parameters.
    pub fn free_parameters(&self) -> FreeVector<T> {
        FreeVector::new(&self.position(), self.time(), &self.direction, self.q_over_p)
    }

    /// Jacobian from the curvilinear bound parameters to free parameters.
    pub fn bound_to_free_jacobian(
        &self,
        tolerance: T,
    ) -> Result<BoundToFreeJacobian<T>, ProjectionError> {
        curvilinear_bound_to_free_jacobian(&self.direction, tolerance)
    }

    /// The plane through the position, perpendicular to the direction.
    pub fn reference_surface(&self, tolerance: T) -> PlaneSurface<T> {
        PlaneSurface::curvilinear(&self.position(), &self.direction, tolerance)
    }

    /// Same as [`Self::reference_surface`] with the default branch tolerance.
    pub fn default_reference_surface(&self) -> PlaneSurface<T> {
        self.reference_surface(nalgebra::convert(DEFAULT_CURVILINEAR_TOLERANCE))
    }
}

// ============================================================================
// Parameter Resolutions
// ============================================================================

/// Per-component standard deviations used to seed a bound covariance.
///
/// Defaults are the usual resolutions assigned to track seeds: 25 µm and
/// 100 µm on the local coordinates, 0.005° and 0.001° on the angles,
/// 0.1 / GeV on q/p and 1 ns on time.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParameterResolutions<T> {
    pub sigma_loc0: T,
    pub sigma_loc1: T,
    pub sigma_phi: T,
    pub sigma_theta: T,
    pub sigma_q_over_p: T,
    pub sigma_time: T,
}

impl<T: RealField + Copy> Default for ParameterResolutions<T> {
    fn default() -> Self {
        let degree: T = T::pi() / nalgebra::convert(180.0);
        Self {
            sigma_loc0: nalgebra::convert(0.025),
            sigma_loc1: nalgebra::convert(0.1),
            sigma_phi: degree * nalgebra::convert(0.005),
            sigma_theta: degree * nalgebra::convert(0.001),
            sigma_q_over_p: nalgebra::convert(0.1),
            sigma_time: T::one(),
        }
    }
}

impl<T: RealField + Copy> ParameterResolutions<T> {
    /// Resolutions ordered like the bound vector.
    pub fn std_devs(&self) -> nalgebra::SVector<T, 6> {
        nalgebra::vector![
            self.sigma_loc0,
            self.sigma_loc1,
            self.sigma_phi,
            self.sigma_theta,
            self.sigma_q_over_p,
            self.sigma_time
        ]
    }

    /// Diagonal bound covariance built from the resolutions.
    pub fn covariance(&self) -> BoundCovariance<T> {
        BoundCovariance::from_std_devs(&self.std_devs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::spaces::bound_index;
    use approx::assert_relative_eq;
    use std::sync::Arc;

    #[test]
    fn test_bound_parameter_accessors() {
        let gctx = GeometryContext::nominal();
        let surface: SurfaceHandle<f64> = Arc::new(PlaneSurface::from_center_normal(
            Vector3::new(0.0, 0.0, 50.0),
            Vector3::z(),
        ));
        let parameters = BoundVector::new(1.0, 2.0, 0.0, std::f64::consts::FRAC_PI_2, -0.5, 3.0);
        let track = BoundTrackParameters::new(surface, parameters, None);

        assert!(track.covariance().is_none());
        assert_relative_eq!(track.position(&gctx).z, 50.0, epsilon = 1e-12);
        assert_relative_eq!(track.absolute_momentum(), 2.0, epsilon = 1e-12);
        assert_eq!(track.charge(), -1.0);
        assert_relative_eq!(track.momentum(), Vector3::new(2.0, 0.0, 0.0), epsilon = 1e-12);
        assert_eq!(track.time(), 3.0);
    }

    #[test]
    fn test_curvilinear_parameters() {
        let track = CurvilinearTrackParameters::new(
            Vector4::new(1.0, 2.0, 3.0, 4.0),
            Vector3::new(0.0, 3.0, 4.0),
            0.25,
            Some(BoundCovariance::identity()),
        )
        .unwrap();

        assert_relative_eq!(track.direction().norm(), 1.0, epsilon = 1e-14);
        assert_eq!(track.position(), Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(track.time(), 4.0);
        assert_eq!(track.charge(), 1.0);

        let bound = track.bound_parameters();
        assert_eq!(bound.local_position(), nalgebra::Vector2::zeros());
        assert_relative_eq!(bound.theta(), (3.0_f64).atan2(4.0), epsilon = 1e-14);

        let gctx = GeometryContext::nominal();
        let surface = track.default_reference_surface();
        let back = crate::conversions::bound_free::free_to_bound(
            &gctx,
            &surface,
            &track.free_parameters(),
            1e-9,
        )
        .unwrap();
        assert_relative_eq!(*back.as_svector(), *bound.as_svector(), epsilon = 1e-12);
    }

    #[test]
    fn test_curvilinear_rejects_zero_direction() {
        let result = CurvilinearTrackParameters::new(Vector4::zeros(), Vector3::zeros(), 1.0, None);
        assert_eq!(result, Err(ProjectionError::SingularProjection));
    }

    #[test]
    fn test_resolution_defaults() {
        let resolutions = ParameterResolutions::<f64>::default();
        let cov = resolutions.covariance();

        assert_relative_eq!(cov.std_dev(bound_index::LOC0), 0.025, epsilon = 1e-15);
        assert_relative_eq!(
            cov.std_dev(bound_index::PHI),
            0.005_f64.to_radians(),
            epsilon = 1e-15
        );
        assert_eq!(cov.as_matrix()[(0, 1)], 0.0);
    }
}
