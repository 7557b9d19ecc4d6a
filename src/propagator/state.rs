//! Propagation step state
//!
//! Everything the covariance engine carries from one reference point to the
//! next. The stepper updates the free parameters, the free transport
//! Jacobian, the path derivatives and the path length; the engine consumes
//! them at the next reference point and re-initializes the Jacobians there.

use std::sync::Arc;

use nalgebra::RealField;

use super::config::TransportConfig;
use crate::conversions::curvilinear::curvilinear_bound_to_free_jacobian;
use crate::geometry::context::GeometryContext;
use crate::geometry::surface::{PlaneSurface, SurfaceHandle};
use crate::types::parameters::{BoundTrackParameters, CurvilinearTrackParameters};
use crate::types::spaces::{BoundCovariance, BoundVector, FreeCovariance, FreeVector};
use crate::types::transforms::{BoundJacobian, BoundToFreeJacobian, FreeTransportJacobian};

/// State of a single trajectory between two reference points.
#[derive(Debug, Clone)]
pub struct StepState<T: RealField> {
    /// Current free parameters
    pub parameters: FreeVector<T>,
    /// Free transport Jacobian since the last reference point
    pub jac_transport: FreeTransportJacobian<T>,
    /// Derivatives of the free parameters with respect to path length
    pub derivatives: FreeVector<T>,
    /// Bound→free Jacobian at the last reference point
    pub jac_to_global: BoundToFreeJacobian<T>,
    /// Full local-to-local Jacobian of the last transport
    pub jacobian: BoundJacobian<T>,
    /// Bound covariance at the last reference point
    pub covariance: BoundCovariance<T>,
    /// First-order free covariance `(M·B)·Σ·(M·B)ᵀ` at the last reference
    /// point, before projection onto the local frame. Stays available on the
    /// polar axis, where no first-order bound covariance exists.
    pub free_covariance: FreeCovariance<T>,
    /// Bound parameters at the last reference point
    pub reference: BoundVector<T>,
    /// Surface of the last reference point
    pub reference_surface: SurfaceHandle<T>,
    /// Accumulated path length
    pub path_length: T,
    /// Whether a covariance is carried along
    pub covariance_transport: bool,
}

impl<T: RealField + Copy> StepState<T> {
    /// Initializes the state from bound start parameters.
    ///
    /// Covariance is transported only if the configuration asks for it and
    /// the start parameters carry one.
    pub fn from_bound(
        gctx: &GeometryContext,
        start: &BoundTrackParameters<T>,
        config: &TransportConfig<T>,
    ) -> Self {
        let surface = start.surface();
        let reference = *start.parameters();
        let jac_to_global = surface.bound_to_free_jacobian(gctx, &reference);
        Self::assemble(
            start.free_parameters(gctx),
            jac_to_global,
            reference,
            Arc::clone(surface),
            start.covariance(),
            config,
        )
    }

    /// Initializes the state from curvilinear start parameters.
    ///
    /// The reference surface is the curvilinear plane of the start point.
    pub fn from_curvilinear(
        start: &CurvilinearTrackParameters<T>,
        config: &TransportConfig<T>,
    ) -> crate::Result<Self> {
        let tolerance = config.curvilinear_tolerance;
        let jac_to_global = curvilinear_bound_to_free_jacobian(start.direction(), tolerance)?;
        let surface: SurfaceHandle<T> =
            Arc::new(PlaneSurface::curvilinear(&start.position(), start.direction(), tolerance));
        Ok(Self::assemble(
            start.free_parameters(),
            jac_to_global,
            start.bound_parameters(),
            surface,
            start.covariance(),
            config,
        ))
    }

    fn assemble(
        parameters: FreeVector<T>,
        jac_to_global: BoundToFreeJacobian<T>,
        reference: BoundVector<T>,
        reference_surface: SurfaceHandle<T>,
        covariance: Option<&BoundCovariance<T>>,
        config: &TransportConfig<T>,
    ) -> Self {
        let covariance_transport = config.covariance_transport && covariance.is_some();
        let covariance = covariance.copied().unwrap_or_else(BoundCovariance::zeros);
        let free_covariance = jac_to_global.conjugate(&covariance);
        Self {
            parameters,
            jac_transport: FreeTransportJacobian::identity(),
            derivatives: FreeVector::zeros(),
            jac_to_global,
            jacobian: BoundJacobian::identity(),
            covariance,
            free_covariance,
            reference,
            reference_surface,
            path_length: T::zero(),
            covariance_transport,
        }
    }

    /// Resets the transport Jacobian to identity and the path derivatives to zero.
    #[inline]
    pub fn reset_jacobians(&mut self) {
        self.jac_transport = FreeTransportJacobian::identity();
        self.derivatives = FreeVector::zeros();
    }
}
