//! Covariance transport engine
//!
//! Chains the Jacobians accumulated between two reference points and
//! produces bound or curvilinear trajectory states at the second one.
//!
//! # Transport to a Bound Surface
//!
//! With `T` the free transport Jacobian, `d` the path derivatives, `p` the
//! path-length sensitivity of the target surface, `B` the bound→free
//! Jacobian at the start and `F` the free→bound Jacobian at the target:
//!
//! ```text
//! M = (I + d ⊗ p) · T
//! J = F · M · B
//! Σ_free' = M · (B · Σ · Bᵀ) · Mᵀ
//! Σ_bound = F · Σ_free' · Fᵀ
//! ```
//!
//! The curvilinear variant replaces `p` by `-direction` and `F` by the
//! analytic curvilinear Jacobian.
//!
//! # Nonlinear Correction
//!
//! When enabled, the bound moments at the start are mapped to free space by
//! sigma points instead of `B`, transported by `M`, and mapped to the target
//! by sigma points instead of `F`. The result is reported next to the
//! first-order one; the step state continues from the first-order
//! covariance.
//!
//! Exactly on the polar axis the free→bound Jacobian has no azimuth row.
//! With the correction enabled the state is still produced there: the
//! first-order covariance is reported as [`FirstOrder::Degenerate`] and the
//! corrected bound covariance seeds the next reference point. Without the
//! correction the transport fails with `DegenerateDirection`.
//!
//! All operations are transactional: on error the step state is unchanged.

use std::sync::Arc;

use nalgebra::{RealField, Vector3};
use tracing::{debug, error, trace, warn};

use super::config::TransportConfig;
use super::corrector::{CorrectorParams, NonlinearCorrector};
use super::state::StepState;
use crate::conversions::angles::on_polar_axis;
use crate::conversions::bound_free::{bound_to_free, free_to_bound};
use crate::conversions::curvilinear::{
    curvilinear_bound_to_free_jacobian, curvilinear_free_to_path_derivative,
    free_to_curvilinear_jacobian, CurvilinearBranch,
};
use crate::geometry::context::GeometryContext;
use crate::geometry::surface::{PlaneSurface, Surface, SurfaceHandle};
use crate::types::gaussian::{BoundMoments, FreeMoments};
use crate::types::parameters::{BoundTrackParameters, CurvilinearTrackParameters};
use crate::types::spaces::{BoundCovariance, BoundVector, FreeCovariance, FreeVector};
use crate::types::transforms::{
    path_correction, BoundJacobian, BoundToFreeJacobian, FreeToBoundJacobian, FreeToPathDerivative,
};
use crate::{ProjectionError, TransportError};

// ============================================================================
// Results
// ============================================================================

/// Output of the sigma-point correction, next to the first-order result.
///
/// Each side is `None` when the correction was disabled or its batch was
/// discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct NonlinearCorrection<T: RealField> {
    /// Corrected free moments at the target
    pub free: Option<FreeMoments<T>>,
    /// Corrected bound moments at the target
    pub bound: Option<BoundMoments<T>>,
}

impl<T: RealField> Default for NonlinearCorrection<T> {
    fn default() -> Self {
        Self {
            free: None,
            bound: None,
        }
    }
}

impl<T: RealField + Copy> NonlinearCorrection<T> {
    /// Corrected bound moments, zero-filled when unavailable.
    pub fn bound_or_zero(&self) -> BoundMoments<T> {
        self.bound.clone().unwrap_or_else(BoundMoments::zeros)
    }

    /// Returns true if both sides of the correction are available.
    pub fn is_available(&self) -> bool {
        self.free.is_some() && self.bound.is_some()
    }
}

/// Outcome of the first-order bound projection of a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirstOrder {
    /// Covariance projected through the analytic free→bound Jacobian
    Projected,
    /// No covariance is transported for this trajectory
    NotRequested,
    /// Direction on the polar axis; only the corrected moments describe the
    /// bound covariance
    Degenerate,
}

/// Trajectory state on a bound reference surface.
#[derive(Debug, Clone)]
pub struct BoundState<T: RealField> {
    /// Bound parameters with first-order covariance (absent unless projected)
    pub parameters: BoundTrackParameters<T>,
    /// Full local-to-local Jacobian since the previous reference point,
    /// identity unless projected
    pub jacobian: BoundJacobian<T>,
    /// Accumulated path length
    pub path_length: T,
    /// Sigma-point corrected moments
    pub correction: NonlinearCorrection<T>,
    pub first_order: FirstOrder,
}

/// Trajectory state in the curvilinear frame of the current direction.
#[derive(Debug, Clone)]
pub struct CurvilinearState<T: RealField> {
    /// Curvilinear parameters with first-order covariance
    pub parameters: CurvilinearTrackParameters<T>,
    /// Full local-to-local Jacobian since the previous reference point
    pub jacobian: BoundJacobian<T>,
    /// Accumulated path length
    pub path_length: T,
    /// Sigma-point corrected moments
    pub correction: NonlinearCorrection<T>,
    pub first_order: FirstOrder,
    /// Frame construction used for the curvilinear axes
    pub branch: CurvilinearBranch,
}

/// Everything a transport computes before it is committed to the state.
struct Transported<T: RealField> {
    jacobian: BoundJacobian<T>,
    covariance: Option<BoundCovariance<T>>,
    first_order: FirstOrder,
    free_covariance: FreeCovariance<T>,
    jac_to_global: BoundToFreeJacobian<T>,
    reference: BoundVector<T>,
    reference_surface: SurfaceHandle<T>,
    correction: NonlinearCorrection<T>,
}

// ============================================================================
// Covariance Engine
// ============================================================================

/// Covariance transport engine.
#[derive(Debug, Clone)]
pub struct CovarianceEngine<T: RealField> {
    config: TransportConfig<T>,
    corrector: NonlinearCorrector<T>,
}

impl<T: RealField + Copy> CovarianceEngine<T> {
    /// Creates an engine from a validated configuration.
    pub fn new(config: TransportConfig<T>) -> crate::Result<Self> {
        config.validate()?;
        let params = CorrectorParams::new(config.kappa)?;
        Ok(Self {
            config,
            corrector: NonlinearCorrector::new(params),
        })
    }

    pub fn config(&self) -> &TransportConfig<T> {
        &self.config
    }

    /// Produces the trajectory state on `surface`.
    ///
    /// # Errors
    /// - `FatalGeometryInconsistency` if the transported state cannot be
    ///   placed on `surface` while re-initializing the Jacobians
    /// - `Projection` for any other failed conversion
    pub fn bound_state(
        &self,
        gctx: &GeometryContext,
        state: &mut StepState<T>,
        surface: &SurfaceHandle<T>,
    ) -> crate::Result<BoundState<T>> {
        let transported = if state.covariance_transport {
            Some(self.compute_to_bound(gctx, state, surface)?)
        } else {
            None
        };

        let parameters = free_to_bound(
            gctx,
            surface.as_ref(),
            &state.parameters,
            self.config.on_surface_tolerance,
        )?;

        let (jacobian, covariance, correction, first_order) = match transported {
            Some(transported) => {
                let result = (
                    transported.jacobian,
                    transported.covariance,
                    transported.correction.clone(),
                    transported.first_order,
                );
                Self::commit(state, transported);
                result
            }
            None => Self::untransported(),
        };

        Ok(BoundState {
            parameters: BoundTrackParameters::new(Arc::clone(surface), parameters, covariance),
            jacobian,
            path_length: state.path_length,
            correction,
            first_order,
        })
    }

    /// Produces the trajectory state in the curvilinear frame of the current
    /// direction.
    ///
    /// The geometry context is only consulted for the previous reference
    /// surface when the nonlinear correction is enabled.
    pub fn curvilinear_state(
        &self,
        gctx: &GeometryContext,
        state: &mut StepState<T>,
    ) -> crate::Result<CurvilinearState<T>> {
        let (jacobian, covariance, correction, first_order) = if state.covariance_transport {
            let transported = self.compute_to_curvilinear(gctx, state)?;
            let result = (
                transported.jacobian,
                transported.covariance,
                transported.correction.clone(),
                transported.first_order,
            );
            Self::commit(state, transported);
            result
        } else {
            Self::untransported()
        };

        let parameters = CurvilinearTrackParameters::from_free(&state.parameters, covariance)?;
        Ok(CurvilinearState {
            branch: CurvilinearBranch::select(parameters.direction(), self.config.curvilinear_tolerance),
            parameters,
            jacobian,
            path_length: state.path_length,
            correction,
            first_order,
        })
    }

    /// Transports the covariance to `surface` and re-initializes the step
    /// state there.
    pub fn transport_covariance_to_bound(
        &self,
        gctx: &GeometryContext,
        state: &mut StepState<T>,
        surface: &SurfaceHandle<T>,
    ) -> crate::Result<()> {
        let transported = self.compute_to_bound(gctx, state, surface)?;
        Self::commit(state, transported);
        Ok(())
    }

    /// Transports the covariance to the curvilinear frame and re-initializes
    /// the step state there.
    pub fn transport_covariance_to_curvilinear(
        &self,
        gctx: &GeometryContext,
        state: &mut StepState<T>,
    ) -> crate::Result<()> {
        let transported = self.compute_to_curvilinear(gctx, state)?;
        Self::commit(state, transported);
        Ok(())
    }

    /// Sigma-point free moments of the reference bound state.
    ///
    /// # Errors
    /// `CorrectionUnavailable` if the batch was discarded.
    pub fn correct_free(
        &self,
        gctx: &GeometryContext,
        state: &StepState<T>,
    ) -> crate::Result<FreeMoments<T>> {
        let moments = self.corrector.bound_to_free(
            gctx,
            state.reference_surface.as_ref(),
            &state.reference,
            &state.covariance,
        )?;
        Ok(moments)
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn compute_to_bound(
        &self,
        gctx: &GeometryContext,
        state: &StepState<T>,
        surface: &SurfaceHandle<T>,
    ) -> crate::Result<Transported<T>> {
        let free = &state.parameters;
        let position = free.position();
        let direction = free.direction();

        let free_to_path = surface.free_to_path_derivative(gctx, &position, &direction)?;
        let free_to_bound_jacobian = if self.skip_first_order(&direction)? {
            None
        } else {
            Some(surface.free_to_bound_jacobian(gctx, free)?)
        };

        let reference = free_to_bound(gctx, surface.as_ref(), free, self.config.on_surface_tolerance)
            .map_err(|source| {
                error!(%source, "inconsistency in global to local transformation during propagation");
                TransportError::FatalGeometryInconsistency(source)
            })?;
        let jac_to_global = surface.bound_to_free_jacobian(gctx, &reference);

        let mut transported = self.chain(gctx, state, &free_to_path, free_to_bound_jacobian.as_ref());
        transported.correction.bound = transported
            .correction
            .free
            .as_ref()
            .and_then(|moments| self.correct_bound(gctx, surface.as_ref(), moments));
        transported.jac_to_global = jac_to_global;
        transported.reference = reference;
        transported.reference_surface = Arc::clone(surface);
        Ok(transported)
    }

    fn compute_to_curvilinear(
        &self,
        gctx: &GeometryContext,
        state: &StepState<T>,
    ) -> crate::Result<Transported<T>> {
        let tolerance = self.config.curvilinear_tolerance;
        let direction = state.parameters.direction();
        trace!(branch = ?CurvilinearBranch::select(&direction, tolerance), "transport to curvilinear");

        let free_to_path = curvilinear_free_to_path_derivative(&direction);
        let free_to_curvilinear = if self.skip_first_order(&direction)? {
            None
        } else {
            Some(free_to_curvilinear_jacobian(&direction, tolerance)?)
        };
        let jac_to_global = curvilinear_bound_to_free_jacobian(&direction, tolerance)?;

        let curvilinear = CurvilinearTrackParameters::from_free(&state.parameters, None)?;
        let surface: SurfaceHandle<T> = Arc::new(PlaneSurface::curvilinear(
            &curvilinear.position(),
            curvilinear.direction(),
            tolerance,
        ));

        let mut transported = self.chain(gctx, state, &free_to_path, free_to_curvilinear.as_ref());
        transported.correction.bound = transported
            .correction
            .free
            .as_ref()
            .and_then(|moments| self.correct_bound(gctx, surface.as_ref(), moments));
        transported.jac_to_global = jac_to_global;
        transported.reference = curvilinear.bound_parameters();
        transported.reference_surface = surface;
        Ok(transported)
    }

    /// Returns true if the first-order bound projection must be skipped
    /// because the direction lies on the polar axis.
    ///
    /// # Errors
    /// `DegenerateDirection` on the polar axis when there is no corrected
    /// covariance to fall back on.
    fn skip_first_order(&self, direction: &Vector3<T>) -> crate::Result<bool> {
        if !on_polar_axis(direction) {
            return Ok(false);
        }
        if !self.config.nonlinear_correction {
            return Err(ProjectionError::DegenerateDirection.into());
        }
        warn!("direction on the polar axis, first-order bound covariance unavailable");
        Ok(true)
    }

    fn untransported() -> (
        BoundJacobian<T>,
        Option<BoundCovariance<T>>,
        NonlinearCorrection<T>,
        FirstOrder,
    ) {
        (
            BoundJacobian::identity(),
            None,
            NonlinearCorrection::default(),
            FirstOrder::NotRequested,
        )
    }

    /// First-order chain and free-side correction; the reference fields are
    /// filled in by the caller. Without a free→bound Jacobian only the free
    /// side is transported.
    fn chain(
        &self,
        gctx: &GeometryContext,
        state: &StepState<T>,
        free_to_path: &FreeToPathDerivative<T>,
        free_to_bound_jacobian: Option<&FreeToBoundJacobian<T>>,
    ) -> Transported<T> {
        let path_corrected = path_correction(&state.derivatives, free_to_path).compose(&state.jac_transport);
        let start_to_final_free = path_corrected.compose(&state.jac_to_global);
        let free_covariance = start_to_final_free.conjugate(&state.covariance).symmetrize();

        let (jacobian, covariance, first_order) = match free_to_bound_jacobian {
            Some(to_bound) => (
                to_bound.compose(&start_to_final_free),
                Some(to_bound.conjugate(&free_covariance).symmetrize()),
                FirstOrder::Projected,
            ),
            None => (BoundJacobian::identity(), None, FirstOrder::Degenerate),
        };
        debug!(
            free_trace = %free_covariance.trace(),
            bound_trace = ?covariance.map(|c| c.trace()),
            "transported covariance"
        );

        let free = if self.config.nonlinear_correction {
            self.correct_free_at_reference(gctx, state).map(|corrected| {
                let reference_free =
                    bound_to_free(gctx, state.reference_surface.as_ref(), &state.reference);
                let shift = FreeVector::from_svector(
                    corrected.mean.as_svector() - reference_free.as_svector(),
                );
                FreeMoments::new(
                    state.parameters + path_corrected.apply(&shift),
                    path_corrected.conjugate(&corrected.covariance).symmetrize(),
                )
            })
        } else {
            None
        };

        Transported {
            jacobian,
            covariance,
            first_order,
            free_covariance,
            jac_to_global: state.jac_to_global,
            reference: state.reference,
            reference_surface: Arc::clone(&state.reference_surface),
            correction: NonlinearCorrection { free, bound: None },
        }
    }

    fn correct_free_at_reference(
        &self,
        gctx: &GeometryContext,
        state: &StepState<T>,
    ) -> Option<FreeMoments<T>> {
        match self.corrector.bound_to_free(
            gctx,
            state.reference_surface.as_ref(),
            &state.reference,
            &state.covariance,
        ) {
            Ok(moments) => Some(moments),
            Err(err) => {
                warn!(%err, "bound to free correction discarded");
                None
            }
        }
    }

    fn correct_bound<S: Surface<T> + ?Sized>(
        &self,
        gctx: &GeometryContext,
        surface: &S,
        moments: &FreeMoments<T>,
    ) -> Option<BoundMoments<T>> {
        match self.corrector.free_to_bound(
            gctx,
            surface,
            &moments.mean,
            &moments.covariance,
            self.config.on_surface_tolerance,
        ) {
            Ok(moments) => Some(moments),
            Err(err) => {
                warn!(%err, "free to bound correction discarded");
                None
            }
        }
    }

    /// Re-initializes the state at the new reference point. Without any bound
    /// covariance there the state keeps accumulating from the previous one.
    fn commit(state: &mut StepState<T>, transported: Transported<T>) {
        let corrected = transported.correction.bound.as_ref().map(|moments| moments.covariance);
        let covariance = match transported.covariance.or(corrected) {
            Some(covariance) => covariance,
            None => {
                warn!("no bound covariance at the new reference point, state not re-initialized");
                return;
            }
        };

        state.jacobian = transported.jacobian;
        state.covariance = covariance;
        state.free_covariance = transported.free_covariance;
        state.jac_to_global = transported.jac_to_global;
        state.reference = transported.reference;
        state.reference_surface = transported.reference_surface;
        state.reset_jacobians();
    }
}
