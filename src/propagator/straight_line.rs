//! Straight-line stepper
//!
//! Minimal field-free propagation: advances the free parameters along their
//! direction and accumulates the free transport Jacobian and the path
//! derivatives in the step state. Particles are assumed to carry unit
//! charge.

use nalgebra::{RealField, SMatrix};
use tracing::trace;

use super::state::StepState;
use crate::geometry::context::GeometryContext;
use crate::geometry::surface::{is_parallel_incidence, Surface};
use crate::types::spaces::{free_index, FreeVector};
use crate::types::transforms::FreeTransportJacobian;
use crate::ProjectionError;

/// Speed of light in mm/ns.
pub const SPEED_OF_LIGHT: f64 = 299.792458;

/// Field-free stepper for particles of a given mass (GeV).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StraightLineStepper<T: RealField> {
    /// Particle mass
    pub mass: T,
}

impl<T: RealField + Copy> StraightLineStepper<T> {
    pub fn new(mass: T) -> Self {
        Self { mass }
    }

    /// `dt/ds` and its derivative with respect to q/p.
    fn time_derivatives(&self, q_over_p: T) -> (T, T) {
        let c: T = nalgebra::convert(SPEED_OF_LIGHT);
        let m2 = self.mass * self.mass;
        let gamma_term = (T::one() + m2 * q_over_p * q_over_p).sqrt();
        (gamma_term / c, m2 * q_over_p / (c * gamma_term))
    }

    /// Advances the state by `step` along the current direction.
    pub fn step(&self, state: &mut StepState<T>, step: T) {
        let free = state.parameters;
        let direction = free.direction();
        let (dtds, d_dtds_dqop) = self.time_derivatives(free.q_over_p());

        state.parameters = FreeVector::new(
            &(free.position() + direction * step),
            free.time() + dtds * step,
            &direction,
            free.q_over_p(),
        );

        let mut step_jacobian = SMatrix::<T, 8, 8>::identity();
        for k in 0..3 {
            step_jacobian[(free_index::POS0 + k, free_index::DIR0 + k)] = step;
        }
        step_jacobian[(free_index::TIME, free_index::QOVERP)] = d_dtds_dqop * step;
        state.jac_transport =
            FreeTransportJacobian::from_matrix(step_jacobian * state.jac_transport.as_matrix());

        let mut derivatives = FreeVector::zeros();
        for k in 0..3 {
            derivatives.set(free_index::POS0 + k, direction[k]);
        }
        derivatives.set(free_index::TIME, dtds);
        state.derivatives = derivatives;

        state.path_length += step;
    }

    /// Distance along the current direction to the plane of `surface`.
    ///
    /// # Errors
    /// `ParallelIncidence` if the direction lies in the plane, up to
    /// rounding of the plane normal.
    pub fn distance_to<S: Surface<T> + ?Sized>(
        &self,
        gctx: &GeometryContext,
        state: &StepState<T>,
        surface: &S,
    ) -> Result<T, ProjectionError> {
        let normal = surface.normal(gctx);
        let incidence = normal.dot(&state.parameters.direction());
        if is_parallel_incidence(incidence, &state.parameters.direction()) {
            return Err(ProjectionError::ParallelIncidence);
        }
        Ok(normal.dot(&(surface.center(gctx) - state.parameters.position())) / incidence)
    }

    /// Steps onto the plane of `surface` and returns the step taken.
    pub fn step_to_surface<S: Surface<T> + ?Sized>(
        &self,
        gctx: &GeometryContext,
        state: &mut StepState<T>,
        surface: &S,
    ) -> Result<T, ProjectionError> {
        let distance = self.distance_to(gctx, state, surface)?;
        trace!(%distance, "straight line step to surface");
        self.step(state, distance);
        Ok(distance)
    }
}
