//! Angular blocks of the bound↔free Jacobians
//!
//! Only the direction/angle blocks depend on the parameterization of the
//! direction; the position blocks come from the surface reference frame.

use nalgebra::{RealField, Vector3};

use crate::conversions::angles::DirectionTrig;
use crate::types::spaces::{bound_index, free_index};
use crate::types::transforms::{BoundToFreeJacobian, FreeToBoundJacobian};
use crate::ProjectionError;

/// Fills the direction rows of a bound→free Jacobian: `d(direction)/d(phi, theta)`.
///
/// At `sin(theta) = 0` the phi column vanishes; the Jacobian stays finite but
/// loses rank, which is why local angles are never recovered from it there.
pub fn init_jacobian_to_global<T: RealField + Copy>(
    jacobian: &mut BoundToFreeJacobian<T>,
    phi: T,
    theta: T,
) {
    init_jacobian_to_global_from_trig(jacobian, &DirectionTrig::from_angles(phi, theta));
}

/// Same as [`init_jacobian_to_global`], from precomputed trigonometric functions.
pub fn init_jacobian_to_global_from_trig<T: RealField + Copy>(
    jacobian: &mut BoundToFreeJacobian<T>,
    trig: &DirectionTrig<T>,
) {
    let m = jacobian.as_matrix_mut();
    m[(free_index::DIR0, bound_index::PHI)] = -trig.sin_theta * trig.sin_phi;
    m[(free_index::DIR0, bound_index::THETA)] = trig.cos_theta * trig.cos_phi;
    m[(free_index::DIR1, bound_index::PHI)] = trig.sin_theta * trig.cos_phi;
    m[(free_index::DIR1, bound_index::THETA)] = trig.cos_theta * trig.sin_phi;
    m[(free_index::DIR2, bound_index::THETA)] = -trig.sin_theta;
}

/// Fills the angle rows of a free→bound Jacobian: `d(phi, theta)/d(direction)`.
///
/// Angles are recovered with `sin(theta) = sqrt(x² + y²)`. Returns
/// `DegenerateDirection` without touching the Jacobian when the direction is
/// exactly on the polar axis.
pub fn init_jacobian_to_local<T: RealField + Copy>(
    jacobian: &mut FreeToBoundJacobian<T>,
    direction: &Vector3<T>,
) -> Result<(), ProjectionError> {
    let trig = DirectionTrig::from_direction(direction)?;
    let inv_sin_theta = trig.inv_sin_theta()?;
    let m = jacobian.as_matrix_mut();

    m[(bound_index::PHI, free_index::DIR0)] = -trig.sin_phi * inv_sin_theta;
    m[(bound_index::PHI, free_index::DIR1)] = trig.cos_phi * inv_sin_theta;
    m[(bound_index::THETA, free_index::DIR0)] = trig.cos_phi * trig.cos_theta;
    m[(bound_index::THETA, free_index::DIR1)] = trig.sin_phi * trig.cos_theta;
    m[(bound_index::THETA, free_index::DIR2)] = -trig.sin_theta;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversions::angles::direction_from_angles;
    use approx::assert_relative_eq;

    #[test]
    fn test_angular_blocks_are_inverse() {
        let (phi, theta) = (0.4_f64, 2.1);
        let mut to_global = BoundToFreeJacobian::zeros();
        let mut to_local = FreeToBoundJacobian::zeros();

        init_jacobian_to_global(&mut to_global, phi, theta);
        init_jacobian_to_local(&mut to_local, &direction_from_angles(phi, theta)).unwrap();

        let product = to_local.as_matrix() * to_global.as_matrix();
        for i in [bound_index::PHI, bound_index::THETA] {
            for j in [bound_index::PHI, bound_index::THETA] {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(product[(i, j)], expected, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_to_global_matches_finite_difference() {
        let (phi, theta) = (-1.1_f64, 0.7);
        let mut jac = BoundToFreeJacobian::zeros();
        init_jacobian_to_global(&mut jac, phi, theta);

        let h = 1e-7;
        let d_phi = (direction_from_angles(phi + h, theta) - direction_from_angles(phi - h, theta))
            / (2.0 * h);
        let d_theta = (direction_from_angles(phi, theta + h)
            - direction_from_angles(phi, theta - h))
            / (2.0 * h);

        for k in 0..3 {
            assert_relative_eq!(
                jac.as_matrix()[(free_index::DIR0 + k, bound_index::PHI)],
                d_phi[k],
                epsilon = 1e-7
            );
            assert_relative_eq!(
                jac.as_matrix()[(free_index::DIR0 + k, bound_index::THETA)],
                d_theta[k],
                epsilon = 1e-7
            );
        }
    }

    #[test]
    fn test_to_local_rejects_pole() {
        let mut jac = FreeToBoundJacobian::<f64>::zeros();
        let result = init_jacobian_to_local(&mut jac, &Vector3::new(0.0, 0.0, 1.0));

        assert_eq!(result, Err(ProjectionError::DegenerateDirection));
        assert!(jac.as_matrix().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_to_global_is_finite_at_pole() {
        let mut jac = BoundToFreeJacobian::<f64>::zeros();
        init_jacobian_to_global(&mut jac, 0.0, 0.0);
        assert!(jac.is_finite());
        assert_eq!(jac.as_matrix()[(free_index::DIR0, bound_index::THETA)], 1.0);
    }
}
