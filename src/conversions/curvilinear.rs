//! Curvilinear frame and Jacobians
//!
//! The curvilinear frame is built from the direction alone: the normal is the
//! direction `T`, the first local axis `U` is perpendicular to a reference
//! axis and `V = T × U`.
//!
//! # Branches
//!
//! - **Standard** (`|cos(theta)| < tolerance`): reference axis is global z,
//!   `U = (-sin(phi), cos(phi), 0)`.
//! - **Grazing** (`|cos(theta)| >= tolerance`): the direction is nearly
//!   parallel to z, so global x is used instead and
//!   `U = (0, -z, y) / sqrt(y² + z²)`.
//!
//! Both branches are exact; they describe different, equally valid frames.
//! The branch selected for a Jacobian must match the one used for the frame.

use nalgebra::{Matrix3, RealField, Vector3};
use tracing::trace;

use super::angles::DirectionTrig;
use crate::geometry::jacobians::{init_jacobian_to_global_from_trig, init_jacobian_to_local};
use crate::types::spaces::{bound_index, free_index};
use crate::types::transforms::{BoundToFreeJacobian, FreeToBoundJacobian, FreeToPathDerivative};
use crate::ProjectionError;

/// Default threshold on `|cos(theta)|` above which the grazing branch is used.
pub const DEFAULT_CURVILINEAR_TOLERANCE: f64 = 0.999;

/// Which construction of the curvilinear frame applies to a direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurvilinearBranch {
    /// Local x axis perpendicular to global z
    Standard,
    /// Local x axis perpendicular to global x
    Grazing,
}

impl CurvilinearBranch {
    /// Selects the branch for a unit `direction`.
    #[inline]
    pub fn select<T: RealField + Copy>(direction: &Vector3<T>, tolerance: T) -> Self {
        if direction.z.abs() < tolerance {
            CurvilinearBranch::Standard
        } else {
            CurvilinearBranch::Grazing
        }
    }
}

/// Curvilinear frame of a direction: columns `U`, `V`, `T`.
///
/// The direction is normalized first. The frame is a proper rotation for
/// every non-zero direction as long as `0 < tolerance < 1`.
pub fn curvilinear_frame<T: RealField + Copy>(direction: &Vector3<T>, tolerance: T) -> Matrix3<T> {
    let t = direction.normalize();
    let u = match CurvilinearBranch::select(&t, tolerance) {
        CurvilinearBranch::Standard => Vector3::z().cross(&t).normalize(),
        CurvilinearBranch::Grazing => Vector3::x().cross(&t).normalize(),
    };
    let v = t.cross(&u);
    Matrix3::from_columns(&[u, v, t])
}

/// Jacobian from free parameters to curvilinear bound parameters.
///
/// # Errors
/// `DegenerateDirection` exactly on the polar axis, where the azimuth row has
/// no finite value; `SingularProjection` for a zero direction.
pub fn free_to_curvilinear_jacobian<T: RealField + Copy>(
    direction: &Vector3<T>,
    tolerance: T,
) -> Result<FreeToBoundJacobian<T>, ProjectionError> {
    let mut jacobian = FreeToBoundJacobian::zeros();
    init_jacobian_to_local(&mut jacobian, direction)?;

    let frame = curvilinear_frame(direction, tolerance);
    trace!(branch = ?CurvilinearBranch::select(&direction.normalize(), tolerance), "free to curvilinear");

    let m = jacobian.as_matrix_mut();
    m.fixed_view_mut::<2, 3>(bound_index::LOC0, free_index::POS0)
        .copy_from(&frame.fixed_view::<3, 2>(0, 0).transpose());
    m[(bound_index::TIME, free_index::TIME)] = T::one();
    m[(bound_index::QOVERP, free_index::QOVERP)] = T::one();
    Ok(jacobian)
}

/// Jacobian from curvilinear bound parameters to free parameters.
///
/// Finite for every non-zero direction, including the poles where the
/// azimuth column vanishes.
pub fn curvilinear_bound_to_free_jacobian<T: RealField + Copy>(
    direction: &Vector3<T>,
    tolerance: T,
) -> Result<BoundToFreeJacobian<T>, ProjectionError> {
    let trig = DirectionTrig::from_direction(direction)?;
    let frame = curvilinear_frame(direction, tolerance);

    let mut jacobian = BoundToFreeJacobian::zeros();
    {
        let m = jacobian.as_matrix_mut();
        m.fixed_view_mut::<3, 2>(free_index::POS0, bound_index::LOC0)
            .copy_from(&frame.fixed_view::<3, 2>(0, 0));
        m[(free_index::TIME, bound_index::TIME)] = T::one();
        m[(free_index::QOVERP, bound_index::QOVERP)] = T::one();
    }
    init_jacobian_to_global_from_trig(&mut jacobian, &trig);
    Ok(jacobian)
}

/// Path-length sensitivity on the curvilinear plane: `-direction` in the
/// position slots.
pub fn curvilinear_free_to_path_derivative<T: RealField + Copy>(
    direction: &Vector3<T>,
) -> FreeToPathDerivative<T> {
    let mut row = FreeToPathDerivative::zeros();
    for k in 0..3 {
        row.as_matrix_mut()[(0, free_index::POS0 + k)] = -direction[k];
    }
    row
}
