//! Bound ↔ free parameter conversion
//!
//! Maps parameter vectors through a surface's placement and reference
//! frame. Only [`free_to_bound`] can fail: the global position has to be
//! expressible in the surface's local coordinates.

use nalgebra::RealField;

use super::angles::{angles_from_direction, direction_from_angles};
use crate::geometry::context::GeometryContext;
use crate::geometry::surface::Surface;
use crate::types::spaces::{BoundVector, FreeVector};
use crate::ProjectionError;

/// Converts bound parameters on `surface` into free parameters.
pub fn bound_to_free<T, S>(gctx: &GeometryContext, surface: &S, bound: &BoundVector<T>) -> FreeVector<T>
where
    T: RealField + Copy,
    S: Surface<T> + ?Sized,
{
    let direction = direction_from_angles(bound.phi(), bound.theta());
    let position = surface.local_to_global(gctx, &bound.local_position(), &direction);
    FreeVector::new(&position, bound.time(), &direction, bound.q_over_p())
}

/// Converts free parameters into bound parameters on `surface`.
///
/// # Errors
/// - `OffSurface` if the position is farther than `tolerance` from the surface
/// - `SingularProjection` for a zero or non-finite direction, or non-finite
///   local coordinates
pub fn free_to_bound<T, S>(
    gctx: &GeometryContext,
    surface: &S,
    free: &FreeVector<T>,
    tolerance: T,
) -> Result<BoundVector<T>, ProjectionError>
where
    T: RealField + Copy,
    S: Surface<T> + ?Sized,
{
    let position = free.position();
    let direction = free.direction();
    let local = surface.global_to_local(gctx, &position, &direction, tolerance)?;
    let (phi, theta) = angles_from_direction(&direction)?;

    let bound = BoundVector::new(local.x, local.y, phi, theta, free.q_over_p(), free.time());
    if !bound.is_finite() {
        return Err(ProjectionError::SingularProjection);
    }
    Ok(bound)
}
