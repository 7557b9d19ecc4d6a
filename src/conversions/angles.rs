//! Direction angles
//!
//! Conversions between a direction vector and its azimuthal/polar angles,
//! `direction = (cos(phi) sin(theta), sin(phi) sin(theta), cos(theta))`.

use nalgebra::{RealField, Vector3};

use crate::ProjectionError;

/// Unit direction from azimuthal and polar angles.
#[inline]
pub fn direction_from_angles<T: RealField + Copy>(phi: T, theta: T) -> Vector3<T> {
    DirectionTrig::from_angles(phi, theta).direction()
}

/// Azimuthal and polar angles of a direction.
///
/// Uses `atan2` on both angles, so the direction does not need to be
/// normalized and the result stays accurate near the poles.
///
/// # Returns
/// `(phi, theta)` with `phi` in `(-pi, pi]` and `theta` in `[0, pi]`, or
/// `SingularProjection` for a zero or non-finite direction.
pub fn angles_from_direction<T: RealField + Copy>(
    direction: &Vector3<T>,
) -> Result<(T, T), ProjectionError> {
    let norm = direction.norm();
    if !norm.is_finite() || norm == T::zero() {
        return Err(ProjectionError::SingularProjection);
    }
    let transverse = (direction.x * direction.x + direction.y * direction.y).sqrt();
    Ok((direction.y.atan2(direction.x), transverse.atan2(direction.z)))
}

/// Returns true if the direction lies exactly on the polar axis, where the
/// azimuth has no derivative.
#[inline]
pub fn on_polar_axis<T: RealField + Copy>(direction: &Vector3<T>) -> bool {
    direction.x == T::zero() && direction.y == T::zero()
}

/// Trigonometric functions of a direction's angles, without evaluating any
/// inverse trigonometric function.
///
/// At the poles (`sin(theta) = 0`) the azimuth is undefined; the convention
/// `phi = 0` is used so that `cos_phi = 1` and `sin_phi = 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionTrig<T: RealField> {
    pub cos_phi: T,
    pub sin_phi: T,
    pub cos_theta: T,
    pub sin_theta: T,
}

impl<T: RealField + Copy> DirectionTrig<T> {
    /// Evaluates the trigonometric functions of the given angles.
    #[inline]
    pub fn from_angles(phi: T, theta: T) -> Self {
        let (sin_phi, cos_phi) = phi.sin_cos();
        let (sin_theta, cos_theta) = theta.sin_cos();
        Self {
            cos_phi,
            sin_phi,
            cos_theta,
            sin_theta,
        }
    }

    /// Unit direction described by these angles.
    #[inline]
    pub fn direction(&self) -> Vector3<T> {
        Vector3::new(
            self.cos_phi * self.sin_theta,
            self.sin_phi * self.sin_theta,
            self.cos_theta,
        )
    }

    /// Evaluates the trigonometric functions of a direction.
    ///
    /// The direction is normalized first; a zero or non-finite direction
    /// yields `SingularProjection`.
    pub fn from_direction(direction: &Vector3<T>) -> Result<Self, ProjectionError> {
        let norm = direction.norm();
        if !norm.is_finite() || norm == T::zero() {
            return Err(ProjectionError::SingularProjection);
        }
        let d = direction / norm;
        let sin_theta = (d.x * d.x + d.y * d.y).sqrt();
        let (cos_phi, sin_phi) = if sin_theta > T::zero() {
            (d.x / sin_theta, d.y / sin_theta)
        } else {
            (T::one(), T::zero())
        };
        Ok(Self {
            cos_phi,
            sin_phi,
            cos_theta: d.z,
            sin_theta,
        })
    }

    /// `1 / sin(theta)`, or `DegenerateDirection` exactly on the polar axis.
    #[inline]
    pub fn inv_sin_theta(&self) -> Result<T, ProjectionError> {
        if self.sin_theta == T::zero() {
            return Err(ProjectionError::DegenerateDirection);
        }
        Ok(T::one() / self.sin_theta)
    }
}
