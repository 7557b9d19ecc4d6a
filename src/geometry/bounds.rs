//! Surface bounds
//!
//! Boundary membership tests on local surface coordinates.

use nalgebra::{RealField, Vector2};

/// Trait for the boundary of a surface in its local coordinates.
pub trait SurfaceBounds<T: RealField>: ::core::fmt::Debug + Send + Sync {
    /// Returns true if `local` lies inside the bounds, enlarged by `tolerance`.
    fn inside(&self, local: &Vector2<T>, tolerance: T) -> bool;
}

/// Bounds that accept every local position.
#[derive(Debug, Clone, Copy, Default)]
pub struct InfiniteBounds;

impl<T: RealField> SurfaceBounds<T> for InfiniteBounds {
    fn inside(&self, _local: &Vector2<T>, _tolerance: T) -> bool {
        true
    }
}

/// Axis-aligned rectangle centred on the local origin.
#[derive(Debug, Clone, Copy)]
pub struct RectangleBounds<T: RealField> {
    /// Half length along local x
    pub half_x: T,
    /// Half length along local y
    pub half_y: T,
}

impl<T: RealField + Copy> RectangleBounds<T> {
    /// Creates rectangle bounds.
    ///
    /// # Panics
    /// Panics if either half length is not positive.
    pub fn new(half_x: T, half_y: T) -> Self {
        assert!(half_x > T::zero(), "Half length half_x must be positive");
        assert!(half_y > T::zero(), "Half length half_y must be positive");
        Self { half_x, half_y }
    }
}

impl<T: RealField + Copy> SurfaceBounds<T> for RectangleBounds<T> {
    fn inside(&self, local: &Vector2<T>, tolerance: T) -> bool {
        local.x.abs() <= self.half_x + tolerance && local.y.abs() <= self.half_y + tolerance
    }
}
