//! Surface material
//!
//! Immutable material description attached to surfaces during geometry
//! construction and shared read-only afterwards.

use nalgebra::RealField;

/// Homogeneous material layer carried by a surface.
///
/// Shared between surfaces through `Arc`; never mutated once the geometry
/// has been built.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceMaterial<T: RealField> {
    /// Layer thickness
    pub thickness: T,
    /// Radiation length X0
    pub radiation_length: T,
    /// Nuclear interaction length L0
    pub interaction_length: T,
}

impl<T: RealField + Copy> SurfaceMaterial<T> {
    /// Creates a material layer.
    ///
    /// # Panics
    /// Panics if any length is not positive.
    pub fn new(thickness: T, radiation_length: T, interaction_length: T) -> Self {
        assert!(thickness > T::zero(), "Material thickness must be positive");
        assert!(radiation_length > T::zero(), "Radiation length must be positive");
        assert!(interaction_length > T::zero(), "Interaction length must be positive");
        Self {
            thickness,
            radiation_length,
            interaction_length,
        }
    }

    /// Thickness in units of radiation length.
    #[inline]
    pub fn thickness_in_x0(&self) -> T {
        self.thickness / self.radiation_length
    }

    /// Thickness in units of interaction length.
    #[inline]
    pub fn thickness_in_l0(&self) -> T {
        self.thickness / self.interaction_length
    }
}
