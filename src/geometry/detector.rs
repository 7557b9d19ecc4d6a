//! Detector elements and layers
//!
//! Surfaces refer to both through `Weak` handles only, so the
//! surface/layer/element graph never forms an ownership cycle.

use nalgebra::{Isometry3, RealField};

use super::context::GeometryContext;

/// A physical detector element that owns the context-dependent placement of
/// its surface.
///
/// Implementations resolve alignment from the context payload; the
/// returned placement overrides the surface's nominal one.
pub trait DetectorElement<T: RealField>: ::core::fmt::Debug + Send + Sync {
    /// Placement of the element in the given context.
    fn transform(&self, gctx: &GeometryContext) -> Isometry3<T>;

    /// Thickness of the sensitive element.
    fn thickness(&self) -> T;
}

/// A detector element whose placement can be shifted by an alignment
/// correction stored in the geometry context.
///
/// The context payload must be an [`AlignmentCorrection`]; any other context
/// resolves to the nominal placement.
#[derive(Debug, Clone)]
pub struct AlignableElement<T: RealField> {
    /// Nominal placement
    pub nominal: Isometry3<T>,
    /// Sensitive thickness
    pub thickness: T,
}

/// Alignment delta applied on top of nominal placements.
#[derive(Debug, Clone)]
pub struct AlignmentCorrection<T: RealField> {
    /// Correction applied after the nominal placement
    pub delta: Isometry3<T>,
}

impl<T: RealField + Copy> AlignableElement<T> {
    /// Creates an element with the given nominal placement.
    pub fn new(nominal: Isometry3<T>, thickness: T) -> Self {
        Self { nominal, thickness }
    }
}

impl<T: RealField + Copy> DetectorElement<T> for AlignableElement<T> {
    fn transform(&self, gctx: &GeometryContext) -> Isometry3<T> {
        match gctx.get::<AlignmentCorrection<T>>() {
            Some(correction) => correction.delta * self.nominal,
            None => self.nominal,
        }
    }

    fn thickness(&self) -> T {
        self.thickness
    }
}

/// A detector layer grouping surfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    /// Layer identifier inside its volume
    pub id: u32,
    /// Human-readable name
    pub name: String,
}

impl Layer {
    /// Creates a layer.
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}
