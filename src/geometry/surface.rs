//! Reference surfaces
//!
//! The capability set the transport engine consumes from geometry:
//! placement, local reference frame, local↔global projection, path-length
//! sensitivity and the bound↔free Jacobians.
//!
//! # Shape Polymorphism
//!
//! [`Surface`] carries default implementations of the generic behavior
//! (placement rotation as reference frame, normal along the local z axis).
//! Shapes only have to provide the local↔global projections; shapes with a
//! position-dependent frame (cylinders, cones) override `reference_frame`.

use std::sync::{Arc, Weak};

use nalgebra::{
    Isometry3, Matrix3, Point3, RealField, Rotation3, Translation3, UnitQuaternion, Vector2,
    Vector3,
};
use tracing::trace;

use super::bounds::{InfiniteBounds, SurfaceBounds};
use super::context::GeometryContext;
use super::detector::{DetectorElement, Layer};
use super::jacobians::{init_jacobian_to_global, init_jacobian_to_local};
use super::material::SurfaceMaterial;
use crate::conversions::angles::direction_from_angles;
use crate::conversions::curvilinear::{curvilinear_frame, DEFAULT_CURVILINEAR_TOLERANCE};
use crate::types::spaces::{bound_index, free_index, BoundVector, FreeVector};
use crate::types::transforms::{BoundToFreeJacobian, FreeToBoundJacobian, FreeToPathDerivative};
use crate::ProjectionError;

/// Shared handle to a reference surface, embedded in produced parameters.
pub type SurfaceHandle<T> = Arc<dyn Surface<T>>;

/// Largest `|n·d| / |d|` treated as a direction lying in a plane.
///
/// Plane normals go through a quaternion and carry rounding error, so an
/// in-plane direction rarely gives an exact zero.
pub const PARALLEL_INCIDENCE_TOLERANCE: f64 = 1e-10;

/// Returns true if `incidence = n·d` is too small (or not finite) for a
/// path length to the plane to be meaningful.
#[inline]
pub fn is_parallel_incidence<T: RealField + Copy>(incidence: T, direction: &Vector3<T>) -> bool {
    let tolerance: T = nalgebra::convert(PARALLEL_INCIDENCE_TOLERANCE);
    !incidence.is_finite() || incidence.abs() <= tolerance * direction.norm()
}

// ============================================================================
// Surface Trait
// ============================================================================

/// Trait for reference surfaces of bound track parameters.
///
/// Surfaces are long-lived and shared; every query takes the geometry
/// context by reference and leaves the surface untouched.
pub trait Surface<T: RealField + Copy>: ::core::fmt::Debug + Send + Sync {
    /// Nominal placement, used when no detector element overrides it.
    fn placement(&self) -> &Isometry3<T>;

    /// Boundary of the surface in local coordinates.
    fn bounds(&self) -> &dyn SurfaceBounds<T>;

    /// Projects a global position into local coordinates.
    ///
    /// Fails with `OffSurface` if the position is farther than `tolerance`
    /// from the surface.
    fn global_to_local(
        &self,
        gctx: &GeometryContext,
        position: &Vector3<T>,
        direction: &Vector3<T>,
        tolerance: T,
    ) -> Result<Vector2<T>, ProjectionError>;

    /// Maps local coordinates to a global position on the surface.
    fn local_to_global(
        &self,
        gctx: &GeometryContext,
        local: &Vector2<T>,
        direction: &Vector3<T>,
    ) -> Vector3<T>;

    /// Detector element providing a context-dependent placement, if still alive.
    fn detector_element(&self) -> Option<Arc<dyn DetectorElement<T>>> {
        None
    }

    /// Enclosing layer, if still alive.
    fn layer(&self) -> Option<Arc<Layer>> {
        None
    }

    /// Shared material description.
    fn material(&self) -> Option<&Arc<SurfaceMaterial<T>>> {
        None
    }

    /// Current placement; delegates to the detector element when bound to one.
    fn transform(&self, gctx: &GeometryContext) -> Isometry3<T> {
        match self.detector_element() {
            Some(element) => element.transform(gctx),
            None => *self.placement(),
        }
    }

    /// Center of the surface (translation of the placement).
    fn center(&self, gctx: &GeometryContext) -> Vector3<T> {
        self.transform(gctx).translation.vector
    }

    /// Normal of the surface (local z axis of the placement).
    fn normal(&self, gctx: &GeometryContext) -> Vector3<T> {
        self.transform(gctx).rotation * Vector3::z()
    }

    /// Local reference frame at a point: columns are the two measurement
    /// axes and the frame normal.
    fn reference_frame(
        &self,
        gctx: &GeometryContext,
        _position: &Vector3<T>,
        _direction: &Vector3<T>,
    ) -> Matrix3<T> {
        self.transform(gctx).rotation.to_rotation_matrix().into_inner()
    }

    /// Boundary membership of a local position.
    fn inside_bounds(&self, local: &Vector2<T>, tolerance: T) -> bool {
        self.bounds().inside(local, tolerance)
    }

    /// Derivative of the path length to the surface with respect to the free
    /// parameters: `-n / (n·d)` in the position slots.
    ///
    /// Fails with `ParallelIncidence` when the direction lies in the frame plane.
    fn free_to_path_derivative(
        &self,
        gctx: &GeometryContext,
        position: &Vector3<T>,
        direction: &Vector3<T>,
    ) -> Result<FreeToPathDerivative<T>, ProjectionError> {
        let frame = self.reference_frame(gctx, position, direction);
        let normal = frame.column(2);
        let incidence = normal.dot(direction);
        if is_parallel_incidence(incidence, direction) {
            return Err(ProjectionError::ParallelIncidence);
        }

        let mut row = FreeToPathDerivative::zeros();
        for k in 0..3 {
            row.as_matrix_mut()[(0, free_index::POS0 + k)] = -normal[k] / incidence;
        }
        Ok(row)
    }

    /// Jacobian from bound parameters on this surface to free parameters.
    fn bound_to_free_jacobian(
        &self,
        gctx: &GeometryContext,
        bound: &BoundVector<T>,
    ) -> BoundToFreeJacobian<T> {
        let direction = direction_from_angles(bound.phi(), bound.theta());
        let position = self.local_to_global(gctx, &bound.local_position(), &direction);
        let frame = self.reference_frame(gctx, &position, &direction);

        let mut jacobian = BoundToFreeJacobian::zeros();
        {
            let m = jacobian.as_matrix_mut();
            m.fixed_view_mut::<3, 2>(free_index::POS0, bound_index::LOC0)
                .copy_from(&frame.fixed_view::<3, 2>(0, 0));
            m[(free_index::TIME, bound_index::TIME)] = T::one();
            m[(free_index::QOVERP, bound_index::QOVERP)] = T::one();
        }
        init_jacobian_to_global(&mut jacobian, bound.phi(), bound.theta());
        jacobian
    }

    /// Jacobian from free parameters to bound parameters on this surface.
    ///
    /// Fails with `DegenerateDirection` on the polar axis, where the
    /// azimuth has no derivative.
    fn free_to_bound_jacobian(
        &self,
        gctx: &GeometryContext,
        free: &FreeVector<T>,
    ) -> Result<FreeToBoundJacobian<T>, ProjectionError> {
        let position = free.position();
        let direction = free.direction();
        let frame = self.reference_frame(gctx, &position, &direction);

        let mut jacobian = FreeToBoundJacobian::zeros();
        init_jacobian_to_local(&mut jacobian, &direction)?;
        let m = jacobian.as_matrix_mut();
        m.fixed_view_mut::<2, 3>(bound_index::LOC0, free_index::POS0)
            .copy_from(&frame.fixed_view::<3, 2>(0, 0).transpose());
        m[(bound_index::TIME, free_index::TIME)] = T::one();
        m[(bound_index::QOVERP, free_index::QOVERP)] = T::one();
        Ok(jacobian)
    }
}

// ============================================================================
// Plane Surface
// ============================================================================

/// A planar surface; local coordinates are the placement's x and y axes.
#[derive(Debug, Clone)]
pub struct PlaneSurface<T: RealField> {
    placement: Isometry3<T>,
    bounds: Arc<dyn SurfaceBounds<T>>,
    detector_element: Option<Weak<dyn DetectorElement<T>>>,
    layer: Option<Weak<Layer>>,
    material: Option<Arc<SurfaceMaterial<T>>>,
}

impl<T: RealField + Copy> PlaneSurface<T> {
    /// Creates an unbounded plane with the given placement.
    pub fn new(placement: Isometry3<T>) -> Self {
        Self {
            placement,
            bounds: Arc::new(InfiniteBounds),
            detector_element: None,
            layer: None,
            material: None,
        }
    }

    /// Creates an unbounded plane through `center` with normal `normal`.
    ///
    /// The local frame is the curvilinear frame of the normal, so the local
    /// x axis is perpendicular to the global z axis unless the normal is
    /// (nearly) parallel to it.
    pub fn from_center_normal(center: Vector3<T>, normal: Vector3<T>) -> Self {
        let tolerance: T = nalgebra::convert(DEFAULT_CURVILINEAR_TOLERANCE);
        Self::curvilinear(&center, &normal, tolerance)
    }

    /// Creates the curvilinear plane at `position` for `direction`.
    ///
    /// The plane is perpendicular to the direction and its frame is the one
    /// selected by [`curvilinear_frame`] with the given `tolerance`.
    pub fn curvilinear(position: &Vector3<T>, direction: &Vector3<T>, tolerance: T) -> Self {
        let frame = curvilinear_frame(direction, tolerance);
        let rotation = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(frame));
        Self::new(Isometry3::from_parts(Translation3::from(*position), rotation))
    }

    /// Restricts the plane to the given bounds.
    pub fn with_bounds<B: SurfaceBounds<T> + 'static>(mut self, bounds: B) -> Self {
        self.bounds = Arc::new(bounds);
        self
    }

    /// Attaches a detector element whose placement overrides the nominal one.
    ///
    /// Only a weak reference is kept.
    pub fn with_detector_element<E: DetectorElement<T> + 'static>(mut self, element: &Arc<E>) -> Self {
        let element: Arc<dyn DetectorElement<T>> = element.clone();
        self.detector_element = Some(Arc::downgrade(&element));
        self
    }

    /// Associates the enclosing layer. Only a weak reference is kept.
    pub fn with_layer(mut self, layer: &Arc<Layer>) -> Self {
        self.layer = Some(Arc::downgrade(layer));
        self
    }

    /// Assigns shared material.
    pub fn with_material(mut self, material: Arc<SurfaceMaterial<T>>) -> Self {
        self.material = Some(material);
        self
    }

    /// Wraps the surface into a shared handle.
    pub fn into_handle(self) -> SurfaceHandle<T> {
        Arc::new(self)
    }
}

impl<T: RealField + Copy> Surface<T> for PlaneSurface<T> {
    fn placement(&self) -> &Isometry3<T> {
        &self.placement
    }

    fn bounds(&self) -> &dyn SurfaceBounds<T> {
        self.bounds.as_ref()
    }

    fn detector_element(&self) -> Option<Arc<dyn DetectorElement<T>>> {
        let element = self.detector_element.as_ref()?.upgrade();
        if element.is_none() {
            trace!("detector element expired, using nominal placement");
        }
        element
    }

    fn layer(&self) -> Option<Arc<Layer>> {
        self.layer.as_ref()?.upgrade()
    }

    fn material(&self) -> Option<&Arc<SurfaceMaterial<T>>> {
        self.material.as_ref()
    }

    fn global_to_local(
        &self,
        gctx: &GeometryContext,
        position: &Vector3<T>,
        _direction: &Vector3<T>,
        tolerance: T,
    ) -> Result<Vector2<T>, ProjectionError> {
        let local = self
            .transform(gctx)
            .inverse_transform_point(&Point3::from(*position));
        if !local.coords.iter().all(|v| v.is_finite()) {
            return Err(ProjectionError::SingularProjection);
        }
        if local.z.abs() > tolerance {
            return Err(ProjectionError::OffSurface);
        }
        Ok(Vector2::new(local.x, local.y))
    }

    fn local_to_global(
        &self,
        gctx: &GeometryContext,
        local: &Vector2<T>,
        _direction: &Vector3<T>,
    ) -> Vector3<T> {
        self.transform(gctx)
            .transform_point(&Point3::new(local.x, local.y, T::zero()))
            .coords
    }
}
