//! Typed Jacobian matrices
//!
//! Matrices that map perturbations between parameter spaces, with
//! type-level encoding of source and target spaces.

use ::core::marker::PhantomData;
use nalgebra::{RealField, SMatrix, Scalar};

use super::spaces::{
    BoundSpace, Covariance, FreeSpace, FreeVector, PathSpace, Vector, BOUND_SIZE, FREE_SIZE,
};

// ============================================================================
// Transform Matrix
// ============================================================================

/// Jacobian `∂To/∂From`, a `ROWS × COLS` matrix tagged with both spaces.
#[repr(transparent)]
#[derive(Debug, Clone, PartialEq)]
pub struct Transform<T: Scalar, const ROWS: usize, const COLS: usize, To, From> {
    inner: SMatrix<T, ROWS, COLS>,
    _marker: PhantomData<(To, From)>,
}

impl<T: Scalar, const ROWS: usize, const COLS: usize, To, From> Transform<T, ROWS, COLS, To, From> {
    /// Creates a transform from a raw matrix.
    #[inline]
    pub fn from_matrix(inner: SMatrix<T, ROWS, COLS>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    /// Returns a reference to the underlying matrix.
    #[inline]
    pub fn as_matrix(&self) -> &SMatrix<T, ROWS, COLS> {
        &self.inner
    }

    /// Returns a mutable reference to the underlying matrix.
    #[inline]
    pub fn as_matrix_mut(&mut self) -> &mut SMatrix<T, ROWS, COLS> {
        &mut self.inner
    }
}

impl<T: Scalar + Copy, const ROWS: usize, const COLS: usize, To: Clone, From: Clone> Copy
    for Transform<T, ROWS, COLS, To, From>
where SMatrix<T, ROWS, COLS>: Copy {}

impl<T: RealField + Copy, const ROWS: usize, const COLS: usize, To, From>
    Transform<T, ROWS, COLS, To, From>
{
    /// Creates a zero transform.
    #[inline]
    pub fn zeros() -> Self {
        Self {
            inner: SMatrix::zeros(),
            _marker: PhantomData,
        }
    }

    /// Applies the transform to a perturbation vector.
    #[inline]
    pub fn apply(&self, v: &Vector<T, COLS, From>) -> Vector<T, ROWS, To> {
        Vector::from_svector(self.inner * v.as_svector())
    }

    /// Chains `self` after `first`: the result maps `Mid -> From -> To`
    /// as a single `Mid -> To` Jacobian.
    #[inline]
    pub fn compose<const K: usize, Mid>(
        &self,
        first: &Transform<T, COLS, K, From, Mid>,
    ) -> Transform<T, ROWS, K, To, Mid> {
        Transform::from_matrix(self.inner * first.inner)
    }

    /// Conjugates a covariance through this transform: `J * C * J^T`
    #[inline]
    pub fn conjugate(&self, cov: &Covariance<T, COLS, From>) -> Covariance<T, ROWS, To> {
        Covariance::from_matrix(self.inner * cov.as_matrix() * self.inner.transpose())
    }

    /// Returns true if every entry is finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.inner.iter().all(|v| v.is_finite())
    }
}

impl<T: RealField + Copy, const N: usize, Space> Transform<T, N, N, Space, Space> {
    /// Creates an identity transform.
    #[inline]
    pub fn identity() -> Self {
        Self {
            inner: SMatrix::identity(),
            _marker: PhantomData,
        }
    }
}

// ============================================================================
// Type Aliases
// ============================================================================

/// Jacobian from bound to free parameters (8×6).
pub type BoundToFreeJacobian<T> = Transform<T, FREE_SIZE, BOUND_SIZE, FreeSpace, BoundSpace>;

/// Jacobian from free to bound parameters (6×8).
pub type FreeToBoundJacobian<T> = Transform<T, BOUND_SIZE, FREE_SIZE, BoundSpace, FreeSpace>;

/// Free transport Jacobian accumulated by the propagator (8×8).
pub type FreeTransportJacobian<T> = Transform<T, FREE_SIZE, FREE_SIZE, FreeSpace, FreeSpace>;

/// Full local-to-local Jacobian between two reference points (6×6).
pub type BoundJacobian<T> = Transform<T, BOUND_SIZE, BOUND_SIZE, BoundSpace, BoundSpace>;

/// Path-length sensitivity of free parameters (1×8).
pub type FreeToPathDerivative<T> = Transform<T, 1, FREE_SIZE, PathSpace, FreeSpace>;

// ============================================================================
// Path Correction
// ============================================================================

/// Builds the path correction `I + d ⊗ p`.
///
/// `d` holds the derivatives of the free parameters with respect to path
/// length, `p` the derivative of path length with respect to the free
/// parameters. Applied after the transport Jacobian it keeps a perturbed
/// free state on the target surface.
#[inline]
pub fn path_correction<T: RealField + Copy>(
    free_derivatives: &FreeVector<T>,
    free_to_path: &FreeToPathDerivative<T>,
) -> FreeTransportJacobian<T> {
    FreeTransportJacobian::from_matrix(
        SMatrix::identity() + free_derivatives.as_svector() * free_to_path.as_matrix(),
    )
}
