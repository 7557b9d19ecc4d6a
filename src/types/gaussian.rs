//! Gaussian moments
//!
//! Mean and covariance pairs describing a parameter estimate in one space.

use nalgebra::RealField;

use super::spaces::{BoundSpace, Covariance, FreeSpace, Vector, BOUND_SIZE, FREE_SIZE};

// ============================================================================
// Moments
// ============================================================================

/// First two moments of a parameter distribution.
///
/// # Type Parameters
///
/// - `T`: Scalar type
/// - `N`: Dimension of the parameter space
/// - `Space`: Parameter space marker
#[derive(Debug, Clone, PartialEq)]
pub struct Moments<T: RealField, const N: usize, Space> {
    /// Mean parameter vector
    pub mean: Vector<T, N, Space>,
    /// Parameter covariance matrix
    pub covariance: Covariance<T, N, Space>,
}

impl<T: RealField + Copy, const N: usize, Space> Moments<T, N, Space> {
    /// Creates moments from a mean and covariance.
    #[inline]
    pub fn new(mean: Vector<T, N, Space>, covariance: Covariance<T, N, Space>) -> Self {
        Self { mean, covariance }
    }

    /// Creates all-zero moments.
    #[inline]
    pub fn zeros() -> Self {
        Self {
            mean: Vector::zeros(),
            covariance: Covariance::zeros(),
        }
    }

    /// Returns the trace of the covariance matrix (sum of variances).
    #[inline]
    pub fn uncertainty(&self) -> T {
        self.covariance.trace()
    }

    /// Returns true if mean and covariance are finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.mean.is_finite() && self.covariance.is_finite()
    }
}

/// Moments of bound parameters.
pub type BoundMoments<T> = Moments<T, BOUND_SIZE, BoundSpace>;

/// Moments of free parameters.
pub type FreeMoments<T> = Moments<T, FREE_SIZE, FreeSpace>;
