//! Sigma-point nonlinearity correction
//!
//! A first-order Jacobian ignores the curvature of a coordinate map across
//! the extent of the uncertainty ellipsoid. The corrector estimates it by
//! mapping a deterministic set of sigma points through the exact map and
//! recombining their moments.
//!
//! # Sigma Points
//!
//! For a mean `μ` of dimension `n` and covariance `Σ = U·D·Uᵀ`, the square
//! root `S = U·√D·Uᵀ` spreads `2n + 1` points:
//!
//! - `χ₀ = μ` with weight `(κ - n) / κ`
//! - `χᵢ = μ ± √κ·S[:, i]`, each with weight `1 / (2κ)`
//!
//! The weights always sum to one. For `κ < n` the central weight is
//! negative, which is expected.
//!
//! # Batch Semantics
//!
//! If any single sample cannot be transformed, the whole batch is
//! discarded. A corrected estimate is never formed from a partial set.

use nalgebra::{DMatrix, RealField, SMatrix};

use crate::conversions::bound_free::{bound_to_free, free_to_bound};
use crate::geometry::context::GeometryContext;
use crate::geometry::surface::Surface;
use crate::types::gaussian::{BoundMoments, FreeMoments, Moments};
use crate::types::spaces::{
    BoundCovariance, BoundVector, Covariance, FreeCovariance, FreeVector, Vector, BOUND_SIZE,
    FREE_SIZE,
};
use crate::{CorrectionError, ProjectionError};

use super::config::DEFAULT_KAPPA;

// ============================================================================
// Corrector Parameters
// ============================================================================

/// Parameters of the sigma-point correction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrectorParams<T: RealField> {
    /// Spread parameter κ
    pub kappa: T,
}

impl<T: RealField + Copy> Default for CorrectorParams<T> {
    fn default() -> Self {
        Self {
            kappa: nalgebra::convert(DEFAULT_KAPPA),
        }
    }
}

impl<T: RealField + Copy> CorrectorParams<T> {
    /// Creates corrector parameters.
    ///
    /// # Errors
    /// `InvalidKappa` unless `kappa > 0`.
    pub fn new(kappa: T) -> Result<Self, CorrectionError> {
        if !(kappa > T::zero()) {
            return Err(CorrectionError::InvalidKappa);
        }
        Ok(Self { kappa })
    }

    /// Weight of the central sigma point: `(κ - n) / κ`
    #[inline]
    pub fn weight_0(&self, n: usize) -> T {
        let n_t: T = nalgebra::convert(n as f64);
        (self.kappa - n_t) / self.kappa
    }

    /// Weight of every other sigma point: `1 / (2κ)`
    #[inline]
    pub fn weight_i(&self) -> T {
        T::one() / (self.kappa + self.kappa)
    }
}

// ============================================================================
// Sigma Points
// ============================================================================

/// Sigma points of an `N`-dimensional distribution.
#[derive(Debug, Clone)]
pub struct SigmaPoints<T: RealField, const N: usize, Space> {
    /// The sigma points: [χ₀, χ₁⁺, χ₁⁻, ..., χₙ⁺, χₙ⁻]
    pub points: Vec<Vector<T, N, Space>>,
    /// Weight of the central point
    pub weight_0: T,
    /// Weight of every other point
    pub weight_i: T,
}

impl<T: RealField + Copy, const N: usize, Space> SigmaPoints<T, N, Space> {
    /// Generates sigma points from a mean and covariance.
    ///
    /// Eigenvalues that are negative only through rounding (relative to the
    /// largest eigenvalue) are clamped to zero.
    ///
    /// # Errors
    /// - `InvalidKappa` if κ is not positive
    /// - `NonFiniteInput` for non-finite moments
    /// - `NotPositiveSemiDefinite` for a significantly negative eigenvalue
    pub fn generate(
        moments: &Moments<T, N, Space>,
        params: &CorrectorParams<T>,
    ) -> Result<Self, CorrectionError> {
        if !(params.kappa > T::zero()) {
            return Err(CorrectionError::InvalidKappa);
        }
        if !moments.is_finite() {
            return Err(CorrectionError::NonFiniteInput);
        }

        let sqrt_cov = symmetric_sqrt(&moments.covariance)?.scale(params.kappa.sqrt());

        let mut points = Vec::with_capacity(2 * N + 1);
        points.push(Vector::from_svector(*moments.mean.as_svector()));
        for i in 0..N {
            let offset = sqrt_cov.column(i).into_owned();
            points.push(Vector::from_svector(moments.mean.as_svector() + offset));
            points.push(Vector::from_svector(moments.mean.as_svector() - offset));
        }

        Ok(Self {
            points,
            weight_0: params.weight_0(N),
            weight_i: params.weight_i(),
        })
    }

    /// Weight of the point at `index`.
    #[inline]
    pub fn weight(&self, index: usize) -> T {
        if index == 0 {
            self.weight_0
        } else {
            self.weight_i
        }
    }

    /// Sum of all weights (one up to rounding).
    pub fn weight_sum(&self) -> T {
        (0..self.points.len()).fold(T::zero(), |acc, i| acc + self.weight(i))
    }

    /// Maps every point through `transform` and recombines mean and covariance.
    ///
    /// # Errors
    /// `InvalidSample` for the first failing transform, `NonFiniteSample` for
    /// the first sample mapped to non-finite parameters. Either discards the
    /// whole batch.
    pub fn recover_moments<const D: usize, To, F>(
        &self,
        mut transform: F,
    ) -> Result<Moments<T, D, To>, CorrectionError>
    where
        F: FnMut(&Vector<T, N, Space>) -> Result<Vector<T, D, To>, ProjectionError>,
    {
        let mut samples = Vec::with_capacity(self.points.len());
        for (index, point) in self.points.iter().enumerate() {
            let sample =
                transform(point).map_err(|source| CorrectionError::InvalidSample { index, source })?;
            if !sample.is_finite() {
                return Err(CorrectionError::NonFiniteSample { index });
            }
            samples.push(sample);
        }

        let mut mean = Vector::<T, D, To>::zeros();
        for (index, sample) in samples.iter().enumerate() {
            mean = mean + sample.scale(self.weight(index));
        }

        let mut covariance = Covariance::<T, D, To>::zeros();
        for (index, sample) in samples.iter().enumerate() {
            let deviation = Vector::<T, D, To>::from_svector(sample.as_svector() - mean.as_svector());
            covariance = covariance + deviation.outer(&deviation).scale(self.weight(index));
        }

        Ok(Moments::new(mean, covariance.symmetrize()))
    }
}

/// Square root `U·√D·Uᵀ` of a symmetric positive semi-definite matrix.
fn symmetric_sqrt<T: RealField + Copy, const N: usize, Space>(
    covariance: &Covariance<T, N, Space>,
) -> Result<SMatrix<T, N, N>, CorrectionError> {
    let symmetric = covariance.symmetrize();
    let dynamic = DMatrix::from_column_slice(N, N, symmetric.as_matrix().as_slice());
    let eigen = dynamic.symmetric_eigen();

    let largest = eigen
        .eigenvalues
        .iter()
        .fold(T::zero(), |acc, v| if v.abs() > acc { v.abs() } else { acc });
    let rounding: T = largest * nalgebra::convert(1e-9);

    let mut roots = eigen.eigenvalues.clone();
    for value in roots.iter_mut() {
        if *value < -rounding {
            return Err(CorrectionError::NotPositiveSemiDefinite);
        }
        *value = if *value > T::zero() { value.sqrt() } else { T::zero() };
    }

    let vectors = &eigen.eigenvectors;
    let root = vectors * DMatrix::from_diagonal(&roots) * vectors.transpose();
    Ok(SMatrix::from_iterator(root.iter().copied()))
}

// ============================================================================
// Nonlinear Corrector
// ============================================================================

/// Applies the sigma-point correction to the exact bound↔free maps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NonlinearCorrector<T: RealField> {
    params: CorrectorParams<T>,
}

impl<T: RealField + Copy> Default for NonlinearCorrector<T> {
    fn default() -> Self {
        Self {
            params: CorrectorParams::default(),
        }
    }
}

impl<T: RealField + Copy> NonlinearCorrector<T> {
    pub fn new(params: CorrectorParams<T>) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &CorrectorParams<T> {
        &self.params
    }

    /// Free moments of bound moments on `surface`, through the exact
    /// bound→free map. The map itself cannot fail.
    pub fn bound_to_free<S: Surface<T> + ?Sized>(
        &self,
        gctx: &GeometryContext,
        surface: &S,
        mean: &BoundVector<T>,
        covariance: &BoundCovariance<T>,
    ) -> Result<FreeMoments<T>, CorrectionError> {
        let moments = BoundMoments::new(mean.clone(), covariance.clone());
        let sigma_points = SigmaPoints::<T, BOUND_SIZE, _>::generate(&moments, &self.params)?;
        sigma_points.recover_moments::<FREE_SIZE, _, _>(|point| Ok(bound_to_free(gctx, surface, point)))
    }

    /// Bound moments on `surface` of free moments, through the exact
    /// free→bound map.
    ///
    /// Samples pushed off the surface by the position spread are accepted up
    /// to `tolerance`.
    pub fn free_to_bound<S: Surface<T> + ?Sized>(
        &self,
        gctx: &GeometryContext,
        surface: &S,
        mean: &FreeVector<T>,
        covariance: &FreeCovariance<T>,
        tolerance: T,
    ) -> Result<BoundMoments<T>, CorrectionError> {
        let moments = FreeMoments::new(mean.clone(), covariance.clone());
        let sigma_points = SigmaPoints::<T, FREE_SIZE, _>::generate(&moments, &self.params)?;
        sigma_points.recover_moments::<BOUND_SIZE, _, _>(|point| {
            free_to_bound(gctx, surface, point, tolerance)
        })
    }
}
