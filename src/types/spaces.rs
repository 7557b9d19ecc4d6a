//! Parameter space markers and typed vectors
//!
//! Track parameters live in several coordinate spaces (surface-local bound,
//! global free, the path-length row). This module provides vectors and
//! covariance matrices that cannot be accidentally mixed across them.

use ::core::marker::PhantomData;
use ::core::ops::{Add, Mul, Sub};
use nalgebra::{RealField, SMatrix, SVector, Scalar, Vector3, Vector4};

// ============================================================================
// Parameter Space Markers
// ============================================================================

/// Marker type for surface-local (bound) parameters.
///
/// Components: `[loc0, loc1, phi, theta, q/p, time]`. Curvilinear
/// parameters use the same space with a frame derived from the direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundSpace;

/// Marker type for global (free) parameters.
///
/// Components: `[x, y, z, time, dx, dy, dz, q/p]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeSpace;

/// Marker type for the one-dimensional path-length space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathSpace;

/// Number of bound parameters.
pub const BOUND_SIZE: usize = 6;

/// Number of free parameters.
pub const FREE_SIZE: usize = 8;

/// Component indices of bound parameter vectors.
pub mod bound_index {
    pub const LOC0: usize = 0;
    pub const LOC1: usize = 1;
    pub const PHI: usize = 2;
    pub const THETA: usize = 3;
    pub const QOVERP: usize = 4;
    pub const TIME: usize = 5;
}

/// Component indices of free parameter vectors.
pub mod free_index {
    pub const POS0: usize = 0;
    pub const POS1: usize = 1;
    pub const POS2: usize = 2;
    pub const TIME: usize = 3;
    pub const DIR0: usize = 4;
    pub const DIR1: usize = 5;
    pub const DIR2: usize = 6;
    pub const QOVERP: usize = 7;
}

// ============================================================================
// Typed Vector
// ============================================================================

/// Parameter vector tagged with the space it lives in.
///
/// Bound and free vectors share the storage layout but not the type, so a
/// bound vector can never be fed where a free one is expected.
#[repr(transparent)]
#[derive(Debug, Clone, PartialEq)]
pub struct Vector<T: Scalar, const N: usize, Space> {
    inner: SVector<T, N>,
    _marker: PhantomData<Space>,
}

impl<T: Scalar, const N: usize, Space> Vector<T, N, Space> {
    /// Vector from its components in index order.
    #[inline]
    pub fn from_array(data: [T; N]) -> Self {
        Self {
            inner: SVector::from(data),
            _marker: PhantomData,
        }
    }

    /// Creates a new vector from an nalgebra SVector.
    #[inline]
    pub fn from_svector(inner: SVector<T, N>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    /// Returns a reference to the underlying nalgebra vector.
    #[inline]
    pub fn as_svector(&self) -> &SVector<T, N> {
        &self.inner
    }

    /// Component at `index`.
    ///
    /// # Panics
    /// Panics if index is out of bounds.
    #[inline]
    #[allow(clippy::should_implement_trait)]
    pub fn index(&self, index: usize) -> &T {
        &self.inner[index]
    }

    /// Sets the element at index.
    ///
    /// # Panics
    /// Panics if index is out of bounds.
    #[inline]
    pub fn set(&mut self, index: usize, value: T) {
        self.inner[index] = value;
    }
}

impl<T: Scalar + Copy, const N: usize, Space: Clone> Copy for Vector<T, N, Space> {}

impl<T: RealField + Copy, const N: usize, Space> Vector<T, N, Space> {
    /// Creates a zero vector.
    #[inline]
    pub fn zeros() -> Self {
        Self {
            inner: SVector::zeros(),
            _marker: PhantomData,
        }
    }

    /// Computes the Euclidean norm.
    #[inline]
    pub fn norm(&self) -> T {
        self.inner.norm()
    }

    /// Scales the vector by a scalar.
    #[inline]
    pub fn scale(&self, s: T) -> Self {
        Self {
            inner: self.inner.scale(s),
            _marker: PhantomData,
        }
    }

    /// Returns true if every component is finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.inner.iter().all(|v| v.is_finite())
    }

    /// Outer product `self ⊗ other`, the rank-one covariance contribution.
    #[inline]
    pub fn outer(&self, other: &Self) -> Covariance<T, N, Space> {
        Covariance::from_matrix(self.inner * other.inner.transpose())
    }
}

// ============================================================================
// Type Aliases
// ============================================================================

/// Bound (surface-local) parameter vector.
pub type BoundVector<T> = Vector<T, BOUND_SIZE, BoundSpace>;

/// Free (global) parameter vector.
pub type FreeVector<T> = Vector<T, FREE_SIZE, FreeSpace>;

impl<T: RealField + Copy> BoundVector<T> {
    /// Assembles a bound vector from its components.
    #[inline]
    pub fn new(loc0: T, loc1: T, phi: T, theta: T, q_over_p: T, time: T) -> Self {
        Self::from_array([loc0, loc1, phi, theta, q_over_p, time])
    }

    /// Local position on the reference surface.
    #[inline]
    pub fn local_position(&self) -> nalgebra::Vector2<T> {
        nalgebra::Vector2::new(self.inner[bound_index::LOC0], self.inner[bound_index::LOC1])
    }

    /// Azimuthal angle of the direction.
    #[inline]
    pub fn phi(&self) -> T {
        self.inner[bound_index::PHI]
    }

    /// Polar angle of the direction.
    #[inline]
    pub fn theta(&self) -> T {
        self.inner[bound_index::THETA]
    }

    /// Charge over momentum.
    #[inline]
    pub fn q_over_p(&self) -> T {
        self.inner[bound_index::QOVERP]
    }

    /// Time coordinate.
    #[inline]
    pub fn time(&self) -> T {
        self.inner[bound_index::TIME]
    }
}

impl<T: RealField + Copy> FreeVector<T> {
    /// Assembles a free vector from position, time, direction and q/p.
    ///
    /// The direction is stored as given; callers are expected to pass a unit vector.
    #[inline]
    pub fn new(position: &Vector3<T>, time: T, direction: &Vector3<T>, q_over_p: T) -> Self {
        Self::from_array([
            position.x,
            position.y,
            position.z,
            time,
            direction.x,
            direction.y,
            direction.z,
            q_over_p,
        ])
    }

    /// Global position.
    #[inline]
    pub fn position(&self) -> Vector3<T> {
        self.inner.fixed_rows::<3>(free_index::POS0).into_owned()
    }

    /// Position and time as a four-vector.
    #[inline]
    pub fn four_position(&self) -> Vector4<T> {
        self.inner.fixed_rows::<4>(free_index::POS0).into_owned()
    }

    /// Time coordinate.
    #[inline]
    pub fn time(&self) -> T {
        self.inner[free_index::TIME]
    }

    /// Direction (unit vector for valid parameters).
    #[inline]
    pub fn direction(&self) -> Vector3<T> {
        self.inner.fixed_rows::<3>(free_index::DIR0).into_owned()
    }

    /// Charge over momentum.
    #[inline]
    pub fn q_over_p(&self) -> T {
        self.inner[free_index::QOVERP]
    }
}

// ============================================================================
// Operations: Same-Space Arithmetic
// ============================================================================

impl<T: RealField + Copy, const N: usize, Space> Add for Vector<T, N, Space> {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self {
            inner: self.inner + rhs.inner,
            _marker: PhantomData,
        }
    }
}

impl<T: RealField + Copy, const N: usize, Space> Sub for Vector<T, N, Space> {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            inner: self.inner - rhs.inner,
            _marker: PhantomData,
        }
    }
}

impl<T: RealField + Copy, const N: usize, Space> Mul<T> for Vector<T, N, Space> {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: T) -> Self::Output {
        Self {
            inner: self.inner * rhs,
            _marker: PhantomData,
        }
    }
}

// ============================================================================
// Covariance Matrix
// ============================================================================

/// Covariance tagged with the space of the parameters it describes.
///
/// Nothing enforces positive semi-definiteness on construction; the
/// sigma-point corrector checks it where it matters.
#[repr(transparent)]
#[derive(Debug, Clone, PartialEq)]
pub struct Covariance<T: Scalar, const N: usize, Space> {
    inner: SMatrix<T, N, N>,
    _marker: PhantomData<Space>,
}

impl<T: Scalar, const N: usize, Space> Covariance<T, N, Space> {
    /// Wraps a raw matrix.
    #[inline]
    pub fn from_matrix(inner: SMatrix<T, N, N>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    /// Returns a reference to the underlying matrix.
    #[inline]
    pub fn as_matrix(&self) -> &SMatrix<T, N, N> {
        &self.inner
    }
}

impl<T: Scalar + Copy, const N: usize, Space: Clone> Copy for Covariance<T, N, Space> where
    SMatrix<T, N, N>: Copy
{
}

impl<T: RealField + Copy, const N: usize, Space> Covariance<T, N, Space> {
    /// Creates a zero covariance matrix.
    #[inline]
    pub fn zeros() -> Self {
        Self {
            inner: SMatrix::zeros(),
            _marker: PhantomData,
        }
    }

    /// Creates an identity covariance matrix.
    #[inline]
    pub fn identity() -> Self {
        Self {
            inner: SMatrix::identity(),
            _marker: PhantomData,
        }
    }

    /// Creates a diagonal covariance matrix.
    #[inline]
    pub fn from_diagonal(diag: &SVector<T, N>) -> Self {
        Self {
            inner: SMatrix::from_diagonal(diag),
            _marker: PhantomData,
        }
    }

    /// Creates a diagonal covariance from standard deviations.
    #[inline]
    pub fn from_std_devs(sigmas: &SVector<T, N>) -> Self {
        Self::from_diagonal(&sigmas.component_mul(sigmas))
    }

    /// Scales the covariance matrix.
    #[inline]
    pub fn scale(&self, s: T) -> Self {
        Self {
            inner: self.inner.scale(s),
            _marker: PhantomData,
        }
    }

    /// Sum of the variances.
    #[inline]
    pub fn trace(&self) -> T {
        self.inner.trace()
    }

    /// Returns true if every entry is exactly zero.
    ///
    /// An all-zero covariance is a valid state, distinct from an absent one.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.inner.iter().all(|v| *v == T::zero())
    }

    /// Returns true if every entry is finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.inner.iter().all(|v| v.is_finite())
    }

    /// Returns true if `|C - Cᵀ|` is below `tolerance` in every entry.
    pub fn is_symmetric(&self, tolerance: T) -> bool {
        for i in 0..N {
            for j in (i + 1)..N {
                if (self.inner[(i, j)] - self.inner[(j, i)]).abs() > tolerance {
                    return false;
                }
            }
        }
        true
    }

    /// Returns `(C + Cᵀ) / 2`.
    #[inline]
    pub fn symmetrize(&self) -> Self {
        let half: T = nalgebra::convert(0.5);
        Self {
            inner: (self.inner + self.inner.transpose()) * half,
            _marker: PhantomData,
        }
    }

    /// Standard deviation of component `index`.
    ///
    /// # Panics
    /// Panics if index is out of bounds.
    #[inline]
    pub fn std_dev(&self, index: usize) -> T {
        self.inner[(index, index)].sqrt()
    }
}

impl<T: RealField + Copy, const N: usize, Space> Add for Covariance<T, N, Space> {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self {
            inner: self.inner + rhs.inner,
            _marker: PhantomData,
        }
    }
}

// ============================================================================
// Type Aliases for Covariance
// ============================================================================

/// Covariance of bound parameters (6×6).
pub type BoundCovariance<T> = Covariance<T, BOUND_SIZE, BoundSpace>;

/// Covariance of free parameters (8×8).
pub type FreeCovariance<T> = Covariance<T, FREE_SIZE, FreeSpace>;
