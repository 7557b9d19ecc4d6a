//! Common test helpers for covariance transport integration tests

#![allow(dead_code)]

use covtransport::prelude::*;
use nalgebra::{DMatrix, Isometry3, SMatrix, Translation3, UnitQuaternion, Vector3};

/// Nominal geometry context
pub fn nominal() -> GeometryContext {
    GeometryContext::nominal()
}

/// Unbounded plane through `center` with normal `normal`
pub fn plane(center: [f64; 3], normal: [f64; 3]) -> SurfaceHandle<f64> {
    PlaneSurface::from_center_normal(Vector3::from(center), Vector3::from(normal)).into_handle()
}

/// Plane with an arbitrary rotation, for tests that should not rely on
/// axis-aligned frames
pub fn tilted_plane(center: [f64; 3], roll: f64, pitch: f64, yaw: f64) -> SurfaceHandle<f64> {
    PlaneSurface::new(Isometry3::from_parts(
        Translation3::from(Vector3::from(center)),
        UnitQuaternion::from_euler_angles(roll, pitch, yaw),
    ))
    .into_handle()
}

/// Diagonal bound covariance from standard deviations
pub fn diagonal_covariance(sigmas: [f64; 6]) -> BoundCovariance<f64> {
    BoundCovariance::from_std_devs(&nalgebra::SVector::from(sigmas))
}

/// Engine with default configuration and the given correction switch
pub fn make_engine(correction: bool) -> CovarianceEngine<f64> {
    CovarianceEngine::new(TransportConfig::default().with_nonlinear_correction(correction))
        .expect("default configuration is valid")
}

/// Smallest eigenvalue of a symmetric matrix
pub fn min_eigenvalue<const N: usize>(matrix: &SMatrix<f64, N, N>) -> f64 {
    let dynamic = DMatrix::from_column_slice(N, N, matrix.as_slice());
    dynamic
        .symmetric_eigen()
        .eigenvalues
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min)
}

/// Exact straight-line map from bound parameters on `from` to bound
/// parameters on `to`, for a massless particle.
pub fn straight_line_bound_map(
    gctx: &GeometryContext,
    from: &SurfaceHandle<f64>,
    to: &SurfaceHandle<f64>,
    bound: &BoundVector<f64>,
) -> BoundVector<f64> {
    let free = bound_to_free(gctx, from.as_ref(), bound);
    let normal = to.normal(gctx);
    let distance =
        normal.dot(&(to.center(gctx) - free.position())) / normal.dot(&free.direction());
    let moved = FreeVector::new(
        &(free.position() + free.direction() * distance),
        free.time() + distance / SPEED_OF_LIGHT,
        &free.direction(),
        free.q_over_p(),
    );
    free_to_bound(gctx, to.as_ref(), &moved, 1e-6).expect("target plane is reachable")
}
