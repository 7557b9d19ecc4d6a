//! Integration tests for the covariance transport engine

mod common;

use std::sync::Arc;

use approx::assert_relative_eq;
use common::{diagonal_covariance, make_engine, nominal, plane, straight_line_bound_map, tilted_plane};
use covtransport::prelude::*;
use nalgebra::{Isometry3, SMatrix, Vector3, Vector4};

fn start_on(surface: &SurfaceHandle<f64>, bound: BoundVector<f64>, cov: Option<BoundCovariance<f64>>) -> StepState<f64> {
    let start = BoundTrackParameters::new(Arc::clone(surface), bound, cov);
    StepState::from_bound(&nominal(), &start, &TransportConfig::default())
}

#[test]
fn test_linear_limit_conjugation() {
    let gctx = nominal();
    let surface = tilted_plane([10.0, 0.0, 40.0], 0.2, 0.5, -0.3);
    let cov = diagonal_covariance([0.5, 0.3, 0.01, 0.02, 0.05, 1.0]);
    let mut state = start_on(&surface, BoundVector::new(1.0, -2.0, 0.4, 1.0, 0.5, 0.0), Some(cov));

    // Identity transport and an identity-embedding bound→free Jacobian
    let mut embedding = BoundToFreeJacobian::zeros();
    for i in 0..BOUND_SIZE {
        embedding.as_matrix_mut()[(i, i)] = 1.0;
    }
    state.jac_to_global = embedding;

    let f = surface.free_to_bound_jacobian(&gctx, &state.parameters).unwrap();
    let expected = f.compose(&embedding).conjugate(&cov);

    make_engine(false)
        .transport_covariance_to_bound(&gctx, &mut state, &surface)
        .unwrap();
    assert_relative_eq!(*state.covariance.as_matrix(), *expected.as_matrix(), epsilon = 1e-12);
}

#[test]
fn test_transport_on_same_surface_is_identity() {
    let gctx = nominal();
    let surface = tilted_plane([0.0, 0.0, 0.0], 1.0, -0.4, 0.1);
    let cov = diagonal_covariance([0.025, 0.1, 1e-4, 2e-5, 0.1, 1.0]);
    let mut state = start_on(&surface, BoundVector::new(3.0, 4.0, -1.0, 2.0, 1.0, 0.0), Some(cov));

    let result = make_engine(false).bound_state(&gctx, &mut state, &surface).unwrap();
    assert_relative_eq!(
        *result.jacobian.as_matrix(),
        SMatrix::<f64, 6, 6>::identity(),
        epsilon = 1e-12
    );
    assert_relative_eq!(
        *result.parameters.covariance().unwrap().as_matrix(),
        *cov.as_matrix(),
        epsilon = 1e-12
    );
}

#[test]
fn test_jacobian_matches_finite_difference() {
    let gctx = nominal();
    let start_surface = tilted_plane([0.0, 0.0, 0.0], 0.1, 0.2, 0.3);
    let target = tilted_plane([0.0, 0.0, 120.0], -0.2, 0.15, 0.7);
    let start = BoundVector::new(2.0, -1.0, 0.6, 0.5, 0.8, 0.0);

    let mut state = start_on(&start_surface, start, Some(BoundCovariance::identity()));
    StraightLineStepper::new(0.0)
        .step_to_surface(&gctx, &mut state, target.as_ref())
        .unwrap();
    let result = make_engine(false).bound_state(&gctx, &mut state, &target).unwrap();

    let end = straight_line_bound_map(&gctx, &start_surface, &target, &start);
    assert_relative_eq!(
        *result.parameters.parameters().as_svector(),
        *end.as_svector(),
        epsilon = 1e-9
    );

    let h = 1e-6;
    for column in 0..BOUND_SIZE {
        let mut plus = start;
        let mut minus = start;
        plus.set(column, *start.index(column) + h);
        minus.set(column, *start.index(column) - h);
        let up = straight_line_bound_map(&gctx, &start_surface, &target, &plus);
        let down = straight_line_bound_map(&gctx, &start_surface, &target, &minus);

        for row in 0..BOUND_SIZE {
            let numeric = (up.index(row) - down.index(row)) / (2.0 * h);
            assert_relative_eq!(
                result.jacobian.as_matrix()[(row, column)],
                numeric,
                epsilon = 1e-5,
                max_relative = 1e-5
            );
        }
    }
}

#[test]
fn test_absent_and_zero_covariance_are_distinct() {
    let gctx = nominal();
    let surface = plane([0.0, 0.0, 0.0], [0.0, 0.0, 1.0]);
    let target = plane([0.0, 0.0, 50.0], [0.0, 0.0, 1.0]);
    let bound = BoundVector::new(0.0, 0.0, 0.2, 0.3, 1.0, 0.0);
    let engine = make_engine(false);
    let stepper = StraightLineStepper::new(0.0);

    let mut absent = start_on(&surface, bound, None);
    stepper.step_to_surface(&gctx, &mut absent, target.as_ref()).unwrap();
    let absent = engine.bound_state(&gctx, &mut absent, &target).unwrap();
    assert!(absent.parameters.covariance().is_none());
    assert_eq!(absent.jacobian, BoundJacobian::identity());

    let mut zero = start_on(&surface, bound, Some(BoundCovariance::zeros()));
    stepper.step_to_surface(&gctx, &mut zero, target.as_ref()).unwrap();
    let zero = engine.bound_state(&gctx, &mut zero, &target).unwrap();
    let covariance = zero.parameters.covariance().expect("zero covariance is kept");
    assert!(covariance.is_zero());
    assert!(zero.correction.bound_or_zero().covariance.is_zero());
}

#[test]
fn test_fatal_inconsistency_leaves_state_untouched() {
    let gctx = nominal();
    let surface = plane([0.0, 0.0, 0.0], [0.0, 0.0, 1.0]);
    let target = plane([0.0, 0.0, 50.0], [0.0, 0.0, 1.0]);
    let cov = diagonal_covariance([0.1, 0.1, 0.01, 0.01, 0.01, 1.0]);
    let mut state = start_on(&surface, BoundVector::new(0.0, 0.0, 0.2, 0.3, 1.0, 0.0), Some(cov));

    // Stop short of the target plane
    StraightLineStepper::new(0.0).step(&mut state, 20.0);
    let before = state.clone();

    let err = make_engine(true)
        .bound_state(&gctx, &mut state, &target)
        .unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(err, TransportError::FatalGeometryInconsistency(ProjectionError::OffSurface));

    assert_eq!(state.jac_transport, before.jac_transport);
    assert_eq!(state.derivatives, before.derivatives);
    assert_eq!(state.jac_to_global, before.jac_to_global);
    assert_eq!(state.covariance, before.covariance);
    assert_eq!(state.reference, before.reference);
    assert!(Arc::ptr_eq(&state.reference_surface, &before.reference_surface));
    assert_eq!(state.path_length, before.path_length);
}

#[test]
fn test_projection_error_without_covariance_is_recoverable() {
    let gctx = nominal();
    let surface = plane([0.0, 0.0, 0.0], [0.0, 0.0, 1.0]);
    let target = plane([0.0, 0.0, 50.0], [0.0, 0.0, 1.0]);
    let mut state = start_on(&surface, BoundVector::new(0.0, 0.0, 0.2, 0.3, 1.0, 0.0), None);

    let err = make_engine(false)
        .bound_state(&gctx, &mut state, &target)
        .unwrap_err();
    assert!(!err.is_fatal());
    assert_eq!(err, TransportError::Projection(ProjectionError::OffSurface));
}

#[test]
fn test_parallel_incidence_is_recoverable() {
    let gctx = nominal();
    let surface = plane([0.0, 0.0, 0.0], [0.0, 0.0, 1.0]);
    // Direction along x lies in the z-normal target plane
    let start = CurvilinearTrackParameters::new(
        Vector4::zeros(),
        Vector3::x(),
        1.0,
        Some(diagonal_covariance([0.1, 0.1, 0.01, 0.01, 0.01, 1.0])),
    )
    .unwrap();
    let engine = make_engine(false);
    let mut state = StepState::from_curvilinear(&start, engine.config()).unwrap();
    let before = state.clone();

    let err = engine.bound_state(&gctx, &mut state, &surface).unwrap_err();
    assert!(!err.is_fatal());
    assert_eq!(err, TransportError::Projection(ProjectionError::ParallelIncidence));
    assert_eq!(state.covariance, before.covariance);
    assert!(Arc::ptr_eq(&state.reference_surface, &before.reference_surface));
}

#[test]
fn test_state_is_reinitialized_after_bound_state() {
    let gctx = nominal();
    let surface = plane([0.0, 0.0, 0.0], [0.0, 0.0, 1.0]);
    let target = tilted_plane([0.0, 0.0, 80.0], 0.1, -0.1, 0.0);
    let cov = diagonal_covariance([0.1, 0.1, 0.01, 0.01, 0.01, 1.0]);
    let mut state = start_on(&surface, BoundVector::new(1.0, 1.0, 0.2, 0.3, 1.0, 0.0), Some(cov));

    StraightLineStepper::new(0.105)
        .step_to_surface(&gctx, &mut state, target.as_ref())
        .unwrap();
    let result = make_engine(false).bound_state(&gctx, &mut state, &target).unwrap();

    assert_eq!(state.jac_transport, FreeTransportJacobian::identity());
    assert_eq!(state.derivatives, FreeVector::zeros());
    assert!(Arc::ptr_eq(&state.reference_surface, &target));
    assert_eq!(state.reference, *result.parameters.parameters());
    assert_eq!(state.covariance, *result.parameters.covariance().unwrap());
    assert_eq!(
        state.jac_to_global,
        target.bound_to_free_jacobian(&gctx, result.parameters.parameters())
    );
    assert!(state.covariance.is_symmetric(1e-15));
    assert_relative_eq!(result.path_length, state.path_length);
}

#[test]
fn test_curvilinear_state_chain() {
    let gctx = nominal();
    let start = CurvilinearTrackParameters::new(
        Vector4::new(0.0, 0.0, 0.0, 0.0),
        Vector3::new(0.3, -0.2, 0.9),
        0.4,
        Some(ParameterResolutions::default().covariance()),
    )
    .unwrap();
    let engine = make_engine(false);
    let mut state = StepState::from_curvilinear(&start, engine.config()).unwrap();

    StraightLineStepper::new(0.0).step(&mut state, 75.0);
    let first = engine.curvilinear_state(&gctx, &mut state).unwrap();
    assert!(first.jacobian.is_finite());
    assert_relative_eq!(first.parameters.position(), state.parameters.position(), epsilon = 1e-12);
    assert_relative_eq!(first.path_length, 75.0);
    let covariance = first.parameters.covariance().unwrap();
    assert!(covariance.is_symmetric(1e-15));
    assert!(covariance.trace() > start.covariance().unwrap().trace());

    // Without any step in between the transport is the identity
    let second = engine.curvilinear_state(&gctx, &mut state).unwrap();
    assert_relative_eq!(
        *second.jacobian.as_matrix(),
        SMatrix::<f64, 6, 6>::identity(),
        epsilon = 1e-12
    );
    assert_relative_eq!(
        *second.parameters.covariance().unwrap().as_matrix(),
        *covariance.as_matrix(),
        epsilon = 1e-12
    );
}

#[test]
fn test_curvilinear_state_near_pole_uses_grazing_branch() {
    let gctx = nominal();
    let direction = direction_from_angles(0.4, 1e-3);
    let start = CurvilinearTrackParameters::new(
        Vector4::zeros(),
        direction,
        1.0,
        Some(diagonal_covariance([0.01, 0.01, 1e-3, 1e-3, 0.01, 1.0])),
    )
    .unwrap();
    let engine = make_engine(true);
    let mut state = StepState::from_curvilinear(&start, engine.config()).unwrap();
    assert_eq!(
        CurvilinearBranch::select(&direction, engine.config().curvilinear_tolerance),
        CurvilinearBranch::Grazing
    );

    StraightLineStepper::new(0.0).step(&mut state, 10.0);
    let result = engine.curvilinear_state(&gctx, &mut state).unwrap();
    assert!(result.jacobian.is_finite());
    assert!(result.parameters.covariance().unwrap().is_finite());
}

#[test]
fn test_misaligned_element_moves_surface() {
    let nominal_placement = Isometry3::translation(0.0, 0.0, 100.0);
    let element = Arc::new(AlignableElement::new(nominal_placement, 0.3));
    let target: SurfaceHandle<f64> = PlaneSurface::new(Isometry3::identity())
        .with_detector_element(&element)
        .into_handle();
    let aligned = GeometryContext::with_payload(AlignmentCorrection {
        delta: Isometry3::translation(0.0, 0.0, 2.5),
    });

    let start_surface = plane([0.0, 0.0, 0.0], [0.0, 0.0, 1.0]);
    let cov = diagonal_covariance([0.1, 0.1, 0.01, 0.01, 0.01, 1.0]);
    let mut state = start_on(&start_surface, BoundVector::new(0.0, 0.0, 0.0, 0.2, 1.0, 0.0), Some(cov));

    let stepper = StraightLineStepper::new(0.0);
    stepper.step_to_surface(&aligned, &mut state, target.as_ref()).unwrap();
    assert_relative_eq!(state.parameters.position().z, 102.5, epsilon = 1e-12);

    let engine = make_engine(false);
    let before = state.clone();
    let err = engine.bound_state(&nominal(), &mut state, &target).unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(state.jac_transport, before.jac_transport);

    let result = engine.bound_state(&aligned, &mut state, &target).unwrap();
    let position = result.parameters.position(&aligned);
    assert_relative_eq!(position, state.parameters.position(), epsilon = 1e-12);
}

#[test]
fn test_engine_rejects_invalid_configuration() {
    let config = TransportConfig::<f64>::default().with_curvilinear_tolerance(1.5);
    assert!(matches!(
        CovarianceEngine::new(config),
        Err(TransportError::InvalidConfiguration(_))
    ));
}

#[test]
fn test_transport_to_curvilinear_reinitializes_reference() {
    let gctx = nominal();
    let surface = tilted_plane([0.0, 0.0, 0.0], 0.3, 0.1, -0.2);
    let cov = diagonal_covariance([0.2, 0.2, 0.01, 0.01, 0.05, 1.0]);
    let mut state = start_on(&surface, BoundVector::new(1.0, 2.0, -0.7, 1.1, 0.3, 0.0), Some(cov));
    let engine = make_engine(false);

    StraightLineStepper::new(0.0).step(&mut state, 40.0);
    engine.transport_covariance_to_curvilinear(&gctx, &mut state).unwrap();

    assert_eq!(state.jac_transport, FreeTransportJacobian::identity());
    assert_eq!(state.derivatives, FreeVector::zeros());
    assert_relative_eq!(
        state.reference_surface.center(&gctx),
        state.parameters.position(),
        epsilon = 1e-12
    );
    assert_relative_eq!(state.reference.local_position().norm(), 0.0, epsilon = 1e-9);
    assert!(state.covariance.is_symmetric(1e-15));

    let again = engine.curvilinear_state(&gctx, &mut state).unwrap();
    assert_relative_eq!(
        *again.jacobian.as_matrix(),
        SMatrix::<f64, 6, 6>::identity(),
        epsilon = 1e-12
    );
}

#[test]
fn test_polar_axis_without_correction_is_recoverable() {
    let gctx = nominal();
    let surface = plane([0.0, 0.0, 0.0], [0.0, 0.0, 1.0]);
    let target = plane([0.0, 0.0, 60.0], [0.0, 0.0, 1.0]);
    let cov = diagonal_covariance([0.1, 0.1, 0.01, 0.01, 0.01, 1.0]);
    let mut state = start_on(&surface, BoundVector::new(0.0, 0.0, 0.0, 0.0, 1.0, 0.0), Some(cov));
    let engine = make_engine(false);

    StraightLineStepper::new(0.0)
        .step_to_surface(&gctx, &mut state, target.as_ref())
        .unwrap();
    let before = state.clone();

    let err = engine.bound_state(&gctx, &mut state, &target).unwrap_err();
    assert!(!err.is_fatal());
    assert_eq!(err, TransportError::Projection(ProjectionError::DegenerateDirection));
    assert_eq!(
        engine.curvilinear_state(&gctx, &mut state).unwrap_err(),
        TransportError::Projection(ProjectionError::DegenerateDirection)
    );
    assert_eq!(state.jac_transport, before.jac_transport);
    assert_eq!(state.covariance, before.covariance);
    assert!(Arc::ptr_eq(&state.reference_surface, &before.reference_surface));

    // Without a covariance the axis is not special
    let mut bare = start_on(&surface, BoundVector::new(0.0, 0.0, 0.0, 0.0, 1.0, 0.0), None);
    StraightLineStepper::new(0.0)
        .step_to_surface(&gctx, &mut bare, target.as_ref())
        .unwrap();
    let result = engine.bound_state(&gctx, &mut bare, &target).unwrap();
    assert_eq!(result.first_order, FirstOrder::NotRequested);
}

#[test]
fn test_free_covariance_is_transported_to_reference_point() {
    let gctx = nominal();
    let surface = tilted_plane([0.0, 0.0, 0.0], 0.2, -0.1, 0.4);
    let target = tilted_plane([5.0, -5.0, 90.0], -0.15, 0.25, 0.0);
    let cov = diagonal_covariance([0.2, 0.3, 0.01, 0.02, 0.05, 1.0]);
    let mut state = start_on(&surface, BoundVector::new(1.0, -1.0, 0.3, 0.6, 0.5, 0.0), Some(cov));

    StraightLineStepper::new(0.105)
        .step_to_surface(&gctx, &mut state, target.as_ref())
        .unwrap();
    let free_to_path = target
        .free_to_path_derivative(&gctx, &state.parameters.position(), &state.parameters.direction())
        .unwrap();
    let expected = path_correction(&state.derivatives, &free_to_path)
        .compose(&state.jac_transport)
        .compose(&state.jac_to_global)
        .conjugate(&cov);

    let result = make_engine(false).bound_state(&gctx, &mut state, &target).unwrap();
    assert_eq!(result.first_order, FirstOrder::Projected);
    assert_relative_eq!(
        *state.free_covariance.as_matrix(),
        *expected.as_matrix(),
        epsilon = 1e-10,
        max_relative = 1e-10
    );

    // The bound covariance is the projection of the free one
    let to_bound = target.free_to_bound_jacobian(&gctx, &state.parameters).unwrap();
    assert_relative_eq!(
        *to_bound.conjugate(&state.free_covariance).as_matrix(),
        *result.parameters.covariance().unwrap().as_matrix(),
        epsilon = 1e-10,
        max_relative = 1e-10
    );
}
