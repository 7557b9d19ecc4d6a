//! Example usage of the covtransport library
//!
//! Propagates a track through a row of tilted planes with a straight-line
//! stepper and reports the first-order and sigma-point corrected covariances
//! at every plane.

use clap::Parser;
use covtransport::prelude::*;
use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3, Vector4};
use tracing::{error, info};

/// Covariance transport demo
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(long, short, default_value_t = false)]
    verbose: bool,

    /// Number of planes to cross
    #[arg(long, default_value_t = 5)]
    planes: usize,

    /// Distance between planes (mm)
    #[arg(long, default_value_t = 50.0)]
    spacing: f64,

    /// Disable the sigma-point correction
    #[arg(long, default_value_t = false)]
    no_correction: bool,
}

fn init_logging(verbose: bool) {
    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true);

    if verbose {
        subscriber.with_max_level(tracing::Level::DEBUG).init();
        info!("Verbose logging enabled (DEBUG level)");
    } else {
        subscriber.with_max_level(tracing::Level::INFO).init();
    }
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    println!("covtransport: Covariance Transport Demo");
    println!("=======================================\n");

    if let Err(e) = run(&args) {
        error!("Propagation aborted: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> covtransport::Result<()> {
    let gctx = GeometryContext::nominal();
    let config = TransportConfig::default().with_nonlinear_correction(!args.no_correction);
    let engine = CovarianceEngine::new(config)?;
    let stepper = StraightLineStepper::new(0.105);

    // Planes along the x axis, slightly tilted around z
    let planes: Vec<SurfaceHandle<f64>> = (1..=args.planes)
        .map(|i| {
            let x = args.spacing * i as f64;
            let tilt = UnitQuaternion::from_euler_angles(0.0, std::f64::consts::FRAC_PI_2, 0.02 * i as f64);
            PlaneSurface::new(Isometry3::from_parts(Translation3::new(x, 0.0, 0.0), tilt))
                .with_bounds(RectangleBounds::new(200.0, 200.0))
                .into_handle()
        })
        .collect();

    let start = CurvilinearTrackParameters::new(
        Vector4::new(0.0, 0.0, 0.0, 0.0),
        Vector3::new(1.0, 0.2, 0.1),
        -1.0,
        Some(ParameterResolutions::default().covariance()),
    )?;
    let mut state = StepState::from_curvilinear(&start, engine.config())?;

    for (i, plane) in planes.iter().enumerate() {
        stepper.step_to_surface(&gctx, &mut state, plane.as_ref())?;
        let bound_state = engine.bound_state(&gctx, &mut state, plane)?;

        let parameters = bound_state.parameters.parameters();
        let inside = plane.inside_bounds(&parameters.local_position(), 0.0);
        println!(
            "Plane {}: loc = ({:.3}, {:.3}), path = {:.1} mm, inside = {}",
            i + 1,
            parameters.local_position().x,
            parameters.local_position().y,
            bound_state.path_length,
            inside
        );

        if let Some(cov) = bound_state.parameters.covariance() {
            println!("  first-order trace: {:.6e}", cov.trace());
        }
        match &bound_state.correction.bound {
            Some(corrected) => println!("  corrected trace:   {:.6e}", corrected.uncertainty()),
            None => println!("  corrected trace:   unavailable"),
        }
    }

    let final_state = engine.curvilinear_state(&gctx, &mut state)?;
    let momentum = final_state.parameters.momentum();
    println!(
        "\nFinal curvilinear state: p = ({:.3}, {:.3}, {:.3}) GeV, t = {:.4} ns",
        momentum.x,
        momentum.y,
        momentum.z,
        final_state.parameters.time()
    );

    Ok(())
}
