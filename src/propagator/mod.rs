//! Covariance transport
//!
//! - [`engine::CovarianceEngine`]: bound and curvilinear trajectory states
//!   from the Jacobians accumulated during propagation
//! - [`corrector::NonlinearCorrector`]: sigma-point correction of the
//!   first-order transport
//! - [`state::StepState`]: per-trajectory state carried between reference points
//! - [`straight_line::StraightLineStepper`]: field-free reference stepper

pub mod config;
pub mod corrector;
pub mod engine;
pub mod state;
pub mod straight_line;

pub use config::*;
pub use corrector::*;
pub use engine::*;
pub use state::*;
pub use straight_line::*;
