//! Core types for typed parameter spaces, Jacobians and track parameters

pub mod gaussian;
pub mod parameters;
pub mod spaces;
pub mod transforms;
