//! Transport configuration

use nalgebra::RealField;

use crate::conversions::curvilinear::DEFAULT_CURVILINEAR_TOLERANCE;
use crate::TransportError;

/// Default distance within which a global position counts as on-surface.
pub const DEFAULT_ON_SURFACE_TOLERANCE: f64 = 1e-4;

/// Default sigma-point spread parameter.
pub const DEFAULT_KAPPA: f64 = 4.0;

/// Configuration of the covariance transport engine.
///
/// # Defaults
///
/// - covariance transport enabled
/// - nonlinear correction disabled
/// - curvilinear branch tolerance 0.999 on `|cos(theta)|`
/// - on-surface tolerance 1e-4
/// - κ = 4
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TransportConfig<T> {
    /// Transport the covariance alongside the parameters
    pub covariance_transport: bool,
    /// Run the sigma-point correction in addition to the first-order result
    pub nonlinear_correction: bool,
    /// Threshold on `|cos(theta)|` selecting the grazing curvilinear branch
    pub curvilinear_tolerance: T,
    /// Maximum distance from a surface accepted by global-to-local projection
    pub on_surface_tolerance: T,
    /// Sigma-point spread parameter
    pub kappa: T,
}

impl<T: RealField + Copy> Default for TransportConfig<T> {
    fn default() -> Self {
        Self {
            covariance_transport: true,
            nonlinear_correction: false,
            curvilinear_tolerance: nalgebra::convert(DEFAULT_CURVILINEAR_TOLERANCE),
            on_surface_tolerance: nalgebra::convert(DEFAULT_ON_SURFACE_TOLERANCE),
            kappa: nalgebra::convert(DEFAULT_KAPPA),
        }
    }
}

impl<T: RealField + Copy> TransportConfig<T> {
    pub fn with_covariance_transport(mut self, enabled: bool) -> Self {
        self.covariance_transport = enabled;
        self
    }

    pub fn with_nonlinear_correction(mut self, enabled: bool) -> Self {
        self.nonlinear_correction = enabled;
        self
    }

    pub fn with_curvilinear_tolerance(mut self, tolerance: T) -> Self {
        self.curvilinear_tolerance = tolerance;
        self
    }

    pub fn with_on_surface_tolerance(mut self, tolerance: T) -> Self {
        self.on_surface_tolerance = tolerance;
        self
    }

    pub fn with_kappa(mut self, kappa: T) -> Self {
        self.kappa = kappa;
        self
    }

    /// Checks that every tolerance and the spread parameter are usable.
    pub fn validate(&self) -> crate::Result<()> {
        if !(self.curvilinear_tolerance > T::zero() && self.curvilinear_tolerance < T::one()) {
            return Err(TransportError::InvalidConfiguration(
                "curvilinear tolerance must lie in (0, 1)",
            ));
        }
        if !(self.on_surface_tolerance > T::zero()) {
            return Err(TransportError::InvalidConfiguration(
                "on-surface tolerance must be positive",
            ));
        }
        if !(self.kappa > T::zero()) {
            return Err(TransportError::InvalidConfiguration("kappa must be positive"));
        }
        Ok(())
    }
}
