//! Geometry context
//!
//! An opaque, caller-owned token carrying alignment and conditions state.
//! The core passes it by reference into every geometry query and never
//! mutates it.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Alignment and conditions token handed to every geometry query.
///
/// The payload is whatever the detector description needs to resolve
/// context-dependent placements (e.g. a table of aligned transforms). The
/// default context carries no payload, which selects nominal placements.
#[derive(Clone, Default)]
pub struct GeometryContext {
    payload: Option<Arc<dyn Any + Send + Sync>>,
}

impl GeometryContext {
    /// Creates a context without payload (nominal geometry).
    #[inline]
    pub fn nominal() -> Self {
        Self::default()
    }

    /// Creates a context that carries alignment or conditions data.
    #[inline]
    pub fn with_payload<P: Any + Send + Sync>(payload: P) -> Self {
        Self {
            payload: Some(Arc::new(payload)),
        }
    }

    /// Returns the payload if it has type `P`.
    #[inline]
    pub fn get<P: Any>(&self) -> Option<&P> {
        self.payload.as_deref().and_then(|p| p.downcast_ref::<P>())
    }

    /// Returns true if the context carries no payload.
    #[inline]
    pub fn is_nominal(&self) -> bool {
        self.payload.is_none()
    }
}

impl fmt::Debug for GeometryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeometryContext")
            .field("nominal", &self.is_nominal())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Shift(f64);

    #[test]
    fn test_nominal_context_has_no_payload() {
        let gctx = GeometryContext::nominal();
        assert!(gctx.is_nominal());
        assert!(gctx.get::<Shift>().is_none());
    }

    #[test]
    fn test_payload_downcast() {
        let gctx = GeometryContext::with_payload(Shift(0.5));
        assert_eq!(gctx.get::<Shift>(), Some(&Shift(0.5)));
        assert!(gctx.get::<u32>().is_none());

        let shared = gctx.clone();
        assert_eq!(shared.get::<Shift>(), Some(&Shift(0.5)));
    }
}
