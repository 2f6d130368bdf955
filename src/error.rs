//! Graphics error types.

use std::fmt;

use thiserror::Error;

/// Errors that can occur in the graphics system.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphicsError {
    /// Failed to create a resource or native state object.
    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),
    /// An invalid parameter was provided.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// The GPU device was lost.
    #[error("GPU device lost")]
    DeviceLost,
    /// The presenter (swapchain) could not be recreated.
    #[error("presenter recreation failed: {0}")]
    PresenterRecreationFailed(String),
    /// Device recovery stalled with resources still destroyed.
    #[error("device recovery failed: {0}")]
    RecoveryFailed(RecoveryFailure),
    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Structured failure data for a stalled recovery pass.
///
/// Produced by [`RecoveryCoordinator::on_device_restored`] when the
/// recreation fixed point stops making progress while resources remain
/// destroyed. Carries the label of every resource that could not be
/// recreated so callers can diagnose which subsystem is stuck.
///
/// [`RecoveryCoordinator::on_device_restored`]: crate::recovery::RecoveryCoordinator::on_device_restored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryFailure {
    /// Labels of the resources that could not be recreated.
    pub resources: Vec<String>,
}

impl fmt::Display for RecoveryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} resource(s) could not be recreated: {}",
            self.resources.len(),
            self.resources.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GraphicsError::DeviceLost;
        assert_eq!(err.to_string(), "GPU device lost");

        let err = GraphicsError::InvalidParameter("buffer size cannot be zero".to_string());
        assert_eq!(
            err.to_string(),
            "invalid parameter: buffer size cannot be zero"
        );
    }

    #[test]
    fn test_recovery_failure_display() {
        let err = GraphicsError::RecoveryFailed(RecoveryFailure {
            resources: vec!["shadow_map".to_string(), "shadow_map_view".to_string()],
        });
        assert_eq!(
            err.to_string(),
            "device recovery failed: 2 resource(s) could not be recreated: shadow_map, shadow_map_view"
        );
    }

    #[test]
    fn test_recovery_failure_data() {
        let failure = RecoveryFailure {
            resources: vec!["depth_buffer".to_string()],
        };
        let err = GraphicsError::RecoveryFailed(failure.clone());
        match err {
            GraphicsError::RecoveryFailed(f) => assert_eq!(f, failure),
            _ => panic!("wrong variant"),
        }
    }
}
