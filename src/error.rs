//! Error Types
//!
//! Errors raised while building a site configuration or validating the inputs
//! of a tilt search. Night-time and self-shaded geometry are not errors: the
//! energy model reports zero for them.

use thiserror::Error;

/// Errors that can occur when validating site parameters.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum ConfigError {
    #[error("latitude must be finite and between -90 and 90 degrees, got {0}")]
    Latitude(f64),

    #[error("panel area must be finite and positive, got {0} m²")]
    PanelArea(f64),

    #[error("efficiency must be in (0, 1], got {0}")]
    Efficiency(f64),
}

/// Errors that can occur when running a tilt search.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum OptimizeError {
    #[error("invalid bracket [{min}, {max}]: need finite 0 <= min < max <= 90")]
    InvalidBracket { min: f64, max: f64 },

    #[error("grid step must be finite, positive and give at most 10000000 grid points, got {0}")]
    InvalidStep(f64),

    #[error("tolerance must be finite and positive, got {0}")]
    InvalidTolerance(f64),

    #[error("learning rate must be finite and positive, got {0}")]
    InvalidLearningRate(f64),

    #[error("angle {0}° is outside the valid tilt range [0, 90]")]
    AngleOutOfRange(f64),

    #[error("sensitivity range must be finite and non-negative, got {0}%")]
    InvalidRangePercent(f64),

    #[error("reference energy at {angle_deg}° is zero, percentage loss is undefined")]
    ZeroReferenceEnergy { angle_deg: f64 },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result alias for search operations.
pub type OptimizeResult<T> = Result<T, OptimizeError>;
