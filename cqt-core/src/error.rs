//! # Error Types
//!
//! Errors raised by the constant-Q engine. Configuration errors are reported when the
//! engine is constructed; call-contract errors are reported by each transform call.
//! Numerical edge cases such as silence are not errors (see
//! [`ConstantQTransform::transform`](crate::transform::ConstantQTransform::transform)).

use thiserror::Error;

/// Errors returned by the constant-Q transform engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CqtError {
    /// The sample rate was zero, negative or not finite.
    #[error("sample rate must be positive and finite, got {0}")]
    InvalidSampleRate(f64),

    /// The lowest analyzed frequency was zero, negative or not finite.
    #[error("minimum frequency must be positive and finite, got {0}")]
    InvalidMinFrequency(f64),

    /// The geometric ratio between neighbouring bins was not greater than one.
    #[error("bin ratio must be greater than 1, got {0}")]
    InvalidRatio(f64),

    /// No constant-Q coefficients were requested.
    #[error("number of constant-Q bins must be positive, got {0}")]
    InvalidBinCount(usize),

    /// The bandwidth is wider than the sample rate, leaving an empty FFT.
    #[error("bandwidth {bandwidth} Hz is too wide for sample rate {sample_rate} Hz")]
    FftSizeTooSmall {
        /// The configured sample rate.
        sample_rate: f64,
        /// The derived frequency resolution.
        bandwidth: f64,
    },

    /// The transform input buffer was not exactly twice the FFT size.
    #[error("input buffer must hold exactly {expected} values, got {actual}")]
    InputSizeMismatch {
        /// Required length (`2 * fft_size`).
        expected: usize,
        /// Length that was supplied.
        actual: usize,
    },

    /// The output buffer cannot hold one value per constant-Q bin.
    #[error("output buffer must hold at least {required} values, got {actual}")]
    OutputTooShort {
        /// Number of constant-Q bins.
        required: usize,
        /// Length that was supplied.
        actual: usize,
    },

    /// The decibel reference power was zero, negative or not finite.
    #[error("reference power must be positive and finite, got {0}")]
    InvalidReferencePower(f64),
}

/// Errors raised while loading or saving an [`AnalysisConfig`](crate::config::AnalysisConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),
}
