//! # Window Functions
//!
//! Weights applied to each constant-Q kernel before it is transformed. A window is any
//! function of `(sample_index, window_length)`; the standard tapers are provided here
//! and can be selected by name from the configuration.
//!
//! Each bin gets its own window length, so the weight is evaluated per bin rather than
//! applied to the input frame the way a short-time FFT would.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// A window weight as a function of sample index and window length.
pub type WindowFn = fn(usize, usize) -> f32;

/// Hann window, tapering to zero at both ends.
pub fn hann(n: usize, window_length: usize) -> f32 {
    cosine_sum(n, window_length, &[0.5, 0.5])
}

/// Hamming window.
pub fn hamming(n: usize, window_length: usize) -> f32 {
    cosine_sum(n, window_length, &[0.54, 0.46])
}

/// Blackman window.
pub fn blackman(n: usize, window_length: usize) -> f32 {
    cosine_sum(n, window_length, &[0.42, 0.5, 0.08])
}

/// Generalized cosine window `a0 - a1 cos(x) + a2 cos(2x) - ...`, symmetric over
/// `window_length` samples.
fn cosine_sum(n: usize, window_length: usize, coefficients: &[f64]) -> f32 {
    if window_length <= 1 {
        return 1.0;
    }
    let x = 2.0 * PI * n as f64 / (window_length - 1) as f64;
    let weight: f64 = coefficients
        .iter()
        .enumerate()
        .map(|(k, a)| {
            let sign = if k % 2 == 0 { 1.0 } else { -1.0 };
            sign * a * (k as f64 * x).cos()
        })
        .sum();
    weight as f32
}

/// Window selection as stored in the configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    /// No weighting.
    #[default]
    Rectangular,
    Hann,
    Hamming,
    Blackman,
}

impl WindowKind {
    /// The weight function for this window, or `None` for the rectangular window.
    pub fn function(self) -> Option<WindowFn> {
        match self {
            WindowKind::Rectangular => None,
            WindowKind::Hann => Some(hann),
            WindowKind::Hamming => Some(hamming),
            WindowKind::Blackman => Some(blackman),
        }
    }
}
