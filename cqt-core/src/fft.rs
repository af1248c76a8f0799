//! # Fast Fourier Transform (FFT) Module
//!
//! Thin helpers around RustFFT for the constant-Q engine. The engine correlates the full
//! complex spectrum of each input block against its kernel, so the real input is expanded
//! to a complex buffer and transformed over all `N` bins rather than the packed
//! half-spectrum a real-input FFT would produce.

use rustfft::{Fft, FftPlanner, num_complex::Complex};
use std::sync::Arc;

/// Plans a forward FFT of `len` points.
///
/// Non power-of-two lengths are fine; the planner picks a mixed-radix or Bluestein
/// algorithm as needed.
pub fn plan_forward(len: usize) -> Arc<dyn Fft<f32>> {
    let mut planner = FftPlanner::new();
    planner.plan_fft_forward(len)
}

/// Computes the full-spectrum FFT of real samples, scaled by `1/N`.
///
/// The first `N` values of `buffer` hold the real input, where `N` is the length of
/// `fft`; the buffer must hold `2 * N` values. On return `buffer` holds the scaled
/// spectrum as interleaved `(re, im)` pairs covering both positive and negative
/// frequencies, and the same spectrum is returned as complex values.
///
/// # Panics
/// * If `buffer` is shorter than `2 * N`
pub fn real_forward_full_scaled(fft: &dyn Fft<f32>, buffer: &mut [f32]) -> Vec<Complex<f32>> {
    let len = buffer.len() / 2;
    let mut spectrum: Vec<Complex<f32>> = buffer[..len]
        .iter()
        .map(|&sample| Complex { re: sample, im: 0.0 })
        .collect();

    fft.process(&mut spectrum);

    let scale = 1.0 / len as f32;
    for (value, pair) in spectrum.iter_mut().zip(buffer.chunks_exact_mut(2)) {
        *value *= scale;
        pair[0] = value.re;
        pair[1] = value.im;
    }
    spectrum
}
