//! # Spectral Kernel Module
//!
//! Precomputes the frequency-domain kernel of the constant-Q transform (Brown & Puckette,
//! 1992). Each row is a windowed complex exponential at one bin's centre frequency,
//! zero-padded to the FFT size, transformed with a forward FFT and scaled by `1/N`.
//!
//! ## Layout
//! Row `i` is stored as `fft_size` complex values (real and imaginary parts interleaved in
//! memory) and corresponds to the centre frequency `min_frequency * ratio^i`.

use log::debug;
use rustfft::{Fft, num_complex::Complex};
use std::f64::consts::PI;

use crate::error::CqtError;

/// Frequency resolution shared by every bin: `min_frequency * ratio - min_frequency`.
pub fn resolution(min_frequency: f64, ratio: f64) -> f64 {
    min_frequency * ratio - min_frequency
}

/// FFT length for a configuration, `floor(sample_rate / resolution)`.
///
/// This does not validate its arguments; use [`CqtParameters::new`] for that.
pub fn fft_size_for(sample_rate: f64, min_frequency: f64, ratio: f64) -> usize {
    (sample_rate / resolution(min_frequency, ratio)) as usize
}

/// Validated constant-Q parameters and the quantities derived from them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CqtParameters {
    sample_rate: f64,
    min_frequency: f64,
    ratio: f64,
    num_bins: usize,
    bandwidth: f64,
    q: f64,
    fft_size: usize,
}

impl CqtParameters {
    /// Validates the configuration and derives bandwidth, Q and FFT size.
    ///
    /// # Errors
    /// Each invalid parameter has its own [`CqtError`] variant. Parameters are checked in
    /// the order sample rate, minimum frequency, ratio, bin count.
    pub fn new(
        sample_rate: f64,
        min_frequency: f64,
        ratio: f64,
        num_bins: usize,
    ) -> Result<Self, CqtError> {
        if !(sample_rate > 0.0 && sample_rate.is_finite()) {
            return Err(CqtError::InvalidSampleRate(sample_rate));
        }
        if !(min_frequency > 0.0 && min_frequency.is_finite()) {
            return Err(CqtError::InvalidMinFrequency(min_frequency));
        }
        if !(ratio > 1.0 && ratio.is_finite()) {
            return Err(CqtError::InvalidRatio(ratio));
        }
        if num_bins == 0 {
            return Err(CqtError::InvalidBinCount(num_bins));
        }

        let bandwidth = resolution(min_frequency, ratio);
        let fft_size = fft_size_for(sample_rate, min_frequency, ratio);
        if fft_size == 0 {
            return Err(CqtError::FftSizeTooSmall {
                sample_rate,
                bandwidth,
            });
        }

        Ok(Self {
            sample_rate,
            min_frequency,
            ratio,
            num_bins,
            bandwidth,
            q: min_frequency / bandwidth,
            fft_size,
        })
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn min_frequency(&self) -> f64 {
        self.min_frequency
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    pub fn num_bins(&self) -> usize {
        self.num_bins
    }

    /// Frequency resolution in Hz.
    pub fn bandwidth(&self) -> f64 {
        self.bandwidth
    }

    /// The constant ratio of centre frequency to bandwidth.
    pub fn q(&self) -> f64 {
        self.q
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Centre frequency of bin `i`.
    pub fn center_frequency(&self, i: usize) -> f64 {
        self.min_frequency * self.ratio.powi(i as i32)
    }

    /// Number of kernel samples for bin `i`, never more than the FFT size.
    ///
    /// Lower bins get longer windows so that every bin spans the same number of periods.
    pub fn window_length(&self, i: usize) -> usize {
        let length = (self.q * self.sample_rate / self.center_frequency(i)) as usize;
        length.min(self.fft_size)
    }
}

/// The precomputed frequency-domain kernel, one row per constant-Q bin.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralKernel {
    rows: Vec<Vec<Complex<f32>>>,
}

impl SpectralKernel {
    /// Builds the kernel for `params`.
    ///
    /// # Arguments
    /// * `params` - Validated parameters
    /// * `window` - Weight applied to each temporal kernel, or `None` for no windowing
    /// * `fft` - Forward FFT planned for `params.fft_size()`
    pub fn build(
        params: &CqtParameters,
        window: Option<&dyn Fn(usize, usize) -> f32>,
        fft: &dyn Fft<f32>,
    ) -> Self {
        let fft_size = params.fft_size();
        let scale = 1.0 / fft_size as f32;
        let mut scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        let rows = (0..params.num_bins())
            .map(|i| {
                let frequency = params.center_frequency(i);
                let window_length = params.window_length(i);
                let mut row = vec![Complex::new(0.0f32, 0.0); fft_size];

                for (j, value) in row.iter_mut().take(window_length).enumerate() {
                    let angle = -2.0 * PI * frequency * j as f64 / params.sample_rate();
                    let weight = window.map_or(1.0, |w| w(j, window_length)) as f64;
                    *value = Complex::new(
                        (weight * angle.cos()) as f32,
                        (weight * angle.sin()) as f32,
                    );
                }

                fft.process_with_scratch(&mut row, &mut scratch);
                row.iter_mut().for_each(|value| *value *= scale);
                row
            })
            .collect::<Vec<_>>();

        debug!(
            "Built spectral kernel: {} bins x {} points (Q = {:.3})",
            rows.len(),
            fft_size,
            params.q()
        );

        Self { rows }
    }

    /// Row for bin `i`.
    pub fn row(&self, i: usize) -> &[Complex<f32>] {
        &self.rows[i]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Complex<f32>]> {
        self.rows.iter().map(Vec::as_slice)
    }

    /// Number of rows, i.e. the number of constant-Q bins.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
