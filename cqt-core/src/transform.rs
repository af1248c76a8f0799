//! # Constant-Q Transform Engine
//!
//! Computes a logarithmically spaced power spectrum from linearly sampled audio using the
//! kernel method of Brown & Puckette (1992): each block is transformed once with an FFT
//! and then correlated against the precomputed [`SpectralKernel`] rows.
//!
//! The engine is immutable after construction. Transform calls only read the kernel and
//! the FFT plan, so one instance can be shared between threads once it has been built.

use log::{debug, info};
use rustfft::{Fft, num_complex::Complex};
use std::sync::Arc;

use crate::{
    config::AnalysisConfig,
    error::CqtError,
    fft,
    kernel::{CqtParameters, SpectralKernel},
};

/// A constant-Q transform with a fixed configuration and precomputed kernel.
///
/// The bins computed are `min_frequency * ratio^i` for `i` in `0..num_bins`.
pub struct ConstantQTransform {
    params: CqtParameters,
    kernel: SpectralKernel,
    fft: Arc<dyn Fft<f32>>,
}

impl std::fmt::Debug for ConstantQTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstantQTransform")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl ConstantQTransform {
    /// Constructs an engine and builds its spectral kernel.
    ///
    /// # Arguments
    /// * `window` - Window applied to each temporal kernel; `None` means no windowing
    /// * `sample_rate` - Sample rate of the audio that will be analyzed
    /// * `min_frequency` - Centre frequency of the lowest bin
    /// * `ratio` - Geometric ratio between neighbouring bins, greater than 1
    /// * `num_bins` - Number of constant-Q coefficients to compute
    ///
    /// # Returns
    /// * `Err(CqtError)` - If any parameter is invalid; no kernel is built in that case
    pub fn new(
        window: Option<&dyn Fn(usize, usize) -> f32>,
        sample_rate: f64,
        min_frequency: f64,
        ratio: f64,
        num_bins: usize,
    ) -> Result<Self, CqtError> {
        let params = CqtParameters::new(sample_rate, min_frequency, ratio, num_bins)?;
        debug!(
            "Constant-Q parameters: bandwidth {:.3} Hz, Q {:.3}, FFT size {}",
            params.bandwidth(),
            params.q(),
            params.fft_size()
        );

        let fft = fft::plan_forward(params.fft_size());
        let kernel = SpectralKernel::build(&params, window, fft.as_ref());

        Ok(Self {
            params,
            kernel,
            fft,
        })
    }

    /// Constructs an engine from a stored configuration and the actual capture rate.
    pub fn from_config(config: &AnalysisConfig, sample_rate: f64) -> Result<Self, CqtError> {
        let window = config.window.function();
        let engine = Self::new(
            window.as_ref().map(|w| w as &dyn Fn(usize, usize) -> f32),
            sample_rate,
            config.min_frequency(),
            config.ratio,
            config.num_bins,
        )?;
        info!(
            "Constant-Q engine ready: {} bins from {:.2} Hz, FFT size {} at {} Hz",
            engine.num_coefficients(),
            engine.min_frequency(),
            engine.fft_size(),
            sample_rate
        );
        Ok(engine)
    }

    /// Computes the constant-Q power spectrum of a block of real samples, in decibels.
    ///
    /// # Arguments
    /// * `input` - Exactly `2 * fft_size()` values; the first `fft_size()` are the real
    ///   samples and the rest is scratch space. On return the whole buffer holds the
    ///   scaled complex spectrum of the block as interleaved `(re, im)` pairs.
    /// * `output` - At least `num_coefficients()` values; entry `i` receives
    ///   `10 log10(|cq_i|^2 / reference_power)`. Entries past the last bin are untouched.
    /// * `reference_power` - Power corresponding to 0 dB
    ///
    /// A bin with zero energy, such as every bin of an all-zero block, yields
    /// `f32::NEG_INFINITY`. It is never NaN; clamp for display on the caller's side.
    pub fn transform(
        &self,
        input: &mut [f32],
        output: &mut [f32],
        reference_power: f64,
    ) -> Result<(), CqtError> {
        let expected = 2 * self.fft_size();
        if input.len() != expected {
            return Err(CqtError::InputSizeMismatch {
                expected,
                actual: input.len(),
            });
        }
        if output.len() < self.num_coefficients() {
            return Err(CqtError::OutputTooShort {
                required: self.num_coefficients(),
                actual: output.len(),
            });
        }
        if !(reference_power > 0.0 && reference_power.is_finite()) {
            return Err(CqtError::InvalidReferencePower(reference_power));
        }

        let spectrum = fft::real_forward_full_scaled(self.fft.as_ref(), input);

        for (power, row) in output.iter_mut().zip(self.kernel.rows()) {
            let coefficient = correlate(&spectrum, row);
            *power = to_decibels(coefficient.norm_sqr(), reference_power);
        }
        Ok(())
    }

    /// Allocating form of [`transform`](Self::transform) for exactly `fft_size()` samples.
    pub fn power_spectrum(
        &self,
        samples: &[f32],
        reference_power: f64,
    ) -> Result<Vec<f32>, CqtError> {
        if samples.len() != self.fft_size() {
            return Err(CqtError::InputSizeMismatch {
                expected: self.fft_size(),
                actual: samples.len(),
            });
        }
        let mut input = vec![0.0; 2 * self.fft_size()];
        input[..samples.len()].copy_from_slice(samples);
        let mut output = vec![0.0; self.num_coefficients()];
        self.transform(&mut input, &mut output, reference_power)?;
        Ok(output)
    }

    pub fn fft_size(&self) -> usize {
        self.params.fft_size()
    }

    pub fn num_coefficients(&self) -> usize {
        self.kernel.len()
    }

    pub fn ratio(&self) -> f64 {
        self.params.ratio()
    }

    pub fn min_frequency(&self) -> f64 {
        self.params.min_frequency()
    }

    pub fn sample_rate(&self) -> f64 {
        self.params.sample_rate()
    }

    pub fn bandwidth(&self) -> f64 {
        self.params.bandwidth()
    }

    pub fn q(&self) -> f64 {
        self.params.q()
    }

    /// Centre frequency of bin `i` in Hz.
    pub fn center_frequency(&self, i: usize) -> f64 {
        self.params.center_frequency(i)
    }

    /// Centre frequencies of every bin, lowest first.
    pub fn center_frequencies(&self) -> Vec<f64> {
        (0..self.num_coefficients())
            .map(|i| self.center_frequency(i))
            .collect()
    }

    pub fn parameters(&self) -> &CqtParameters {
        &self.params
    }

    pub fn kernel(&self) -> &SpectralKernel {
        &self.kernel
    }
}

/// Complex inner product of the input spectrum with one kernel row.
fn correlate(spectrum: &[Complex<f32>], row: &[Complex<f32>]) -> Complex<f32> {
    spectrum
        .iter()
        .zip(row)
        .fold(Complex::new(0.0, 0.0), |acc, (x, k)| acc + x * k)
}

fn to_decibels(power: f32, reference_power: f64) -> f32 {
    (10.0 * (power as f64 / reference_power).log10()) as f32
}
