//! End-to-end checks of the constant-Q engine through its public API.

use approx::assert_relative_eq;
use cqt_core::{
    ConstantQTransform, CqtError, fft_size_for, spectrum::peak_bin, window,
};
use std::f64::consts::PI;

const SEMITONE: f64 = 1.059_463_094_359_295_3;

fn sine(frequency: f64, sample_rate: f64, len: usize) -> Vec<f32> {
    (0..len)
        .map(|n| (0.5 * (2.0 * PI * frequency * n as f64 / sample_rate).sin()) as f32)
        .collect()
}

fn three_octaves_from_a1() -> ConstantQTransform {
    ConstantQTransform::new(None, 44_100.0, 55.0, SEMITONE, 37).unwrap()
}

#[test]
fn fft_size_follows_the_bandwidth_formula() {
    let engine = three_octaves_from_a1();
    let expected = (44_100.0 / (55.0 * SEMITONE - 55.0)).floor() as usize;

    assert_eq!(engine.fft_size(), expected);
    assert_eq!(engine.fft_size(), 13_484);
    assert_eq!(fft_size_for(44_100.0, 55.0, SEMITONE), expected);
    assert_eq!(engine.num_coefficients(), 37);
    assert_eq!(engine.ratio(), SEMITONE);
    assert_eq!(engine.min_frequency(), 55.0);
}

#[test]
fn highest_bin_is_three_octaves_up() {
    let engine = three_octaves_from_a1();
    assert_relative_eq!(engine.center_frequency(36), 440.0, max_relative = 1e-9);
}

#[test]
fn kernel_construction_is_deterministic() {
    let build = || ConstantQTransform::new(Some(&window::hann), 8000.0, 110.0, SEMITONE, 24).unwrap();
    let first = build();
    let second = build();
    assert_eq!(first.kernel(), second.kernel());
}

#[test]
fn sinusoid_peaks_at_its_bin() {
    let engine = three_octaves_from_a1();
    for bin in [0, 12, 24, 36] {
        let frequency = engine.center_frequency(bin);
        let spectrum = engine
            .power_spectrum(&sine(frequency, 44_100.0, engine.fft_size()), 1.0)
            .unwrap();

        assert_eq!(peak_bin(&spectrum), Some(bin), "sinusoid at {frequency} Hz");
        if bin > 0 {
            assert!(spectrum[bin] > spectrum[bin - 1]);
        }
        if bin + 1 < spectrum.len() {
            assert!(spectrum[bin] > spectrum[bin + 1]);
        }
    }
}

#[test]
fn windowed_kernel_still_peaks_at_its_bin() {
    let engine = ConstantQTransform::new(Some(&window::hann), 8000.0, 110.0, SEMITONE, 24).unwrap();
    let spectrum = engine
        .power_spectrum(&sine(220.0, 8000.0, engine.fft_size()), 1.0)
        .unwrap();
    assert_eq!(peak_bin(&spectrum), Some(12));
    assert!(spectrum[12] > spectrum[11]);
    assert!(spectrum[12] > spectrum[13]);
}

#[test]
fn silence_yields_negative_infinity_not_nan() {
    let engine = ConstantQTransform::new(None, 8000.0, 110.0, SEMITONE, 24).unwrap();
    let mut input = vec![0.0f32; 2 * engine.fft_size()];
    let mut output = vec![0.0f32; engine.num_coefficients()];

    engine.transform(&mut input, &mut output, 1.0).unwrap();

    for power in output {
        assert!(!power.is_nan());
        assert!(power == f32::NEG_INFINITY || power < -200.0);
    }
}

#[test]
fn reference_power_shifts_every_bin_equally() {
    let engine = ConstantQTransform::new(None, 8000.0, 110.0, SEMITONE, 24).unwrap();
    let samples = sine(330.0, 8000.0, engine.fft_size());
    let at_unity = engine.power_spectrum(&samples, 1.0).unwrap();
    let at_hundred = engine.power_spectrum(&samples, 100.0).unwrap();

    for (a, b) in at_unity.iter().zip(&at_hundred) {
        assert_relative_eq!(a - b, 20.0, epsilon = 1e-3);
    }
}

#[test]
fn short_input_is_a_size_mismatch() {
    let engine = ConstantQTransform::new(None, 8000.0, 110.0, SEMITONE, 24).unwrap();
    let n = engine.fft_size();
    let mut output = vec![0.0f32; 24];

    let mut short = vec![0.0f32; 2 * n - 1];
    assert_eq!(
        engine.transform(&mut short, &mut output, 1.0),
        Err(CqtError::InputSizeMismatch {
            expected: 2 * n,
            actual: 2 * n - 1
        })
    );

    let mut only_samples = vec![0.0f32; n];
    assert!(matches!(
        engine.transform(&mut only_samples, &mut output, 1.0),
        Err(CqtError::InputSizeMismatch { .. })
    ));
}

#[test]
fn short_output_is_rejected() {
    let engine = ConstantQTransform::new(None, 8000.0, 110.0, SEMITONE, 24).unwrap();
    let mut input = vec![0.0f32; 2 * engine.fft_size()];
    let mut output = vec![0.0f32; 23];
    assert_eq!(
        engine.transform(&mut input, &mut output, 1.0),
        Err(CqtError::OutputTooShort {
            required: 24,
            actual: 23
        })
    );
}

#[test]
fn invalid_configuration_fails_construction() {
    let build = |sample_rate, min_frequency, ratio, bins| {
        ConstantQTransform::new(None, sample_rate, min_frequency, ratio, bins).unwrap_err()
    };

    assert_eq!(build(44_100.0, 55.0, 1.0, 12), CqtError::InvalidRatio(1.0));
    assert_eq!(build(44_100.0, 55.0, 0.5, 12), CqtError::InvalidRatio(0.5));
    assert_eq!(build(44_100.0, 0.0, SEMITONE, 12), CqtError::InvalidMinFrequency(0.0));
    assert_eq!(build(-1.0, 55.0, SEMITONE, 12), CqtError::InvalidSampleRate(-1.0));
    assert_eq!(build(44_100.0, 55.0, SEMITONE, 0), CqtError::InvalidBinCount(0));
}
