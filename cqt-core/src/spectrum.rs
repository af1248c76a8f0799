//! Helpers for consuming constant-Q power spectra.

/// Index of the strongest bin, ignoring NaN and infinite values.
///
/// Returns `None` if no bin holds a finite value (e.g. a silent block).
pub fn peak_bin(spectrum: &[f32]) -> Option<usize> {
    spectrum
        .iter()
        .enumerate()
        .filter(|(_, power)| power.is_finite())
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
}

/// Raises every value below `floor` (including `-inf` and NaN) to `floor`.
pub fn clamp_db(spectrum: &mut [f32], floor: f32) {
    for power in spectrum.iter_mut() {
        if !(*power >= floor) {
            *power = floor;
        }
    }
}
