//! Console rendering of constant-Q spectra.
//!
//! Each frame is summarized by its strongest bin: the nearest note, its deviation in
//! cents from equal temperament, and a level bar.

use cqt_core::{SpectrumFrame, notes, spectrum};

/// Lowest level shown; quieter bins (and silence, which is `-inf`) clamp to this.
pub const DISPLAY_FLOOR_DB: f32 = -120.0;

/// Frames whose strongest bin is below this level are reported as quiet.
pub const QUIET_THRESHOLD_DB: f32 = -40.0;

const BAR_WIDTH: usize = 30;

/// Formats spectra for the terminal once the frequency axis is known.
#[derive(Debug, Default)]
pub struct SpectrumDisplay {
    axis: Option<(f64, f64)>,
}

impl SpectrumDisplay {
    /// Records the frequency axis: bin `i` is centred on `min_frequency * ratio^i`.
    pub fn configure(&mut self, ratio: f64, min_frequency: f64) {
        self.axis = Some((ratio, min_frequency));
    }

    /// One line describing `frame`, or `None` before the axis is configured.
    pub fn describe(&self, frame: &SpectrumFrame) -> Option<String> {
        let (ratio, min_frequency) = self.axis?;

        let mut power = frame.power_db.clone();
        spectrum::clamp_db(&mut power, DISPLAY_FLOOR_DB);

        let peak = match spectrum::peak_bin(&power) {
            Some(peak) if power[peak] >= QUIET_THRESHOLD_DB => peak,
            _ => return Some(format!("#{:<6} (quiet)", frame.index)),
        };

        let frequency = min_frequency * ratio.powi(peak as i32);
        let (name, cents) = match notes::find_nearest_note(frequency) {
            Some(note) => (
                note.name.as_str(),
                notes::cents_deviation(frequency, note.frequency),
            ),
            None => ("?", 0.0),
        };

        Some(format!(
            "#{:<6} {:<4} {:>8.2} Hz {:>+6.1} ct {:>7.1} dB |{}",
            frame.index,
            name,
            frequency,
            cents,
            power[peak],
            level_bar(power[peak])
        ))
    }
}

fn level_bar(power_db: f32) -> String {
    let fraction = ((power_db - DISPLAY_FLOOR_DB) / -DISPLAY_FLOOR_DB).clamp(0.0, 1.0);
    let filled = (fraction * BAR_WIDTH as f32).round() as usize;
    format!("{}{}", "#".repeat(filled), " ".repeat(BAR_WIDTH - filled))
}
