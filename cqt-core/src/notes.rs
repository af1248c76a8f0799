//! # Musical Notes Module
//!
//! Equal-temperament note names and frequencies for labelling constant-Q bins. The table
//! covers the 88 keys of a piano, A0 to C8, tuned to A4 = 440 Hz.

use once_cell::sync::Lazy;

use crate::config::DEFAULT_TUNING_FREQUENCY;

/// Names of the twelve pitch classes, starting from C.
pub const CHROMATIC_SCALE: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Number of keys in the note table.
pub const KEY_COUNT: usize = 88;

/// A single musical note with its name and frequency.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    /// Note name (e.g. "A4", "C#3")
    pub name: String,
    /// Frequency in Hz
    pub frequency: f64,
}

/// All 88 keys, computed once on first use.
static NOTES: Lazy<Vec<Note>> = Lazy::new(|| {
    (0..KEY_COUNT)
        .map(|key| {
            // Key 0 is A0, which sits nine semitones above C0. A4 is key 48.
            let semitone = key + 9;
            let name = format!("{}{}", CHROMATIC_SCALE[semitone % 12], semitone / 12);
            let frequency =
                DEFAULT_TUNING_FREQUENCY * 2f64.powf((key as f64 - 48.0) / 12.0);
            Note { name, frequency }
        })
        .collect()
});

/// Finds the key closest in pitch to `frequency`.
///
/// Distance is measured in cents so that the choice is symmetric on a log scale.
/// Returns `None` for frequencies that are not positive and finite.
pub fn find_nearest_note(frequency: f64) -> Option<&'static Note> {
    if !(frequency > 0.0 && frequency.is_finite()) {
        return None;
    }
    NOTES.iter().min_by(|a, b| {
        let da = cents_deviation(frequency, a.frequency).abs();
        let db = cents_deviation(frequency, b.frequency).abs();
        da.total_cmp(&db)
    })
}

/// The note for a key index (0 = A0, 87 = C8).
pub fn note_for_key(key_index: usize) -> Option<&'static Note> {
    NOTES.get(key_index)
}

/// Deviation of `frequency` from `target` in cents; positive means sharp.
pub fn cents_deviation(frequency: f64, target: f64) -> f64 {
    1200.0 * (frequency / target).log2()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn table_spans_a0_to_c8() {
        let first = note_for_key(0).unwrap();
        assert_eq!(first.name, "A0");
        assert_abs_diff_eq!(first.frequency, 27.5, epsilon = 1e-9);

        let last = note_for_key(KEY_COUNT - 1).unwrap();
        assert_eq!(last.name, "C8");
        assert_abs_diff_eq!(last.frequency, 4186.009, epsilon = 1e-3);

        assert!(note_for_key(KEY_COUNT).is_none());
    }

    #[test]
    fn octave_number_changes_at_c() {
        assert_eq!(note_for_key(2).unwrap().name, "B0");
        assert_eq!(note_for_key(3).unwrap().name, "C1");
        assert_eq!(note_for_key(48).unwrap().name, "A4");
    }

    #[test]
    fn nearest_note_uses_pitch_distance() {
        assert_eq!(find_nearest_note(440.0).unwrap().name, "A4");
        assert_eq!(find_nearest_note(450.0).unwrap().name, "A4");
        assert_eq!(find_nearest_note(455.0).unwrap().name, "A#4");
        assert_eq!(find_nearest_note(10.0).unwrap().name, "A0");
        assert!(find_nearest_note(0.0).is_none());
        assert!(find_nearest_note(f64::NAN).is_none());
    }

    #[test]
    fn cents_are_signed() {
        assert_abs_diff_eq!(cents_deviation(880.0, 440.0), 1200.0, epsilon = 1e-9);
        assert_abs_diff_eq!(cents_deviation(220.0, 440.0), -1200.0, epsilon = 1e-9);
        assert_abs_diff_eq!(cents_deviation(440.0, 440.0), 0.0);
    }
}
