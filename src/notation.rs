const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Convert a frequency to the nearest equal-tempered MIDI note (A4 = 440 Hz = 69).
/// Exact half-semitone inputs round away from zero.
pub fn frequency_to_midi(freq_hz: f64) -> Option<i32> {
    if !(freq_hz.is_finite() && freq_hz > 0.0) {
        return None;
    }
    Some((12.0 * (freq_hz / 440.0).log2() + 69.0).round() as i32)
}

pub fn midi_to_frequency(midi: i32) -> f64 {
    440.0 * 2f64.powf((midi as f64 - 69.0) / 12.0)
}

/// Scientific pitch name, so 69 is "A4" and 60 is "C4".
pub fn midi_to_note_name(midi: i32) -> String {
    let name = NOTE_NAMES[midi.rem_euclid(12) as usize];
    let octave = midi.div_euclid(12) - 1;
    format!("{}{}", name, octave)
}

pub fn cents_between(detected_midi: i32, target_midi: i32) -> f64 {
    (detected_midi - target_midi) as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_a440_is_midi_69() {
        assert_eq!(frequency_to_midi(440.0), Some(69));
    }

    #[test]
    fn test_bass_open_strings() {
        // E1, A1, D2, G2
        assert_eq!(frequency_to_midi(41.2), Some(28));
        assert_eq!(frequency_to_midi(55.0), Some(33));
        assert_eq!(frequency_to_midi(73.42), Some(38));
        assert_eq!(frequency_to_midi(98.0), Some(43));
    }

    #[test]
    fn test_rounds_to_nearest_semitone() {
        // 40 cents sharp of A4 still reads as A4, 60 cents sharp reads as A#4
        assert_eq!(frequency_to_midi(440.0 * 2f64.powf(0.4 / 12.0)), Some(69));
        assert_eq!(frequency_to_midi(440.0 * 2f64.powf(0.6 / 12.0)), Some(70));
    }

    #[test]
    fn test_invalid_frequency() {
        assert_eq!(frequency_to_midi(0.0), None);
        assert_eq!(frequency_to_midi(-5.0), None);
        assert_eq!(frequency_to_midi(f64::NAN), None);
    }

    #[test]
    fn test_note_names() {
        assert_eq!(midi_to_note_name(69), "A4");
        assert_eq!(midi_to_note_name(60), "C4");
        assert_eq!(midi_to_note_name(40), "E2");
        assert_eq!(midi_to_note_name(0), "C-1");
        assert_eq!(midi_to_note_name(-1), "B-2");
    }

    #[test]
    fn test_frequency_roundtrip() {
        for midi in 28..=67 {
            assert_eq!(frequency_to_midi(midi_to_frequency(midi)), Some(midi));
        }
    }

    #[test]
    fn test_cents_between() {
        assert_eq!(cents_between(40, 40), 0.0);
        assert_eq!(cents_between(41, 40), 100.0);
        assert_eq!(cents_between(38, 40), -200.0);
    }
}
