use crate::notation::cents_between;
use crate::scoring::types::*;

/// Pitch tolerance for a hit, in cents either side of the target.
pub const PITCH_TOLERANCE_CENTS: f64 = 30.0;
/// Tempo-relative timing window as a fraction of a quarter note.
pub const TIMING_RATIO: f64 = 0.125;

pub fn quarter_note_ms(tempo_bpm: f64) -> f64 {
    (60.0 / tempo_bpm) * 1000.0
}

impl TimingWindow {
    /// Half-width of the window in milliseconds. An unusable tempo gives a
    /// zero-width window rather than an unbounded one.
    pub fn tolerance_ms(self, tempo_bpm: f64) -> f64 {
        match self {
            TimingWindow::TempoRelative => {
                if tempo_bpm.is_finite() && tempo_bpm > 0.0 {
                    quarter_note_ms(tempo_bpm) * TIMING_RATIO
                } else {
                    0.0
                }
            }
            TimingWindow::Fixed { ms } => ms,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct JudgeParams {
    pub mode: PracticeMode,
    pub tempo_bpm: f64,
    pub window: TimingWindow,
}

impl JudgeParams {
    /// Parameters using the mode's own timing window.
    pub fn for_mode(mode: PracticeMode, tempo_bpm: f64) -> Self {
        JudgeParams {
            mode,
            tempo_bpm,
            window: mode.default_window(),
        }
    }

    pub fn tolerance_ms(&self) -> f64 {
        self.window.tolerance_ms(self.tempo_bpm)
    }
}

/// Judge one detected pitch at `elapsed_sec` against the reference notes.
///
/// `notes` must be sorted by start time. The first pending note that is both
/// inside the timing window and within pitch tolerance is consumed; a note in
/// the window with the wrong pitch does not stop the scan.
pub fn judge(
    detected_midi: Option<i32>,
    elapsed_sec: f64,
    notes: &mut [ReferenceNote],
    params: &JudgeParams,
) -> JudgmentResult {
    let detected = match detected_midi {
        Some(m) => m,
        None => return JudgmentResult::miss(),
    };

    let tolerance_ms = params.tolerance_ms();
    let elapsed_ms = elapsed_sec * 1000.0;

    for (idx, note) in notes.iter_mut().enumerate() {
        // Centers never precede starts, so nothing from here on can be in range.
        if note.start_time * 1000.0 > elapsed_ms + tolerance_ms {
            break;
        }
        if note.consumed {
            continue;
        }

        let delta_ms = (elapsed_sec - note.center()) * 1000.0;
        if delta_ms.abs() > tolerance_ms {
            continue;
        }

        let pitch_error_cents = cents_between(detected, note.pitch);
        if pitch_error_cents.abs() <= PITCH_TOLERANCE_CENTS {
            note.consumed = true;
            return JudgmentResult {
                hit: true,
                timing_class: params.mode.hit_class(),
                pitch_error_cents: Some(pitch_error_cents),
                note_index: Some(idx),
            };
        }
    }

    JudgmentResult::miss()
}

/// Make every note matchable again, e.g. after a backward seek.
pub fn reset_judgment_state(notes: &mut [ReferenceNote]) {
    for note in notes.iter_mut() {
        note.consumed = false;
    }
}
