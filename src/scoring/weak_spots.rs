use std::collections::VecDeque;

use crate::notation::cents_between;
use crate::scoring::judge::PITCH_TOLERANCE_CENTS;
use crate::scoring::types::*;

/// Timing tolerance used for diagnostics. Strict follows the tempo, lenient
/// is a flat 40 ms regardless of the window the judge was given.
pub fn diagnostic_timing_tolerance_ms(tempo_bpm: f64, mode: PracticeMode) -> f64 {
    mode.default_window().tolerance_ms(tempo_bpm)
}

/// Re-evaluate a sample against its target note and return a record when the
/// pitch or timing error is out of tolerance. Passing samples return `None`.
pub fn record_if_weak(
    sample: &PitchSample,
    target: &ReferenceNote,
    judgment: &JudgmentResult,
    tempo_bpm: f64,
    mode: PracticeMode,
) -> Option<WeakSpotRecord> {
    let detected = sample.midi?;

    let pitch_error_cents = judgment
        .pitch_error_cents
        .unwrap_or_else(|| cents_between(detected, target.pitch));
    let timing_error_ms = (sample.time_sec - target.center()) * 1000.0;

    let mut reasons = Vec::new();
    if pitch_error_cents.abs() > PITCH_TOLERANCE_CENTS {
        reasons.push(WeakReason::Pitch);
    }
    if timing_error_ms.abs() > diagnostic_timing_tolerance_ms(tempo_bpm, mode) {
        reasons.push(WeakReason::Timing);
    }
    if reasons.is_empty() {
        return None;
    }

    Some(WeakSpotRecord {
        time_sec: sample.time_sec,
        target_pitch: target.pitch,
        detected_pitch: detected,
        pitch_error_cents,
        timing_error_ms,
        tempo_bpm,
        mode,
        reasons,
    })
}

/// Append-only weak-spot log with a fixed capacity; once full, the oldest
/// record is dropped for each new one.
#[derive(Debug, Clone)]
pub struct WeakSpotLog {
    records: VecDeque<WeakSpotRecord>,
    capacity: usize,
}

impl WeakSpotLog {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        WeakSpotLog {
            records: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub fn push(&mut self, record: WeakSpotRecord) {
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// Evaluate and append in one step. Returns whether a record was added.
    pub fn record_if_weak(
        &mut self,
        sample: &PitchSample,
        target: &ReferenceNote,
        judgment: &JudgmentResult,
        tempo_bpm: f64,
        mode: PracticeMode,
    ) -> bool {
        match record_if_weak(sample, target, judgment, tempo_bpm, mode) {
            Some(record) => {
                self.push(record);
                true
            }
            None => false,
        }
    }

    pub fn records(&self) -> impl Iterator<Item = &WeakSpotRecord> {
        self.records.iter()
    }

    pub fn to_vec(&self) -> Vec<WeakSpotRecord> {
        self.records.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn target() -> ReferenceNote {
        ReferenceNote {
            pitch: 40,
            start_time: 2.0,
            duration: 0.5,
            consumed: false,
        }
    }

    fn sample(time_sec: f64, midi: Option<i32>) -> PitchSample {
        PitchSample {
            time_sec,
            midi,
            hit: false,
        }
    }

    fn judged_with_cents(cents: f64) -> JudgmentResult {
        JudgmentResult {
            pitch_error_cents: Some(cents),
            ..JudgmentResult::miss()
        }
    }

    #[test]
    fn test_pitch_only_failure() {
        // 50 cents off, 10 ms late at 120 BPM strict (62.5 ms window)
        let record = record_if_weak(
            &sample(2.26, Some(40)),
            &target(),
            &judged_with_cents(50.0),
            120.0,
            PracticeMode::Strict,
        )
        .expect("pitch error should be recorded");
        assert_eq!(record.reasons, vec![WeakReason::Pitch]);
        assert_eq!(record.pitch_error_cents, 50.0);
        assert!((record.timing_error_ms - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_timing_only_failure() {
        let record = record_if_weak(
            &sample(2.40, Some(40)),
            &target(),
            &JudgmentResult::miss(),
            120.0,
            PracticeMode::Strict,
        )
        .expect("timing error should be recorded");
        assert_eq!(record.reasons, vec![WeakReason::Timing]);
        assert_eq!(record.pitch_error_cents, 0.0);
        assert!(record.timing_error_ms > 62.5);
    }

    #[test]
    fn test_both_failures_tagged() {
        let record = record_if_weak(
            &sample(2.10, Some(42)),
            &target(),
            &JudgmentResult::miss(),
            120.0,
            PracticeMode::Strict,
        )
        .expect("both errors should be recorded");
        assert_eq!(record.reasons, vec![WeakReason::Pitch, WeakReason::Timing]);
        assert_eq!(record.pitch_error_cents, 200.0);
        assert!(record.timing_error_ms < 0.0, "early playing is negative");
    }

    #[test]
    fn test_clean_pass_is_silent() {
        let result = record_if_weak(
            &sample(2.25, Some(40)),
            &target(),
            &judged_with_cents(0.0),
            120.0,
            PracticeMode::Strict,
        );
        assert!(result.is_none());
    }

    #[test]
    fn test_lenient_mode_uses_40ms() {
        // 50 ms late: fine for strict at 120 BPM, weak for lenient
        let s = sample(2.30, Some(40));
        let strict = record_if_weak(&s, &target(), &JudgmentResult::miss(), 120.0, PracticeMode::Strict);
        let lenient =
            record_if_weak(&s, &target(), &JudgmentResult::miss(), 120.0, PracticeMode::Lenient);
        assert!(strict.is_none());
        assert_eq!(lenient.map(|r| r.reasons), Some(vec![WeakReason::Timing]));
    }

    #[test]
    fn test_no_pitch_never_recorded() {
        let result = record_if_weak(
            &sample(5.0, None),
            &target(),
            &JudgmentResult::miss(),
            120.0,
            PracticeMode::Strict,
        );
        assert!(result.is_none());
    }

    #[test]
    fn test_log_evicts_oldest() {
        let mut log = WeakSpotLog::with_capacity(2);
        for i in 0..3 {
            let added = log.record_if_weak(
                &sample(10.0 + i as f64, Some(45)),
                &target(),
                &JudgmentResult::miss(),
                120.0,
                PracticeMode::Strict,
            );
            assert!(added);
        }
        assert_eq!(log.len(), 2);
        let times: Vec<f64> = log.records().map(|r| r.time_sec).collect();
        assert_eq!(times, vec![11.0, 12.0]);

        log.clear();
        assert!(log.is_empty());
    }
}
