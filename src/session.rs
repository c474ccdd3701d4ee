//! One practice session: the loaded bass line plus everything the front end
//! accumulates while the performer plays along.
//!
//! The front end drives it once per animation frame with `process_frame`, in
//! non-decreasing playback time. A frame that arrives earlier than the one
//! before it is treated as a backward seek and makes every note matchable
//! again.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::TrainerConfig;
use crate::error::{Result, TrainerError};
use crate::notation::{frequency_to_midi, midi_to_note_name};
use crate::parser::bass_track::{extract_bass_line, BassLine};
use crate::parser::midi::{parse_midi, MidiData};
use crate::pitch::autocorrelation::AutocorrelationDetector;
use crate::scoring::judge::{self, JudgeParams};
use crate::scoring::report::build_report;
use crate::scoring::types::*;
use crate::scoring::weak_spots::WeakSpotLog;

const FRAME_SIZE_HINT: usize = 2048;

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct LoadSummary {
    pub note_count: usize,
    pub track_index: usize,
    pub track_name: String,
    pub tempo_bpm: f64,
    pub pitch_range: PitchRange,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct FrameOutcome {
    pub time_sec: f64,
    pub frequency_hz: Option<f32>,
    pub midi: Option<i32>,
    pub note_name: Option<String>,
    pub judgment: JudgmentResult,
    pub weak_spot_recorded: bool,
}

pub struct PracticeSession {
    config: TrainerConfig,
    bass_line: Option<BassLine>,
    mode: PracticeMode,
    tempo_bpm: f64,
    weak_spots: WeakSpotLog,
    history: VecDeque<PitchSample>,
    /// Best miss so far per pending note, by note index. Flushed to the
    /// weak-spot log once the note's judge window has passed without a hit.
    near_misses: BTreeMap<usize, PitchSample>,
    /// Notes whose window closed and were already diagnosed.
    diagnosed: BTreeSet<usize>,
    sections: Vec<MarkedSection>,
    pending_mark_in: Option<f64>,
    last_elapsed: Option<f64>,
    detector: AutocorrelationDetector,
}

impl Default for PracticeSession {
    fn default() -> Self {
        Self::build(TrainerConfig::default())
    }
}

impl PracticeSession {
    pub fn new(config: TrainerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: TrainerConfig) -> Self {
        PracticeSession {
            mode: PracticeMode::default(),
            tempo_bpm: config.default_tempo_bpm,
            weak_spots: WeakSpotLog::with_capacity(config.weak_spot_capacity),
            history: VecDeque::new(),
            near_misses: BTreeMap::new(),
            diagnosed: BTreeSet::new(),
            sections: Vec::new(),
            pending_mark_in: None,
            last_elapsed: None,
            bass_line: None,
            detector: AutocorrelationDetector::new(FRAME_SIZE_HINT),
            config,
        }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Swap in a new configuration. Existing weak spots and history are kept,
    /// trimmed from the oldest end if the new capacities are smaller.
    pub fn configure(&mut self, config: TrainerConfig) -> Result<()> {
        config.validate()?;

        let mut weak_spots = WeakSpotLog::with_capacity(config.weak_spot_capacity);
        for record in self.weak_spots.records() {
            weak_spots.push(record.clone());
        }
        self.weak_spots = weak_spots;

        while self.history.len() > config.pitch_history_capacity {
            self.history.pop_front();
        }
        if self.reference_bpm().is_none() && self.tempo_bpm == self.config.default_tempo_bpm {
            self.tempo_bpm = config.default_tempo_bpm;
        }
        self.config = config;
        Ok(())
    }

    // Loading

    /// Decode SMF bytes and load their bass line.
    pub fn load_midi_bytes(&mut self, bytes: &[u8]) -> Result<LoadSummary> {
        let data = parse_midi(bytes).inspect_err(|e| warn!(error = %e, "MIDI parse failed"))?;
        self.load(&data)
    }

    /// Load an already parsed file. The previous bass line stays in place
    /// unless selection succeeds.
    pub fn load(&mut self, midi: &MidiData) -> Result<LoadSummary> {
        let line = extract_bass_line(midi)
            .inspect_err(|e| warn!(error = %e, tracks = midi.tracks.len(), "bass line rejected"))?;

        if let Some(bpm) = line.reference_bpm {
            let clamped = bpm.clamp(self.config.min_tempo_bpm, self.config.max_tempo_bpm);
            if clamped != bpm {
                warn!(bpm, clamped, "file tempo outside practice range");
            }
            self.tempo_bpm = clamped;
        }
        let summary = LoadSummary {
            note_count: line.notes.len(),
            track_index: line.track_index,
            track_name: line.track_name.clone(),
            tempo_bpm: self.tempo_bpm,
            pitch_range: line.pitch_range,
        };

        self.bass_line = Some(line);
        self.history.clear();
        self.near_misses.clear();
        self.diagnosed.clear();
        self.last_elapsed = None;
        self.pending_mark_in = None;

        info!(
            notes = summary.note_count,
            track = %summary.track_name,
            tempo_bpm = summary.tempo_bpm,
            "bass line loaded"
        );
        Ok(summary)
    }

    // Per-frame processing

    /// Estimate, judge and record one microphone frame taken at `elapsed_sec`.
    pub fn process_frame(&mut self, frame: &[f32], sample_rate: f32, elapsed_sec: f64) -> FrameOutcome {
        let rate = if sample_rate.is_finite() && sample_rate > 0.0 {
            sample_rate
        } else {
            self.config.fallback_sample_rate
        };

        let frequency_hz = self.detector.detect(frame, rate);
        let midi = frequency_hz.and_then(|hz| frequency_to_midi(hz as f64));
        let (judgment, weak_spot_recorded) = self.observe(midi, elapsed_sec);

        FrameOutcome {
            time_sec: elapsed_sec,
            frequency_hz,
            midi,
            note_name: midi.map(midi_to_note_name),
            judgment,
            weak_spot_recorded,
        }
    }

    /// Judge a pitch detected elsewhere.
    pub fn judge_pitch(&mut self, detected_midi: Option<i32>, elapsed_sec: f64) -> JudgmentResult {
        self.observe(detected_midi, elapsed_sec).0
    }

    fn observe(&mut self, detected: Option<i32>, elapsed_sec: f64) -> (JudgmentResult, bool) {
        if self.last_elapsed.is_some_and(|last| elapsed_sec < last) {
            self.rewind_to(elapsed_sec);
        }
        self.last_elapsed = Some(elapsed_sec);

        let params = self.judge_params();
        let line = match self.bass_line.as_mut() {
            Some(line) => line,
            None => return (JudgmentResult::miss(), false),
        };

        let judgment = judge::judge(detected, elapsed_sec, &mut line.notes, &params);
        let mut recorded = false;

        let sample = PitchSample {
            time_sec: elapsed_sec,
            midi: detected,
            hit: judgment.hit,
        };

        // Each note is diagnosed once: on its hit, or after its window closes.
        match judgment.note_index {
            Some(idx) => {
                self.near_misses.remove(&idx);
                if let Some(note) = line.notes.get(idx) {
                    recorded |= self.weak_spots.record_if_weak(
                        &sample,
                        note,
                        &judgment,
                        self.tempo_bpm,
                        self.mode,
                    );
                }
            }
            None if detected.is_some() => {
                let sounding = line
                    .notes
                    .iter()
                    .position(|n| !n.consumed && n.contains(elapsed_sec));
                if let Some(idx) = sounding.filter(|idx| !self.diagnosed.contains(idx)) {
                    let center = line.notes[idx].center();
                    let closer = self
                        .near_misses
                        .get(&idx)
                        .map_or(true, |best| {
                            (elapsed_sec - center).abs() < (best.time_sec - center).abs()
                        });
                    if closer {
                        self.near_misses.insert(idx, sample.clone());
                    }
                }
            }
            None => {}
        }

        let tolerance_ms = params.tolerance_ms();
        let closed: Vec<usize> = self
            .near_misses
            .keys()
            .copied()
            .filter(|&idx| {
                line.notes.get(idx).map_or(true, |n| {
                    n.consumed || elapsed_sec * 1000.0 > n.center() * 1000.0 + tolerance_ms
                })
            })
            .collect();
        for idx in closed {
            let best = match self.near_misses.remove(&idx) {
                Some(best) => best,
                None => continue,
            };
            self.diagnosed.insert(idx);
            match line.notes.get(idx) {
                Some(note) if !note.consumed => {
                    recorded |= self.weak_spots.record_if_weak(
                        &best,
                        note,
                        &JudgmentResult::miss(),
                        self.tempo_bpm,
                        self.mode,
                    );
                }
                _ => {}
            }
        }

        if detected.is_none() {
            return (judgment, recorded);
        }

        if self.history.len() == self.config.pitch_history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(sample);

        (judgment, recorded)
    }

    fn judge_params(&self) -> JudgeParams {
        let window = match self.mode {
            PracticeMode::Strict => TimingWindow::TempoRelative,
            PracticeMode::Lenient => self.config.lenient_window,
        };
        JudgeParams {
            mode: self.mode,
            tempo_bpm: self.tempo_bpm,
            window,
        }
    }

    // Transport

    /// Tell the session the playhead moved. Moving backwards makes every note
    /// matchable again and drops history past the new position.
    pub fn seek(&mut self, to_sec: f64) {
        if self.last_elapsed.is_some_and(|last| to_sec < last) {
            self.rewind_to(to_sec);
        }
        self.last_elapsed = Some(to_sec);
    }

    fn rewind_to(&mut self, to_sec: f64) {
        self.reset_judgment_state();
        self.history.retain(|p| p.time_sec <= to_sec);
        debug!(to_sec, "rewound practice session");
    }

    pub fn reset_judgment_state(&mut self) {
        if let Some(line) = self.bass_line.as_mut() {
            judge::reset_judgment_state(&mut line.notes);
        }
        self.near_misses.clear();
        self.diagnosed.clear();
    }

    pub fn mode(&self) -> PracticeMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: PracticeMode) {
        self.mode = mode;
    }

    pub fn tempo_bpm(&self) -> f64 {
        self.tempo_bpm
    }

    /// Override the practice tempo. Returns the playback rate the backing
    /// track should use to follow it.
    pub fn set_tempo(&mut self, bpm: f64) -> Result<f64> {
        if !self.config.accepts_tempo(bpm) {
            warn!(bpm, "tempo rejected");
            return Err(TrainerError::InvalidTempo(bpm));
        }
        self.tempo_bpm = bpm;
        Ok(self.playback_rate())
    }

    pub fn reference_bpm(&self) -> Option<f64> {
        self.bass_line.as_ref().and_then(|l| l.reference_bpm)
    }

    pub fn playback_rate(&self) -> f64 {
        match self.reference_bpm() {
            Some(reference) => self.tempo_bpm / reference,
            None => 1.0,
        }
    }

    // User-marked sections

    pub fn mark_in(&mut self, time_sec: f64) {
        self.pending_mark_in = Some(time_sec);
    }

    pub fn mark_out(&mut self, time_sec: f64) -> Result<MarkedSection> {
        let start = self.pending_mark_in.ok_or(TrainerError::MarkOutWithoutMarkIn)?;
        if time_sec <= start {
            return Err(TrainerError::InvalidSection {
                start,
                end: time_sec,
            });
        }
        let section = MarkedSection {
            start_sec: start,
            end_sec: time_sec,
        };
        self.sections.push(section);
        self.pending_mark_in = None;
        Ok(section)
    }

    pub fn marked_sections(&self) -> &[MarkedSection] {
        &self.sections
    }

    pub fn clear_marked_sections(&mut self) {
        self.sections.clear();
        self.pending_mark_in = None;
    }

    // Read-only views

    pub fn bass_line(&self) -> Option<&BassLine> {
        self.bass_line.as_ref()
    }

    pub fn reference_notes(&self) -> &[ReferenceNote] {
        self.bass_line
            .as_ref()
            .map(|l| l.notes.as_slice())
            .unwrap_or(&[])
    }

    pub fn pitch_range(&self) -> PitchRange {
        self.bass_line
            .as_ref()
            .map(|l| l.pitch_range)
            .unwrap_or_default()
    }

    pub fn hit_count(&self) -> usize {
        self.reference_notes().iter().filter(|n| n.consumed).count()
    }

    pub fn weak_spots(&self) -> &WeakSpotLog {
        &self.weak_spots
    }

    pub fn clear_weak_spots(&mut self) {
        self.weak_spots.clear();
    }

    pub fn pitch_history(&self) -> impl Iterator<Item = &PitchSample> {
        self.history.iter()
    }

    pub fn report(&self) -> SessionReport {
        build_report(
            self.reference_notes(),
            &self.weak_spots.to_vec(),
            self.sections.len(),
        )
    }
}
