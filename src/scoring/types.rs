use serde::{Deserialize, Serialize};

// Reference data

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ReferenceNote {
    pub pitch: i32,
    pub start_time: f64,
    pub duration: f64,
    pub consumed: bool,
}

impl ReferenceNote {
    pub fn center(&self) -> f64 {
        self.start_time + self.duration / 2.0
    }

    pub fn contains(&self, time_sec: f64) -> bool {
        time_sec >= self.start_time && time_sec <= self.start_time + self.duration
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct PitchRange {
    pub min: i32,
    pub max: i32,
}

impl Default for PitchRange {
    fn default() -> Self {
        PitchRange { min: 30, max: 70 }
    }
}

// Practice mode and timing

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PracticeMode {
    /// Follow the MIDI exactly.
    #[default]
    Strict,
    /// Allow the feel of the original recording.
    Lenient,
}

impl PracticeMode {
    /// Accepts both the front-end names ("midi"/"original") and our own.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "strict" | "midi" => Some(PracticeMode::Strict),
            "lenient" | "original" => Some(PracticeMode::Lenient),
            _ => None,
        }
    }

    pub fn hit_class(self) -> TimingClass {
        match self {
            PracticeMode::Strict => TimingClass::Exact,
            PracticeMode::Lenient => TimingClass::Lenient,
        }
    }

    pub fn default_window(self) -> TimingWindow {
        match self {
            PracticeMode::Strict => TimingWindow::TempoRelative,
            PracticeMode::Lenient => TimingWindow::Fixed { ms: 40.0 },
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimingWindow {
    /// 12.5% of a quarter note at the current tempo.
    TempoRelative,
    Fixed { ms: f64 },
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimingClass {
    Exact,
    Lenient,
    Miss,
}

// Performance tracking types

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PitchSample {
    pub time_sec: f64,
    pub midi: Option<i32>,
    pub hit: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct JudgmentResult {
    pub hit: bool,
    pub timing_class: TimingClass,
    pub pitch_error_cents: Option<f64>,
    pub note_index: Option<usize>,
}

impl JudgmentResult {
    pub fn miss() -> Self {
        JudgmentResult {
            hit: false,
            timing_class: TimingClass::Miss,
            pitch_error_cents: None,
            note_index: None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WeakReason {
    Pitch,
    Timing,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct WeakSpotRecord {
    pub time_sec: f64,
    pub target_pitch: i32,
    pub detected_pitch: i32,
    pub pitch_error_cents: f64,
    pub timing_error_ms: f64,
    pub tempo_bpm: f64,
    pub mode: PracticeMode,
    pub reasons: Vec<WeakReason>,
}

impl WeakSpotRecord {
    pub fn has_reason(&self, reason: WeakReason) -> bool {
        self.reasons.contains(&reason)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct MarkedSection {
    pub start_sec: f64,
    pub end_sec: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SessionReport {
    pub total_notes: u32,
    pub notes_hit: u32,
    pub hit_percentage: u32,
    pub weak_spot_count: u32,
    pub pitch_failures: u32,
    pub timing_failures: u32,
    pub avg_pitch_error_cents: f64,
    pub avg_timing_error_ms: f64,
    pub pitch_tendency: String,  // "sharp", "flat", "accurate"
    pub timing_tendency: String, // "early", "late", "on_time"
    pub marked_sections: u32,
    pub feedback: Vec<String>,
}
