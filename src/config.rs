//! Session configuration.
//!
//! Everything here is a knob the front end may set through `configure`. The
//! pitch tolerance and the tempo-relative timing ratio are fixed constants in
//! [`crate::scoring::judge`] and deliberately not part of this struct.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainerError};
use crate::scoring::types::TimingWindow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Tempo used until a MIDI file declares one.
    pub default_tempo_bpm: f64,
    /// Used when the audio host reports no usable sample rate.
    pub fallback_sample_rate: f32,
    pub min_tempo_bpm: f64,
    pub max_tempo_bpm: f64,
    /// Weak-spot log is a ring; the oldest record goes first.
    pub weak_spot_capacity: usize,
    pub pitch_history_capacity: usize,
    /// Timing window applied in lenient mode.
    pub lenient_window: TimingWindow,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            default_tempo_bpm: 120.0,
            fallback_sample_rate: 44100.0,
            min_tempo_bpm: 40.0,
            max_tempo_bpm: 300.0,
            weak_spot_capacity: 512,
            pitch_history_capacity: 4096,
            lenient_window: TimingWindow::Fixed { ms: 40.0 },
        }
    }
}

impl TrainerConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.fallback_sample_rate.is_finite() && self.fallback_sample_rate > 0.0) {
            return Err(TrainerError::InvalidConfig(format!(
                "fallback_sample_rate must be positive, got {}",
                self.fallback_sample_rate
            )));
        }
        if !(self.min_tempo_bpm > 0.0 && self.min_tempo_bpm <= self.max_tempo_bpm) {
            return Err(TrainerError::InvalidConfig(format!(
                "tempo bounds [{}, {}] are not a valid range",
                self.min_tempo_bpm, self.max_tempo_bpm
            )));
        }
        if !self.accepts_tempo(self.default_tempo_bpm) {
            return Err(TrainerError::InvalidConfig(format!(
                "default_tempo_bpm {} is outside [{}, {}]",
                self.default_tempo_bpm, self.min_tempo_bpm, self.max_tempo_bpm
            )));
        }
        if self.weak_spot_capacity == 0 || self.pitch_history_capacity == 0 {
            return Err(TrainerError::InvalidConfig(
                "capacities must be at least 1".to_string(),
            ));
        }
        if let TimingWindow::Fixed { ms } = self.lenient_window {
            if !(ms.is_finite() && ms >= 0.0) {
                return Err(TrainerError::InvalidConfig(format!(
                    "lenient window must be a non-negative duration, got {} ms",
                    ms
                )));
            }
        }
        Ok(())
    }

    pub fn accepts_tempo(&self, bpm: f64) -> bool {
        bpm.is_finite() && bpm >= self.min_tempo_bpm && bpm <= self.max_tempo_bpm
    }
}
