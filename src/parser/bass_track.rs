//! Pick the track most likely to carry the bass line.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, TrainerError};
use crate::parser::midi::{MidiData, MidiNote, TrackData};
use crate::scoring::types::{PitchRange, ReferenceNote};

/// General MIDI percussion channel (10, zero-based).
pub const DRUM_CHANNEL: u8 = 9;
pub const FALLBACK_DURATION_SEC: f64 = 0.1;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BassLine {
    pub notes: Vec<ReferenceNote>,
    pub pitch_range: PitchRange,
    /// First tempo declared by the file, if any.
    pub reference_bpm: Option<f64>,
    pub track_index: usize,
    pub track_name: String,
    pub score: f64,
}

struct TrackCandidate<'a> {
    index: usize,
    track: &'a TrackData,
    score: f64,
}

/// Notes with no usable onset never become reference notes.
fn has_onset(note: &&MidiNote) -> bool {
    note.time.is_finite() && note.time >= 0.0
}

/// Heuristic bass score, or `None` for tracks that can never be the bass.
pub fn score_track(track: &TrackData) -> Option<f64> {
    if track.channel == DRUM_CHANNEL {
        return None;
    }

    let pitches: Vec<i32> = track.notes.iter().filter(has_onset).map(|n| n.midi).collect();
    let min_pitch = *pitches.iter().min()?;
    let max_pitch = *pitches.iter().max()?;
    let avg_pitch = pitches.iter().map(|&p| p as f64).sum::<f64>() / pitches.len() as f64;
    let name = track.name.to_lowercase();

    let mut score = 0.0;
    if min_pitch >= 30 && max_pitch <= 70 {
        score += 5.0;
    }
    if name.contains("bass") {
        score += 10.0;
    }
    if avg_pitch < 55.0 {
        score += (55.0 - avg_pitch) * 0.5;
    }
    if name.contains("guitar") || name.contains("piano") {
        score -= 5.0;
    }
    Some(score)
}

fn note_duration(duration: f64) -> f64 {
    if duration.is_finite() && duration > 0.0 {
        duration
    } else {
        FALLBACK_DURATION_SEC
    }
}

/// Choose the bass track and build its reference notes, sorted by start time.
/// Ties go to the earlier track.
pub fn select_bass_track(tracks: &[TrackData]) -> Result<BassLine> {
    let mut best: Option<TrackCandidate> = None;

    for (index, track) in tracks.iter().enumerate() {
        let score = match score_track(track) {
            Some(s) => s,
            None => continue,
        };
        debug!(index, name = %track.name, score, "scored bass candidate");

        if best.as_ref().map_or(true, |b| score > b.score) {
            best = Some(TrackCandidate {
                index,
                track,
                score,
            });
        }
    }

    let best = best.ok_or(TrainerError::NoBassTrackFound)?;

    let mut notes: Vec<ReferenceNote> = best
        .track
        .notes
        .iter()
        .filter(has_onset)
        .map(|n| ReferenceNote {
            pitch: n.midi,
            start_time: n.time,
            duration: note_duration(n.duration),
            consumed: false,
        })
        .collect();
    notes.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

    // Candidates always have a playable note, so the fold sees at least one pitch.
    let (min, max) = notes
        .iter()
        .fold((i32::MAX, i32::MIN), |(lo, hi), n| (lo.min(n.pitch), hi.max(n.pitch)));

    info!(
        index = best.index,
        name = %best.track.name,
        score = best.score,
        notes = notes.len(),
        "selected bass track"
    );

    Ok(BassLine {
        notes,
        pitch_range: PitchRange {
            min: min - 2,
            max: max + 2,
        },
        reference_bpm: None,
        track_index: best.index,
        track_name: best.track.name.clone(),
        score: best.score,
    })
}

/// Selection over a parsed file, also picking up its first declared tempo.
pub fn extract_bass_line(midi: &MidiData) -> Result<BassLine> {
    let mut line = select_bass_track(&midi.tracks)?;
    line.reference_bpm = midi
        .tempos
        .first()
        .map(|t| t.bpm)
        .filter(|bpm| bpm.is_finite() && *bpm > 0.0);
    Ok(line)
}
