//! Standard MIDI File decoding into a seconds-based track list.
//!
//! The shape matches what browser MIDI libraries hand out (`name`, `channel`,
//! `notes: [{midi, time, duration}]`, `tempos: [{bpm}]`), so a front end can
//! either pass its own parse result or give us the raw file bytes.

use std::collections::{HashMap, VecDeque};

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use serde::{Deserialize, Serialize};

use crate::error::Result;

const DEFAULT_MICROS_PER_QUARTER: u32 = 500_000;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MidiNote {
    pub midi: i32,
    /// Onset in seconds.
    pub time: f64,
    /// Length in seconds; zero when the source did not provide one.
    #[serde(default)]
    pub duration: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct TrackData {
    pub name: String,
    pub channel: u8,
    pub notes: Vec<MidiNote>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TempoInfo {
    pub bpm: f64,
    #[serde(default)]
    pub time: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct MidiData {
    pub tracks: Vec<TrackData>,
    pub tempos: Vec<TempoInfo>,
}

/// Piecewise tick-to-seconds mapping built from every tempo event in the file.
struct TempoMap {
    ticks_per_quarter: Option<f64>,
    seconds_per_tick_smpte: f64,
    /// (tick, seconds at tick, microseconds per quarter), sorted by tick
    segments: Vec<(u64, f64, u32)>,
}

impl TempoMap {
    fn new(timing: Timing, mut changes: Vec<(u64, u32)>) -> Self {
        match timing {
            Timing::Metrical(tpq) => {
                let tpq = (tpq.as_int().max(1)) as f64;
                changes.sort_by_key(|&(tick, _)| tick);

                let mut segments = Vec::with_capacity(changes.len() + 1);
                let mut last = (0u64, 0.0f64, DEFAULT_MICROS_PER_QUARTER);
                for (tick, micros) in changes {
                    let (last_tick, last_secs, last_micros) = last;
                    // A later event on the same tick overrides the earlier one.
                    if tick != last_tick {
                        segments.push(last);
                    }
                    let secs = last_secs + ticks_to_secs(tick - last_tick, last_micros, tpq);
                    last = (tick, secs, micros);
                }
                segments.push(last);

                TempoMap {
                    ticks_per_quarter: Some(tpq),
                    seconds_per_tick_smpte: 0.0,
                    segments,
                }
            }
            Timing::Timecode(fps, ticks_per_frame) => TempoMap {
                ticks_per_quarter: None,
                seconds_per_tick_smpte: 1.0
                    / (fps.as_f32() as f64 * (ticks_per_frame.max(1)) as f64),
                segments: Vec::new(),
            },
        }
    }

    fn seconds_at(&self, tick: u64) -> f64 {
        let tpq = match self.ticks_per_quarter {
            Some(tpq) => tpq,
            None => return tick as f64 * self.seconds_per_tick_smpte,
        };
        let idx = self.segments.partition_point(|&(t, _, _)| t <= tick);
        let (seg_tick, seg_secs, micros) = self.segments[idx.saturating_sub(1)];
        seg_secs + ticks_to_secs(tick - seg_tick, micros, tpq)
    }
}

fn ticks_to_secs(ticks: u64, micros_per_quarter: u32, tpq: f64) -> f64 {
    ticks as f64 / tpq * micros_per_quarter as f64 / 1_000_000.0
}

fn micros_to_bpm(micros_per_quarter: u32) -> f64 {
    60_000_000.0 / micros_per_quarter.max(1) as f64
}

/// Per-track events we care about, in absolute ticks.
#[derive(Default)]
struct RawTrack {
    name: Option<String>,
    channel: Option<u8>,
    /// (start tick, end tick, key)
    notes: Vec<(u64, u64, u8)>,
}

/// Parse SMF bytes. Parser failures are returned untouched as
/// [`crate::error::TrainerError::MalformedMidiInput`].
pub fn parse_midi(bytes: &[u8]) -> Result<MidiData> {
    let smf = Smf::parse(bytes)?;

    let mut tempo_changes: Vec<(u64, u32)> = Vec::new();
    let mut raw_tracks: Vec<RawTrack> = Vec::with_capacity(smf.tracks.len());

    for track in &smf.tracks {
        let mut raw = RawTrack::default();
        let mut tick = 0u64;
        let mut open: HashMap<(u8, u8), VecDeque<u64>> = HashMap::new();

        for event in track {
            tick += event.delta.as_int() as u64;

            match event.kind {
                TrackEventKind::Midi { channel, message } => {
                    let ch = channel.as_int();
                    raw.channel.get_or_insert(ch);
                    match message {
                        MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                            open.entry((ch, key.as_int())).or_default().push_back(tick);
                        }
                        // Note On with velocity 0 is Note Off
                        MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                            let started = open
                                .get_mut(&(ch, key.as_int()))
                                .and_then(|starts| starts.pop_front());
                            if let Some(start) = started {
                                raw.notes.push((start, tick, key.as_int()));
                            }
                        }
                        _ => {}
                    }
                }
                TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => {
                    tempo_changes.push((tick, tempo.as_int()));
                }
                TrackEventKind::Meta(MetaMessage::TrackName(name)) => {
                    if raw.name.is_none() {
                        raw.name = Some(String::from_utf8_lossy(name).into_owned());
                    }
                }
                _ => {}
            }
        }

        // Notes never released end with the track.
        for ((_, key), starts) in open {
            for start in starts {
                raw.notes.push((start, tick, key));
            }
        }
        raw.notes.sort_by_key(|&(start, _, key)| (start, key));
        raw_tracks.push(raw);
    }

    let tempo_map = TempoMap::new(smf.header.timing, tempo_changes.clone());

    let tracks = raw_tracks
        .into_iter()
        .map(|raw| {
            let notes = raw
                .notes
                .iter()
                .map(|&(start, end, key)| {
                    let time = tempo_map.seconds_at(start);
                    MidiNote {
                        midi: key as i32,
                        time,
                        duration: tempo_map.seconds_at(end) - time,
                    }
                })
                .collect();
            TrackData {
                name: raw.name.unwrap_or_default(),
                channel: raw.channel.unwrap_or(0),
                notes,
            }
        })
        .collect();

    tempo_changes.sort_by_key(|&(tick, _)| tick);
    let tempos = tempo_changes
        .iter()
        .map(|&(tick, micros)| TempoInfo {
            bpm: micros_to_bpm(micros),
            time: tempo_map.seconds_at(tick),
        })
        .collect();

    Ok(MidiData { tracks, tempos })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrainerError;
    use approx::assert_abs_diff_eq;

    fn write_vlq(buf: &mut Vec<u8>, mut value: u32) {
        let mut bytes = vec![(value & 0x7F) as u8];
        value >>= 7;
        while value > 0 {
            bytes.push(((value & 0x7F) as u8) | 0x80);
            value >>= 7;
        }
        bytes.reverse();
        buf.extend_from_slice(&bytes);
    }

    /// Assemble a track chunk from (delta, raw event bytes) pairs.
    fn track_chunk(events: &[(u32, Vec<u8>)]) -> Vec<u8> {
        let mut data = Vec::new();
        for (delta, bytes) in events {
            write_vlq(&mut data, *delta);
            data.extend_from_slice(bytes);
        }
        write_vlq(&mut data, 0);
        data.extend_from_slice(&[0xFF, 0x2F, 0x00]);

        let mut chunk = b"MTrk".to_vec();
        chunk.extend_from_slice(&(data.len() as u32).to_be_bytes());
        chunk.extend_from_slice(&data);
        chunk
    }

    fn smf(tpq: u16, tracks: &[Vec<u8>]) -> Vec<u8> {
        let mut out = b"MThd".to_vec();
        out.extend_from_slice(&6u32.to_be_bytes());
        out.extend_from_slice(&1u16.to_be_bytes());
        out.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
        out.extend_from_slice(&tpq.to_be_bytes());
        for t in tracks {
            out.extend_from_slice(t);
        }
        out
    }

    fn tempo(micros: u32) -> Vec<u8> {
        let b = micros.to_be_bytes();
        vec![0xFF, 0x51, 0x03, b[1], b[2], b[3]]
    }

    fn name(text: &str) -> Vec<u8> {
        let mut v = vec![0xFF, 0x03, text.len() as u8];
        v.extend_from_slice(text.as_bytes());
        v
    }

    fn note_on(ch: u8, key: u8, vel: u8) -> Vec<u8> {
        vec![0x90 | ch, key, vel]
    }

    fn note_off(ch: u8, key: u8) -> Vec<u8> {
        vec![0x80 | ch, key, 0]
    }

    #[test]
    fn test_notes_in_seconds_at_120_bpm() {
        let conductor = track_chunk(&[(0, tempo(500_000))]);
        let bass = track_chunk(&[
            (0, name("Finger Bass")),
            (0, note_on(1, 40, 100)),
            (480, note_off(1, 40)),
            (0, note_on(1, 43, 100)),
            (240, note_on(1, 43, 0)),
        ]);
        let data = parse_midi(&smf(480, &[conductor, bass])).expect("valid file");

        assert_eq!(data.tracks.len(), 2);
        assert!(data.tracks[0].notes.is_empty());
        let track = &data.tracks[1];
        assert_eq!(track.name, "Finger Bass");
        assert_eq!(track.channel, 1);
        assert_eq!(track.notes.len(), 2);
        assert_eq!(track.notes[0].midi, 40);
        assert_abs_diff_eq!(track.notes[0].time, 0.0);
        assert_abs_diff_eq!(track.notes[0].duration, 0.5);
        assert_eq!(track.notes[1].midi, 43);
        assert_abs_diff_eq!(track.notes[1].time, 0.5);
        assert_abs_diff_eq!(track.notes[1].duration, 0.25);

        assert_eq!(data.tempos.len(), 1);
        assert_abs_diff_eq!(data.tempos[0].bpm, 120.0);
    }

    #[test]
    fn test_tempo_change_mid_song() {
        // One quarter at 120 BPM, then 60 BPM
        let conductor = track_chunk(&[(0, tempo(500_000)), (480, tempo(1_000_000))]);
        let bass = track_chunk(&[
            (0, note_on(0, 36, 90)),
            (480, note_off(0, 36)),
            (0, note_on(0, 38, 90)),
            (480, note_off(0, 38)),
        ]);
        let data = parse_midi(&smf(480, &[conductor, bass])).expect("valid file");

        let notes = &data.tracks[1].notes;
        assert_abs_diff_eq!(notes[0].duration, 0.5);
        assert_abs_diff_eq!(notes[1].time, 0.5);
        assert_abs_diff_eq!(notes[1].duration, 1.0);

        let bpms: Vec<f64> = data.tempos.iter().map(|t| t.bpm).collect();
        assert_eq!(bpms, vec![120.0, 60.0]);
        assert_abs_diff_eq!(data.tempos[1].time, 0.5);
    }

    #[test]
    fn test_no_tempo_defaults_to_120() {
        let bass = track_chunk(&[(0, note_on(0, 33, 90)), (960, note_off(0, 33))]);
        let data = parse_midi(&smf(480, &[bass])).expect("valid file");
        assert!(data.tempos.is_empty());
        assert_abs_diff_eq!(data.tracks[0].notes[0].duration, 1.0);
    }

    #[test]
    fn test_dangling_note_ends_with_track() {
        let bass = track_chunk(&[(0, note_on(0, 33, 90)), (480, note_on(0, 35, 90)), (480, name("x"))]);
        let data = parse_midi(&smf(480, &[bass])).expect("valid file");
        let notes = &data.tracks[0].notes;
        assert_eq!(notes.len(), 2);
        assert_abs_diff_eq!(notes[0].duration, 1.0);
        assert_abs_diff_eq!(notes[1].duration, 0.5);
        assert_eq!(data.tracks[0].name, "x");
    }

    #[test]
    fn test_drum_channel_reported() {
        let drums = track_chunk(&[(0, note_on(9, 36, 100)), (120, note_off(9, 36))]);
        let data = parse_midi(&smf(480, &[drums])).expect("valid file");
        assert_eq!(data.tracks[0].channel, 9);
    }

    #[test]
    fn test_smpte_timing() {
        // 25 fps at 40 ticks per frame: one tick per millisecond
        let bass = track_chunk(&[
            (100, note_on(0, 40, 100)),
            (500, note_off(0, 40)),
            (0, note_on(0, 45, 100)),
            (250, note_off(0, 45)),
        ]);
        let data = parse_midi(&smf(0xE728, &[bass])).expect("valid file");

        let notes = &data.tracks[0].notes;
        assert_abs_diff_eq!(notes[0].time, 0.1, epsilon = 1e-9);
        assert_abs_diff_eq!(notes[0].duration, 0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(notes[1].time, 0.6, epsilon = 1e-9);
        assert_abs_diff_eq!(notes[1].duration, 0.25, epsilon = 1e-9);
    }

    #[test]
    fn test_garbage_is_malformed() {
        let err = parse_midi(b"definitely not a midi file").unwrap_err();
        assert!(matches!(err, TrainerError::MalformedMidiInput(_)));
    }
}
