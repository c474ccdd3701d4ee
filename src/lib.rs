use wasm_bindgen::prelude::*;

pub mod config;
pub mod error;
pub mod notation;
pub mod parser;
pub mod pitch;
pub mod scoring;
pub mod session;

use config::TrainerConfig;
use parser::midi::MidiData;
use scoring::types::PracticeMode;
use session::PracticeSession;

use std::cell::RefCell;

thread_local! {
    static SESSION: RefCell<PracticeSession> = RefCell::new(PracticeSession::default());
    static DETECTOR: RefCell<Option<pitch::autocorrelation::AutocorrelationDetector>> =
        RefCell::new(None);
}

fn js_err(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn to_js<T: serde::Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(js_err)
}

/// Replace the session configuration. Missing fields take their defaults.
#[wasm_bindgen]
pub fn configure(config_js: JsValue) -> Result<(), JsValue> {
    let config: TrainerConfig = if config_js.is_null() || config_js.is_undefined() {
        TrainerConfig::default()
    } else {
        serde_wasm_bindgen::from_value(config_js).map_err(js_err)?
    };
    SESSION.with(|s| s.borrow_mut().configure(config)).map_err(js_err)
}

/// Load a Standard MIDI File and pick its bass line.
#[wasm_bindgen]
pub fn load_midi(bytes: &[u8]) -> Result<JsValue, JsValue> {
    let summary = SESSION
        .with(|s| s.borrow_mut().load_midi_bytes(bytes))
        .map_err(js_err)?;
    to_js(&summary)
}

/// Load a file the front end already parsed: `{ tracks: [...], tempos: [...] }`.
#[wasm_bindgen]
pub fn load_tracks(midi_js: JsValue) -> Result<JsValue, JsValue> {
    let midi: MidiData = serde_wasm_bindgen::from_value(midi_js).map_err(js_err)?;
    let summary = SESSION.with(|s| s.borrow_mut().load(&midi)).map_err(js_err)?;
    to_js(&summary)
}

/// Stateless pitch estimate in Hz, `undefined` when no pitch is found.
/// Reuses a thread-local detector to avoid per-call allocations.
#[wasm_bindgen]
pub fn detect_pitch(samples: &[f32], sample_rate: f32) -> Option<f32> {
    DETECTOR.with(|cell| {
        let mut borrow = cell.borrow_mut();
        let detector = borrow.get_or_insert_with(|| {
            pitch::autocorrelation::AutocorrelationDetector::new(samples.len())
        });
        detector.detect(samples, sample_rate)
    })
}

/// Estimate, judge and record one microphone frame.
#[wasm_bindgen]
pub fn process_frame(samples: &[f32], sample_rate: f32, elapsed_sec: f64) -> Result<JsValue, JsValue> {
    let outcome = SESSION.with(|s| s.borrow_mut().process_frame(samples, sample_rate, elapsed_sec));
    to_js(&outcome)
}

#[wasm_bindgen]
pub fn judge_pitch(midi: Option<i32>, elapsed_sec: f64) -> Result<JsValue, JsValue> {
    let judgment = SESSION.with(|s| s.borrow_mut().judge_pitch(midi, elapsed_sec));
    to_js(&judgment)
}

#[wasm_bindgen]
pub fn reset_judgment() {
    SESSION.with(|s| s.borrow_mut().reset_judgment_state());
}

#[wasm_bindgen]
pub fn seek(to_sec: f64) {
    SESSION.with(|s| s.borrow_mut().seek(to_sec));
}

/// Accepts "strict"/"midi" and "lenient"/"original".
#[wasm_bindgen]
pub fn set_practice_mode(name: &str) -> Result<(), JsValue> {
    let mode = PracticeMode::parse(name)
        .ok_or_else(|| JsValue::from_str(&format!("unknown practice mode: {}", name)))?;
    SESSION.with(|s| s.borrow_mut().set_mode(mode));
    Ok(())
}

/// Override the practice tempo, returning the backing-track playback rate.
#[wasm_bindgen]
pub fn set_tempo(bpm: f64) -> Result<f64, JsValue> {
    SESSION.with(|s| s.borrow_mut().set_tempo(bpm)).map_err(js_err)
}

#[wasm_bindgen]
pub fn reference_notes() -> Result<JsValue, JsValue> {
    SESSION.with(|s| to_js(&s.borrow().reference_notes()))
}

#[wasm_bindgen]
pub fn visual_range() -> Result<JsValue, JsValue> {
    SESSION.with(|s| to_js(&s.borrow().pitch_range()))
}

#[wasm_bindgen]
pub fn weak_spots() -> Result<JsValue, JsValue> {
    SESSION.with(|s| to_js(&s.borrow().weak_spots().to_vec()))
}

#[wasm_bindgen]
pub fn clear_weak_spots() {
    SESSION.with(|s| s.borrow_mut().clear_weak_spots());
}

#[wasm_bindgen]
pub fn pitch_history() -> Result<JsValue, JsValue> {
    SESSION.with(|s| {
        let session = s.borrow();
        let history: Vec<_> = session.pitch_history().collect();
        to_js(&history)
    })
}

#[wasm_bindgen]
pub fn mark_in(time_sec: f64) {
    SESSION.with(|s| s.borrow_mut().mark_in(time_sec));
}

#[wasm_bindgen]
pub fn mark_out(time_sec: f64) -> Result<JsValue, JsValue> {
    let section = SESSION.with(|s| s.borrow_mut().mark_out(time_sec)).map_err(js_err)?;
    to_js(&section)
}

#[wasm_bindgen]
pub fn marked_sections() -> Result<JsValue, JsValue> {
    SESSION.with(|s| to_js(&s.borrow().marked_sections()))
}

#[wasm_bindgen]
pub fn clear_marked_sections() {
    SESSION.with(|s| s.borrow_mut().clear_marked_sections());
}

#[wasm_bindgen]
pub fn session_report() -> Result<JsValue, JsValue> {
    SESSION.with(|s| to_js(&s.borrow().report()))
}

#[wasm_bindgen]
pub fn frequency_to_midi(freq_hz: f64) -> Option<i32> {
    notation::frequency_to_midi(freq_hz)
}

#[wasm_bindgen]
pub fn midi_to_note_name(midi: i32) -> String {
    notation::midi_to_note_name(midi)
}
