use crate::notation::midi_to_note_name;
use crate::scoring::types::*;

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Summarize a practice run from the reference notes and the weak-spot log.
pub fn build_report(
    notes: &[ReferenceNote],
    weak_spots: &[WeakSpotRecord],
    marked_sections: usize,
) -> SessionReport {
    let total_notes = notes.len() as u32;
    let notes_hit = notes.iter().filter(|n| n.consumed).count() as u32;
    let hit_percentage = if total_notes == 0 {
        0
    } else {
        ((notes_hit as f64 / total_notes as f64) * 100.0).round() as u32
    };

    let pitch_errors: Vec<f64> = weak_spots
        .iter()
        .filter(|r| r.has_reason(WeakReason::Pitch))
        .map(|r| r.pitch_error_cents)
        .collect();
    let timing_errors: Vec<f64> = weak_spots
        .iter()
        .filter(|r| r.has_reason(WeakReason::Timing))
        .map(|r| r.timing_error_ms)
        .collect();

    let avg_pitch_error_cents = mean(&pitch_errors);
    let avg_timing_error_ms = mean(&timing_errors);

    let pitch_tendency = if avg_pitch_error_cents > 10.0 {
        "sharp"
    } else if avg_pitch_error_cents < -10.0 {
        "flat"
    } else {
        "accurate"
    }
    .to_string();

    let timing_tendency = if avg_timing_error_ms > 20.0 {
        "late"
    } else if avg_timing_error_ms < -20.0 {
        "early"
    } else {
        "on_time"
    }
    .to_string();

    // Generate feedback messages
    let mut feedback: Vec<String> = Vec::new();

    if total_notes > 0 {
        let pct = hit_percentage;
        if pct >= 90 {
            feedback.push(format!("Locked in! You hit {}% of the bass line.", pct));
        } else if pct >= 70 {
            feedback.push(format!("Solid groove, {}% of the notes landed.", pct));
        } else if pct >= 50 {
            feedback.push(format!("Getting there: {}% of the notes landed.", pct));
        } else {
            feedback.push(format!(
                "Only {}% of the notes landed. Try a slower tempo.",
                pct
            ));
        }
    } else {
        feedback.push("Load a MIDI file to get a reference bass line.".to_string());
    }

    match pitch_tendency.as_str() {
        "sharp" => feedback.push(format!(
            "Wrong notes tend to be above the target (avg +{:.0} cents). Check your fretting hand position.",
            avg_pitch_error_cents
        )),
        "flat" => feedback.push(format!(
            "Wrong notes tend to be below the target (avg {:.0} cents). Check your fretting hand position.",
            avg_pitch_error_cents
        )),
        _ => {}
    }

    match timing_tendency.as_str() {
        "late" => feedback.push(format!(
            "You tend to drag behind the beat by about {:.0} ms.",
            avg_timing_error_ms
        )),
        "early" => feedback.push(format!(
            "You tend to rush ahead of the beat by about {:.0} ms.",
            avg_timing_error_ms.abs()
        )),
        _ => {}
    }

    if let Some(target) = most_missed_target(weak_spots) {
        feedback.push(format!("{} is the note you miss most often.", midi_to_note_name(target)));
    }

    if marked_sections > 0 {
        feedback.push(format!(
            "You marked {} section{} to work on.",
            marked_sections,
            if marked_sections == 1 { "" } else { "s" }
        ));
    }

    SessionReport {
        total_notes,
        notes_hit,
        hit_percentage,
        weak_spot_count: weak_spots.len() as u32,
        pitch_failures: pitch_errors.len() as u32,
        timing_failures: timing_errors.len() as u32,
        avg_pitch_error_cents,
        avg_timing_error_ms,
        pitch_tendency,
        timing_tendency,
        marked_sections: marked_sections as u32,
        feedback,
    }
}

/// Target pitch with the most pitch failures; needs at least three to count.
fn most_missed_target(weak_spots: &[WeakSpotRecord]) -> Option<i32> {
    use std::collections::HashMap;

    let mut counts: HashMap<i32, u32> = HashMap::new();
    for record in weak_spots.iter().filter(|r| r.has_reason(WeakReason::Pitch)) {
        *counts.entry(record.target_pitch).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .filter(|&(_, count)| count >= 3)
        .max_by_key(|&(pitch, count)| (count, std::cmp::Reverse(pitch)))
        .map(|(pitch, _)| pitch)
}
