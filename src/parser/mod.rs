pub mod bass_track;
pub mod midi;
