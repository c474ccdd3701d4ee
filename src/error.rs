use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrainerError>;

#[derive(Debug, Error)]
pub enum TrainerError {
    /// Every track was empty or on the drum channel.
    #[error("no usable bass line in this file")]
    NoBassTrackFound,

    #[error("malformed MIDI input: {0}")]
    MalformedMidiInput(#[from] midly::Error),

    #[error("tempo {0} BPM is outside the accepted range")]
    InvalidTempo(f64),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("mark out requested before mark in")]
    MarkOutWithoutMarkIn,

    #[error("section end {end:.2}s must come after start {start:.2}s")]
    InvalidSection { start: f64, end: f64 },
}
