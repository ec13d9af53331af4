//! The FM voice engine: patch decoding, operators, envelopes, LFO, the 32
//! algorithm routings and the per-block voice driver.

pub mod algorithms;
pub mod dx_units;
pub mod envelope;
pub mod lfo;
pub mod operator;
pub mod patch;
pub mod voice;

/// Operators per voice.
pub const NUM_OPERATORS: usize = 6;

/// Routing algorithms.
pub const NUM_ALGORITHMS: usize = 32;

/// Largest block a voice renders in one call.
pub const BLOCK_SIZE: usize = 24;

pub use lfo::Lfo;
pub use patch::{Bank, Patch};
pub use voice::{Voice, VoiceParams};
