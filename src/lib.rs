//! dx7fm - Yamaha DX7 six-operator FM voice engine.
//!
//! Decodes 32-voice DX7 SysEx banks and renders single notes through a
//! faithful reimplementation of the FM voice: fixed-point phase-accumulating
//! operator chains, the 32 algorithm routings with self-feedback, the
//! multi-stage envelopes with their DX7 shape quirks, keyboard/rate/velocity
//! scaling and the delayed LFO.

/// Initialize logging for the library
pub fn init_logging() {
    env_logger::init();
}

pub mod dsp;
pub mod error;
pub mod fm;
pub mod render;
pub mod rng;
pub mod wav_writer;

// Re-export the main types
pub use error::{Error, Result};
pub use fm::{Bank, Lfo, Patch, Voice, VoiceParams};
