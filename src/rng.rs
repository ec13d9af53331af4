//! Thread-local pseudo random source for the LFO sample-and-hold waveform.
//!
//! A linear congruential generator is plenty here; what matters is that each
//! thread owns its own state and that tests can reseed it.

use std::cell::Cell;

thread_local! {
    static STATE: Cell<u32> = const { Cell::new(0x21) };
}

/// Reseeds the calling thread's generator.
pub fn seed(value: u32) {
    STATE.with(|state| state.set(value));
}

/// Next 32-bit word.
#[inline]
pub fn next_word() -> u32 {
    STATE.with(|state| {
        let next = state.get().wrapping_mul(1664525).wrapping_add(1013904223);
        state.set(next);
        next
    })
}

/// Uniform float in [0, 1). Built from the top 24 bits so the conversion to
/// f32 is exact and the result can never round up to 1.0.
#[inline]
pub fn next_float() -> f32 {
    (next_word() >> 8) as f32 / 16777216.0
}
