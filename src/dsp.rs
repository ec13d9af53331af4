// Copyright 2021 Emilie Gillet (emilie.o.gillet@gmail.com)
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
// THE SOFTWARE.
//
// See http://creativecommons.org/licenses/MIT/ for more information.

//! Sine primitives and small DSP helpers shared by the FM engine.

use std::sync::LazyLock;

const SINE_TABLE_SIZE: usize = 512;
const SINE_TABLE_BITS: u32 = 9;

/// One sine period over 512 samples, with the first sample duplicated at the
/// end so interpolation never has to wrap an index.
static LUT_SINE: LazyLock<[f32; SINE_TABLE_SIZE + 1]> = LazyLock::new(|| {
    let mut table = [0.0; SINE_TABLE_SIZE + 1];
    for (i, entry) in table.iter_mut().enumerate() {
        *entry = (i as f64 / SINE_TABLE_SIZE as f64 * std::f64::consts::TAU).sin() as f32;
    }
    table
});

/// Linear interpolation in a table, index in [0, 1].
#[inline]
pub fn interpolate(table: &[f32], index: f32, size: f32) -> f32 {
    let index = index * size;
    let integral = (index as usize).min(table.len() - 2);
    let fractional = index - integral as f32;
    let a = table[integral];
    let b = table[integral + 1];
    a + (b - a) * fractional
}

/// Linear interpolation with the integer part of the index discarded.
#[inline]
pub fn interpolate_wrap(table: &[f32], mut index: f32, size: f32) -> f32 {
    index -= (index as i32) as f32;
    index *= size;
    let integral = index as i32;
    let fractional = index - integral as f32;
    let a = table[integral as usize];
    let b = table[integral as usize + 1];
    a + (b - a) * fractional
}

/// Table sine, phase in cycles. Safe for any phase >= 0.
#[inline]
pub fn sine(phase: f32) -> f32 {
    interpolate_wrap(&*LUT_SINE, phase, SINE_TABLE_SIZE as f32)
}

/// Phase-modulated table sine over a 32-bit phase accumulator.
///
/// One modulation index is 2^26 phase units (1/64 cycle), so the +/-32 index
/// range spans exactly one turn and `pm` wraps with period 64. The input is
/// biased into the positive range before the truncating float-to-u32 cast
/// (which would clamp a negative value), pre-scaled by 2^20 so the cast
/// cannot saturate, brought up to phase units with a wrapping multiply, and
/// recentered by subtracting the bias in integer arithmetic: `pm = 0` adds
/// no offset at all.
#[inline]
pub fn sine_pm(phase: u32, pm: f32) -> f32 {
    const MAX_INDEX: f32 = 32.0;
    const RANGE: u32 = 2 * MAX_INDEX as u32;
    const SCALE: f32 = 4294967296.0 / (2.0 * MAX_INDEX) / RANGE as f32;
    // MAX_INDEX indices worth of offset, removed after the cast.
    const BIAS: u32 = 1 << 31;

    let offset = (((pm + MAX_INDEX) * SCALE) as u32)
        .wrapping_mul(RANGE)
        .wrapping_sub(BIAS);
    let phase = phase.wrapping_add(offset);

    let integral = (phase >> (32 - SINE_TABLE_BITS)) as usize;
    let fractional = (phase << SINE_TABLE_BITS) as f32 / 4294967296.0;
    let a = LUT_SINE[integral];
    let b = LUT_SINE[integral + 1];
    a + (b - a) * fractional
}

/// Convert semitones to a frequency ratio.
#[inline]
pub fn semitones_to_ratio(semitones: f32) -> f32 {
    2.0f32.powf(semitones / 12.0)
}

/// Semitones to ratio, folding extreme inputs in 120-semitone chunks so the
/// exponent stays in a range where `powf` is exact.
#[inline]
pub fn semitones_to_ratio_safe(mut semitones: f32) -> f32 {
    let mut scale = 1.0f32;
    while semitones > 120.0 {
        semitones -= 120.0;
        scale *= 1024.0;
    }
    while semitones < -120.0 {
        semitones += 120.0;
        scale *= 1.0 / 1024.0;
    }
    scale * semitones_to_ratio(semitones)
}

/// Cubic soft limiter, transparent around 0 and equal to 1 at +/-3.
#[inline]
pub fn soft_limit(x: f32) -> f32 {
    x * (27.0 + x * x) / (27.0 + 9.0 * x * x)
}

/// Soft limiter clamped to [-1, 1] outside [-3, 3].
#[inline]
pub fn soft_clip(x: f32) -> f32 {
    if x < -3.0 {
        -1.0
    } else if x > 3.0 {
        1.0
    } else {
        soft_limit(x)
    }
}
