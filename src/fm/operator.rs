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

//! Sine operator state and the block renderer for chains of operators.

use crate::dsp::sine_pm;

/// Runtime state of one FM operator.
#[derive(Debug, Clone, Copy, Default)]
pub struct Operator {
    /// Phase accumulator; wraps modulo 2^32.
    pub phase: u32,
    /// Current amplitude, smoothed towards its per-block target.
    pub amplitude: f32,
}

impl Operator {
    #[inline]
    pub fn reset(&mut self) {
        self.phase = 0;
        self.amplitude = 0.0;
    }
}

/// Signature shared by all monomorphized chain renderers.
pub type RenderFn = fn(
    ops: &mut [Operator],
    f: &[f32],
    a: &[f32],
    feedback_state: &mut [f32; 2],
    feedback_amount: i32,
    modulation: &[f32],
    out: &mut [f32],
);

/// Renders `N` consecutive operators for one block, each phase-modulating the
/// next.
///
/// `SOURCE` selects where the first operator's modulation comes from: -1 for
/// none, -2 for the external `modulation` buffer, or the index of the chain
/// member whose output feeds the feedback delay line. The feedback tap is the
/// average of the last two samples, which is what keeps high feedback amounts
/// from diverging.
pub fn render_chain<const N: usize, const SOURCE: i32, const ADDITIVE: bool>(
    ops: &mut [Operator],
    f: &[f32],
    a: &[f32],
    feedback_state: &mut [f32; 2],
    feedback_amount: i32,
    modulation: &[f32],
    out: &mut [f32],
) {
    let size = out.len();

    let mut previous = if SOURCE >= 0 {
        *feedback_state
    } else {
        [0.0, 0.0]
    };

    let mut increment = [0u32; N];
    let mut phase = [0u32; N];
    let mut amplitude = [0.0f32; N];
    let mut amplitude_slope = [0.0f32; N];

    let scale = 1.0 / size as f32;
    for k in 0..N {
        increment[k] = (f[k].min(0.5) * 4294967296.0) as u32;
        phase[k] = ops[k].phase;
        amplitude[k] = ops[k].amplitude;
        amplitude_slope[k] = (a[k].min(4.0) - amplitude[k]) * scale;
    }

    let fb_scale = if feedback_amount != 0 {
        (1 << feedback_amount) as f32 / 512.0
    } else {
        0.0
    };

    for (n, out_sample) in out.iter_mut().enumerate() {
        let mut pm = if SOURCE >= 0 {
            (previous[0] + previous[1]) * fb_scale
        } else if SOURCE == -2 {
            modulation[n]
        } else {
            0.0
        };

        for k in 0..N {
            phase[k] = phase[k].wrapping_add(increment[k]);
            pm = sine_pm(phase[k], pm) * amplitude[k];
            amplitude[k] += amplitude_slope[k];
            if k as i32 == SOURCE {
                previous[1] = previous[0];
                previous[0] = pm;
            }
        }

        if ADDITIVE {
            *out_sample += pm;
        } else {
            *out_sample = pm;
        }
    }

    for k in 0..N {
        ops[k].phase = phase[k];
        ops[k].amplitude = amplitude[k];
    }

    if SOURCE >= 0 {
        *feedback_state = previous;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_accumulation_matches_u64_reference() {
        let increments = [0x1234_5678u32, 0x8000_0001, 0xffff_ffff, 7, 0x4000_0000];
        let mut phase = 0xdead_beefu32;
        let mut reference = 0xdead_beefu64;
        for _ in 0..1000 {
            for &increment in &increments {
                phase = phase.wrapping_add(increment);
                reference += increment as u64;
                assert_eq!(phase, (reference & 0xffff_ffff) as u32);
            }
        }
    }

    #[test]
    fn single_operator_produces_a_sine() {
        let mut ops = [Operator::default()];
        let mut feedback = [0.0f32; 2];
        let mut out = [0.0f32; 24];

        // 1/24 cycle per sample: one full cycle per block.
        render_chain::<1, -1, false>(
            &mut ops,
            &[1.0 / 24.0],
            &[1.0],
            &mut feedback,
            0,
            &[],
            &mut out,
        );

        let peak = out.iter().fold(0.0f32, |m, x| m.max(x.abs()));
        // The amplitude ramps from 0 to 1 over the block.
        assert!(peak > 0.4 && peak <= 1.0, "peak {}", peak);

        let increment = ((1.0f32 / 24.0) * 4294967296.0) as u32;
        assert_eq!(ops[0].phase, increment.wrapping_mul(24));
    }

    #[test]
    fn amplitude_target_is_clamped() {
        let mut ops = [Operator::default()];
        let mut feedback = [0.0f32; 2];
        let mut out = [0.0f32; 8];

        render_chain::<1, -1, false>(
            &mut ops,
            &[0.01],
            &[1000.0],
            &mut feedback,
            0,
            &[],
            &mut out,
        );

        assert!(ops[0].amplitude <= 4.0 + 1e-6, "{}", ops[0].amplitude);
    }

    #[test]
    fn feedback_history_tracks_last_two_samples() {
        let mut ops = [Operator::default()];
        let mut feedback = [0.0f32; 2];
        let mut out = [0.0f32; 24];

        render_chain::<1, 0, false>(
            &mut ops,
            &[0.01],
            &[1.0],
            &mut feedback,
            7,
            &[],
            &mut out,
        );

        assert_eq!(feedback[0], out[23]);
        assert_eq!(feedback[1], out[22]);
    }
}
