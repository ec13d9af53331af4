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

//! Multi-stage piecewise-linear envelopes with the DX7's quirks:
//! logarithmic reshaping of ascending segments, a direct jump above the
//! ascent threshold, and adjusted rates for plateaus.

use super::dx_units::{
    operator_envelope_increment, operator_level, pitch_envelope_increment, pitch_envelope_level,
};

/// Sentinel for "interpolate from the previous stage's level".
const PREVIOUS_LEVEL: f32 = -100.0;

/// Generic multi-stage envelope. The last stage is the release stage;
/// `RESHAPE_ASCENDING` enables the DX7 attack curvature.
#[derive(Debug, Clone, Copy)]
pub struct Envelope<const NUM_STAGES: usize, const RESHAPE_ASCENDING: bool> {
    stage: usize,
    phase: f32,
    start: f32,
    increment: [f32; NUM_STAGES],
    level: [f32; NUM_STAGES],
    scale: f32,
}

impl<const NUM_STAGES: usize, const RESHAPE_ASCENDING: bool>
    Envelope<NUM_STAGES, RESHAPE_ASCENDING>
{
    pub fn new() -> Self {
        let mut envelope = Self {
            stage: NUM_STAGES - 1,
            phase: 1.0,
            start: 0.0,
            increment: [0.001; NUM_STAGES],
            level: [0.0; NUM_STAGES],
            scale: 1.0,
        };
        envelope.reset_levels();
        envelope
    }

    /// Reinitializes with a sample-rate adjustment factor (44100 / fs).
    pub fn init(&mut self, scale: f32) {
        self.scale = scale;
        self.stage = NUM_STAGES - 1;
        self.phase = 1.0;
        self.start = 0.0;
        self.increment = [0.001; NUM_STAGES];
        self.reset_levels();
    }

    fn reset_levels(&mut self) {
        for (i, level) in self.level.iter_mut().enumerate() {
            *level = 1.0 / (1 << i) as f32;
        }
        self.level[NUM_STAGES - 1] = 0.0;
    }

    pub fn set_increment(&mut self, stage: usize, increment: f32) {
        self.increment[stage] = increment * self.scale;
    }

    pub fn set_level(&mut self, stage: usize, level: f32) {
        self.level[stage] = level;
    }

    pub fn level(&self, stage: usize) -> f32 {
        self.level[stage]
    }

    /// Advances by one step and returns the current value.
    ///
    /// `rate` scales the step (block size times rate scaling); `ad_scale` and
    /// `release_scale` stretch the gated and released stages respectively.
    pub fn render(&mut self, gate: bool, rate: f32, ad_scale: f32, release_scale: f32) -> f32 {
        if gate {
            if self.stage == NUM_STAGES - 1 {
                self.start = self.value();
                self.stage = 0;
                self.phase = 0.0;
            }
        } else if self.stage != NUM_STAGES - 1 {
            self.start = self.value();
            self.stage = NUM_STAGES - 1;
            self.phase = 0.0;
        }

        let stage_scale = if self.stage == NUM_STAGES - 1 {
            release_scale
        } else {
            ad_scale
        };
        self.phase += self.increment[self.stage] * rate * stage_scale;

        if self.phase >= 1.0 {
            if self.stage >= NUM_STAGES - 2 {
                // Sustain and release saturate instead of advancing.
                self.phase = 1.0;
            } else {
                self.phase = 0.0;
                self.stage += 1;
            }
            self.start = PREVIOUS_LEVEL;
        }

        self.value()
    }

    /// Deterministic value at sample time `t` for a hypothetical gate held
    /// `gate_duration` samples, independent of streaming state.
    pub fn render_at_sample(&self, t: f32, gate_duration: f32) -> f32 {
        if t > gate_duration {
            let phase = (t - gate_duration) * self.increment[NUM_STAGES - 1];
            return if phase >= 1.0 {
                self.level[NUM_STAGES - 1]
            } else {
                let sustain = self.render_at_sample(gate_duration, gate_duration);
                self.value_at(NUM_STAGES - 1, phase, sustain)
            };
        }

        // Walk the gated stages, consuming each stage's duration.
        let mut stage = 0;
        let mut remaining = t;
        for i in 0..NUM_STAGES - 1 {
            let duration = 1.0 / self.increment[i];
            if remaining < duration {
                stage = i;
                break;
            }
            remaining -= duration;
            stage = i + 1;
        }

        if stage == NUM_STAGES - 1 {
            remaining -= gate_duration;
            if remaining <= 0.0 {
                return self.level[NUM_STAGES - 2];
            } else if remaining * self.increment[NUM_STAGES - 1] > 1.0 {
                return self.level[NUM_STAGES - 1];
            }
        }

        self.value_at(stage, remaining * self.increment[stage], PREVIOUS_LEVEL)
    }

    #[inline]
    fn value(&self) -> f32 {
        self.value_at(self.stage, self.phase, self.start)
    }

    #[inline]
    fn value_at(&self, stage: usize, mut phase: f32, start: f32) -> f32 {
        let mut from = if start == PREVIOUS_LEVEL {
            self.level[(stage + NUM_STAGES - 1) % NUM_STAGES]
        } else {
            start
        };
        let mut to = self.level[stage];

        if RESHAPE_ASCENDING && from < to {
            from = from.max(6.7);
            to = to.max(6.7);
            phase *= (2.5 - phase) * 0.666667;
        }

        phase * (to - from) + from
    }
}

impl<const NUM_STAGES: usize, const RESHAPE_ASCENDING: bool> Default
    for Envelope<NUM_STAGES, RESHAPE_ASCENDING>
{
    fn default() -> Self {
        Self::new()
    }
}

/// Operator amplitude envelope: four stages, reshaped ascents, levels on the
/// DX7 TL scale.
#[derive(Debug, Clone, Copy, Default)]
pub struct OperatorEnvelope(pub Envelope<4, true>);

impl OperatorEnvelope {
    pub fn new() -> Self {
        Self(Envelope::new())
    }

    /// Configures levels and increments from patch data. `global_level` is
    /// the operator's output level already mapped by `operator_level`.
    pub fn set(&mut self, rate: &[u8; 4], level: &[u8; 4], global_level: i32) {
        for i in 0..4 {
            let scaled = (operator_level(level[i]) & !1) + global_level - 133;
            self.0
                .set_level(i, 0.125 * if scaled < 1 { 0.5 } else { scaled as f32 });
        }

        for i in 0..4 {
            let from = self.0.level((i + 3) % 4);
            let to = self.0.level(i);
            let mut increment = operator_envelope_increment(rate[i]);

            if from == to {
                // Quirk: plateaus run slower.
                increment *= 0.6;
                if i == 0 && level[i] == 0 {
                    // Quirk: except the attack plateau, which is much faster.
                    increment *= 20.0;
                }
            } else if from < to {
                let from = from.max(6.7);
                let to = to.max(6.7);
                if from == to {
                    // Quirk: the jump above the ascent threshold can swallow
                    // the whole attack.
                    increment = 1.0;
                } else {
                    // Quirk: rate compensation for the reshaped ascent.
                    increment *= 7.2 / (to - from);
                }
            } else {
                increment *= 1.0 / (from - to);
            }
            self.0.set_increment(i, increment);
        }
    }
}

/// Pitch envelope: four stages, plain linear segments, levels in octaves.
#[derive(Debug, Clone, Copy, Default)]
pub struct PitchEnvelope(pub Envelope<4, false>);

impl PitchEnvelope {
    pub fn new() -> Self {
        Self(Envelope::new())
    }

    pub fn set(&mut self, rate: &[u8; 4], level: &[u8; 4]) {
        for i in 0..4 {
            self.0.set_level(i, pitch_envelope_level(level[i]));
        }

        for i in 0..4 {
            let from = self.0.level((i + 3) % 4);
            let to = self.0.level(i);
            let mut increment = pitch_envelope_increment(rate[i]);

            if from != to {
                increment *= 1.0 / (from - to).abs();
            } else if i != 3 {
                increment = 0.2;
            }
            self.0.set_increment(i, increment);
        }
    }
}
