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

//! Single DX7 voice: envelopes, scalings and algorithm dispatch per block.

use log::trace;

use super::algorithms::Algorithms;
use super::dx_units::{
    amp_mod_sensitivity, frequency_ratio, keyboard_scaling, normalize_velocity, operator_level,
    pow2_fast, rate_scaling,
};
use super::envelope::{OperatorEnvelope, PitchEnvelope};
use super::operator::Operator;
use super::patch::Patch;
use super::{BLOCK_SIZE, NUM_OPERATORS};
use crate::dsp::semitones_to_ratio_safe;

/// Per-block rendering parameters.
#[derive(Debug, Clone)]
pub struct VoiceParams {
    /// Envelope scrubbing mode: evaluate at a fixed point in time instead of
    /// streaming.
    pub sustain: bool,
    /// Note on/off.
    pub gate: bool,
    /// MIDI note, fractional values allowed.
    pub note: f32,
    /// Velocity in [0, 1].
    pub velocity: f32,
    /// Raises or lowers modulator levels; 0.5 is neutral.
    pub brightness: f32,
    /// Stretches envelope times; 0.5 is neutral.
    pub envelope_control: f32,
    /// External pitch modulation, typically the LFO output.
    pub pitch_mod: f32,
    /// External amplitude modulation, typically the LFO output.
    pub amp_mod: f32,
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self {
            sustain: false,
            gate: false,
            note: 48.0,
            velocity: 0.5,
            brightness: 0.5,
            envelope_control: 0.5,
            pitch_mod: 0.0,
            amp_mod: 0.0,
        }
    }
}

/// A single six-operator FM voice bound to one patch.
pub struct Voice {
    algorithms: Algorithms,
    sample_rate: f32,
    one_hz: f32,
    a0: f32,

    gate: bool,

    operator: [Operator; NUM_OPERATORS],
    operator_envelope: [OperatorEnvelope; NUM_OPERATORS],
    pitch_envelope: PitchEnvelope,

    normalized_velocity: f32,
    note: f32,

    ratios: [f32; NUM_OPERATORS],
    level_headroom: [f32; NUM_OPERATORS],
    level: [f32; NUM_OPERATORS],

    feedback_state: [f32; 2],

    // Slot 0 collects the mix; 1..3 are modulation scratch.
    buffers: [[f32; BLOCK_SIZE]; 4],

    patch: Patch,
    dirty: bool,
}

impl Voice {
    pub fn new(patch: Patch, sample_rate: f32) -> Self {
        let mut voice = Self {
            algorithms: Algorithms::new(),
            sample_rate,
            one_hz: 1.0 / sample_rate,
            a0: 55.0 / sample_rate,
            gate: false,
            operator: [Operator::default(); NUM_OPERATORS],
            operator_envelope: [OperatorEnvelope::new(); NUM_OPERATORS],
            pitch_envelope: PitchEnvelope::new(),
            normalized_velocity: 10.0,
            note: 48.0,
            ratios: [0.0; NUM_OPERATORS],
            level_headroom: [0.0; NUM_OPERATORS],
            level: [0.0; NUM_OPERATORS],
            feedback_state: [0.0; 2],
            buffers: [[0.0; BLOCK_SIZE]; 4],
            patch,
            dirty: true,
        };

        // Envelope increments are tabulated for 44.1kHz.
        let envelope_scale = 44100.0 * voice.one_hz;
        for (operator, envelope) in voice
            .operator
            .iter_mut()
            .zip(voice.operator_envelope.iter_mut())
        {
            operator.reset();
            envelope.0.init(envelope_scale);
        }
        voice.pitch_envelope.0.init(envelope_scale);

        voice
    }

    /// Rebinds the patch; derived data is rebuilt on the next render.
    pub fn set_patch(&mut self, patch: Patch) {
        self.patch = patch;
        self.dirty = true;
    }

    /// Derives envelope constants, level headroom and frequency ratios from
    /// the patch. Returns whether any work was done; a second call without an
    /// intervening `set_patch` is a no-op.
    pub fn setup(&mut self) -> bool {
        if !self.dirty {
            return false;
        }

        self.pitch_envelope
            .set(&self.patch.pitch_eg.rate, &self.patch.pitch_eg.level);

        for i in 0..NUM_OPERATORS {
            let op = &self.patch.op[i];

            let level = operator_level(op.level);
            self.operator_envelope[i].set(&op.eg.rate, &op.eg.level, level);

            // Keyboard scaling plus velocity scaling must not push the
            // operator past the equivalent of level 99.
            self.level_headroom[i] = (127 - level) as f32;

            // The sign of the ratio encodes the base frequency: the root
            // note, or 1Hz for fixed-frequency operators.
            let sign = if op.mode == 0 { 1.0 } else { -1.0 };
            self.ratios[i] = sign * frequency_ratio(op);
        }

        self.dirty = false;
        true
    }

    /// Latest rendered level of operator `i`, after all scalings.
    #[inline]
    pub fn op_level(&self, i: usize) -> f32 {
        self.level[i]
    }

    /// Renders one block into `out` (at most `BLOCK_SIZE` samples).
    pub fn render(&mut self, params: &VoiceParams, out: &mut [f32]) {
        assert!(out.len() <= BLOCK_SIZE);

        if self.setup() {
            // A patch change spends this block on setup; the gap is one
            // clean blank block instead of a glitch.
            out.fill(0.0);
            return;
        }

        let size = out.len();
        let envelope_rate = size as f32;
        let ad_scale = pow2_fast::<1>((0.5 - params.envelope_control) * 8.0);
        let release_scale = pow2_fast::<1>(-(params.envelope_control - 0.3).abs() * 8.0);
        let gate_duration = 1.5 * self.sample_rate;
        let envelope_sample = gate_duration * params.envelope_control;

        let input_note = params.note - 24.0 + self.patch.transpose as f32;

        let pitch_envelope = if params.sustain {
            self.pitch_envelope
                .0
                .render_at_sample(envelope_sample, gate_duration)
        } else {
            self.pitch_envelope
                .0
                .render(params.gate, envelope_rate, ad_scale, release_scale)
        };
        let pitch_mod = pitch_envelope + params.pitch_mod;
        let f0 = self.a0 * 0.25 * semitones_to_ratio_safe(input_note - 9.0 + pitch_mod * 12.0);

        // Note and velocity are sampled at the trigger, or continuously when
        // scrubbing.
        let note_on = params.gate && !self.gate;
        self.gate = params.gate;
        if note_on || params.sustain {
            self.normalized_velocity = normalize_velocity(params.velocity);
            self.note = input_note;
        }

        if note_on && self.patch.reset_phase != 0 {
            for operator in &mut self.operator {
                operator.phase = 0;
            }
        }

        let mut f = [0.0f32; NUM_OPERATORS];
        let mut a = [0.0f32; NUM_OPERATORS];

        for i in 0..NUM_OPERATORS {
            let op = &self.patch.op[i];

            f[i] = self.ratios[i]
                * if self.ratios[i] < 0.0 {
                    -self.one_hz
                } else {
                    f0
                };

            let rate = envelope_rate * rate_scaling(self.note, op.rate_scaling);
            let level = if params.sustain {
                self.operator_envelope[i]
                    .0
                    .render_at_sample(envelope_sample, gate_duration)
            } else {
                self.operator_envelope[i]
                    .0
                    .render(params.gate, rate, ad_scale, release_scale)
            };

            let kb_scaling = keyboard_scaling(self.note, &op.keyboard_scaling);
            let velocity_scaling = self.normalized_velocity * op.velocity_sensitivity as f32;
            let brightness = if self
                .algorithms
                .is_modulator(self.patch.algorithm as usize, i)
            {
                (params.brightness - 0.5) * 32.0
            } else {
                0.0
            };

            let level = level
                + 0.125
                    * (kb_scaling + velocity_scaling + brightness).min(self.level_headroom[i]);
            self.level[i] = level;

            let sensitivity = amp_mod_sensitivity(op.amp_mod_sensitivity);
            let log_level_mod = sensitivity * params.amp_mod - 1.0;
            let level_mod = 1.0 - pow2_fast::<2>(6.4 * log_level_mod);
            a[i] = pow2_fast::<2>(-14.0 + level * level_mod);
        }

        trace!("rendering block: f0 {} levels {:?}", f0, self.level);

        for buffer in &mut self.buffers {
            buffer[..size].fill(0.0);
        }

        let algorithm = self.patch.algorithm as usize;
        let feedback = self.patch.feedback as i32;
        let mut i = 0;
        while i < NUM_OPERATORS {
            let call = *self.algorithms.render_call(algorithm, i);
            let ops = &mut self.operator[i..i + call.n];
            let f = &f[i..i + call.n];
            let a = &a[i..i + call.n];

            if call.input == call.output {
                // A call may read and write the same slot; the kernel reads
                // each modulation sample before overwriting it, so a block
                // copy keeps the borrows disjoint without changing the
                // result.
                let modulation = self.buffers[call.input];
                (call.render)(
                    ops,
                    f,
                    a,
                    &mut self.feedback_state,
                    feedback,
                    &modulation[..size],
                    &mut self.buffers[call.output][..size],
                );
            } else {
                let (modulation, output) = split_buffers(&mut self.buffers, call.input, call.output);
                (call.render)(
                    ops,
                    f,
                    a,
                    &mut self.feedback_state,
                    feedback,
                    &modulation[..size],
                    &mut output[..size],
                );
            }

            i += call.n;
        }

        out.copy_from_slice(&self.buffers[0][..size]);
    }
}

/// Disjoint immutable/mutable access to two different buffer slots.
fn split_buffers(
    buffers: &mut [[f32; BLOCK_SIZE]; 4],
    input: usize,
    output: usize,
) -> (&[f32; BLOCK_SIZE], &mut [f32; BLOCK_SIZE]) {
    debug_assert_ne!(input, output);
    if input < output {
        let (lo, hi) = buffers.split_at_mut(output);
        (&lo[input], &mut hi[0])
    } else {
        let (lo, hi) = buffers.split_at_mut(input);
        (&hi[0], &mut lo[output])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fm::patch::OpParams;

    fn carrier_patch() -> Patch {
        let mut patch = Patch::default();
        patch.algorithm = 31;
        patch.transpose = 24;
        // Level 50 is the neutral pitch envelope setting.
        patch.pitch_eg = crate::fm::patch::Eg {
            rate: [99, 99, 99, 99],
            level: [50, 50, 50, 50],
        };
        for number in 1..=6 {
            patch
                .set_op(
                    number,
                    OpParams {
                        eg: crate::fm::patch::Eg {
                            rate: [99, 99, 99, 99],
                            level: [99, 99, 99, 0],
                        },
                        level: 99,
                        coarse: 1,
                        detune: 7,
                        ..OpParams::default()
                    },
                )
                .unwrap();
        }
        patch
    }

    #[test]
    fn setup_is_idempotent() {
        let mut voice = Voice::new(carrier_patch(), 44100.0);
        assert!(voice.setup());
        assert!(!voice.setup());

        voice.set_patch(carrier_patch());
        assert!(voice.setup());
        assert!(!voice.setup());
    }

    #[test]
    fn first_render_after_patch_change_is_silent() {
        let mut voice = Voice::new(carrier_patch(), 44100.0);
        let params = VoiceParams {
            gate: true,
            velocity: 1.0,
            note: 60.0,
            ..VoiceParams::default()
        };

        let mut out = [1.0f32; BLOCK_SIZE];
        voice.render(&params, &mut out);
        assert!(out.iter().all(|&x| x == 0.0));

        voice.render(&params, &mut out);
        assert!(out.iter().any(|&x| x != 0.0));
    }

    #[test]
    fn gated_render_produces_audio_and_release_decays() {
        let mut voice = Voice::new(carrier_patch(), 44100.0);
        voice.setup();
        let mut params = VoiceParams {
            gate: true,
            velocity: 1.0,
            note: 60.0,
            ..VoiceParams::default()
        };

        let mut out = [0.0f32; BLOCK_SIZE];
        let mut peak = 0.0f32;
        for _ in 0..2000 {
            voice.render(&params, &mut out);
            peak = out.iter().fold(peak, |m, x| m.max(x.abs()));
        }
        assert!(peak > 0.1, "gate-held peak {}", peak);

        params.gate = false;
        let mut tail = 1.0f32;
        for _ in 0..20_000 {
            voice.render(&params, &mut out);
            tail = out.iter().fold(0.0f32, |m, x| m.max(x.abs()));
        }
        // The envelope release floor leaves six carriers at roughly
        // 6 * 2^-13.9 before the output stage scales them down.
        assert!(tail < 1e-3, "release tail {}", tail);
        assert!(tail < peak * 0.01, "tail {} vs peak {}", tail, peak);
    }

    #[test]
    fn feedback_output_stays_bounded() {
        let mut patch = carrier_patch();
        patch.feedback = 7;
        for op in &mut patch.op {
            op.level = 80;
        }
        let mut voice = Voice::new(patch, 44100.0);
        voice.setup();
        let params = VoiceParams {
            gate: true,
            velocity: 1.0,
            note: 60.0,
            ..VoiceParams::default()
        };

        let mut out = [0.0f32; BLOCK_SIZE];
        let mut peak = 0.0f32;
        for _ in 0..(10 * 44100 / BLOCK_SIZE) {
            voice.render(&params, &mut out);
            peak = out.iter().fold(peak, |m, x| m.max(x.abs()));
        }
        assert!(peak < 8.0, "feedback peak {}", peak);
        assert!(peak > 0.0);
    }

    #[test]
    fn phase_reset_on_note_on_is_honored() {
        let mut patch = carrier_patch();
        patch.reset_phase = 1;
        let mut voice = Voice::new(patch, 44100.0);
        voice.setup();

        let mut params = VoiceParams {
            gate: true,
            velocity: 1.0,
            note: 60.0,
            ..VoiceParams::default()
        };
        let mut first = [0.0f32; BLOCK_SIZE];
        voice.render(&params, &mut first);

        // Release, then retrigger: with phase reset the first block repeats.
        params.gate = false;
        let mut out = [0.0f32; BLOCK_SIZE];
        for _ in 0..40_000 {
            voice.render(&params, &mut out);
        }
        params.gate = true;
        let mut second = [0.0f32; BLOCK_SIZE];
        voice.render(&params, &mut second);

        for (x, y) in first.iter().zip(second.iter()) {
            assert!((x - y).abs() < 1e-3, "{} vs {}", x, y);
        }
    }
}
