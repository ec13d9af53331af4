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

//! Conversions from the DX7 0..99 parameter space to DSP quantities.

use crate::dsp::{interpolate, semitones_to_ratio_safe};
use super::patch::{KeyboardScaling, OpParams};

/// Coarse frequency settings, in semitones above half the root frequency.
pub const LUT_COARSE: [f32; 32] = [
    -12.000000, 0.000000, 12.000000, 19.019550, 24.000000, 27.863137,
    31.019550, 33.688259, 36.000000, 38.039100, 39.863137, 41.513180,
    43.019550, 44.405276, 45.688259, 46.882687, 48.000000, 49.049554,
    50.039100, 50.975130, 51.863137, 52.707809, 53.513180, 54.282743,
    55.019550, 55.726274, 56.405276, 57.058650, 57.688259, 58.295772,
    58.882687, 59.450356,
];

/// Amplitude modulation sensitivity, 0..3.
pub const LUT_AMP_MOD_SENSITIVITY: [f32; 4] = [0.0, 0.2588, 0.4274, 1.0];

/// Pitch modulation sensitivity, 0..7.
pub const LUT_PITCH_MOD_SENSITIVITY: [f32; 8] = [
    0.0, 0.0781250, 0.1562500, 0.2578125, 0.4296875, 0.7187500, 1.1953125, 2.0,
];

/// Cube root over [0, 1] in 16 steps, for velocity normalization.
pub const LUT_CUBE_ROOT: [f32; 17] = [
    0.0, 0.39685062976, 0.50000000000, 0.57235744065, 0.62996081605,
    0.67860466725, 0.72112502092, 0.75914745216, 0.79370070937, 0.82548197054,
    0.85498810729, 0.88258719406, 0.90856038354, 0.93312785379, 0.95646563396,
    0.97871693135, 1.0,
];

/// Slowest LFO frequency, in Hz.
pub const MIN_LFO_FREQUENCY: f32 = 0.005865;

/// 2^x through a polynomial approximation of the fractional part.
///
/// `ORDER` selects the polynomial order (1, 2 or 3). Order 1 defers to the
/// library exponent, which is both accurate and fast enough at block rate;
/// orders 2 and 3 splice the integer part directly into the exponent field.
#[inline]
pub fn pow2_fast<const ORDER: i32>(mut x: f32) -> f32 {
    if ORDER == 1 {
        return x.exp2();
    }

    let mut integral = x as i32;
    if x < 0.0 {
        integral -= 1;
    }
    x -= integral as f32;

    let fractional = if ORDER == 2 {
        1.0 + x * (0.6565 + x * 0.3435)
    } else {
        1.0 + x * (0.6958 + x * (0.2251 + x * 0.0791))
    };

    f32::from_bits((fractional.to_bits() as i32 + (integral << 23)) as u32)
}

/// Operator output level 0..99, mapped to the complement of the TL value.
///
/// * 0 => 0 (TL = 127)
/// * 20 => 48 (TL = 79)
/// * 99 => 127 (TL = 0)
#[inline]
pub fn operator_level(level: u8) -> i32 {
    let level = level as i32;
    if level < 20 {
        if level < 15 {
            (level * (36 - level)) >> 3
        } else {
            level + 27
        }
    } else {
        level + 28
    }
}

/// Pitch envelope level 0..99, mapped to an octave shift centered on 50.
#[inline]
pub fn pitch_envelope_level(level: u8) -> f32 {
    let x = (level as f32 - 50.0) / 32.0;
    let tail = (x.abs() + 0.02 - 1.0).max(0.0);
    x * (1.0 + tail * tail * 5.3056)
}

/// Operator envelope rate 0..99, as a phase increment per sample at 44.1kHz.
#[inline]
pub fn operator_envelope_increment(rate: u8) -> f32 {
    let r = (rate as i32 * 41) >> 6;
    let mantissa = 4 + (r & 3);
    let exponent = 2 + (r >> 2);
    ((mantissa << exponent) as f32) / ((1 << 24) as f32)
}

/// Pitch envelope rate 0..99, as a phase increment per sample at 44.1kHz.
#[inline]
pub fn pitch_envelope_increment(rate: u8) -> f32 {
    let r = rate as f32 * 0.01;
    (1.0 + 192.0 * r * (r * r * r * r + 0.3333)) / (21.3 * 44100.0)
}

/// LFO rate 0..99, in Hz.
#[inline]
pub fn lfo_frequency(rate: u8) -> f32 {
    let mut r = if rate == 0 { 1 } else { (rate as i32 * 165) >> 6 };
    r *= if r < 160 { 11 } else { 11 + ((r - 160) >> 4) };
    r as f32 * MIN_LFO_FREQUENCY
}

/// LFO delay 0..99, as the pair of onset and ramp increments in Hz.
#[inline]
pub fn lfo_delay(delay: u8) -> [f32; 2] {
    if delay == 0 {
        [100000.0, 100000.0]
    } else {
        let d = 99 - delay as i32;
        let scaled = (16 + (d & 15)) << (1 + (d >> 4));
        [
            scaled as f32 * MIN_LFO_FREQUENCY,
            0x80.max(scaled & 0xff80) as f32 * MIN_LFO_FREQUENCY,
        ]
    }
}

/// Velocity in [0, 1], pre-shaped for level scaling.
#[inline]
pub fn normalize_velocity(velocity: f32) -> f32 {
    let cube_root = interpolate(&LUT_CUBE_ROOT, velocity, 16.0);
    16.0 * (cube_root - 0.918)
}

/// Envelope increment ratio from the note and the rate-scaling setting 0..7.
#[inline]
pub fn rate_scaling(note: f32, rate_scaling: u8) -> f32 {
    pow2_fast::<1>(rate_scaling as f32 * (note * 0.33333 - 7.0) * 0.03125)
}

/// Amplitude modulation sensitivity 0..3.
#[inline]
pub fn amp_mod_sensitivity(sensitivity: u8) -> f32 {
    LUT_AMP_MOD_SENSITIVITY[sensitivity as usize]
}

/// Pitch modulation sensitivity 0..7.
#[inline]
pub fn pitch_mod_sensitivity(sensitivity: u8) -> f32 {
    LUT_PITCH_MOD_SENSITIVITY[sensitivity as usize]
}

/// Keyboard tracking to TL adjustment.
#[inline]
pub fn keyboard_scaling(note: f32, ks: &KeyboardScaling) -> f32 {
    let x = note - ks.break_point as f32 - 15.0;
    let (curve, depth) = if x > 0.0 {
        (ks.right_curve, ks.right_depth as f32)
    } else {
        (ks.left_curve, ks.left_depth as f32)
    };

    let mut t = x.abs();
    if curve == 1 || curve == 2 {
        t = (t * 0.010467).min(1.0);
        t = t * t * t * 96.0;
    }
    if curve < 2 {
        t = -t;
    }

    t * depth * 0.02677
}

/// Frequency ratio (or fixed frequency in Hz) of an operator.
#[inline]
pub fn frequency_ratio(op: &OpParams) -> f32 {
    let fine = if op.mode == 0 && op.fine != 0 {
        1.0 + 0.01 * op.fine as f32
    } else {
        1.0
    };

    let mut base = if op.mode == 0 {
        LUT_COARSE[op.coarse as usize]
    } else {
        ((op.coarse & 3) as i32 * 100 + op.fine as i32) as f32 * 0.39864
    };
    base += (op.detune as f32 - 7.0) * 0.015;

    semitones_to_ratio_safe(base) * fine
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_level_anchor_points() {
        assert_eq!(operator_level(0), 0);
        assert_eq!(operator_level(20), 48);
        assert_eq!(operator_level(50), 78);
        assert_eq!(operator_level(99), 127);
    }

    #[test]
    fn pitch_envelope_level_is_centered_on_50() {
        assert_eq!(pitch_envelope_level(50), 0.0);
        assert!((pitch_envelope_level(0) + 4.0).abs() < 0.25);
        assert!((pitch_envelope_level(99) - 4.0).abs() < 0.25);
        assert!((pitch_envelope_level(82) - 1.0).abs() < 0.05);
    }

    #[test]
    fn slowest_lfo_sits_at_the_frequency_floor() {
        assert_eq!(lfo_frequency(0), 11.0 * MIN_LFO_FREQUENCY);
        assert_eq!(lfo_delay(0), [100000.0, 100000.0]);
    }

    #[test]
    fn fastest_lfo_frequency_is_stable() {
        // (99 * 165) >> 6 = 255, then 255 * (11 + ((255 - 160) >> 4)) = 4080.
        const EXPECTED: f32 = 4080.0 * MIN_LFO_FREQUENCY;
        assert_eq!(lfo_frequency(99), EXPECTED);

        let cycles_per_sample = lfo_frequency(99) / 44100.0;
        assert!(cycles_per_sample > 5.4e-4 && cycles_per_sample < 5.5e-4);
    }

    #[test]
    fn velocity_normalization_range() {
        assert!((normalize_velocity(0.0) + 14.688).abs() < 1e-3);
        assert!((normalize_velocity(1.0) - 1.312).abs() < 1e-3);
    }

    #[test]
    fn pow2_fast_accuracy_bounds() {
        for i in -60..=60 {
            let x = i as f32 * 0.171;
            let exact = x.exp2();
            assert!((pow2_fast::<1>(x) - exact).abs() / exact < 0.01);
            assert!((pow2_fast::<2>(x) - exact).abs() / exact < 0.001);
            assert!((pow2_fast::<3>(x) - exact).abs() / exact < 0.001);
        }
    }

    #[test]
    fn unison_ratio_is_one() {
        let op = OpParams {
            coarse: 1,
            detune: 7,
            ..OpParams::default()
        };
        assert!((frequency_ratio(&op) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn fixed_mode_frequency_in_hz() {
        // Fixed mode, coarse 1, fine 0: 100 * 0.39864 semitones above 1Hz.
        let op = OpParams {
            mode: 1,
            coarse: 1,
            fine: 0,
            detune: 7,
            ..OpParams::default()
        };
        let expected = 2.0f32.powf(100.0 * 0.39864 / 12.0);
        assert!((frequency_ratio(&op) - expected).abs() / expected < 1e-4);
    }
}
