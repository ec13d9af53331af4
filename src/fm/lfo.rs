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

//! DX7-compatible low-frequency oscillator with its onset delay ramp.

use super::dx_units::{lfo_delay, lfo_frequency, pitch_mod_sensitivity};
use super::patch::ModParams;
use crate::dsp::sine;
use crate::rng;

/// The six LFO waveforms, in DX7 order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Waveform {
    #[default]
    Triangle,
    RampDown,
    RampUp,
    Square,
    Sine,
    SampleHold,
}

impl From<u8> for Waveform {
    fn from(value: u8) -> Self {
        match value {
            1 => Waveform::RampDown,
            2 => Waveform::RampUp,
            3 => Waveform::Square,
            4 => Waveform::Sine,
            5 => Waveform::SampleHold,
            _ => Waveform::Triangle,
        }
    }
}

/// Low-frequency modulation source shared by pitch and amplitude.
#[derive(Debug, Clone)]
pub struct Lfo {
    phase: f32,
    frequency: f32,
    delay_phase: f32,
    delay_increment: [f32; 2],
    value: f32,
    random_value: f32,
    one_hz: f32,
    amp_mod_depth: f32,
    pitch_mod_depth: f32,
    waveform: Waveform,
    reset_phase: bool,
    phase_integral: i32,
}

impl Lfo {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            phase: 0.0,
            frequency: 0.1,
            delay_phase: 0.0,
            delay_increment: [0.1, 0.1],
            value: 0.0,
            random_value: 0.0,
            one_hz: 1.0 / sample_rate,
            amp_mod_depth: 0.0,
            pitch_mod_depth: 0.0,
            waveform: Waveform::Triangle,
            reset_phase: false,
            phase_integral: 0,
        }
    }

    /// Configures rate, delay, waveform and depths from patch data.
    pub fn set(&mut self, modulations: &ModParams) {
        self.frequency = lfo_frequency(modulations.rate) * self.one_hz;

        let [onset, ramp] = lfo_delay(modulations.delay);
        self.delay_increment = [onset * self.one_hz, ramp * self.one_hz];

        self.waveform = Waveform::from(modulations.waveform);
        self.reset_phase = modulations.reset_phase != 0;

        self.amp_mod_depth = modulations.amp_mod_depth as f32 * 0.01;
        self.pitch_mod_depth = modulations.pitch_mod_depth as f32
            * 0.01
            * pitch_mod_sensitivity(modulations.pitch_mod_sensitivity);
    }

    /// Note-on: restarts the delay ramp, and the phase if the patch asks.
    pub fn reset(&mut self) {
        if self.reset_phase {
            self.phase = 0.0;
        }
        self.delay_phase = 0.0;
    }

    /// Advances by `scale` samples.
    pub fn step(&mut self, scale: f32) {
        self.phase += scale * self.frequency;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
            self.random_value = rng::next_float();
        }

        self.value = self.shape();

        let increment = self.delay_increment[if self.delay_phase < 0.5 { 0 } else { 1 }];
        self.delay_phase = (self.delay_phase + scale * increment).min(1.0);
    }

    /// Deterministic evaluation at absolute sample time `sample`.
    pub fn scrub(&mut self, mut sample: f32) {
        let phase = sample * self.frequency;
        let integral = phase as i32;
        self.phase = phase - integral as f32;
        if integral != self.phase_integral {
            self.phase_integral = integral;
            self.random_value = rng::next_float();
        }

        self.value = self.shape();

        self.delay_phase = sample * self.delay_increment[0];
        if self.delay_phase > 0.5 {
            sample -= 0.5 / self.delay_increment[0];
            self.delay_phase = (0.5 + sample * self.delay_increment[1]).min(1.0);
        }
    }

    fn shape(&self) -> f32 {
        match self.waveform {
            Waveform::Triangle => {
                2.0 * if self.phase < 0.5 {
                    0.5 - self.phase
                } else {
                    self.phase - 0.5
                }
            }
            Waveform::RampDown => 1.0 - self.phase,
            Waveform::RampUp => self.phase,
            Waveform::Square => {
                if self.phase < 0.5 {
                    0.0
                } else {
                    1.0
                }
            }
            Waveform::Sine => 0.5 + 0.5 * sine(self.phase + 0.5),
            Waveform::SampleHold => self.random_value,
        }
    }

    /// Onset ramp: silent for the first half of the delay, linear afterwards.
    #[inline]
    pub fn delay_ramp(&self) -> f32 {
        if self.delay_phase < 0.5 {
            0.0
        } else {
            (self.delay_phase - 0.5) * 2.0
        }
    }

    #[inline]
    pub fn pitch_mod(&self) -> f32 {
        (self.value - 0.5) * self.delay_ramp() * self.pitch_mod_depth
    }

    #[inline]
    pub fn amp_mod(&self) -> f32 {
        (1.0 - self.value) * self.delay_ramp() * self.amp_mod_depth
    }
}
