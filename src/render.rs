//! Offline rendering of a patch into a float sample buffer.

use std::time::Duration;

use log::debug;

use crate::dsp::soft_clip;
use crate::fm::{Lfo, Patch, Voice, VoiceParams, BLOCK_SIZE};

/// Samples below this magnitude count as silence.
const SILENCE_FLOOR: f32 = 1e-4;

/// Trailing silence kept after the release tail, in fractions of a second.
const SILENCE_TAIL: usize = 10;

/// Hard cap on the rendered length, in seconds.
const MAX_RENDER_SECONDS: usize = 10;

impl Patch {
    /// Renders this patch at `midi_note`, held for `duration`, then released
    /// until the output stays silent for 100ms. The trailing silence is
    /// trimmed back to exactly that window and the total length is capped at
    /// ten seconds.
    pub fn generate_samples(
        &self,
        midi_note: f32,
        sample_rate: u32,
        duration: Duration,
    ) -> Vec<f32> {
        let mut voice = Voice::new(*self, sample_rate as f32);
        voice.setup();

        let mut lfo = Lfo::new(sample_rate as f32);
        lfo.set(&self.modulations);
        lfo.reset();

        let gate_samples = duration.as_millis() as usize * sample_rate as usize / 1000;
        let silence_samples = sample_rate as usize / SILENCE_TAIL;
        let max_samples = MAX_RENDER_SECONDS * sample_rate as usize;

        let mut params = VoiceParams {
            gate: true,
            note: midi_note,
            velocity: 1.0,
            ..VoiceParams::default()
        };

        let mut out = Vec::with_capacity(gate_samples + silence_samples);
        let mut block = [0.0f32; BLOCK_SIZE];
        let mut silence_run = 0usize;

        while out.len() < max_samples {
            let gate = out.len() < gate_samples;
            let mut size = BLOCK_SIZE.min(max_samples - out.len());
            if gate {
                // Keep the gate edge block-aligned.
                size = size.min(gate_samples - out.len());
            }
            params.gate = gate;

            lfo.step(size as f32);
            params.pitch_mod = lfo.pitch_mod();
            params.amp_mod = lfo.amp_mod();

            voice.render(&params, &mut block[..size]);

            for &sample in &block[..size] {
                let sample = soft_clip(0.25 * sample);
                out.push(sample);
                if sample.abs() < SILENCE_FLOOR {
                    silence_run += 1;
                } else {
                    silence_run = 0;
                }
            }

            if !gate && silence_run >= silence_samples {
                out.truncate(out.len() - (silence_run - silence_samples));
                break;
            }
        }

        debug!(
            "rendered '{}' at note {}: {} samples",
            self.name(),
            midi_note,
            out.len()
        );

        out
    }
}
