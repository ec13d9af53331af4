//! WAV encoding of rendered sample buffers.

use std::path::Path;

use anyhow::{Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};

fn spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    }
}

/// Encodes mono float samples as an in-memory WAV file.
pub fn wav_bytes(sample_rate: u32, samples: &[f32]) -> Result<Vec<u8>> {
    let mut bytes = vec![];
    let mut cursor = std::io::Cursor::new(&mut bytes);

    let mut writer = WavWriter::new(&mut cursor, spec(sample_rate))?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    Ok(bytes)
}

/// Writes mono float samples to a WAV file.
pub fn write_wav(path: &Path, sample_rate: u32, samples: &[f32]) -> Result<()> {
    let mut writer = WavWriter::create(path, spec(sample_rate))
        .with_context(|| format!("failed to create WAV file '{}'", path.display()))?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer
        .finalize()
        .with_context(|| format!("failed to finalize WAV file '{}'", path.display()))
}
