mod common;

use std::time::Duration;

use common::carrier_patch;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

const SAMPLE_RATE: u32 = 44100;
const FFT_SIZE: usize = 16384;

fn dominant_frequency(samples: &[f32]) -> f32 {
    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(FFT_SIZE);

    // Hann window against spectral leakage.
    let mut buffer: Vec<Complex<f32>> = samples
        .iter()
        .take(FFT_SIZE)
        .enumerate()
        .map(|(i, &x)| {
            let window = 0.5
                - 0.5 * (std::f32::consts::TAU * i as f32 / (FFT_SIZE - 1) as f32).cos();
            Complex::new(x * window, 0.0)
        })
        .collect();
    assert_eq!(buffer.len(), FFT_SIZE);

    fft.process(&mut buffer);

    let (peak_bin, _) = buffer[1..FFT_SIZE / 2]
        .iter()
        .enumerate()
        .map(|(i, c)| (i + 1, c.norm_sqr()))
        .fold((0, 0.0f32), |best, candidate| {
            if candidate.1 > best.1 {
                candidate
            } else {
                best
            }
        });

    peak_bin as f32 * SAMPLE_RATE as f32 / FFT_SIZE as f32
}

#[test]
fn unison_patch_at_a4_peaks_at_440_hz() {
    let samples = carrier_patch().generate_samples(69.0, SAMPLE_RATE, Duration::from_millis(1500));

    // Skip the attack before analysing.
    let steady = &samples[8192..8192 + FFT_SIZE];
    let frequency = dominant_frequency(steady);

    let bin_width = SAMPLE_RATE as f32 / FFT_SIZE as f32;
    assert!(
        (frequency - 440.0).abs() < 2.0 * bin_width + 1.0,
        "dominant frequency {}",
        frequency
    );
}

#[test]
fn coarse_2_doubles_the_fundamental() {
    let mut patch = carrier_patch();
    for op in &mut patch.op {
        op.coarse = 2;
    }
    let samples = patch.generate_samples(69.0, SAMPLE_RATE, Duration::from_millis(1500));
    let steady = &samples[8192..8192 + FFT_SIZE];
    let frequency = dominant_frequency(steady);

    let bin_width = SAMPLE_RATE as f32 / FFT_SIZE as f32;
    assert!(
        (frequency - 880.0).abs() < 2.0 * bin_width + 2.0,
        "dominant frequency {}",
        frequency
    );
}
