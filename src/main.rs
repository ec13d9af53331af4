use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use dx7fm::{wav_writer, Bank};

fn parse_duration(s: &str) -> Result<Duration, std::num::ParseIntError> {
    let ms: u64 = s.parse()?;
    Ok(Duration::from_millis(ms))
}

/// Render DX7 SYSEX patches with a software FM voice engine
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List all patches in a sysex bank file
    List {
        /// Path to the DX7 sysex bank file
        sysex_file: PathBuf,
    },
    /// Render one patch to a mono float WAV file
    Render {
        /// Path to the DX7 sysex bank file
        sysex_file: PathBuf,

        /// Patch number (0-indexed)
        patch_number: usize,

        /// MIDI note to render
        #[arg(long, default_value_t = 60)]
        note: u8,

        /// Key on duration in milliseconds
        #[arg(long, default_value = "2000", value_parser = parse_duration)]
        key_on_duration: Duration,

        /// Output sample rate in Hz
        #[arg(long, default_value_t = 44100)]
        sample_rate: u32,

        /// Output path (defaults to "<patch name>.wav")
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn load_bank(path: &PathBuf) -> Result<Bank> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read sysex file '{}'", path.display()))?;
    Bank::from_sysex(&bytes)
        .with_context(|| format!("'{}' is not a 32-voice DX7 bank", path.display()))
}

fn main() -> Result<()> {
    dx7fm::init_logging();

    let args = Args::parse();

    match args.command {
        Commands::List { sysex_file } => {
            let bank = load_bank(&sysex_file)?;
            for (i, patch) in bank.patches.iter().enumerate() {
                println!("{}: {}", i, patch.name());
            }
        }
        Commands::Render {
            sysex_file,
            patch_number,
            note,
            key_on_duration,
            sample_rate,
            output,
        } => {
            if note > 127 {
                bail!("note must be <= 127 (got {})", note);
            }

            let bank = load_bank(&sysex_file)?;
            if patch_number >= bank.patches.len() {
                bail!(
                    "patch_number {} is out of range (bank has {} patches)",
                    patch_number,
                    bank.patches.len()
                );
            }

            let patch = bank.patches[patch_number];
            let samples = patch.generate_samples(note as f32, sample_rate, key_on_duration);

            let path = output.unwrap_or_else(|| PathBuf::from(format!("{}.wav", patch.name())));
            wav_writer::write_wav(&path, sample_rate, &samples)?;
            println!(
                "wrote {} samples ({:.2}s) to {}",
                samples.len(),
                samples.len() as f32 / sample_rate as f32,
                path.display()
            );
        }
    }

    Ok(())
}
