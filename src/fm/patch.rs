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

//! Decoding of the packed 128-byte DX7 voice format and 4104-byte banks.
//!
//! Every numeric field is masked to its bit width and clamped to its
//! documented maximum, so a decoded patch can be rendered without any
//! further range checks.

use log::debug;

use crate::error::{Error, Result};
use super::NUM_OPERATORS;

/// Size of one packed voice.
pub const VOICE_SIZE: usize = 128;

/// Number of voices in a bulk dump.
pub const BANK_PATCHES: usize = 32;

/// Full bank SysEx message: header + 32 voices + checksum + EOX.
pub const BANK_SIZE: usize = 6 + BANK_PATCHES * VOICE_SIZE + 2;

const BANK_HEADER: [u8; 6] = [0xF0, 0x43, 0x00, 0x09, 0x20, 0x00];

/// Four-stage envelope generator settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Eg {
    pub rate: [u8; 4],
    pub level: [u8; 4],
}

/// Keyboard level scaling around a break point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyboardScaling {
    pub break_point: u8,
    pub left_depth: u8,
    pub right_depth: u8,
    pub left_curve: u8,
    pub right_curve: u8,
}

/// Parameters of one operator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpParams {
    pub eg: Eg,
    pub keyboard_scaling: KeyboardScaling,
    /// Rate scaling, 0..7.
    pub rate_scaling: u8,
    /// Amplitude modulation sensitivity, 0..3.
    pub amp_mod_sensitivity: u8,
    /// Velocity sensitivity, 0..7.
    pub velocity_sensitivity: u8,
    /// Output level, 0..99.
    pub level: u8,
    /// 0 = frequency ratio, 1 = fixed frequency.
    pub mode: u8,
    /// Coarse frequency, 0..31.
    pub coarse: u8,
    /// Fine frequency, 0..99.
    pub fine: u8,
    /// Detune, 0..14 (7 is centered).
    pub detune: u8,
}

/// LFO settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModParams {
    pub rate: u8,
    pub delay: u8,
    pub pitch_mod_depth: u8,
    pub amp_mod_depth: u8,
    pub reset_phase: u8,
    /// Waveform, 0..5.
    pub waveform: u8,
    /// Pitch modulation sensitivity, 0..7.
    pub pitch_mod_sensitivity: u8,
}

/// One decoded DX7 voice.
///
/// Operators are stored in rendering order: index 0 is DX7 operator 6. The
/// `op`/`set_op` accessors translate from the front-panel 1..=6 numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Patch {
    pub op: [OpParams; NUM_OPERATORS],
    pub pitch_eg: Eg,
    /// Algorithm, 0..31.
    pub algorithm: u8,
    /// Feedback amount, 0..7.
    pub feedback: u8,
    /// Reset operator phases on note-on.
    pub reset_phase: u8,
    pub modulations: ModParams,
    /// Transpose, 0..48 (24 is centered).
    pub transpose: u8,
    /// Raw 7-bit ASCII name.
    pub name: [u8; 10],
    /// Reserved operator mute mask; decoded as all-on, not consulted when
    /// rendering.
    pub active_op: u8,
}

impl Default for Patch {
    fn default() -> Self {
        Self {
            op: [OpParams::default(); NUM_OPERATORS],
            pitch_eg: Eg::default(),
            algorithm: 0,
            feedback: 0,
            reset_phase: 0,
            modulations: ModParams::default(),
            transpose: 0,
            name: [b' '; 10],
            active_op: 0x3f,
        }
    }
}

impl Patch {
    /// Decodes one packed 128-byte voice.
    pub fn from_packed(data: &[u8]) -> Result<Self> {
        if data.len() != VOICE_SIZE {
            return Err(Error::BadVoiceLength {
                expected: VOICE_SIZE,
                actual: data.len(),
            });
        }

        let mut patch = Self::default();

        for (i, op) in patch.op.iter_mut().enumerate() {
            let bytes = &data[i * 17..(i + 1) * 17];

            for j in 0..4 {
                op.eg.rate[j] = (bytes[j] & 0x7f).min(99);
                op.eg.level[j] = (bytes[4 + j] & 0x7f).min(99);
            }

            op.keyboard_scaling.break_point = (bytes[8] & 0x7f).min(99);
            op.keyboard_scaling.left_depth = (bytes[9] & 0x7f).min(99);
            op.keyboard_scaling.right_depth = (bytes[10] & 0x7f).min(99);
            op.keyboard_scaling.left_curve = bytes[11] & 0x3;
            op.keyboard_scaling.right_curve = (bytes[11] >> 2) & 0x3;

            op.rate_scaling = bytes[12] & 0x7;
            op.detune = ((bytes[12] >> 3) & 0xf).min(14);
            op.amp_mod_sensitivity = bytes[13] & 0x3;
            op.velocity_sensitivity = (bytes[13] >> 2) & 0x7;
            op.level = (bytes[14] & 0x7f).min(99);
            op.mode = bytes[15] & 0x1;
            op.coarse = (bytes[15] >> 1) & 0x1f;
            op.fine = (bytes[16] & 0x7f).min(99);
        }

        for j in 0..4 {
            patch.pitch_eg.rate[j] = (data[102 + j] & 0x7f).min(99);
            patch.pitch_eg.level[j] = (data[106 + j] & 0x7f).min(99);
        }

        patch.algorithm = data[110] & 0x1f;
        patch.feedback = data[111] & 0x7;
        patch.reset_phase = (data[111] >> 3) & 0x1;

        patch.modulations.rate = (data[112] & 0x7f).min(99);
        patch.modulations.delay = (data[113] & 0x7f).min(99);
        patch.modulations.pitch_mod_depth = (data[114] & 0x7f).min(99);
        patch.modulations.amp_mod_depth = (data[115] & 0x7f).min(99);
        patch.modulations.reset_phase = data[116] & 0x1;
        patch.modulations.waveform = ((data[116] >> 1) & 0x7).min(5);
        patch.modulations.pitch_mod_sensitivity = (data[116] >> 4) & 0x7;

        patch.transpose = (data[117] & 0x7f).min(48);

        for (i, byte) in patch.name.iter_mut().enumerate() {
            *byte = data[118 + i] & 0x7f;
        }

        debug!(
            "decoded voice '{}': algorithm {}, feedback {}",
            patch.name(),
            patch.algorithm + 1,
            patch.feedback
        );

        Ok(patch)
    }

    /// Re-encodes into the packed format. For patches whose fields are within
    /// their documented ranges this is the exact inverse of `from_packed`.
    pub fn pack(&self) -> [u8; VOICE_SIZE] {
        let mut data = [0u8; VOICE_SIZE];

        for (i, op) in self.op.iter().enumerate() {
            let bytes = &mut data[i * 17..(i + 1) * 17];

            bytes[..4].copy_from_slice(&op.eg.rate);
            bytes[4..8].copy_from_slice(&op.eg.level);
            bytes[8] = op.keyboard_scaling.break_point;
            bytes[9] = op.keyboard_scaling.left_depth;
            bytes[10] = op.keyboard_scaling.right_depth;
            bytes[11] = (op.keyboard_scaling.left_curve & 0x3)
                | ((op.keyboard_scaling.right_curve & 0x3) << 2);
            bytes[12] = (op.rate_scaling & 0x7) | ((op.detune & 0xf) << 3);
            bytes[13] = (op.amp_mod_sensitivity & 0x3) | ((op.velocity_sensitivity & 0x7) << 2);
            bytes[14] = op.level;
            bytes[15] = (op.mode & 0x1) | ((op.coarse & 0x1f) << 1);
            bytes[16] = op.fine;
        }

        data[102..106].copy_from_slice(&self.pitch_eg.rate);
        data[106..110].copy_from_slice(&self.pitch_eg.level);
        data[110] = self.algorithm & 0x1f;
        data[111] = (self.feedback & 0x7) | ((self.reset_phase & 0x1) << 3);
        data[112] = self.modulations.rate;
        data[113] = self.modulations.delay;
        data[114] = self.modulations.pitch_mod_depth;
        data[115] = self.modulations.amp_mod_depth;
        data[116] = (self.modulations.reset_phase & 0x1)
            | ((self.modulations.waveform & 0x7) << 1)
            | ((self.modulations.pitch_mod_sensitivity & 0x7) << 4);
        data[117] = self.transpose;
        data[118..128].copy_from_slice(&self.name);

        data
    }

    /// Operator parameters by DX7 number 1..=6.
    pub fn op(&self, number: usize) -> Result<&OpParams> {
        Ok(&self.op[Self::op_index(number)?])
    }

    /// Replaces the parameters of operator `number` (DX7 numbering 1..=6).
    pub fn set_op(&mut self, number: usize, params: OpParams) -> Result<()> {
        self.op[Self::op_index(number)?] = params;
        Ok(())
    }

    fn op_index(number: usize) -> Result<usize> {
        if (1..=NUM_OPERATORS).contains(&number) {
            Ok(NUM_OPERATORS - number)
        } else {
            Err(Error::BadOperatorIndex(number))
        }
    }

    /// Patch name with trailing padding removed.
    pub fn name(&self) -> String {
        self.name
            .iter()
            .map(|&byte| char::from(byte))
            .collect::<String>()
            .trim_end()
            .to_string()
    }
}

/// A bank of 32 patches parsed from a bulk-dump SysEx message.
#[derive(Debug, Clone, PartialEq)]
pub struct Bank {
    pub patches: [Patch; BANK_PATCHES],
}

impl Bank {
    /// Parses a complete 4104-byte bank dump. The trailing checksum and EOX
    /// bytes are reserved and not validated.
    pub fn from_sysex(data: &[u8]) -> Result<Self> {
        if data.len() != BANK_SIZE {
            return Err(Error::BadBankLength {
                expected: BANK_SIZE,
                actual: data.len(),
            });
        }
        if data[..6] != BANK_HEADER {
            return Err(Error::BadBankHeader {
                expected: BANK_HEADER,
                actual: data[..6].try_into().unwrap(),
            });
        }

        let payload = &data[6..6 + BANK_PATCHES * VOICE_SIZE];
        let mut patches = [Patch::default(); BANK_PATCHES];
        for (i, patch) in patches.iter_mut().enumerate() {
            *patch = Patch::from_packed(&payload[i * VOICE_SIZE..(i + 1) * VOICE_SIZE])?;
        }

        debug!("parsed bank of {} voices", patches.len());

        Ok(Self { patches })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank_bytes() -> Vec<u8> {
        let mut data = vec![0u8; BANK_SIZE];
        data[..6].copy_from_slice(&BANK_HEADER);
        data[BANK_SIZE - 1] = 0xF7;
        data
    }

    #[test]
    fn decoded_fields_stay_in_range() {
        // All-0x7F input exercises every mask and clamp at once.
        let data = [0x7fu8; VOICE_SIZE];
        let patch = Patch::from_packed(&data).unwrap();

        for op in &patch.op {
            assert!(op.eg.rate.iter().all(|&r| r <= 99));
            assert!(op.eg.level.iter().all(|&l| l <= 99));
            assert!(op.keyboard_scaling.break_point <= 99);
            assert!(op.keyboard_scaling.left_curve <= 3);
            assert!(op.keyboard_scaling.right_curve <= 3);
            assert!(op.rate_scaling <= 7);
            assert!(op.detune <= 14);
            assert!(op.amp_mod_sensitivity <= 3);
            assert!(op.velocity_sensitivity <= 7);
            assert!(op.level <= 99);
            assert!(op.coarse <= 31);
            assert!(op.fine <= 99);
        }
        assert!(patch.algorithm <= 31);
        assert!(patch.feedback <= 7);
        assert!(patch.reset_phase <= 1);
        assert!(patch.modulations.waveform <= 5);
        assert!(patch.modulations.pitch_mod_sensitivity <= 7);
        assert!(patch.transpose <= 48);
        assert_eq!(patch.active_op, 0x3f);
    }

    #[test]
    fn wrong_voice_length_is_rejected() {
        assert_eq!(
            Patch::from_packed(&[0u8; 127]),
            Err(Error::BadVoiceLength {
                expected: VOICE_SIZE,
                actual: 127
            })
        );
        assert!(Patch::from_packed(&[0u8; 155]).is_err());
    }

    #[test]
    fn pack_round_trips_in_range_patches() {
        let mut data = [0u8; VOICE_SIZE];
        for (i, byte) in data.iter_mut().enumerate() {
            // In-range pseudo-random content: rates/levels 0..99, packed
            // bit fields kept within their widths.
            *byte = match i % 17 {
                11 => (i % 16) as u8,
                12 => (i % 120) as u8,
                13 => (i % 32) as u8,
                15 => (i % 64) as u8,
                _ => ((i * 7) % 100) as u8,
            };
        }
        // Global block: keep each field in range.
        for j in 102..110 {
            data[j] = (j as u8) % 100;
        }
        data[110] = 17;
        data[111] = 0b1101;
        data[112] = 35;
        data[113] = 40;
        data[114] = 45;
        data[115] = 50;
        data[116] = 0b101_101_1;
        data[117] = 24;
        for j in 118..128 {
            data[j] = b'A' + (j - 118) as u8;
        }

        let patch = Patch::from_packed(&data).unwrap();
        assert_eq!(patch.pack(), data);
    }

    #[test]
    fn operator_accessors_use_dx7_numbering() {
        let mut patch = Patch::default();
        let op = OpParams {
            level: 77,
            ..OpParams::default()
        };
        patch.set_op(6, op).unwrap();
        // DX7 operator 6 is the first stored operator.
        assert_eq!(patch.op[0].level, 77);
        assert_eq!(patch.op(6).unwrap().level, 77);

        assert_eq!(patch.set_op(0, op), Err(Error::BadOperatorIndex(0)));
        assert_eq!(patch.set_op(7, op), Err(Error::BadOperatorIndex(7)));
    }

    #[test]
    fn bank_parses_and_rejects_mutations() {
        let mut data = bank_bytes();
        let name = b"BRASS   1 ";
        data[6 + 118..6 + 128].copy_from_slice(name);

        let bank = Bank::from_sysex(&data).unwrap();
        assert_eq!(bank.patches.len(), 32);
        assert_eq!(bank.patches[0].name(), "BRASS   1");

        data[0] = 0xF1;
        match Bank::from_sysex(&data) {
            Err(Error::BadBankHeader { .. }) => {}
            other => panic!("expected BadBankHeader, got {:?}", other),
        }

        let bytes = bank_bytes();
        assert_eq!(
            Bank::from_sysex(&bytes[..BANK_SIZE - 1]),
            Err(Error::BadBankLength {
                expected: BANK_SIZE,
                actual: BANK_SIZE - 1
            })
        );
    }
}
