use dx7fm::fm::patch::{Eg, OpParams, Patch, BANK_PATCHES, BANK_SIZE, VOICE_SIZE};

pub const BANK_HEADER: [u8; 6] = [0xF0, 0x43, 0x00, 0x09, 0x20, 0x00];

/// A patch with all six operators as unison carriers (algorithm 32 in DX7
/// numbering), neutral pitch envelope and centered transpose.
#[allow(dead_code)]
pub fn carrier_patch() -> Patch {
    let mut patch = Patch::default();
    patch.algorithm = 31;
    patch.transpose = 24;
    patch.pitch_eg = Eg {
        rate: [99, 99, 99, 99],
        level: [50, 50, 50, 50],
    };
    for number in 1..=6 {
        patch
            .set_op(
                number,
                OpParams {
                    eg: Eg {
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

/// A syntactically valid, all-zero 32-voice bank dump.
#[allow(dead_code)]
pub fn empty_bank_bytes() -> Vec<u8> {
    let mut data = vec![0u8; BANK_SIZE];
    data[..6].copy_from_slice(&BANK_HEADER);
    data[BANK_SIZE - 1] = 0xF7;
    data
}

/// A bank whose 32 voices are copies of `patch`, named PATCH 00..PATCH 31.
#[allow(dead_code)]
pub fn bank_bytes_of(patch: &Patch) -> Vec<u8> {
    let mut data = empty_bank_bytes();
    for i in 0..BANK_PATCHES {
        let mut voice = *patch;
        let name = format!("{:<10}", format!("PATCH {:02}", i));
        voice.name.copy_from_slice(name.as_bytes());
        data[6 + i * VOICE_SIZE..6 + (i + 1) * VOICE_SIZE].copy_from_slice(&voice.pack());
    }
    data
}
