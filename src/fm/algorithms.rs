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

//! The 32 DX7 operator routings, compiled into chain-render call plans.
//!
//! Each algorithm is six opcodes, one per operator, rendered in ascending
//! order. An opcode packs the destination buffer, the modulation source
//! buffer, an additive flag and a feedback-tap flag. Compilation fuses runs
//! of operators that pipe straight into each other into a single chain
//! renderer call when a specialization for that shape exists.

use super::operator::{render_chain, RenderFn};
use super::{NUM_ALGORITHMS, NUM_OPERATORS};

const DESTINATION_MASK: u8 = 0x03;
const ADDITIVE_FLAG: u8 = 0x04;
const SOURCE_MASK: u8 = 0x30;
const SOURCE_FEEDBACK: u8 = 0x30;
const FEEDBACK_SOURCE_FLAG: u8 = 0x40;

/// Modulation source field: read from buffer `n`.
const fn src(n: u8) -> u8 {
    n << 4
}

/// Destination field: overwrite buffer `n`.
const fn dst(n: u8) -> u8 {
    n
}

/// Destination field: add into buffer `n`.
const fn sum(n: u8) -> u8 {
    n | ADDITIVE_FLAG
}

const FB_SRC: u8 = FEEDBACK_SOURCE_FLAG;
const FB_DST: u8 = src(3);
const FB: u8 = FB_SRC | FB_DST;
const NO_SRC: u8 = src(0);
/// The final mix: additive write into buffer 0.
const MIX: u8 = sum(0);

#[rustfmt::skip]
static OPCODES: [[u8; NUM_OPERATORS]; NUM_ALGORITHMS] = [
    [ FB | dst(1),          src(1) | dst(1),        src(1) | dst(1), src(1) | MIX,    NO_SRC | dst(1), src(1) | sum(0) ],
    [ NO_SRC | dst(1),      src(1) | dst(1),        src(1) | dst(1), src(1) | MIX,    FB | dst(1),     src(1) | sum(0) ],
    [ FB | dst(1),          src(1) | dst(1),        src(1) | MIX,    NO_SRC | dst(1), src(1) | dst(1), src(1) | sum(0) ],
    [ FB_DST | NO_SRC | dst(1), src(1) | dst(1), FB_SRC | src(1) | MIX, NO_SRC | dst(1), src(1) | dst(1), src(1) | sum(0) ],
    [ FB | dst(1),          src(1) | MIX,           NO_SRC | dst(1), src(1) | sum(0), NO_SRC | dst(1), src(1) | sum(0) ],
    [ FB_DST | NO_SRC | dst(1), FB_SRC | src(1) | MIX, NO_SRC | dst(1), src(1) | sum(0), NO_SRC | dst(1), src(1) | sum(0) ],
    [ FB | dst(1),          src(1) | dst(1),        NO_SRC | sum(1), src(1) | MIX,    NO_SRC | dst(1), src(1) | sum(0) ],
    [ NO_SRC | dst(1),      src(1) | dst(1),        FB | sum(1),     src(1) | MIX,    NO_SRC | dst(1), src(1) | sum(0) ],
    [ NO_SRC | dst(1),      src(1) | dst(1),        NO_SRC | sum(1), src(1) | MIX,    FB | dst(1),     src(1) | sum(0) ],
    [ NO_SRC | dst(1),      NO_SRC | sum(1),        src(1) | MIX,    FB | dst(1),     src(1) | dst(1), src(1) | sum(0) ],
    [ FB | dst(1),          NO_SRC | sum(1),        src(1) | MIX,    NO_SRC | dst(1), src(1) | dst(1), src(1) | sum(0) ],
    [ NO_SRC | dst(1),      NO_SRC | sum(1),        NO_SRC | sum(1), src(1) | MIX,    FB | dst(1),     src(1) | sum(0) ],
    [ FB | dst(1),          NO_SRC | sum(1),        NO_SRC | sum(1), src(1) | MIX,    NO_SRC | dst(1), src(1) | sum(0) ],
    [ FB | dst(1),          NO_SRC | sum(1),        src(1) | dst(1), src(1) | MIX,    NO_SRC | dst(1), src(1) | sum(0) ],
    [ NO_SRC | dst(1),      NO_SRC | sum(1),        src(1) | dst(1), src(1) | MIX,    FB | dst(1),     src(1) | sum(0) ],
    [ FB | dst(1),          src(1) | dst(1),        NO_SRC | dst(2), src(2) | sum(1), NO_SRC | sum(1), src(1) | MIX ],
    [ NO_SRC | dst(1),      src(1) | dst(1),        NO_SRC | dst(2), src(2) | sum(1), FB | sum(1),     src(1) | MIX ],
    [ NO_SRC | dst(1),      src(1) | dst(1),        src(1) | dst(1), FB | sum(1),     NO_SRC | sum(1), src(1) | MIX ],
    [ FB | dst(1),          src(1) | MIX,           src(1) | sum(0), NO_SRC | dst(1), src(1) | dst(1), src(1) | sum(0) ],
    [ NO_SRC | dst(1),      NO_SRC | sum(1),        src(1) | MIX,    FB | dst(1),     src(1) | sum(0), src(1) | sum(0) ],
    [ NO_SRC | dst(1),      src(1) | MIX,           src(1) | sum(0), FB | dst(1),     src(1) | sum(0), src(1) | sum(0) ],
    [ FB | dst(1),          src(1) | MIX,           src(1) | sum(0), src(1) | sum(0), NO_SRC | dst(1), src(1) | sum(0) ],
    [ FB | dst(1),          src(1) | MIX,           src(1) | sum(0), NO_SRC | dst(1), src(1) | sum(0), NO_SRC | sum(0) ],
    [ FB | dst(1),          src(1) | MIX,           src(1) | sum(0), src(1) | sum(0), NO_SRC | sum(0), NO_SRC | sum(0) ],
    [ FB | dst(1),          src(1) | MIX,           src(1) | sum(0), NO_SRC | sum(0), NO_SRC | sum(0), NO_SRC | sum(0) ],
    [ FB | dst(1),          NO_SRC | sum(1),        src(1) | MIX,    NO_SRC | dst(1), src(1) | sum(0), NO_SRC | sum(0) ],
    [ NO_SRC | dst(1),      NO_SRC | sum(1),        src(1) | MIX,    FB | dst(1),     src(1) | sum(0), NO_SRC | sum(0) ],
    [ NO_SRC | MIX,         FB | dst(1),            src(1) | dst(1), src(1) | sum(0), NO_SRC | dst(1), src(1) | sum(0) ],
    [ FB | dst(1),          src(1) | MIX,           NO_SRC | dst(1), src(1) | sum(0), NO_SRC | sum(0), NO_SRC | sum(0) ],
    [ NO_SRC | MIX,         FB | dst(1),            src(1) | dst(1), src(1) | sum(0), NO_SRC | sum(0), NO_SRC | sum(0) ],
    [ FB | dst(1),          src(1) | MIX,           NO_SRC | sum(0), NO_SRC | sum(0), NO_SRC | sum(0), NO_SRC | sum(0) ],
    [ FB | MIX,             NO_SRC | sum(0),        NO_SRC | sum(0), NO_SRC | sum(0), NO_SRC | sum(0), NO_SRC | sum(0) ],
];

/// One compiled renderer invocation: which specialization to call, how many
/// operators it consumes, and which buffers it reads and writes.
#[derive(Debug, Clone, Copy)]
pub struct RenderCall {
    pub render: RenderFn,
    pub n: usize,
    pub input: usize,
    pub output: usize,
}

impl Default for RenderCall {
    fn default() -> Self {
        Self {
            render: render_chain::<1, -1, false>,
            n: 0,
            input: 0,
            output: 0,
        }
    }
}

/// Compiled call plans for all 32 algorithms.
pub struct Algorithms {
    plans: [[RenderCall; NUM_OPERATORS]; NUM_ALGORITHMS],
}

impl Algorithms {
    pub fn new() -> Self {
        let mut algorithms = Self {
            plans: [[RenderCall::default(); NUM_OPERATORS]; NUM_ALGORITHMS],
        };
        for algorithm in 0..NUM_ALGORITHMS {
            algorithms.compile(algorithm);
        }
        algorithms
    }

    /// The call covering operator `op` of `algorithm`. Only entries at chain
    /// starts are meaningful; walk the plan by advancing `op` by `n`.
    #[inline]
    pub fn render_call(&self, algorithm: usize, op: usize) -> &RenderCall {
        &self.plans[algorithm][op]
    }

    /// True when the operator feeds a modulation buffer rather than the mix.
    #[inline]
    pub fn is_modulator(&self, algorithm: usize, op: usize) -> bool {
        OPCODES[algorithm][op] & DESTINATION_MASK != 0
    }

    fn compile(&mut self, algorithm: usize) {
        let opcodes = &OPCODES[algorithm];
        let mut i = 0;

        while i < NUM_OPERATORS {
            let opcode = opcodes[i];

            // Fuse as long as each operator pipes, without accumulation, into
            // the buffer the next one reads.
            let mut n = 1;
            while i + n < NUM_OPERATORS {
                let from = opcodes[i + n - 1];
                let to = (opcodes[i + n] & SOURCE_MASK) >> 4;
                if from & ADDITIVE_FLAG != 0 || from & DESTINATION_MASK != to {
                    if to == opcode & DESTINATION_MASK {
                        n = 1;
                    }
                    break;
                }
                n += 1;
            }

            // Look up a specialization for this chain; on a miss, retry once
            // with the chain split back down to a single operator.
            for _attempt in 0..2 {
                let last = opcodes[i + n - 1];
                let additive = last & ADDITIVE_FLAG != 0;

                let source = if opcode & SOURCE_MASK == 0 {
                    -1
                } else if opcode & SOURCE_MASK != SOURCE_FEEDBACK {
                    -2
                } else {
                    let mut tap = -3;
                    for (j, member) in opcodes[i..i + n].iter().enumerate() {
                        if member & FEEDBACK_SOURCE_FLAG != 0 {
                            tap = j as i32;
                        }
                    }
                    tap
                };

                if let Some(render) = specialized(n, source, additive) {
                    self.plans[algorithm][i] = RenderCall {
                        render,
                        n,
                        input: ((opcode & SOURCE_MASK) >> 4) as usize,
                        output: (last & DESTINATION_MASK) as usize,
                    };
                    break;
                } else if n > 1 {
                    n = 1;
                }
            }

            i += n;
        }
    }
}

impl Default for Algorithms {
    fn default() -> Self {
        Self::new()
    }
}

fn specialized(n: usize, source: i32, additive: bool) -> Option<RenderFn> {
    Some(match (n, source, additive) {
        (1, -2, false) => render_chain::<1, -2, false>,
        (1, -2, true) => render_chain::<1, -2, true>,
        (1, -1, false) => render_chain::<1, -1, false>,
        (1, -1, true) => render_chain::<1, -1, true>,
        (1, 0, false) => render_chain::<1, 0, false>,
        (1, 0, true) => render_chain::<1, 0, true>,
        (2, 1, true) => render_chain::<2, 1, true>,
        (3, 2, true) => render_chain::<3, 2, true>,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_algorithm_mixes_into_the_output_buffer() {
        for (algorithm, opcodes) in OPCODES.iter().enumerate() {
            let mixes = opcodes
                .iter()
                .filter(|&&op| op & DESTINATION_MASK == 0 && op & ADDITIVE_FLAG != 0)
                .count();
            assert!(mixes >= 1, "algorithm {} never reaches the mix", algorithm);
        }
    }

    #[test]
    fn every_plan_covers_all_six_operators() {
        let algorithms = Algorithms::new();
        for algorithm in 0..NUM_ALGORITHMS {
            let mut covered = 0;
            let mut i = 0;
            while i < NUM_OPERATORS {
                let call = algorithms.render_call(algorithm, i);
                assert!(call.n >= 1, "algorithm {} has a dead call at {}", algorithm, i);
                assert!(call.n <= 3);
                assert!(call.input < 4 && call.output < 4);
                covered += call.n;
                i += call.n;
            }
            assert_eq!(covered, NUM_OPERATORS, "algorithm {}", algorithm);
        }
    }

    #[test]
    fn every_algorithm_has_exactly_one_feedback_tap() {
        for (algorithm, opcodes) in OPCODES.iter().enumerate() {
            let taps = opcodes
                .iter()
                .filter(|&&op| op & FEEDBACK_SOURCE_FLAG != 0)
                .count();
            assert_eq!(taps, 1, "algorithm {}", algorithm);
        }
    }

    #[test]
    fn carrier_and_modulator_classification() {
        let algorithms = Algorithms::new();
        // Algorithm 32: six carriers, no modulators.
        for op in 0..NUM_OPERATORS {
            assert!(!algorithms.is_modulator(31, op));
        }
        // Algorithm 1: operators 4 and 6 (0-based 3 and 5) are the carriers.
        for op in 0..NUM_OPERATORS {
            assert_eq!(algorithms.is_modulator(0, op), op != 3 && op != 5);
        }
    }
}
