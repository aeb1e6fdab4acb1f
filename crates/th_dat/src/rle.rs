//! Run-length coding used by the PC-98 and executable-embedded archives.
//!
//! A byte equal to the one before it is followed by a count of further copies. Once a
//! run has been expanded the previous byte is forgotten, so the byte after the count
//! always starts afresh.

use std::iter;

/// Longest run a single triple can describe: two literal bytes plus 255 copies
pub const MAX_RUN: usize = 257;

/// Expand `input`, returning `None` when it ends in the middle of a run
pub fn decode(input: &[u8], size_hint: usize) -> Option<Vec<u8>> {
    let mut output = Vec::with_capacity(size_hint);
    let mut previous = None;
    let mut bytes = input.iter().copied();

    while let Some(byte) = bytes.next() {
        output.push(byte);
        if previous == Some(byte) {
            let count = bytes.next()?;
            output.extend(iter::repeat(byte).take(count as usize));
            previous = None;
        } else {
            previous = Some(byte);
        }
    }

    Some(output)
}

/// Encode `input` using maximal runs
pub fn encode(input: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(input.len());

    let mut start = 0;
    while start < input.len() {
        let byte = input[start];
        let run = input[start..]
            .iter()
            .take(MAX_RUN)
            .take_while(|&&b| b == byte)
            .count();

        if run == 1 {
            output.push(byte);
        } else {
            output.extend_from_slice(&[byte, byte, (run - 2) as u8]);
        }
        start += run;
    }

    output
}
