//! Run-length encoding of consecutive skipped entities.
//!
//! A run is an "inactive" marker bit (0) followed by a 2-bit size class and
//! `count - 1` in 0, 5, 8 or 11 bits. Runs longer than [`MAX_SKIP_RUN`] are
//! split into consecutive runs.

use bitstream::{BitReader, BitWriter};

use crate::error::WireResult;

/// Longest run a single skip block can express.
pub const MAX_SKIP_RUN: u32 = 2048;

const CLASS_BITS: u8 = 2;
const CLASS_WIDTHS: [u8; 4] = [0, 5, 8, 11];

const fn size_class(value: u32) -> usize {
    match value {
        0 => 0,
        1..=31 => 1,
        32..=255 => 2,
        _ => 3,
    }
}

/// Writes `count` skipped entities as one or more skip runs.
pub fn write_skip_run(writer: &mut BitWriter, count: u32) -> WireResult<()> {
    let mut remaining = count;
    while remaining > 0 {
        let run = remaining.min(MAX_SKIP_RUN);
        let value = run - 1;
        let class = size_class(value);
        writer.write_bool(false);
        writer.write_bits(class as u32, CLASS_BITS)?;
        writer.write_bits(value, CLASS_WIDTHS[class])?;
        remaining -= run;
    }
    Ok(())
}

/// Reads one skip run after its inactive marker bit has been consumed.
///
/// Returns the number of entities the run covers.
pub fn read_skip_run(reader: &mut BitReader<'_>) -> WireResult<u32> {
    let class = reader.read_bits(CLASS_BITS)? as usize;
    let value = reader.read_bits(CLASS_WIDTHS[class])?;
    Ok(value + 1)
}

/// Number of bits [`write_skip_run`] emits for `count` entities.
#[must_use]
pub fn skip_run_bits(count: u32) -> usize {
    let mut remaining = count;
    let mut bits = 0;
    while remaining > 0 {
        let run = remaining.min(MAX_SKIP_RUN);
        bits += 1 + CLASS_BITS as usize + CLASS_WIDTHS[size_class(run - 1)] as usize;
        remaining -= run;
    }
    bits
}
