//! Bit-level writers for encoding packed binary data.

use std::ops::{Deref, DerefMut};

use crate::error::{BitError, BitResult};
use crate::packed::PackedBits;

/// Widest single field accepted by [`BitWriter::write_bits`].
pub const MAX_FIELD_BITS: u8 = 32;

/// A bit-level writer for encoding packed binary data.
///
/// Fields are written most-significant bit first and packed across byte
/// boundaries. Call [`finish`](Self::finish) to get the final byte buffer.
#[derive(Debug, Default)]
pub struct BitWriter {
    /// The accumulated bytes.
    bytes: Vec<u8>,
    /// Pending bits not yet pushed to `bytes` (always fewer than 8).
    acc: u64,
    /// Number of pending bits in `acc`.
    acc_bits: u8,
}

impl BitWriter {
    /// Creates a new empty `BitWriter`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new `BitWriter` with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(bytes),
            acc: 0,
            acc_bits: 0,
        }
    }

    /// Returns the number of bits written so far.
    #[must_use]
    pub fn bits_written(&self) -> usize {
        self.bytes.len() * 8 + self.acc_bits as usize
    }

    /// Returns `true` if the next write starts on a byte boundary.
    #[must_use]
    pub const fn is_aligned(&self) -> bool {
        self.acc_bits == 0
    }

    /// Writes a single bit.
    pub fn write_bool(&mut self, value: bool) {
        self.push(u64::from(value), 1);
    }

    /// Writes the low `bits` bits of `value`.
    ///
    /// Higher bits of `value` are ignored, which lets callers pass
    /// two's-complement deltas directly.
    ///
    /// # Errors
    ///
    /// Returns [`BitError::InvalidBitCount`] if `bits > 32`.
    pub fn write_bits(&mut self, value: u32, bits: u8) -> BitResult<()> {
        if bits > MAX_FIELD_BITS {
            return Err(BitError::InvalidBitCount {
                bits,
                max_bits: MAX_FIELD_BITS,
            });
        }
        if bits > 0 {
            self.push(u64::from(value), bits);
        }
        Ok(())
    }

    /// Copies a precomputed fragment into the stream.
    pub fn write_packed(&mut self, packed: PackedBits) {
        if !packed.is_empty() {
            self.push(packed.value(), packed.len());
        }
    }

    /// Pads the current byte with zeros.
    pub fn align_to_byte(&mut self) {
        if self.acc_bits > 0 {
            let pad = 8 - self.acc_bits;
            self.push(0, pad);
        }
    }

    /// Appends raw bytes at a byte boundary.
    ///
    /// # Errors
    ///
    /// Returns [`BitError::MisalignedAccess`] if the writer is mid-byte.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> BitResult<()> {
        if !self.is_aligned() {
            return Err(BitError::MisalignedAccess {
                bit_position: self.bits_written(),
            });
        }
        self.bytes.extend_from_slice(bytes);
        Ok(())
    }

    /// Finishes writing and returns the byte buffer.
    ///
    /// If the last byte is incomplete, it is padded with zeros on the right.
    #[must_use]
    pub fn finish(mut self) -> Vec<u8> {
        self.align_to_byte();
        self.bytes
    }

    /// Finishes writing and appends to the provided buffer.
    ///
    /// If the last byte is incomplete, it is padded with zeros on the right.
    pub fn finish_into(mut self, buf: &mut Vec<u8>) {
        self.align_to_byte();
        buf.append(&mut self.bytes);
    }

    // `bits` never exceeds 56, so `acc` (< 8 pending bits) cannot overflow.
    fn push(&mut self, value: u64, bits: u8) {
        debug_assert!(bits > 0 && bits <= 56);
        let masked = value & ((1u64 << bits) - 1);
        self.acc = (self.acc << bits) | masked;
        self.acc_bits += bits;
        while self.acc_bits >= 8 {
            self.acc_bits -= 8;
            self.bytes.push((self.acc >> self.acc_bits) as u8);
        }
        self.acc &= (1u64 << self.acc_bits) - 1;
    }
}

/// A [`BitWriter`] borrowed from an output buffer.
///
/// Everything written through the scope is padded to a byte boundary and
/// appended to the target when the scope is dropped, including on early
/// return through `?`.
#[derive(Debug)]
pub struct ScopedBitWriter<'a> {
    target: &'a mut Vec<u8>,
    inner: BitWriter,
}

impl<'a> ScopedBitWriter<'a> {
    /// Opens a bit scope that appends to `target` when dropped.
    pub fn new(target: &'a mut Vec<u8>) -> Self {
        Self {
            target,
            inner: BitWriter::new(),
        }
    }
}

impl Deref for ScopedBitWriter<'_> {
    type Target = BitWriter;

    fn deref(&self) -> &BitWriter {
        &self.inner
    }
}

impl DerefMut for ScopedBitWriter<'_> {
    fn deref_mut(&mut self) -> &mut BitWriter {
        &mut self.inner
    }
}

impl Drop for ScopedBitWriter<'_> {
    fn drop(&mut self) {
        std::mem::take(&mut self.inner).finish_into(self.target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_writer() {
        let writer = BitWriter::new();
        assert_eq!(writer.bits_written(), 0);
        let bytes = writer.finish();
        assert!(bytes.is_empty());
    }

    #[test]
    fn write_single_bit_true() {
        let mut writer = BitWriter::new();
        writer.write_bool(true);
        assert_eq!(writer.bits_written(), 1);
        // Single bit 1, padded with 7 zeros
        assert_eq!(writer.finish(), vec![0b1000_0000]);
    }

    #[test]
    fn write_full_byte() {
        let mut writer = BitWriter::new();
        for bit in [true, false, true, false, true, false, true, false] {
            writer.write_bool(bit);
        }
        assert_eq!(writer.bits_written(), 8);
        assert_eq!(writer.finish(), vec![0b1010_1010]);
    }

    #[test]
    fn write_bits_zero() {
        let mut writer = BitWriter::new();
        writer.write_bits(0xFF, 0).unwrap();
        assert_eq!(writer.bits_written(), 0);
        assert!(writer.finish().is_empty());
    }

    #[test]
    fn write_bits_masks_high_bits() {
        let mut writer = BitWriter::new();
        // -1 in 5 bits is 11111
        writer.write_bits((-1i32) as u32, 5).unwrap();
        assert_eq!(writer.finish(), vec![0b1111_1000]);
    }

    #[test]
    fn write_bits_across_byte_boundary() {
        let mut writer = BitWriter::new();
        writer.write_bits(0b1111, 4).unwrap();
        writer.write_bits(0b1010_1010, 8).unwrap();
        assert_eq!(writer.finish(), vec![0b1111_1010, 0b1010_0000]);
    }

    #[test]
    fn write_bits_32_bits() {
        let mut writer = BitWriter::new();
        writer.write_bool(true);
        writer.write_bits(u32::MAX, 32).unwrap();
        assert_eq!(writer.bits_written(), 33);
        assert_eq!(writer.finish(), vec![0xFF, 0xFF, 0xFF, 0xFF, 0x80]);
    }

    #[test]
    fn write_bits_invalid_count() {
        let mut writer = BitWriter::new();
        let result = writer.write_bits(0, 33);
        assert!(matches!(
            result,
            Err(BitError::InvalidBitCount {
                bits: 33,
                max_bits: 32
            })
        ));
    }

    #[test]
    fn write_bytes_requires_alignment() {
        let mut writer = BitWriter::new();
        writer.write_bool(true);
        assert!(matches!(
            writer.write_bytes(&[1]),
            Err(BitError::MisalignedAccess { bit_position: 1 })
        ));
        writer.align_to_byte();
        writer.write_bytes(&[0xAB, 0xCD]).unwrap();
        assert_eq!(writer.finish(), vec![0x80, 0xAB, 0xCD]);
    }

    #[test]
    fn finish_into_with_padding() {
        let mut writer = BitWriter::new();
        writer.write_bool(true);

        let mut buf = vec![0x11];
        writer.finish_into(&mut buf);
        assert_eq!(buf, vec![0x11, 0b1000_0000]);
    }

    #[test]
    fn scoped_writer_flushes_on_drop() {
        let mut out = vec![0xEE];
        {
            let mut scope = ScopedBitWriter::new(&mut out);
            scope.write_bits(0b101, 3).unwrap();
        }
        assert_eq!(out, vec![0xEE, 0b1010_0000]);
    }

    #[test]
    fn scoped_writer_flushes_on_early_return() {
        fn write_then_fail(out: &mut Vec<u8>) -> BitResult<()> {
            let mut scope = ScopedBitWriter::new(out);
            scope.write_bits(0xF, 4)?;
            scope.write_bits(0, 40)?;
            Ok(())
        }

        let mut out = Vec::new();
        assert!(write_then_fail(&mut out).is_err());
        assert_eq!(out, vec![0xF0]);
    }

    #[test]
    fn packed_and_plain_writes_match() {
        let mut packed = PackedBits::new();
        packed.push(3, 2).unwrap();
        packed.push(1, 1).unwrap();
        packed.push(0x3FFF, 14).unwrap();

        let mut a = BitWriter::new();
        a.write_bool(true);
        a.write_packed(packed);

        let mut b = BitWriter::new();
        b.write_bool(true);
        b.write_bits(3, 2).unwrap();
        b.write_bits(1, 1).unwrap();
        b.write_bits(0x3FFF, 14).unwrap();

        assert_eq!(a.finish(), b.finish());
    }
}
