//! Allocation-free bit fragments held in a single `u64`.

use crate::error::{BitError, BitResult};
use crate::writer::MAX_FIELD_BITS;

/// A short run of bits stored inline in one `u64`.
///
/// The low 56 bits hold the payload (right-aligned, first field most
/// significant) and the high 8 bits hold the length. Fragments are `Copy`
/// and never allocate, which makes them suitable for per-entity movement
/// codes that are copied into thousands of observer buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PackedBits(u64);

impl PackedBits {
    /// Maximum payload length in bits.
    pub const CAPACITY: u8 = 50;

    const LEN_SHIFT: u32 = 56;
    const PAYLOAD_MASK: u64 = (1u64 << Self::LEN_SHIFT) - 1;

    /// Creates an empty fragment.
    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }

    /// Returns the number of bits held.
    #[must_use]
    pub const fn len(self) -> u8 {
        (self.0 >> Self::LEN_SHIFT) as u8
    }

    /// Returns `true` if the fragment holds no bits.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.len() == 0
    }

    /// Returns the payload, right-aligned.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0 & Self::PAYLOAD_MASK
    }

    /// Appends the low `bits` bits of `value`.
    ///
    /// # Errors
    ///
    /// Returns [`BitError::InvalidBitCount`] for fields wider than 32 bits and
    /// [`BitError::PackedOverflow`] if the fragment would exceed
    /// [`CAPACITY`](Self::CAPACITY).
    pub fn push(&mut self, value: u32, bits: u8) -> BitResult<()> {
        if bits > MAX_FIELD_BITS {
            return Err(BitError::InvalidBitCount {
                bits,
                max_bits: MAX_FIELD_BITS,
            });
        }
        let len = self.len();
        if len + bits > Self::CAPACITY {
            return Err(BitError::PackedOverflow {
                len,
                bits,
                capacity: Self::CAPACITY,
            });
        }
        if bits == 0 {
            return Ok(());
        }
        let masked = u64::from(value) & ((1u64 << bits) - 1);
        let payload = (self.value() << bits) | masked;
        self.0 = (u64::from(len + bits) << Self::LEN_SHIFT) | payload;
        Ok(())
    }
}
