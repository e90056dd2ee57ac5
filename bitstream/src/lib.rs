//! Bit packing primitives for the infosync entity-info encoder.
//!
//! This crate provides [`BitWriter`], [`ScopedBitWriter`], [`PackedBits`] and
//! [`BitReader`] for bit-level encoding and decoding.
//!
//! # Design Principles
//!
//! - **No unsafe code** - Safety is paramount.
//! - **Bounded operations** - All reads are bounds-checked.
//! - **No domain knowledge** - This crate knows nothing about entities or coordinates.
//! - **Identical output** - A field sequence written through [`PackedBits`] produces
//!   the same bits as writing it directly.
//!
//! # Example
//!
//! ```
//! use bitstream::{BitReader, BitWriter};
//!
//! let mut writer = BitWriter::new();
//! writer.write_bool(true);
//! writer.write_bits(42, 7).unwrap();
//!
//! let bytes = writer.finish();
//!
//! let mut reader = BitReader::new(&bytes);
//! assert_eq!(reader.read_bool().unwrap(), true);
//! assert_eq!(reader.read_bits(7).unwrap(), 42);
//! ```

mod error;
mod packed;
mod reader;
mod writer;

pub use error::{BitError, BitResult};
pub use packed::PackedBits;
pub use reader::BitReader;
pub use writer::{BitWriter, ScopedBitWriter, MAX_FIELD_BITS};
