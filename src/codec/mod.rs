//! Encoding and decoding of 32-byte storage words.
//!
//! Two alignment rules coexist in a packed slot and getting them backward
//! silently corrupts every packed struct:
//!
//! - integers, addresses, and booleans are **right-aligned**: the value
//!   occupies the low-order bytes of its field;
//! - fixed-size byte arrays (`bytesN`) are **left-aligned**: the value sits
//!   at the high-order end of its field.
//!
//! The rule lives in one place, [`alignment_of`], and every decode goes
//! through the [`decode_value`] dispatch over [`TypeKind`] rather than
//! re-deriving alignment at call sites.
//!
//! Encoders produce the canonical full-word *value* form: an integer in the
//! low-order bytes, a `bytesN` at the high-order end. A *storage* word holds
//! each field at its packed position instead; [`insert`] performs that
//! placement and the decoders read it back. For right-aligned values at
//! offset 0 the two forms coincide, so `decode(encode(v))` round-trips
//! directly; a `bytesN` narrower than the word always goes through its
//! placement, the same shift the EVM applies when packing a left-aligned
//! value into a slot, which is why a lone `bytes4` occupies the low-order
//! bytes of its slot even though its encoded word is high-aligned.

use crate::errors::LayoutError;
use crate::layout::{SlotLocation, TypeKind};
use alloy_primitives::{Address, Bytes, B256, U256};

/// Which end of its field a value occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    /// Low-order (right-aligned): integers, addresses, booleans
    Low,
    /// High-order (left-aligned): fixed-size byte arrays
    High,
}

/// The alignment rule for a value type kind.
pub fn alignment_of(kind: &TypeKind) -> Alignment {
    match kind {
        TypeKind::FixedBytes { .. } => Alignment::High,
        _ => Alignment::Low,
    }
}

/// A decoded storage value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Unsigned integer of any declared width
    Uint(U256),
    /// 20-byte account address
    Address(Address),
    /// Fixed-size byte array, 1..=32 bytes
    FixedBytes(Bytes),
    /// Boolean
    Bool(bool),
}

fn check_range(offset: u8, width: u8) -> Result<(), LayoutError> {
    if width == 0 || offset as usize + width as usize > 32 {
        return Err(LayoutError::LayoutMismatch { offset, width });
    }
    Ok(())
}

/// Byte range of a field within the big-endian word representation.
///
/// Offsets count from the least-significant end, so a field at offset `o`
/// with width `w` covers bytes `32 - o - w .. 32 - o` of the word.
fn field_range(offset: u8, width: u8) -> std::ops::Range<usize> {
    let hi = 32 - offset as usize - width as usize;
    hi..hi + width as usize
}

/// Encode an unsigned integer into a right-aligned 32-byte word.
///
/// Fails with `OutOfRange` if the value exceeds `2^bits - 1`; never silently
/// truncates.
pub fn encode_uint(value: U256, bits: u16) -> Result<B256, LayoutError> {
    if bits == 0 || bits > 256 {
        return Err(LayoutError::UnsupportedType(format!(
            "uint{bits} is not a legal integer width"
        )));
    }
    if bits < 256 && value > (U256::from(1) << bits as usize) - U256::from(1) {
        return Err(LayoutError::OutOfRange { value, bits });
    }
    Ok(B256::from(value.to_be_bytes()))
}

/// Extract a `width`-byte big-endian integer at `offset` from the
/// least-significant end of the word.
pub fn decode_uint(word: B256, offset: u8, width: u8) -> Result<U256, LayoutError> {
    check_range(offset, width)?;
    let shifted = U256::from_be_bytes(word.0) >> (offset as usize * 8);
    let mask = if width == 32 {
        U256::MAX
    } else {
        (U256::from(1) << (width as usize * 8)) - U256::from(1)
    };
    Ok(shifted & mask)
}

/// Encode an address into a right-aligned (left-zero-padded) 32-byte word.
pub fn encode_address(addr: Address) -> B256 {
    let mut bytes = [0u8; 32];
    bytes[12..32].copy_from_slice(addr.as_slice());
    B256::from(bytes)
}

/// Extract a 20-byte address at `offset` from the least-significant end.
pub fn decode_address(word: B256, offset: u8) -> Result<Address, LayoutError> {
    check_range(offset, 20)?;
    Ok(Address::from_slice(&word[field_range(offset, 20)]))
}

/// Encode a fixed-size byte array into a left-aligned 32-byte word.
pub fn encode_fixed_bytes(bytes: &[u8]) -> Result<B256, LayoutError> {
    if bytes.is_empty() || bytes.len() > 32 {
        return Err(LayoutError::UnsupportedType(format!(
            "bytes{} is not a legal fixed-bytes width",
            bytes.len()
        )));
    }
    let mut out = [0u8; 32];
    out[..bytes.len()].copy_from_slice(bytes);
    Ok(B256::from(out))
}

/// Extract a `len`-byte fixed byte array at `offset` from the
/// least-significant end. The bytes come back in declaration order (the
/// left-aligned value, not an integer).
///
/// This reads the storage form written by [`insert`]; a lone `bytesN`
/// placed at offset 0 therefore sits in the low-order bytes of its word,
/// not where [`encode_fixed_bytes`] puts it in the value form.
pub fn decode_fixed_bytes(word: B256, offset: u8, len: u8) -> Result<Bytes, LayoutError> {
    check_range(offset, len)?;
    Ok(Bytes::copy_from_slice(&word[field_range(offset, len)]))
}

/// Encode a boolean into a 32-byte word (a single low-order byte).
pub fn encode_bool(value: bool) -> B256 {
    let mut bytes = [0u8; 32];
    bytes[31] = value as u8;
    B256::from(bytes)
}

/// True iff the single byte at `offset` is nonzero.
pub fn decode_bool(word: B256, offset: u8) -> Result<bool, LayoutError> {
    check_range(offset, 1)?;
    Ok(word[31 - offset as usize] != 0)
}

/// Write an encoded full-word value into a packed position of an existing
/// word, leaving the other bytes untouched.
///
/// The field bytes are taken from the low-order end of `encoded` for
/// right-aligned values and from the high-order end for left-aligned ones,
/// matching what [`encode_uint`] / [`encode_fixed_bytes`] produce.
pub fn insert(
    word: B256,
    encoded: B256,
    offset: u8,
    width: u8,
    align: Alignment,
) -> Result<B256, LayoutError> {
    check_range(offset, width)?;
    let field: &[u8] = match align {
        Alignment::Low => &encoded[32 - width as usize..],
        Alignment::High => &encoded[..width as usize],
    };
    let mut out = word.0;
    out[field_range(offset, width)].copy_from_slice(field);
    Ok(B256::from(out))
}

/// Decode the field at `location` as a typed value, dispatching on the
/// declared kind.
pub fn decode_value(
    word: B256,
    location: SlotLocation,
    kind: &TypeKind,
) -> Result<Value, LayoutError> {
    match kind {
        TypeKind::Uint { bits } => {
            // The planner derives widths from kinds, so a disagreement here
            // means the location belongs to a different declaration.
            if location.width as u16 * 8 != *bits {
                return Err(LayoutError::LayoutMismatch {
                    offset: location.offset,
                    width: location.width,
                });
            }
            Ok(Value::Uint(decode_uint(word, location.offset, location.width)?))
        }
        TypeKind::Address => Ok(Value::Address(decode_address(word, location.offset)?)),
        TypeKind::FixedBytes { len } => Ok(Value::FixedBytes(decode_fixed_bytes(
            word,
            location.offset,
            *len,
        )?)),
        TypeKind::Bool => Ok(Value::Bool(decode_bool(word, location.offset)?)),
        k => Err(LayoutError::UnsupportedType(format!(
            "{k:?} is not a decodable value kind"
        ))),
    }
}
