//! Hash-derived slot computation for dynamic arrays, mappings, and struct
//! fields.
//!
//! Solidity stores a dynamic array's length at its declared slot and its data
//! at `keccak256(slot)`; a mapping stores nothing at its declared slot and
//! each value at `keccak256(key ++ slot)` with both pre-image halves padded
//! to exact 32-byte words, *key first*. Struct fields are plain slot
//! additions on top of whichever base the struct resolved to. The two hash
//! paths differ only in how the pre-image is assembled, so both go through
//! one [`derive`] helper.

use crate::errors::LayoutError;
use crate::layout::SlotLocation;
use alloy_primitives::{Address, Keccak256, B256, U256};

/// A mapping key, encodable as a canonical 32-byte word.
///
/// Keys hash as left-zero-padded words: integers big-endian, addresses in
/// the low 20 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapKey {
    /// Unsigned integer key of any declared width
    Uint(U256),
    /// Address key
    Address(Address),
}

impl MapKey {
    /// The key's 32-byte pre-image word.
    pub fn to_word(self) -> B256 {
        match self {
            MapKey::Uint(v) => B256::from(v.to_be_bytes()),
            MapKey::Address(a) => {
                let mut padded = [0u8; 32];
                padded[12..32].copy_from_slice(a.as_slice());
                B256::from(padded)
            }
        }
    }
}

impl From<U256> for MapKey {
    fn from(v: U256) -> Self {
        MapKey::Uint(v)
    }
}

impl From<u64> for MapKey {
    fn from(v: u64) -> Self {
        MapKey::Uint(U256::from(v))
    }
}

impl From<Address> for MapKey {
    fn from(a: Address) -> Self {
        MapKey::Address(a)
    }
}

/// Hash a pre-image assembled by `build` into a slot index.
fn derive<F: FnOnce(&mut Keccak256)>(build: F) -> U256 {
    let mut hasher = Keccak256::new();
    build(&mut hasher);
    U256::from_be_bytes(hasher.finalize().0)
}

/// First data slot of a dynamic array declared at `base_slot`.
///
/// For `uint256[] values` at slot 6: `values[0]` lives at
/// `keccak256(uint256(6))`, `values[1]` at that slot plus one.
pub fn array_data_slot(base_slot: U256) -> U256 {
    derive(|hasher| hasher.update(B256::from(base_slot.to_be_bytes())))
}

/// Slot delta and byte offset of the `index`-th element packed at
/// `elem_width` bytes apiece, `floor(32 / elem_width)` per slot.
fn packed_element(index: u64, elem_width: u8) -> (u64, u8) {
    let per_slot = (32 / elem_width) as u64;
    (index / per_slot, (index % per_slot) as u8 * elem_width)
}

/// Location of a dynamic array element with a value-typed element.
///
/// Elements narrower than a word pack several to a slot; 32-byte elements
/// occupy `data + index` directly.
pub fn array_element_location(base_slot: U256, index: u64, elem_width: u8) -> SlotLocation {
    let (delta, offset) = packed_element(index, elem_width);
    SlotLocation {
        slot: array_data_slot(base_slot) + U256::from(delta),
        offset,
        width: elem_width,
    }
}

/// Base slot of a dynamic array element that spans `elem_span` whole slots
/// (struct elements): `data + index * elem_span`.
pub fn array_struct_element_slot(base_slot: U256, index: u64, elem_span: U256) -> U256 {
    array_data_slot(base_slot) + U256::from(index) * elem_span
}

/// Slot of a mapping value: `keccak256(key_word ++ slot_word)`.
///
/// The key comes first in the pre-image; both halves are exact 32-byte
/// words.
pub fn map_value_slot(base_slot: U256, key: MapKey) -> U256 {
    derive(|hasher| {
        hasher.update(key.to_word());
        hasher.update(B256::from(base_slot.to_be_bytes()));
    })
}

/// Absolute location of a struct field given the struct's resolved base slot
/// and the field's relative location from the struct's local layout. Plain
/// addition, no hashing: struct storage is contiguous once its base is
/// fixed, whether that base came from a plain declaration or a derived slot.
pub fn struct_field_slot(base_slot: U256, relative: SlotLocation) -> SlotLocation {
    SlotLocation {
        slot: base_slot + relative.slot,
        offset: relative.offset,
        width: relative.width,
    }
}

/// Location of a static array element: the same per-slot packing arithmetic
/// as dynamic arrays, relative to the declaration's own slot, with no hash.
pub fn static_element_location(
    base_slot: U256,
    index: u64,
    elem_width: u8,
) -> Result<SlotLocation, LayoutError> {
    if elem_width == 0 || elem_width > 32 {
        return Err(LayoutError::LayoutMismatch { offset: 0, width: elem_width });
    }
    let (delta, offset) = packed_element(index, elem_width);
    Ok(SlotLocation { slot: base_slot + U256::from(delta), offset, width: elem_width })
}
