//! Storage layout model: variable declarations and their planned slot
//! positions.
//!
//! A contract's persistent variables are described by an ordered
//! [`Declaration`] table (produced by whatever front-end parses the contract
//! source; typically consumed here as JSON). [`plan`] turns that table into an
//! immutable [`Layout`] mapping every variable to its `(slot, offset, width)`
//! position under the Solidity packing rules:
//!
//! - values pack into the current slot in declaration order, as long as they
//!   fit entirely in the remaining bytes;
//! - dynamic arrays, mappings, structs, and static arrays always open a fresh
//!   slot and close it behind them;
//! - no value is ever split across two slots.

pub mod planner;

pub use planner::plan;

use crate::errors::LayoutError;
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The recognized variable type kinds.
///
/// Value kinds (`Uint`, `Address`, `FixedBytes`, `Bool`) occupy `width` bytes
/// and pack; the rest reserve whole slots. `Struct` owns its fields in
/// declaration order and packs them in a local slot space starting at 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum TypeKind {
    /// Unsigned integer of the declared bit-width (8..=256, multiple of 8)
    Uint {
        /// Declared bit-width
        bits: u16,
    },
    /// 20-byte account address
    Address,
    /// Fixed-size byte array `bytesN`, 1..=32 bytes, left-aligned in its word
    FixedBytes {
        /// Byte length N
        len: u8,
    },
    /// Single-byte boolean
    Bool,
    /// Dynamically-sized array; length word at the base slot, data at
    /// `keccak256(base)`
    DynamicArray {
        /// Element type
        elem: Box<TypeKind>,
    },
    /// Key-value mapping; values at `keccak256(key ++ base)`
    Mapping {
        /// Key type (uint or address)
        key: Box<TypeKind>,
        /// Value type
        value: Box<TypeKind>,
    },
    /// Struct with fields packed in a local 0-based slot space
    Struct {
        /// Fields in declaration order
        fields: Vec<Declaration>,
    },
    /// Fixed-length array occupying whole slots of its own
    StaticArray {
        /// Element type
        elem: Box<TypeKind>,
        /// Declared element count
        len: u64,
    },
}

/// How a kind participates in packing.
pub(crate) enum WidthClass {
    /// Packs into shared slots with the given byte width
    Value(u8),
    /// One full slot holding a length word or nothing; data lives at a
    /// hash-derived slot (dynamic arrays, mappings)
    Reference,
    /// Contiguous run of whole slots (structs, static arrays)
    Aggregate,
}

impl TypeKind {
    /// Classify this kind for the packer, validating it in the process.
    pub(crate) fn width_class(&self) -> Result<WidthClass, LayoutError> {
        match self {
            TypeKind::Uint { bits } => {
                if *bits == 0 || *bits > 256 || bits % 8 != 0 {
                    return Err(LayoutError::UnsupportedType(format!(
                        "uint{bits} is not a legal integer width"
                    )));
                }
                Ok(WidthClass::Value((bits / 8) as u8))
            }
            TypeKind::Address => Ok(WidthClass::Value(20)),
            TypeKind::FixedBytes { len } => {
                if *len == 0 || *len > 32 {
                    return Err(LayoutError::UnsupportedType(format!(
                        "bytes{len} is not a legal fixed-bytes width"
                    )));
                }
                Ok(WidthClass::Value(*len))
            }
            TypeKind::Bool => Ok(WidthClass::Value(1)),
            TypeKind::DynamicArray { .. } | TypeKind::Mapping { .. } => Ok(WidthClass::Reference),
            TypeKind::Struct { .. } | TypeKind::StaticArray { .. } => Ok(WidthClass::Aggregate),
        }
    }

    /// Whether this kind is a packable value type.
    pub fn is_value_type(&self) -> bool {
        matches!(
            self,
            TypeKind::Uint { .. } | TypeKind::Address | TypeKind::FixedBytes { .. } | TypeKind::Bool
        )
    }

    /// Byte width of a value type; `None` for slot-reference kinds.
    pub fn value_width(&self) -> Option<u8> {
        match self.width_class() {
            Ok(WidthClass::Value(w)) => Some(w),
            _ => None,
        }
    }
}

/// One contract-level (or struct field) variable declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    /// Variable name, unique within its declaration table
    pub name: String,
    /// The declared type
    #[serde(flatten)]
    pub kind: TypeKind,
}

impl Declaration {
    /// Create a declaration.
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self { name: name.into(), kind }
    }
}

/// A variable's planned position: slot, byte offset, and byte width.
///
/// `offset` counts from the least-significant end of the 32-byte word, which
/// is the direction Solidity packs in: the first variable sharing a slot
/// occupies its low-order bytes. Invariant: `offset + width <= 32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotLocation {
    /// Slot index
    pub slot: U256,
    /// Byte offset from the least-significant end
    pub offset: u8,
    /// Field width in bytes (32 for whole-slot declarations)
    pub width: u8,
}

/// A planned declaration: the declaration itself, its location, and (for
/// struct-bearing declarations) the struct's relative layout.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutEntry {
    /// The declaration this entry was planned from
    pub declaration: Declaration,
    /// Slot, offset, and width assigned by the planner
    pub location: SlotLocation,
    /// Relative (0-based) layout of the struct type reachable through this
    /// declaration: the struct itself, a struct array element, or a struct
    /// mapping value. Built once at plan time so reads never recompute it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inner: Option<Box<Layout>>,
}

/// An immutable, ordered, name-indexed layout built once per declaration
/// table. Concurrent readers may share one `Layout` freely.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    entries: Vec<LayoutEntry>,
    #[serde(skip)]
    index: HashMap<String, usize>,
    slot_span: U256,
}

impl Layout {
    pub(crate) fn from_parts(entries: Vec<LayoutEntry>, slot_span: U256) -> Result<Self, LayoutError> {
        let mut index = HashMap::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            if index.insert(entry.declaration.name.clone(), i).is_some() {
                return Err(LayoutError::UnsupportedType(format!(
                    "duplicate declaration `{}`",
                    entry.declaration.name
                )));
            }
        }
        Ok(Self { entries, index, slot_span })
    }

    /// Look up a variable by name.
    pub fn get(&self, name: &str) -> Option<&LayoutEntry> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    /// Look up a variable by name, failing with `UnknownVariable`.
    pub fn entry(&self, name: &str) -> Result<&LayoutEntry, LayoutError> {
        self.get(name).ok_or_else(|| LayoutError::UnknownVariable { name: name.to_string() })
    }

    /// All entries in declaration order.
    pub fn entries(&self) -> &[LayoutEntry] {
        &self.entries
    }

    /// Number of declarations in the layout.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the layout has no declarations.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of slots this layout covers from its start slot; a trailing
    /// partially-filled slot counts whole. For a struct's relative layout
    /// this is the element stride in slots.
    pub fn slot_span(&self) -> U256 {
        self.slot_span
    }
}
