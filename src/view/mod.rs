//! Typed read-side projection over a contract's storage.
//!
//! [`StorageView`] ties together a planned [`Layout`], a contract address,
//! and an injected [`StorageReader`]; every read resolves a location (hashing
//! through `derived` when the variable is dynamic), fetches one raw word, and
//! decodes it through the codec. No caching, no mutation: writes belong to
//! whatever owns the store.
//!
//! # Usage
//! ```ignore
//! let layout = layout::plan(&declarations, U256::ZERO)?;
//! let view = StorageView::new(contract, &layout, &reader);
//! let owner = view.read_scalar("owner")?;
//! let holder = view.read_map_value("holders", 0u64.into())?;
//! ```

use crate::codec::{self, Value};
use crate::derived::{self, MapKey};
use crate::errors::LayoutError;
use crate::layout::{Layout, LayoutEntry, SlotLocation, TypeKind};
use alloy_primitives::{Address, B256, U256};
use tracing::trace;

/// Trait for reading contract storage slots.
///
/// In production: implemented over whatever state database or RPC endpoint
/// holds the contract's storage. In tests: an in-memory map.
pub trait StorageReader {
    /// Read a storage slot value from a contract address.
    /// Returns None if the contract or slot doesn't exist.
    fn read_storage(&self, address: Address, slot: U256) -> Option<B256>;
}

/// Read-only typed view of one contract's storage under one layout.
///
/// Holds references only; concurrent callers may share a `Layout` and issue
/// reads without coordination.
pub struct StorageView<'a, R: StorageReader> {
    contract: Address,
    layout: &'a Layout,
    reader: &'a R,
}

impl<'a, R: StorageReader> StorageView<'a, R> {
    /// Create a view of `contract` under `layout`, reading through `reader`.
    pub fn new(contract: Address, layout: &'a Layout, reader: &'a R) -> Self {
        Self { contract, layout, reader }
    }

    /// The layout this view resolves against.
    pub fn layout(&self) -> &Layout {
        self.layout
    }

    /// Read a scalar (value-typed) variable.
    pub fn read_scalar(&self, name: &str) -> Result<Value, LayoutError> {
        let entry = self.layout.entry(name)?;
        if !entry.declaration.kind.is_value_type() {
            return Err(LayoutError::KindMismatch {
                name: name.to_string(),
                expected: "a scalar value",
            });
        }
        self.read_at(entry.location, &entry.declaration.kind)
    }

    /// Read a dynamic array's length word at its base slot.
    pub fn read_array_len(&self, name: &str) -> Result<U256, LayoutError> {
        let entry = self.layout.entry(name)?;
        match &entry.declaration.kind {
            TypeKind::DynamicArray { .. } => {
                codec::decode_uint(self.fetch(entry.location.slot), 0, 32)
            }
            _ => Err(LayoutError::KindMismatch {
                name: name.to_string(),
                expected: "a dynamic array",
            }),
        }
    }

    /// Read a value-typed element of a dynamic or static array.
    ///
    /// Dynamic elements live at the hashed data slot; static elements sit in
    /// the declaration's own slots. Struct elements go through
    /// [`Self::read_array_struct_field`].
    pub fn read_array_element(&self, name: &str, index: u64) -> Result<Value, LayoutError> {
        let entry = self.layout.entry(name)?;
        match &entry.declaration.kind {
            TypeKind::DynamicArray { elem } => {
                let width = element_width(name, elem)?;
                let location = derived::array_element_location(entry.location.slot, index, width);
                trace!(name, index, slot = %location.slot, "resolved dynamic array element");
                self.read_at(location, elem)
            }
            TypeKind::StaticArray { elem, len } => {
                if index >= *len {
                    return Err(LayoutError::IndexOutOfBounds {
                        name: name.to_string(),
                        index,
                        len: *len,
                    });
                }
                let width = element_width(name, elem)?;
                let location =
                    derived::static_element_location(entry.location.slot, index, width)?;
                self.read_at(location, elem)
            }
            _ => Err(LayoutError::KindMismatch {
                name: name.to_string(),
                expected: "an array",
            }),
        }
    }

    /// Read a value-typed mapping entry under `key`.
    pub fn read_map_value(&self, name: &str, key: MapKey) -> Result<Value, LayoutError> {
        let entry = self.layout.entry(name)?;
        match &entry.declaration.kind {
            TypeKind::Mapping { key: declared, value } => {
                check_map_key(name, declared, key)?;
                let width = value.value_width().ok_or_else(|| LayoutError::KindMismatch {
                    name: name.to_string(),
                    expected: "a mapping with a value-typed value",
                })?;
                let slot = derived::map_value_slot(entry.location.slot, key);
                trace!(name, slot = %slot, "resolved mapping value slot");
                self.read_at(SlotLocation { slot, offset: 0, width }, value)
            }
            _ => Err(LayoutError::KindMismatch {
                name: name.to_string(),
                expected: "a mapping",
            }),
        }
    }

    /// Read one field of a standalone struct variable.
    pub fn read_struct_field(&self, name: &str, field: &str) -> Result<Value, LayoutError> {
        let entry = self.layout.entry(name)?;
        if !matches!(entry.declaration.kind, TypeKind::Struct { .. }) {
            return Err(LayoutError::KindMismatch {
                name: name.to_string(),
                expected: "a struct",
            });
        }
        let rel = field_entry(inner_layout(entry, name)?, name, field)?;
        let location = derived::struct_field_slot(entry.location.slot, rel.location);
        self.read_at(location, &rel.declaration.kind)
    }

    /// Read one field of a struct stored as a mapping value: resolve the
    /// keyed base slot, then add the field's relative offset.
    pub fn read_map_struct_field(
        &self,
        name: &str,
        key: MapKey,
        field: &str,
    ) -> Result<Value, LayoutError> {
        let entry = self.layout.entry(name)?;
        match &entry.declaration.kind {
            TypeKind::Mapping { key: declared, value } if matches!(**value, TypeKind::Struct { .. }) => {
                check_map_key(name, declared, key)?;
                let base = derived::map_value_slot(entry.location.slot, key);
                let rel = field_entry(inner_layout(entry, name)?, name, field)?;
                let location = derived::struct_field_slot(base, rel.location);
                self.read_at(location, &rel.declaration.kind)
            }
            _ => Err(LayoutError::KindMismatch {
                name: name.to_string(),
                expected: "a struct-valued mapping",
            }),
        }
    }

    /// Read one field of a struct stored as an array element.
    pub fn read_array_struct_field(
        &self,
        name: &str,
        index: u64,
        field: &str,
    ) -> Result<Value, LayoutError> {
        let entry = self.layout.entry(name)?;
        let base = match &entry.declaration.kind {
            TypeKind::DynamicArray { elem } if matches!(**elem, TypeKind::Struct { .. }) => {
                let span = inner_layout(entry, name)?.slot_span();
                derived::array_struct_element_slot(entry.location.slot, index, span)
            }
            TypeKind::StaticArray { elem, len } if matches!(**elem, TypeKind::Struct { .. }) => {
                if index >= *len {
                    return Err(LayoutError::IndexOutOfBounds {
                        name: name.to_string(),
                        index,
                        len: *len,
                    });
                }
                let span = inner_layout(entry, name)?.slot_span();
                entry.location.slot + U256::from(index) * span
            }
            _ => {
                return Err(LayoutError::KindMismatch {
                    name: name.to_string(),
                    expected: "an array of structs",
                })
            }
        };
        let rel = field_entry(inner_layout(entry, name)?, name, field)?;
        let location = derived::struct_field_slot(base, rel.location);
        self.read_at(location, &rel.declaration.kind)
    }

    /// Fetch one raw word; never-written slots read as the zero word.
    fn fetch(&self, slot: U256) -> B256 {
        self.reader.read_storage(self.contract, slot).unwrap_or(B256::ZERO)
    }

    fn read_at(&self, location: SlotLocation, kind: &TypeKind) -> Result<Value, LayoutError> {
        let word = self.fetch(location.slot);
        codec::decode_value(word, location, kind)
    }
}

fn element_width(name: &str, elem: &TypeKind) -> Result<u8, LayoutError> {
    elem.value_width().ok_or_else(|| LayoutError::KindMismatch {
        name: name.to_string(),
        expected: "an array of value-typed elements",
    })
}

fn inner_layout<'b>(entry: &'b LayoutEntry, name: &str) -> Result<&'b Layout, LayoutError> {
    entry.inner.as_deref().ok_or_else(|| LayoutError::KindMismatch {
        name: name.to_string(),
        expected: "a struct-bearing declaration",
    })
}

fn field_entry<'b>(
    inner: &'b Layout,
    name: &str,
    field: &str,
) -> Result<&'b LayoutEntry, LayoutError> {
    inner.get(field).ok_or_else(|| LayoutError::UnknownField {
        name: name.to_string(),
        field: field.to_string(),
    })
}

/// The key must match the declared key kind, including the declared integer
/// width: mapping keys narrower than 256 bits still hash as full words, but
/// a key value outside the declared range can never occur on-chain.
fn check_map_key(name: &str, declared: &TypeKind, key: MapKey) -> Result<(), LayoutError> {
    match (declared, key) {
        (TypeKind::Uint { bits }, MapKey::Uint(v)) => {
            codec::encode_uint(v, *bits)?;
            Ok(())
        }
        (TypeKind::Address, MapKey::Address(_)) => Ok(()),
        _ => Err(LayoutError::KindMismatch {
            name: name.to_string(),
            expected: "keyed by its declared key kind",
        }),
    }
}
