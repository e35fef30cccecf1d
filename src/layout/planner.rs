//! The slot packing algorithm.
//!
//! Walks a declaration table in order, maintaining the current slot and its
//! used byte count. Value types pack into the remaining bytes of the current
//! slot when they fit entirely; everything else opens a fresh slot. Struct
//! fields are planned recursively in a local slot space starting at 0, so a
//! struct type's relative layout is built exactly once no matter how many
//! reads later resolve against it.

use super::{Declaration, Layout, LayoutEntry, SlotLocation, TypeKind, WidthClass};
use crate::errors::LayoutError;
use alloy_primitives::U256;
use tracing::debug;

/// Build a [`Layout`] for an ordered declaration table starting at
/// `start_slot`.
///
/// Fails with `UnsupportedType` for malformed declarations: illegal integer
/// or fixed-bytes widths, empty structs, zero-length static arrays,
/// non-value mapping keys, unsupported element kinds, or duplicate names.
pub fn plan(declarations: &[Declaration], start_slot: U256) -> Result<Layout, LayoutError> {
    let mut entries = Vec::with_capacity(declarations.len());
    let mut current = start_slot;
    let mut used: u8 = 0;

    for decl in declarations {
        let entry = match decl.kind.width_class()? {
            WidthClass::Value(width) => {
                if used + width > 32 {
                    current += U256::from(1);
                    used = 0;
                }
                let location = SlotLocation { slot: current, offset: used, width };
                used += width;
                // An exact fill closes the slot for the next declaration.
                if used == 32 {
                    current += U256::from(1);
                    used = 0;
                }
                LayoutEntry { declaration: decl.clone(), location, inner: None }
            }
            WidthClass::Reference => {
                if used > 0 {
                    current += U256::from(1);
                    used = 0;
                }
                let location = SlotLocation { slot: current, offset: 0, width: 32 };
                current += U256::from(1);
                let inner = reachable_struct_layout(&decl.kind)?;
                LayoutEntry { declaration: decl.clone(), location, inner }
            }
            WidthClass::Aggregate => {
                if used > 0 {
                    current += U256::from(1);
                    used = 0;
                }
                let location = SlotLocation { slot: current, offset: 0, width: 32 };
                let inner = reachable_struct_layout(&decl.kind)?;
                current += aggregate_span(&decl.kind, inner.as_deref())?;
                LayoutEntry { declaration: decl.clone(), location, inner }
            }
        };
        entries.push(entry);
    }

    let slot_span = if used > 0 {
        current + U256::from(1) - start_slot
    } else {
        current - start_slot
    };
    let layout = Layout::from_parts(entries, slot_span)?;
    debug!(
        declarations = declarations.len(),
        slots = %layout.slot_span(),
        "planned storage layout"
    );
    Ok(layout)
}

/// Relative layout of the struct type reachable through a declaration, if
/// any: the struct itself, a struct array element, or a struct mapping
/// value. Also validates element and key kinds along the way.
fn reachable_struct_layout(kind: &TypeKind) -> Result<Option<Box<Layout>>, LayoutError> {
    match kind {
        TypeKind::Struct { fields } => {
            if fields.is_empty() {
                return Err(LayoutError::UnsupportedType("empty struct".to_string()));
            }
            Ok(Some(Box::new(plan(fields, U256::ZERO)?)))
        }
        TypeKind::DynamicArray { elem } | TypeKind::StaticArray { elem, .. } => match &**elem {
            TypeKind::Struct { .. } => reachable_struct_layout(elem),
            e if e.is_value_type() => {
                e.width_class()?;
                Ok(None)
            }
            e => Err(LayoutError::UnsupportedType(format!(
                "array element kind {e:?} is not supported"
            ))),
        },
        TypeKind::Mapping { key, value } => {
            match &**key {
                TypeKind::Uint { .. } | TypeKind::Address => {
                    key.width_class()?;
                }
                k => {
                    return Err(LayoutError::UnsupportedType(format!(
                        "mapping key kind {k:?} is not supported"
                    )))
                }
            }
            match &**value {
                TypeKind::Struct { .. } | TypeKind::Mapping { .. } => {
                    reachable_struct_layout(value)
                }
                v if v.is_value_type() => {
                    v.width_class()?;
                    Ok(None)
                }
                v => Err(LayoutError::UnsupportedType(format!(
                    "mapping value kind {v:?} is not supported"
                ))),
            }
        }
        _ => Ok(None),
    }
}

/// Number of whole slots an aggregate declaration reserves.
fn aggregate_span(kind: &TypeKind, inner: Option<&Layout>) -> Result<U256, LayoutError> {
    match kind {
        TypeKind::Struct { .. } => {
            // Set by reachable_struct_layout for every struct declaration.
            match inner {
                Some(rel) => Ok(rel.slot_span()),
                None => Err(LayoutError::UnsupportedType("empty struct".to_string())),
            }
        }
        TypeKind::StaticArray { elem, len } => {
            if *len == 0 {
                return Err(LayoutError::UnsupportedType(
                    "zero-length static array".to_string(),
                ));
            }
            match (&**elem, inner) {
                (TypeKind::Struct { .. }, Some(rel)) => Ok(rel.slot_span() * U256::from(*len)),
                (e, _) => match e.value_width() {
                    Some(width) => {
                        let per_slot = (32 / width) as u64;
                        Ok(U256::from((len + per_slot - 1) / per_slot))
                    }
                    None => Err(LayoutError::UnsupportedType(format!(
                        "array element kind {e:?} is not supported"
                    ))),
                },
            }
        }
        k => Err(LayoutError::UnsupportedType(format!(
            "{k:?} is not an aggregate kind"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(entry: &LayoutEntry) -> (u64, u8, u8) {
        (
            entry.location.slot.to::<u64>(),
            entry.location.offset,
            entry.location.width,
        )
    }

    // =========================================================================
    // Basic packing
    // =========================================================================

    #[test]
    fn test_packing_fills_slot_then_opens_next() {
        // 10 + 10 + 10 + 2 bytes fill slot 0 exactly; the fifth scalar opens
        // slot 1.
        let decls = vec![
            Declaration::new("a", TypeKind::Uint { bits: 80 }),
            Declaration::new("b", TypeKind::Uint { bits: 80 }),
            Declaration::new("c", TypeKind::Uint { bits: 80 }),
            Declaration::new("d", TypeKind::Uint { bits: 16 }),
            Declaration::new("e", TypeKind::Uint { bits: 8 }),
        ];
        let layout = plan(&decls, U256::ZERO).unwrap();

        assert_eq!(loc(layout.entry("a").unwrap()), (0, 0, 10));
        assert_eq!(loc(layout.entry("b").unwrap()), (0, 10, 10));
        assert_eq!(loc(layout.entry("c").unwrap()), (0, 20, 10));
        assert_eq!(loc(layout.entry("d").unwrap()), (0, 30, 2));
        assert_eq!(loc(layout.entry("e").unwrap()), (1, 0, 1));
        assert_eq!(layout.slot_span(), U256::from(2));
    }

    #[test]
    fn test_uint80_bool_address_share_slot_zero() {
        let decls = vec![
            Declaration::new("u80", TypeKind::Uint { bits: 80 }),
            Declaration::new("flag", TypeKind::Bool),
            Declaration::new("owner", TypeKind::Address),
        ];
        let layout = plan(&decls, U256::ZERO).unwrap();

        assert_eq!(loc(layout.entry("u80").unwrap()), (0, 0, 10));
        assert_eq!(loc(layout.entry("flag").unwrap()), (0, 10, 1));
        assert_eq!(loc(layout.entry("owner").unwrap()), (0, 11, 20));
        assert_eq!(layout.slot_span(), U256::from(1));
    }

    #[test]
    fn test_value_never_split_across_slots() {
        // 20 + 20 cannot share a slot.
        let decls = vec![
            Declaration::new("a", TypeKind::Address),
            Declaration::new("b", TypeKind::Address),
        ];
        let layout = plan(&decls, U256::ZERO).unwrap();
        assert_eq!(loc(layout.entry("a").unwrap()), (0, 0, 20));
        assert_eq!(loc(layout.entry("b").unwrap()), (1, 0, 20));
    }

    #[test]
    fn test_exact_fill_closes_slot_for_next_declaration() {
        let decls = vec![
            Declaration::new("lo", TypeKind::Uint { bits: 128 }),
            Declaration::new("hi", TypeKind::Uint { bits: 128 }),
            Declaration::new("next", TypeKind::Bool),
        ];
        let layout = plan(&decls, U256::ZERO).unwrap();
        assert_eq!(loc(layout.entry("lo").unwrap()), (0, 0, 16));
        assert_eq!(loc(layout.entry("hi").unwrap()), (0, 16, 16));
        assert_eq!(loc(layout.entry("next").unwrap()), (1, 0, 1));
    }

    #[test]
    fn test_full_word_never_shares() {
        let decls = vec![
            Declaration::new("flag", TypeKind::Bool),
            Declaration::new("hash", TypeKind::FixedBytes { len: 32 }),
            Declaration::new("tail", TypeKind::Bool),
        ];
        let layout = plan(&decls, U256::ZERO).unwrap();
        assert_eq!(loc(layout.entry("flag").unwrap()), (0, 0, 1));
        assert_eq!(loc(layout.entry("hash").unwrap()), (1, 0, 32));
        assert_eq!(loc(layout.entry("tail").unwrap()), (2, 0, 1));

        // Declared first, a full word takes the opening slot whole and the
        // next value starts fresh.
        let decls = vec![
            Declaration::new("hash", TypeKind::FixedBytes { len: 32 }),
            Declaration::new("flag", TypeKind::Bool),
        ];
        let layout = plan(&decls, U256::ZERO).unwrap();
        assert_eq!(loc(layout.entry("hash").unwrap()), (0, 0, 32));
        assert_eq!(loc(layout.entry("flag").unwrap()), (1, 0, 1));
    }

    #[test]
    fn test_start_slot_offsets_everything() {
        let decls = vec![
            Declaration::new("a", TypeKind::Uint { bits: 256 }),
            Declaration::new("b", TypeKind::Bool),
        ];
        let layout = plan(&decls, U256::from(7)).unwrap();
        assert_eq!(loc(layout.entry("a").unwrap()), (7, 0, 32));
        assert_eq!(loc(layout.entry("b").unwrap()), (8, 0, 1));
        assert_eq!(layout.slot_span(), U256::from(2));
    }

    // =========================================================================
    // Fresh-slot kinds
    // =========================================================================

    #[test]
    fn test_mapping_and_array_open_fresh_slots() {
        let decls = vec![
            Declaration::new("flag", TypeKind::Bool),
            Declaration::new(
                "values",
                TypeKind::DynamicArray { elem: Box::new(TypeKind::Uint { bits: 256 }) },
            ),
            Declaration::new(
                "holders",
                TypeKind::Mapping {
                    key: Box::new(TypeKind::Uint { bits: 256 }),
                    value: Box::new(TypeKind::Address),
                },
            ),
            Declaration::new("tail", TypeKind::Bool),
        ];
        let layout = plan(&decls, U256::ZERO).unwrap();
        assert_eq!(loc(layout.entry("flag").unwrap()), (0, 0, 1));
        assert_eq!(loc(layout.entry("values").unwrap()), (1, 0, 32));
        assert_eq!(loc(layout.entry("holders").unwrap()), (2, 0, 32));
        // The slot after a reference kind is fresh even though slot 0 had
        // 31 free bytes.
        assert_eq!(loc(layout.entry("tail").unwrap()), (3, 0, 1));
    }

    #[test]
    fn test_static_array_reserves_whole_slots() {
        // address[3]: one 20-byte element per slot, three slots.
        let decls = vec![
            Declaration::new(
                "operators",
                TypeKind::StaticArray { elem: Box::new(TypeKind::Address), len: 3 },
            ),
            Declaration::new("tail", TypeKind::Bool),
        ];
        let layout = plan(&decls, U256::ZERO).unwrap();
        assert_eq!(loc(layout.entry("operators").unwrap()), (0, 0, 32));
        assert_eq!(loc(layout.entry("tail").unwrap()), (3, 0, 1));
    }

    #[test]
    fn test_static_array_packs_small_elements() {
        // uint64[5]: four elements per slot, so two slots.
        let decls = vec![
            Declaration::new(
                "counters",
                TypeKind::StaticArray { elem: Box::new(TypeKind::Uint { bits: 64 }), len: 5 },
            ),
            Declaration::new("tail", TypeKind::Bool),
        ];
        let layout = plan(&decls, U256::ZERO).unwrap();
        assert_eq!(loc(layout.entry("tail").unwrap()), (2, 0, 1));
    }

    // =========================================================================
    // Struct planning
    // =========================================================================

    fn position_struct() -> TypeKind {
        TypeKind::Struct {
            fields: vec![
                Declaration::new("amount", TypeKind::Uint { bits: 96 }),
                Declaration::new("vault", TypeKind::Address),
                Declaration::new("beneficiary", TypeKind::Address),
                Declaration::new("tag", TypeKind::FixedBytes { len: 4 }),
                Declaration::new("salt", TypeKind::FixedBytes { len: 8 }),
                Declaration::new("cap", TypeKind::Uint { bits: 256 }),
            ],
        }
    }

    #[test]
    fn test_struct_fields_pack_in_local_slot_space() {
        let decls = vec![
            Declaration::new("flag", TypeKind::Bool),
            Declaration::new("position", position_struct()),
            Declaration::new("tail", TypeKind::Bool),
        ];
        let layout = plan(&decls, U256::ZERO).unwrap();

        let entry = layout.entry("position").unwrap();
        assert_eq!(entry.location.slot, U256::from(1));

        let rel = entry.inner.as_deref().unwrap();
        assert_eq!(rel.slot_span(), U256::from(3));

        // Slot 0: uint96 + address fill it exactly (12 + 20).
        assert_eq!(loc(rel.entry("amount").unwrap()), (0, 0, 12));
        assert_eq!(loc(rel.entry("vault").unwrap()), (0, 12, 20));
        // Slot 1: address + bytes4 + bytes8 (20 + 4 + 8).
        assert_eq!(loc(rel.entry("beneficiary").unwrap()), (1, 0, 20));
        assert_eq!(loc(rel.entry("tag").unwrap()), (1, 20, 4));
        assert_eq!(loc(rel.entry("salt").unwrap()), (1, 24, 8));
        // Slot 2: the uint256 gets a slot of its own.
        assert_eq!(loc(rel.entry("cap").unwrap()), (2, 0, 32));

        // The struct consumed slots 1..=3; the next variable starts at 4.
        assert_eq!(loc(layout.entry("tail").unwrap()), (4, 0, 1));
    }

    #[test]
    fn test_struct_array_and_struct_mapping_carry_relative_layout() {
        let decls = vec![
            Declaration::new(
                "positions",
                TypeKind::DynamicArray { elem: Box::new(position_struct()) },
            ),
            Declaration::new(
                "by_amount",
                TypeKind::Mapping {
                    key: Box::new(TypeKind::Uint { bits: 96 }),
                    value: Box::new(position_struct()),
                },
            ),
        ];
        let layout = plan(&decls, U256::ZERO).unwrap();

        for name in ["positions", "by_amount"] {
            let rel = layout.entry(name).unwrap().inner.as_deref().unwrap();
            assert_eq!(rel.slot_span(), U256::from(3), "{name}");
        }
    }

    #[test]
    fn test_static_struct_array_stride() {
        let decls = vec![
            Declaration::new(
                "pair",
                TypeKind::StaticArray { elem: Box::new(position_struct()), len: 2 },
            ),
            Declaration::new("tail", TypeKind::Bool),
        ];
        let layout = plan(&decls, U256::ZERO).unwrap();
        assert_eq!(loc(layout.entry("tail").unwrap()), (6, 0, 1));
    }

    // =========================================================================
    // Rejected declarations
    // =========================================================================

    #[test]
    fn test_rejects_malformed_declarations() {
        let cases = vec![
            Declaration::new("bad", TypeKind::Uint { bits: 7 }),
            Declaration::new("bad", TypeKind::FixedBytes { len: 40 }),
            Declaration::new("bad", TypeKind::Struct { fields: vec![] }),
            Declaration::new(
                "bad",
                TypeKind::StaticArray { elem: Box::new(TypeKind::Bool), len: 0 },
            ),
            Declaration::new(
                "bad",
                TypeKind::Mapping {
                    key: Box::new(TypeKind::Bool),
                    value: Box::new(TypeKind::Address),
                },
            ),
            Declaration::new(
                "bad",
                TypeKind::DynamicArray {
                    elem: Box::new(TypeKind::Mapping {
                        key: Box::new(TypeKind::Address),
                        value: Box::new(TypeKind::Bool),
                    }),
                },
            ),
        ];
        for decl in cases {
            let err = plan(std::slice::from_ref(&decl), U256::ZERO).unwrap_err();
            assert!(
                matches!(err, LayoutError::UnsupportedType(_)),
                "{decl:?} should be rejected, got {err:?}"
            );
        }
    }

    #[test]
    fn test_nested_mapping_value_is_accepted() {
        let decls = vec![Declaration::new(
            "allowance",
            TypeKind::Mapping {
                key: Box::new(TypeKind::Address),
                value: Box::new(TypeKind::Mapping {
                    key: Box::new(TypeKind::Address),
                    value: Box::new(TypeKind::Uint { bits: 256 }),
                }),
            },
        )];
        assert!(plan(&decls, U256::ZERO).is_ok());
    }
}
