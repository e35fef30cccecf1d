//! # Slotscope — Ethereum contract storage layout engine
//!
//! Deterministic computation of storage slot addresses and byte offsets for
//! a contract's persistent variables, and decoding of raw 32-byte storage
//! words back into typed values. Covers packed value types, dynamic arrays,
//! mappings, structs (including struct-in-mapping and struct-in-array), and
//! static arrays, under the Solidity storage layout rules.
//!
//! The crate is a pure library: it computes *where* values live and *what*
//! raw words mean, while the actual word store stays behind the injected
//! [`view::StorageReader`] trait.

pub mod codec;
pub mod derived;
pub mod errors;
pub mod layout;
pub mod view;

pub use codec::Value;
pub use derived::MapKey;
pub use errors::LayoutError;
pub use layout::{plan, Declaration, Layout, SlotLocation, TypeKind};
pub use view::{StorageReader, StorageView};
