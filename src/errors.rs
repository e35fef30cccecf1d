use alloy_primitives::U256;
use thiserror::Error;

/// Storage layout and word codec errors.
///
/// All failures in this crate are deterministic and local: a value that does
/// not fit its declared width, a read that falls outside a 32-byte word, or a
/// declaration table the planner cannot accept. There are no transient
/// errors; retry policy belongs to whatever implements the storage accessor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// Value does not fit in its declared bit-width
    #[error("value {value} does not fit in uint{bits}")]
    OutOfRange {
        /// The value that was being encoded
        value: U256,
        /// The declared bit-width
        bits: u16,
    },

    /// A decode was requested for a byte range outside the 32-byte word
    #[error("byte range at offset {offset} with width {width} exceeds the 32-byte word")]
    LayoutMismatch {
        /// Byte offset from the least-significant end
        offset: u8,
        /// Width of the requested field in bytes
        width: u8,
    },

    /// A declaration's type is malformed or not a recognized kind
    #[error("unsupported declaration: {0}")]
    UnsupportedType(String),

    /// A read named a variable the layout does not contain
    #[error("no variable `{name}` in layout")]
    UnknownVariable {
        /// The requested variable name
        name: String,
    },

    /// A struct read named a field the struct does not have
    #[error("struct `{name}` has no field `{field}`")]
    UnknownField {
        /// The struct-typed variable name
        name: String,
        /// The requested field name
        field: String,
    },

    /// An operation was applied to the wrong kind of declaration
    #[error("`{name}` is not {expected}")]
    KindMismatch {
        /// The variable name
        name: String,
        /// What the operation required
        expected: &'static str,
    },

    /// A static array element read past the declared length
    #[error("index {index} out of bounds for `{name}` of length {len}")]
    IndexOutOfBounds {
        /// The array variable name
        name: String,
        /// The requested element index
        index: u64,
        /// The declared array length
        len: u64,
    },
}
