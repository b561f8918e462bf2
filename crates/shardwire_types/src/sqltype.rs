//! Storage wire types.

use serde::{Deserialize, Serialize};

const FLAG_IS_INTEGRAL: u32 = 256;
const FLAG_IS_UNSIGNED: u32 = 512;
const FLAG_IS_FLOAT: u32 = 1024;
const FLAG_IS_QUOTED: u32 = 2048;
const FLAG_IS_TEXT: u32 = 4096;
const FLAG_IS_BINARY: u32 = 8192;

/// The type of a column or value as reported by the storage engine.
///
/// Discriminants embed classification flags, so the predicates below are
/// bit tests rather than lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum Type {
    /// SQL NULL.
    Null = 0,
    /// Signed 8-bit integer.
    Int8 = 257,
    /// Unsigned 8-bit integer.
    Uint8 = 770,
    /// Signed 16-bit integer.
    Int16 = 259,
    /// Unsigned 16-bit integer.
    Uint16 = 772,
    /// Signed 24-bit integer.
    Int24 = 261,
    /// Unsigned 24-bit integer.
    Uint24 = 774,
    /// Signed 32-bit integer.
    Int32 = 263,
    /// Unsigned 32-bit integer.
    Uint32 = 776,
    /// Signed 64-bit integer.
    Int64 = 265,
    /// Unsigned 64-bit integer.
    Uint64 = 778,
    /// 32-bit float.
    Float32 = 1035,
    /// 64-bit float.
    Float64 = 1036,
    /// Timestamp.
    Timestamp = 2061,
    /// Date.
    Date = 2062,
    /// Time of day.
    Time = 2063,
    /// Date and time.
    Datetime = 2064,
    /// Year.
    Year = 785,
    /// Fixed point decimal.
    Decimal = 18,
    /// Text.
    Text = 6163,
    /// Binary large object.
    Blob = 10260,
    /// Variable length text.
    VarChar = 6165,
    /// Variable length binary.
    VarBinary = 10262,
    /// Fixed length text.
    Char = 6167,
    /// Fixed length binary.
    Binary = 10264,
    /// Bit field.
    Bit = 2073,
    /// Enum.
    Enum = 2074,
    /// Set.
    Set = 2075,
    /// Tuple of values (bind variables only).
    Tuple = 28,
}

impl Type {
    fn flags(self) -> u32 {
        self as u32
    }

    /// Returns true for signed or unsigned integers up to 64 bits.
    pub fn is_integral(self) -> bool {
        self.flags() & FLAG_IS_INTEGRAL == FLAG_IS_INTEGRAL
    }

    /// Returns true for signed integers.
    pub fn is_signed(self) -> bool {
        self.flags() & (FLAG_IS_INTEGRAL | FLAG_IS_UNSIGNED) == FLAG_IS_INTEGRAL
    }

    /// Returns true for unsigned integers. Not the same as `!is_signed()`.
    pub fn is_unsigned(self) -> bool {
        self.flags() & (FLAG_IS_INTEGRAL | FLAG_IS_UNSIGNED)
            == FLAG_IS_INTEGRAL | FLAG_IS_UNSIGNED
    }

    /// Returns true for floating point types.
    pub fn is_float(self) -> bool {
        self.flags() & FLAG_IS_FLOAT == FLAG_IS_FLOAT
    }

    /// Returns true for types whose literals are quoted.
    pub fn is_quoted(self) -> bool {
        self.flags() & FLAG_IS_QUOTED == FLAG_IS_QUOTED
    }

    /// Returns true for text types.
    pub fn is_text(self) -> bool {
        self.flags() & FLAG_IS_TEXT == FLAG_IS_TEXT
    }

    /// Returns true for binary types.
    pub fn is_binary(self) -> bool {
        self.flags() & FLAG_IS_BINARY == FLAG_IS_BINARY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(Type::Int64.is_integral());
        assert!(Type::Int64.is_signed());
        assert!(!Type::Int64.is_unsigned());
        assert!(Type::Uint64.is_unsigned());
        assert!(!Type::Uint64.is_signed());
        assert!(Type::Year.is_unsigned());
        assert!(Type::Float64.is_float());
        assert!(!Type::Float64.is_integral());
        assert!(Type::VarBinary.is_binary());
        assert!(Type::VarBinary.is_quoted());
        assert!(Type::VarChar.is_text());
        assert!(!Type::Decimal.is_quoted());
        assert!(!Type::Null.is_integral());
    }
}
