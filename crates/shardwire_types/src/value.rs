//! Typed storage values and bind variables.

use crate::sqltype::Type;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A storage value: a type tag plus the raw bytes the storage engine sent.
///
/// Numbers are carried in their decimal text form, exactly as the storage
/// wire protocol does, so `raw()` is stable for hashing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Value {
    ty: Type,
    raw: Vec<u8>,
}

impl Value {
    /// Creates a value from a type and raw bytes.
    pub fn new(ty: Type, raw: impl Into<Vec<u8>>) -> Self {
        Self {
            ty,
            raw: raw.into(),
        }
    }

    /// The SQL NULL value.
    pub fn null() -> Self {
        Self::new(Type::Null, Vec::new())
    }

    /// Creates a signed 64-bit integer value.
    pub fn from_i64(v: i64) -> Self {
        Self::new(Type::Int64, v.to_string().into_bytes())
    }

    /// Creates an unsigned 64-bit integer value.
    pub fn from_u64(v: u64) -> Self {
        Self::new(Type::Uint64, v.to_string().into_bytes())
    }

    /// Creates a VARCHAR value.
    pub fn from_text(s: &str) -> Self {
        Self::new(Type::VarChar, s.as_bytes().to_vec())
    }

    /// Creates a VARBINARY value.
    pub fn from_bytes(b: &[u8]) -> Self {
        Self::new(Type::VarBinary, b.to_vec())
    }

    /// Returns the type of the value.
    pub fn ty(&self) -> Type {
        self.ty
    }

    /// Returns the raw bytes of the value.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Returns true for SQL NULL.
    pub fn is_null(&self) -> bool {
        self.ty == Type::Null
    }

    /// Parses an integral value as `u64`.
    ///
    /// Returns `None` for non-integral types and for negative numbers.
    pub fn to_u64(&self) -> Option<u64> {
        if !self.ty.is_integral() {
            return None;
        }
        std::str::from_utf8(&self.raw).ok()?.parse().ok()
    }

    /// Parses an integral value as `i64`.
    pub fn to_i64(&self) -> Option<i64> {
        if !self.ty.is_integral() {
            return None;
        }
        std::str::from_utf8(&self.raw).ok()?.parse().ok()
    }
}

/// A bind variable: a single value or a list (for `IN` clauses).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BindValue {
    /// A scalar value.
    Scalar(Value),
    /// A list of values.
    List(Vec<Value>),
}

impl From<Value> for BindValue {
    fn from(v: Value) -> Self {
        BindValue::Scalar(v)
    }
}

impl From<i64> for BindValue {
    fn from(v: i64) -> Self {
        BindValue::Scalar(Value::from_i64(v))
    }
}

impl From<&str> for BindValue {
    fn from(v: &str) -> Self {
        BindValue::Scalar(Value::from_text(v))
    }
}

/// Named bind variables, ordered by name.
pub type BindVars = BTreeMap<String, BindValue>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_parsing() {
        assert_eq!(Value::from_u64(42).to_u64(), Some(42));
        assert_eq!(Value::from_i64(-5).to_i64(), Some(-5));
        assert_eq!(Value::from_i64(-5).to_u64(), None);
        assert_eq!(Value::from_text("42").to_u64(), None);
    }

    #[test]
    fn raw_bytes() {
        assert_eq!(Value::from_bytes(b"abc").raw(), b"abc");
        assert_eq!(Value::from_i64(12).raw(), b"12");
        assert!(Value::null().is_null());
    }
}
