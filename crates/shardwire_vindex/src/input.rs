//! Accepted input shapes for vindex mapping.

use shardwire_types::Value;

/// A column value handed to a vindex.
///
/// Each variant documents which shapes it accepts; anything else is an
/// `UnsupportedInput` error rather than a silent default.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VindexInput {
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// A storage value exposing raw bytes.
    Value(Value),
    /// A signed integer.
    Int(i64),
    /// An unsigned integer.
    Uint(u64),
    /// A text string.
    Text(String),
}

impl VindexInput {
    /// Returns the kind name, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            VindexInput::Bytes(_) => "bytes",
            VindexInput::Value(_) => "value",
            VindexInput::Int(_) => "int",
            VindexInput::Uint(_) => "uint",
            VindexInput::Text(_) => "text",
        }
    }

    /// Returns the raw bytes for byte-shaped inputs.
    pub fn raw_bytes(&self) -> Option<&[u8]> {
        match self {
            VindexInput::Bytes(b) => Some(b),
            VindexInput::Value(v) => Some(v.raw()),
            _ => None,
        }
    }

    /// Returns the value as `u64` for integral inputs.
    ///
    /// Negative signed integers are reinterpreted as their two's complement
    /// bit pattern, so every `i64` has a distinct image.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            VindexInput::Uint(v) => Some(*v),
            VindexInput::Int(v) => Some(*v as u64),
            VindexInput::Value(v) if v.ty().is_integral() => {
                v.to_u64().or_else(|| v.to_i64().map(|i| i as u64))
            }
            _ => None,
        }
    }

    /// Returns a canonical byte encoding usable as a lookup key.
    ///
    /// Integers encode as decimal text so that `Int(7)`, `Uint(7)` and an
    /// integral `Value` holding `7` share one lookup row.
    pub fn lookup_key(&self) -> Vec<u8> {
        match self {
            VindexInput::Bytes(b) => b.clone(),
            VindexInput::Value(v) => v.raw().to_vec(),
            VindexInput::Int(v) => v.to_string().into_bytes(),
            VindexInput::Uint(v) => v.to_string().into_bytes(),
            VindexInput::Text(s) => s.as_bytes().to_vec(),
        }
    }
}

impl From<&[u8]> for VindexInput {
    fn from(b: &[u8]) -> Self {
        VindexInput::Bytes(b.to_vec())
    }
}

impl From<Value> for VindexInput {
    fn from(v: Value) -> Self {
        VindexInput::Value(v)
    }
}

impl From<u64> for VindexInput {
    fn from(v: u64) -> Self {
        VindexInput::Uint(v)
    }
}

impl From<i64> for VindexInput {
    fn from(v: i64) -> Self {
        VindexInput::Int(v)
    }
}

impl From<&str> for VindexInput {
    fn from(s: &str) -> Self {
        VindexInput::Text(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_views() {
        assert_eq!(VindexInput::Uint(9).as_u64(), Some(9));
        assert_eq!(VindexInput::Int(-1).as_u64(), Some(u64::MAX));
        assert_eq!(VindexInput::Value(Value::from_u64(12)).as_u64(), Some(12));
        assert_eq!(VindexInput::Value(Value::from_i64(-2)).as_u64(), Some(u64::MAX - 1));
        assert_eq!(VindexInput::Value(Value::from_text("12")).as_u64(), None);
        assert_eq!(VindexInput::Text("12".into()).as_u64(), None);
    }

    #[test]
    fn lookup_keys_agree_across_integer_shapes() {
        let a = VindexInput::Int(7).lookup_key();
        let b = VindexInput::Uint(7).lookup_key();
        let c = VindexInput::Value(Value::from_u64(7)).lookup_key();
        assert_eq!(a, b);
        assert_eq!(b, c);
    }
}
