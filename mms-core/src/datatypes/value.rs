//! MMS value type
//!
//! Container for data read from or pushed by the IED. Decoders dispatch on
//! the BER tag of each `Data` element to one of these variants; structures
//! and arrays nest recursively (IEC 61850 `AnalogueValue { i, f }` arrives
//! as a two-element structure, `Vector { mag, ang }` as a structure holding
//! an `AnalogueValue`).

use crate::datatypes::bit_string::BitString;
use crate::datatypes::time::{BinaryTime, UtcTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Container class holding data received from or sent to the IED.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MmsValue {
    /// Boolean value
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Unsigned integer
    Uint(u64),
    /// IEEE 754 binary32
    Float32(f32),
    /// IEEE 754 binary64
    Float64(f64),
    /// Bit string
    BitString(BitString),
    /// Octet string
    OctetString(Vec<u8>),
    /// Visible string
    VisibleString(String),
    /// MMS binary-time
    BinaryTime(BinaryTime),
    /// IEC 61850 UtcTime
    UtcTime(UtcTime),
    /// Ordered, possibly heterogeneous fields
    Structure(Vec<MmsValue>),
    /// Homogeneous element list
    Array(Vec<MmsValue>),
}

impl MmsValue {
    /// Boolean content, if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MmsValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Unsigned content; `Int` values convert when non-negative.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            MmsValue::Uint(v) => Some(*v),
            MmsValue::Int(v) if *v >= 0 => Some(*v as u64),
            _ => None,
        }
    }

    /// Signed content; `Uint` values convert when in range.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MmsValue::Int(v) => Some(*v),
            MmsValue::Uint(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// String content, if this is a `VisibleString`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MmsValue::VisibleString(s) => Some(s),
            _ => None,
        }
    }

    /// Bit string content.
    pub fn as_bit_string(&self) -> Option<&BitString> {
        match self {
            MmsValue::BitString(b) => Some(b),
            _ => None,
        }
    }

    /// Structure or array elements.
    pub fn elements(&self) -> Option<&[MmsValue]> {
        match self {
            MmsValue::Structure(v) | MmsValue::Array(v) => Some(v),
            _ => None,
        }
    }

    /// Timestamp in milliseconds since the Unix epoch, for time variants.
    pub fn timestamp_ms(&self) -> Option<i64> {
        match self {
            MmsValue::UtcTime(t) => Some(t.timestamp_ms()),
            MmsValue::BinaryTime(t) => Some(t.timestamp_ms()),
            _ => None,
        }
    }

    /// Collect every numeric leaf in document order. Booleans count as
    /// 0.0/1.0; structures and arrays recurse. Strings, octet strings, bit
    /// strings and timestamps contribute nothing.
    pub fn numeric_leaves(&self) -> Vec<f64> {
        let mut out = Vec::new();
        self.collect_numeric(&mut out);
        out
    }

    fn collect_numeric(&self, out: &mut Vec<f64>) {
        match self {
            MmsValue::Bool(b) => out.push(if *b { 1.0 } else { 0.0 }),
            MmsValue::Int(v) => out.push(*v as f64),
            MmsValue::Uint(v) => out.push(*v as f64),
            MmsValue::Float32(v) => out.push(*v as f64),
            MmsValue::Float64(v) => out.push(*v),
            MmsValue::Structure(fields) | MmsValue::Array(fields) => {
                for field in fields {
                    field.collect_numeric(out);
                }
            }
            _ => {}
        }
    }
}

impl fmt::Display for MmsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MmsValue::Bool(b) => write!(f, "{}", b),
            MmsValue::Int(v) => write!(f, "{}", v),
            MmsValue::Uint(v) => write!(f, "{}", v),
            MmsValue::Float32(v) => write!(f, "{}", v),
            MmsValue::Float64(v) => write!(f, "{}", v),
            MmsValue::BitString(b) => write!(f, "b{}", b),
            MmsValue::OctetString(bytes) => {
                for byte in bytes {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
            MmsValue::VisibleString(s) => write!(f, "{:?}", s),
            MmsValue::BinaryTime(t) => write!(f, "{}", t),
            MmsValue::UtcTime(t) => write!(f, "{}", t),
            MmsValue::Structure(fields) => {
                write!(f, "{{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", field)?;
                }
                write!(f, "}}")
            }
            MmsValue::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        assert_eq!(MmsValue::Bool(true).as_bool(), Some(true));
        assert_eq!(MmsValue::Uint(7).as_u64(), Some(7));
        assert_eq!(MmsValue::Int(7).as_u64(), Some(7));
        assert_eq!(MmsValue::Int(-1).as_u64(), None);
        assert_eq!(
            MmsValue::VisibleString("LLN0".into()).as_str(),
            Some("LLN0")
        );
    }

    #[test]
    fn test_numeric_leaves_flattens_analogue_value() {
        // Vector { mag: AnalogueValue { f }, ang: AnalogueValue { f } }
        let vector = MmsValue::Structure(vec![
            MmsValue::Structure(vec![MmsValue::Float32(250.31)]),
            MmsValue::Structure(vec![MmsValue::Float32(-140.0)]),
        ]);
        let leaves = vector.numeric_leaves();
        assert_eq!(leaves.len(), 2);
        assert!((leaves[0] - 250.31).abs() < 1e-4);
        assert_eq!(leaves[1], -140.0);
    }

    #[test]
    fn test_numeric_leaves_skips_non_numeric() {
        let v = MmsValue::Structure(vec![
            MmsValue::VisibleString("x".into()),
            MmsValue::Bool(true),
            MmsValue::OctetString(vec![1, 2]),
        ]);
        assert_eq!(v.numeric_leaves(), vec![1.0]);
    }

    #[test]
    fn test_display_structure() {
        let v = MmsValue::Structure(vec![MmsValue::Int(1), MmsValue::Bool(false)]);
        assert_eq!(v.to_string(), "{1, false}");
    }
}
