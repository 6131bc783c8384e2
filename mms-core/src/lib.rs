//! Core types and utilities for the IEC 61850 MMS reporting client
//!
//! This crate provides the fundamental value types, timestamp types and the
//! error taxonomy shared by every layer of the stack.

pub mod error;
pub mod datatypes;

pub use error::{DataAccessError, MmsError, MmsResult};
pub use datatypes::{BinaryTime, BitString, MmsValue, UtcTime};

/// Format a byte slice as a lowercase hex string with space separators.
///
/// Used by the `--debug` PDU dumps; truncates nothing, callers slice first.
pub fn hex_string(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 3);
    for (i, byte) in data.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_string() {
        assert_eq!(hex_string(&[0x03, 0x00, 0xff]), "03 00 ff");
        assert_eq!(hex_string(&[]), "");
    }
}
