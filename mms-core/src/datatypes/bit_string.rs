//! Bit string type for MMS values and RCB attributes

use crate::error::{MmsError, MmsResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Arbitrary string of bits, MSB-first within each octet. A bit string value
/// can have any length including zero.
///
/// Used for `OptFlds`, `TrgOps`, quality descriptors and the report
/// inclusion bitmap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitString {
    bytes: Vec<u8>,
    num_bits: usize,
}

impl BitString {
    /// Construct a new bit string object.
    ///
    /// # Arguments
    ///
    /// * `bytes` - The bit string as a byte array
    /// * `num_bits` - The number of bits
    ///
    /// # Errors
    ///
    /// Returns an error if `num_bits > bytes.len() * 8`.
    pub fn new(bytes: Vec<u8>, num_bits: usize) -> MmsResult<Self> {
        if num_bits > bytes.len() * 8 {
            return Err(MmsError::InvalidData(format!(
                "bit string too short to hold all bits: need {} bytes for {} bits",
                (num_bits + 7) / 8,
                num_bits
            )));
        }
        Ok(Self { bytes, num_bits })
    }

    /// Construct an all-zero bit string of the given length.
    pub fn zeroed(num_bits: usize) -> Self {
        Self {
            bytes: vec![0u8; (num_bits + 7) / 8],
            num_bits,
        }
    }

    /// Get the bit string as a byte array.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The number of bits in the byte array.
    pub fn num_bits(&self) -> usize {
        self.num_bits
    }

    /// Get the bit at a position (0 = MSB of the first octet).
    ///
    /// Out-of-range indices read as `false`; report decoding treats a short
    /// bit string as trailing zeros.
    pub fn get_bit(&self, index: usize) -> bool {
        if index >= self.num_bits {
            return false;
        }
        let byte_index = index / 8;
        let bit_index = 7 - (index % 8);
        (self.bytes[byte_index] >> bit_index) & 1 == 1
    }

    /// Set the bit at a position.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is out of bounds.
    pub fn set_bit(&mut self, index: usize, value: bool) -> MmsResult<()> {
        if index >= self.num_bits {
            return Err(MmsError::InvalidData(format!(
                "bit index {} out of bounds (num_bits: {})",
                index, self.num_bits
            )));
        }
        let byte_index = index / 8;
        let bit_index = 7 - (index % 8);
        if value {
            self.bytes[byte_index] |= 1 << bit_index;
        } else {
            self.bytes[byte_index] &= !(1 << bit_index);
        }
        Ok(())
    }

    /// Number of set bits.
    pub fn count_set(&self) -> usize {
        (0..self.num_bits).filter(|&i| self.get_bit(i)).count()
    }

    /// Indices of set bits, in ascending order.
    pub fn set_positions(&self) -> Vec<usize> {
        (0..self.num_bits).filter(|&i| self.get_bit(i)).collect()
    }
}

impl fmt::Display for BitString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.num_bits {
            write!(f, "{}", if self.get_bit(i) { '1' } else { '0' })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_string_new() {
        let bytes = vec![0xFF, 0x00, 0xAA];
        let bit_string = BitString::new(bytes.clone(), 24).unwrap();
        assert_eq!(bit_string.as_bytes(), &bytes);
        assert_eq!(bit_string.num_bits(), 24);
    }

    #[test]
    fn test_bit_string_invalid() {
        let result = BitString::new(vec![0xFF], 16);
        assert!(result.is_err());
    }

    #[test]
    fn test_get_set_bit() {
        let mut bits = BitString::zeroed(10);
        bits.set_bit(1, true).unwrap();
        bits.set_bit(8, true).unwrap();
        assert!(bits.get_bit(1));
        assert!(bits.get_bit(8));
        assert!(!bits.get_bit(0));
        assert_eq!(bits.as_bytes(), &[0b0100_0000, 0b1000_0000]);
        assert_eq!(bits.count_set(), 2);
        assert_eq!(bits.set_positions(), vec![1, 8]);
    }

    #[test]
    fn test_out_of_range_reads_false() {
        let mut bits = BitString::new(vec![0xFF], 8).unwrap();
        assert!(!bits.get_bit(9));
        assert!(bits.set_bit(9, true).is_err());
    }

    #[test]
    fn test_display() {
        let bits = BitString::new(vec![0b1010_0000], 4).unwrap();
        assert_eq!(bits.to_string(), "1010");
    }
}
