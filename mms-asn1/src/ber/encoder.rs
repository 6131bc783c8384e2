//! BER encoder
//!
//! TLV building plus the content encodings the MMS `Data` codec composes
//! with its own context tags.

use crate::ber::types::{BerLength, BerTag};
use mms_core::datatypes::BitString;
use mms_core::MmsResult;

/// BER encoder accumulating TLV triplets into a byte buffer.
pub struct BerEncoder {
    buffer: Vec<u8>,
}

impl BerEncoder {
    /// Create a new BER encoder.
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Create a new BER encoder with initial capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Encode a TLV triplet: tag, definite length, content.
    pub fn encode_tlv(&mut self, tag: &BerTag, value: &[u8]) -> MmsResult<()> {
        self.buffer.extend_from_slice(&tag.encode());
        self.buffer.extend_from_slice(&BerLength::encode(value.len()));
        self.buffer.extend_from_slice(value);
        Ok(())
    }

    /// Append already-encoded bytes verbatim.
    pub fn encode_raw(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Encode a universal INTEGER (minimal two's complement).
    pub fn encode_integer(&mut self, value: i64) -> MmsResult<()> {
        let tag = BerTag::universal(false, 2);
        self.encode_tlv(&tag, &integer_content(value))
    }

    /// Encode a universal OCTET STRING.
    pub fn encode_octet_string(&mut self, value: &[u8]) -> MmsResult<()> {
        let tag = BerTag::universal(false, 4);
        self.encode_tlv(&tag, value)
    }

    /// Encode a universal SEQUENCE (constructed, tag 16) around
    /// already-encoded element TLVs.
    pub fn encode_sequence(&mut self, elements: &[u8]) -> MmsResult<()> {
        let tag = BerTag::universal(true, 16);
        self.encode_tlv(&tag, elements)
    }

    /// Encode a context-specific tag.
    pub fn encode_context(&mut self, tag_number: u32, value: &[u8], constructed: bool) -> MmsResult<()> {
        let tag = BerTag::context(constructed, tag_number);
        self.encode_tlv(&tag, value)
    }

    /// Encode an application tag.
    pub fn encode_application(&mut self, tag_number: u32, value: &[u8], constructed: bool) -> MmsResult<()> {
        let tag = BerTag::application(constructed, tag_number);
        self.encode_tlv(&tag, value)
    }

    /// Get the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Get a reference to the encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }
}

impl Default for BerEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Minimal two's-complement big-endian content for a signed INTEGER.
/// Zero encodes as a single `0x00`.
pub fn integer_content(value: i64) -> Vec<u8> {
    if value == 0 {
        return vec![0];
    }
    let mut bytes = Vec::new();
    if value < 0 {
        let mut temp = value;
        while temp != -1 {
            bytes.push((temp & 0xFF) as u8);
            temp >>= 8;
        }
        if bytes.is_empty() || (bytes[bytes.len() - 1] & 0x80) == 0 {
            bytes.push(0xFF);
        }
    } else {
        let mut temp = value;
        while temp > 0 {
            bytes.push((temp & 0xFF) as u8);
            temp >>= 8;
        }
        if (bytes[bytes.len() - 1] & 0x80) != 0 {
            bytes.push(0x00);
        }
    }
    bytes.reverse();
    bytes
}

/// Minimal big-endian content for an Unsigned, with a leading `0x00` pad
/// when the top bit would otherwise read as a sign.
pub fn unsigned_content(value: u64) -> Vec<u8> {
    let mut bytes = Vec::new();
    let mut temp = value;
    loop {
        bytes.push((temp & 0xFF) as u8);
        temp >>= 8;
        if temp == 0 {
            break;
        }
    }
    if (bytes[bytes.len() - 1] & 0x80) != 0 {
        bytes.push(0x00);
    }
    bytes.reverse();
    bytes
}

/// MMS FLOATING POINT content for a binary32: exponent-width octet (8)
/// followed by the IEEE 754 encoding.
pub fn float32_content(value: f32) -> Vec<u8> {
    let mut out = vec![8u8];
    out.extend_from_slice(&value.to_be_bytes());
    out
}

/// MMS FLOATING POINT content for a binary64: exponent-width octet (11)
/// followed by the IEEE 754 encoding.
pub fn float64_content(value: f64) -> Vec<u8> {
    let mut out = vec![11u8];
    out.extend_from_slice(&value.to_be_bytes());
    out
}

/// BIT STRING content: unused-bit count octet followed by the packed bits.
pub fn bit_string_content(bits: &BitString) -> Vec<u8> {
    let unused = (bits.as_bytes().len() * 8 - bits.num_bits()) as u8;
    let mut out = vec![unused];
    out.extend_from_slice(bits.as_bytes());
    out
}

/// BOOLEAN content: `0xFF` true, `0x00` false.
pub fn boolean_content(value: bool) -> [u8; 1] {
    [if value { 0xFF } else { 0x00 }]
}
