//! BER decoder
//!
//! Cursor-style TLV reader plus the content-level parsers the MMS `Data`
//! codec dispatches to. Definite lengths are the norm; indefinite lengths
//! (`0x80`, terminated by `00 00` end-of-contents) are accepted on
//! constructed types because MMS stacks in the wild emit them.

use crate::ber::types::{BerLength, BerTag};
use mms_core::datatypes::BitString;
use mms_core::{MmsError, MmsResult};

/// Nesting limit while scanning indefinite-length content for its
/// end-of-contents marker.
const MAX_DEPTH: usize = 32;

/// One decoded TLV. `content` borrows from the decoder's buffer and, for
/// constructed values, is itself a concatenation of TLVs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tlv<'a> {
    pub tag: BerTag,
    pub content: &'a [u8],
}

/// BER decoder reading TLV triplets from a byte buffer.
///
/// The decoder keeps a position that advances as values are read, so
/// several values can be decoded sequentially from one buffer.
pub struct BerDecoder<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> BerDecoder<'a> {
    /// Create a new BER decoder over a buffer.
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    /// Current position in the buffer.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Remaining undecoded bytes.
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    /// True when more data is available.
    pub fn has_remaining(&self) -> bool {
        self.position < self.buffer.len()
    }

    /// Decode one TLV and advance the cursor past it.
    ///
    /// For an indefinite-length constructed value the content slice covers
    /// everything up to (excluding) the end-of-contents octets, which are
    /// consumed as well.
    ///
    /// # Errors
    /// Returns `Ber` on a truncated tag, length or content, on an
    /// indefinite-length primitive, or on nesting deeper than the scan
    /// limit.
    pub fn decode_tlv(&mut self) -> MmsResult<Tlv<'a>> {
        let (tlv, consumed) = read_tlv(&self.buffer[self.position..], 0)?;
        self.position += consumed;
        Ok(tlv)
    }

    /// Skip one TLV (tag + length + content).
    pub fn skip_tlv(&mut self) -> MmsResult<()> {
        self.decode_tlv().map(|_| ())
    }

    /// Decode a TLV and require a specific tag.
    ///
    /// # Errors
    /// Returns `Ber` when the next tag differs from `expected`.
    pub fn expect_tlv(&mut self, expected: &BerTag) -> MmsResult<&'a [u8]> {
        let tlv = self.decode_tlv()?;
        if tlv.tag != *expected {
            return Err(MmsError::Ber(format!(
                "expected tag {:?}, got {:?}",
                expected, tlv.tag
            )));
        }
        Ok(tlv.content)
    }

    /// Decode a universal INTEGER.
    pub fn decode_integer(&mut self) -> MmsResult<i64> {
        let content = self.expect_tlv(&BerTag::universal(false, 2))?;
        parse_integer(content)
    }
}

fn read_tlv(data: &[u8], depth: usize) -> MmsResult<(Tlv<'_>, usize)> {
    if depth > MAX_DEPTH {
        return Err(MmsError::Ber("TLV nesting too deep".to_string()));
    }
    let (tag, tag_len) = BerTag::decode(data)?;
    let (length, len_len) = BerLength::decode(&data[tag_len..])?;
    let header = tag_len + len_len;

    match length {
        BerLength::Definite(content_len) => {
            if data.len() < header + content_len {
                return Err(MmsError::Ber(format!(
                    "truncated content: need {} octets, have {}",
                    content_len,
                    data.len() - header
                )));
            }
            Ok((
                Tlv {
                    tag,
                    content: &data[header..header + content_len],
                },
                header + content_len,
            ))
        }
        BerLength::Indefinite => {
            if !tag.is_constructed() {
                return Err(MmsError::Ber(
                    "indefinite length on a primitive value".to_string(),
                ));
            }
            // Walk nested TLVs until the end-of-contents marker at this
            // level.
            let mut pos = header;
            loop {
                if pos + 2 <= data.len() && data[pos] == 0x00 && data[pos + 1] == 0x00 {
                    return Ok((
                        Tlv {
                            tag,
                            content: &data[header..pos],
                        },
                        pos + 2,
                    ));
                }
                if pos >= data.len() {
                    return Err(MmsError::Ber(
                        "indefinite length without end-of-contents".to_string(),
                    ));
                }
                let (_, consumed) = read_tlv(&data[pos..], depth + 1)?;
                pos += consumed;
            }
        }
    }
}

/// Parse signed INTEGER content (big-endian two's complement).
pub fn parse_integer(content: &[u8]) -> MmsResult<i64> {
    if content.is_empty() {
        return Err(MmsError::Ber("empty integer encoding".to_string()));
    }
    if content.len() > 8 {
        return Err(MmsError::Ber(format!(
            "integer too large: {} octets",
            content.len()
        )));
    }
    let mut value = if (content[0] & 0x80) != 0 { -1i64 } else { 0 };
    for &byte in content {
        value = (value << 8) | (byte as i64);
    }
    Ok(value)
}

/// Parse Unsigned content (big-endian, optional leading `0x00` pad).
pub fn parse_unsigned(content: &[u8]) -> MmsResult<u64> {
    if content.is_empty() {
        return Err(MmsError::Ber("empty unsigned encoding".to_string()));
    }
    let trimmed = if content[0] == 0 && content.len() > 1 {
        &content[1..]
    } else {
        content
    };
    if trimmed.len() > 8 {
        return Err(MmsError::Ber(format!(
            "unsigned too large: {} octets",
            content.len()
        )));
    }
    let mut value = 0u64;
    for &byte in trimmed {
        value = (value << 8) | (byte as u64);
    }
    Ok(value)
}

/// Parse BOOLEAN content; any non-zero octet reads as true.
pub fn parse_boolean(content: &[u8]) -> MmsResult<bool> {
    match content {
        [byte] => Ok(*byte != 0),
        _ => Err(MmsError::Ber(format!(
            "boolean content must be 1 octet, got {}",
            content.len()
        ))),
    }
}

/// Parse BIT STRING content (leading unused-bit octet).
pub fn parse_bit_string(content: &[u8]) -> MmsResult<BitString> {
    let (&unused, bytes) = content
        .split_first()
        .ok_or_else(|| MmsError::Ber("empty bit string encoding".to_string()))?;
    if unused > 7 {
        return Err(MmsError::Ber(format!(
            "invalid unused bit count: {}",
            unused
        )));
    }
    let num_bits = if bytes.is_empty() {
        0
    } else {
        bytes.len() * 8 - unused as usize
    };
    BitString::new(bytes.to_vec(), num_bits)
}

/// Parse MMS FLOATING POINT content: exponent-width octet then IEEE 754
/// bytes. Width 8 takes 4 octets (binary32), width 11 takes 8 (binary64).
pub fn parse_float(content: &[u8]) -> MmsResult<FloatValue> {
    let (&width, payload) = content
        .split_first()
        .ok_or_else(|| MmsError::Ber("empty floating-point encoding".to_string()))?;
    match (width, payload.len()) {
        (8, 4) => Ok(FloatValue::Single(f32::from_be_bytes([
            payload[0], payload[1], payload[2], payload[3],
        ]))),
        (11, 8) => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(payload);
            Ok(FloatValue::Double(f64::from_be_bytes(raw)))
        }
        _ => Err(MmsError::Ber(format!(
            "unsupported floating-point encoding: width={}, {} payload octets",
            width,
            payload.len()
        ))),
    }
}

/// Decoded MMS floating-point value, preserving the wire precision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FloatValue {
    Single(f32),
    Double(f64),
}

/// Parse visible-string content.
pub fn parse_visible_string(content: &[u8]) -> String {
    String::from_utf8_lossy(content).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ber::encoder::{integer_content, BerEncoder};

    #[test]
    fn test_decode_integer_roundtrip() {
        for value in [0i64, 1, 42, -1, 127, 128, 255, 256, -129, i64::MAX, i64::MIN] {
            let mut encoder = BerEncoder::new();
            encoder.encode_integer(value).unwrap();
            let bytes = encoder.into_bytes();
            let mut decoder = BerDecoder::new(&bytes);
            assert_eq!(decoder.decode_integer().unwrap(), value, "value {}", value);
            assert_eq!(decoder.position(), bytes.len());
        }
    }

    #[test]
    fn test_tlv_consumes_exactly_its_encoding() {
        let mut encoder = BerEncoder::new();
        encoder.encode_octet_string(&[1, 2, 3]).unwrap();
        encoder.encode_integer(7).unwrap();
        let bytes = encoder.into_bytes();

        let mut decoder = BerDecoder::new(&bytes);
        let before = decoder.position();
        let tlv = decoder.decode_tlv().unwrap();
        assert_eq!(decoder.position() - before, 2 + 3);
        assert_eq!(tlv.content, &[1, 2, 3]);
        assert_eq!(decoder.decode_integer().unwrap(), 7);
        assert!(!decoder.has_remaining());
    }

    #[test]
    fn test_indefinite_length_constructed() {
        // SEQUENCE (indefinite) { INTEGER 5 } terminated by 00 00, then a
        // trailing INTEGER to prove the cursor lands after the EOC.
        let bytes = [0x30, 0x80, 0x02, 0x01, 0x05, 0x00, 0x00, 0x02, 0x01, 0x09];
        let mut decoder = BerDecoder::new(&bytes);
        let tlv = decoder.decode_tlv().unwrap();
        assert!(tlv.tag.is_universal(16));
        assert_eq!(tlv.content, &[0x02, 0x01, 0x05]);
        assert_eq!(decoder.decode_integer().unwrap(), 9);
    }

    #[test]
    fn test_indefinite_length_nested() {
        // Outer indefinite containing inner indefinite.
        let bytes = [
            0xA0, 0x80, 0x30, 0x80, 0x02, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00,
        ];
        let mut decoder = BerDecoder::new(&bytes);
        let tlv = decoder.decode_tlv().unwrap();
        assert!(tlv.tag.is_context(0));
        assert_eq!(tlv.content, &[0x30, 0x80, 0x02, 0x01, 0x01, 0x00, 0x00]);
        assert!(!decoder.has_remaining());
    }

    #[test]
    fn test_indefinite_primitive_rejected() {
        let bytes = [0x04, 0x80, 0x00, 0x00];
        let mut decoder = BerDecoder::new(&bytes);
        assert!(decoder.decode_tlv().is_err());
    }

    #[test]
    fn test_truncated_content_rejected() {
        let bytes = [0x04, 0x05, 0x01, 0x02];
        let mut decoder = BerDecoder::new(&bytes);
        assert!(decoder.decode_tlv().is_err());
    }

    #[test]
    fn test_parse_unsigned_strips_pad() {
        assert_eq!(parse_unsigned(&[0x00, 0xFD, 0xE8]).unwrap(), 65000);
        assert_eq!(parse_unsigned(&[0x0A]).unwrap(), 10);
        assert_eq!(
            parse_unsigned(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]).unwrap(),
            u64::MAX
        );
    }

    #[test]
    fn test_parse_integer_sign_extension() {
        assert_eq!(parse_integer(&integer_content(-300)).unwrap(), -300);
        assert_eq!(parse_integer(&[0xFF]).unwrap(), -1);
        assert_eq!(parse_integer(&[0x00, 0xFF]).unwrap(), 255);
    }

    #[test]
    fn test_parse_boolean() {
        assert!(parse_boolean(&[0xFF]).unwrap());
        assert!(parse_boolean(&[0x01]).unwrap());
        assert!(!parse_boolean(&[0x00]).unwrap());
        assert!(parse_boolean(&[]).is_err());
    }

    #[test]
    fn test_parse_bit_string() {
        let bits = parse_bit_string(&[0x06, 0x7E, 0x80]).unwrap();
        assert_eq!(bits.num_bits(), 10);
        assert!(bits.get_bit(1));
        assert!(!bits.get_bit(0));
        assert!(bits.get_bit(8));
    }

    #[test]
    fn test_parse_float_known_vector() {
        match parse_float(&[0x08, 0x42, 0x48, 0x00, 0x00]).unwrap() {
            FloatValue::Single(v) => assert_eq!(v, 50.0),
            other => panic!("expected binary32, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_float_double() {
        let mut content = vec![11u8];
        content.extend_from_slice(&1234.5f64.to_be_bytes());
        match parse_float(&content).unwrap() {
            FloatValue::Double(v) => assert_eq!(v, 1234.5),
            other => panic!("expected binary64, got {:?}", other),
        }
    }
}
