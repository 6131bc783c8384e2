//! MMS `Data` codec
//!
//! `Data` is a tagged CHOICE; each variant carries its own context tag:
//! array 1, structure 2, boolean 3, bit-string 4, integer 5, unsigned 6,
//! floating-point 7, octet-string 9, visible-string 10, binary-time 12,
//! bcd 13, booleanArray 14, utc-time 17. Structures and arrays nest
//! recursively. A handful of IEDs emit universal IA5String for strings;
//! the decoder accepts that too.

use mms_asn1::ber::decoder::{
    parse_bit_string, parse_boolean, parse_float, parse_integer, parse_unsigned,
    parse_visible_string, FloatValue, Tlv,
};
use mms_asn1::ber::encoder::{
    bit_string_content, boolean_content, float32_content, float64_content, integer_content,
    unsigned_content, BerEncoder,
};
use mms_asn1::ber::types::BerTag;
use mms_asn1::{BerDecoder, BerTagClass};
use mms_core::datatypes::{BinaryTime, UtcTime};
use mms_core::{MmsError, MmsResult, MmsValue};

/// `Data` CHOICE context tag numbers.
mod tag {
    pub const ARRAY: u32 = 1;
    pub const STRUCTURE: u32 = 2;
    pub const BOOLEAN: u32 = 3;
    pub const BIT_STRING: u32 = 4;
    pub const INTEGER: u32 = 5;
    pub const UNSIGNED: u32 = 6;
    pub const FLOATING_POINT: u32 = 7;
    pub const OCTET_STRING: u32 = 9;
    pub const VISIBLE_STRING: u32 = 10;
    pub const GENERALIZED_TIME: u32 = 11;
    pub const BINARY_TIME: u32 = 12;
    pub const BCD: u32 = 13;
    pub const BOOLEAN_ARRAY: u32 = 14;
    pub const MMS_STRING: u32 = 16;
    pub const UTC_TIME: u32 = 17;
}

/// Encode a value as a `Data` TLV.
pub fn encode_value(value: &MmsValue) -> MmsResult<Vec<u8>> {
    let mut encoder = BerEncoder::new();
    encode_into(&mut encoder, value)?;
    Ok(encoder.into_bytes())
}

fn encode_into(encoder: &mut BerEncoder, value: &MmsValue) -> MmsResult<()> {
    match value {
        MmsValue::Bool(b) => encoder.encode_context(tag::BOOLEAN, &boolean_content(*b), false),
        MmsValue::Int(v) => encoder.encode_context(tag::INTEGER, &integer_content(*v), false),
        MmsValue::Uint(v) => encoder.encode_context(tag::UNSIGNED, &unsigned_content(*v), false),
        MmsValue::Float32(v) => {
            encoder.encode_context(tag::FLOATING_POINT, &float32_content(*v), false)
        }
        MmsValue::Float64(v) => {
            encoder.encode_context(tag::FLOATING_POINT, &float64_content(*v), false)
        }
        MmsValue::BitString(bits) => {
            encoder.encode_context(tag::BIT_STRING, &bit_string_content(bits), false)
        }
        MmsValue::OctetString(bytes) => encoder.encode_context(tag::OCTET_STRING, bytes, false),
        MmsValue::VisibleString(s) => {
            encoder.encode_context(tag::VISIBLE_STRING, s.as_bytes(), false)
        }
        MmsValue::BinaryTime(t) => encoder.encode_context(tag::BINARY_TIME, &t.to_bytes(), false),
        MmsValue::UtcTime(t) => encoder.encode_context(tag::UTC_TIME, &t.to_bytes(), false),
        MmsValue::Structure(fields) => {
            let mut inner = BerEncoder::new();
            for field in fields {
                encode_into(&mut inner, field)?;
            }
            encoder.encode_context(tag::STRUCTURE, inner.as_bytes(), true)
        }
        MmsValue::Array(items) => {
            let mut inner = BerEncoder::new();
            for item in items {
                encode_into(&mut inner, item)?;
            }
            encoder.encode_context(tag::ARRAY, inner.as_bytes(), true)
        }
    }
}

/// Decode one `Data` TLV that has already been read from the stream.
pub fn decode_value(tlv: &Tlv<'_>) -> MmsResult<MmsValue> {
    // Universal IA5String instead of the context tag, seen on some IEDs.
    if tlv.tag == BerTag::universal(false, 26) {
        return Ok(MmsValue::VisibleString(parse_visible_string(tlv.content)));
    }
    if tlv.tag.class() != BerTagClass::ContextSpecific {
        return Err(MmsError::Ber(format!(
            "unexpected tag for Data: {:?}",
            tlv.tag
        )));
    }
    match tlv.tag.number() {
        tag::BOOLEAN => Ok(MmsValue::Bool(parse_boolean(tlv.content)?)),
        tag::BIT_STRING | tag::BOOLEAN_ARRAY => {
            Ok(MmsValue::BitString(parse_bit_string(tlv.content)?))
        }
        tag::INTEGER => Ok(MmsValue::Int(parse_integer(tlv.content)?)),
        tag::UNSIGNED | tag::BCD => Ok(MmsValue::Uint(parse_unsigned(tlv.content)?)),
        tag::FLOATING_POINT => Ok(match parse_float(tlv.content)? {
            FloatValue::Single(v) => MmsValue::Float32(v),
            FloatValue::Double(v) => MmsValue::Float64(v),
        }),
        tag::OCTET_STRING => Ok(MmsValue::OctetString(tlv.content.to_vec())),
        tag::VISIBLE_STRING | tag::MMS_STRING | tag::GENERALIZED_TIME => {
            Ok(MmsValue::VisibleString(parse_visible_string(tlv.content)))
        }
        tag::BINARY_TIME => Ok(MmsValue::BinaryTime(BinaryTime::from_bytes(tlv.content)?)),
        tag::UTC_TIME => Ok(MmsValue::UtcTime(UtcTime::from_bytes(tlv.content)?)),
        tag::STRUCTURE => Ok(MmsValue::Structure(decode_sequence(tlv.content)?)),
        tag::ARRAY => Ok(MmsValue::Array(decode_sequence(tlv.content)?)),
        other => Err(MmsError::Ber(format!("unknown Data tag: [{}]", other))),
    }
}

/// Decode a concatenation of `Data` TLVs.
pub fn decode_sequence(content: &[u8]) -> MmsResult<Vec<MmsValue>> {
    let mut decoder = BerDecoder::new(content);
    let mut values = Vec::new();
    while decoder.has_remaining() {
        let tlv = decoder.decode_tlv()?;
        values.push(decode_value(&tlv)?);
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mms_core::datatypes::BitString;

    fn roundtrip(value: &MmsValue) -> MmsValue {
        let encoded = encode_value(value).unwrap();
        let mut decoder = BerDecoder::new(&encoded);
        let tlv = decoder.decode_tlv().unwrap();
        assert!(!decoder.has_remaining(), "encoding not fully consumed");
        decode_value(&tlv).unwrap()
    }

    #[test]
    fn test_roundtrip_scalars() {
        for value in [
            MmsValue::Bool(true),
            MmsValue::Bool(false),
            MmsValue::Int(-42),
            MmsValue::Int(0),
            MmsValue::Uint(65000),
            MmsValue::Float32(50.0),
            MmsValue::Float64(-1.25e9),
            MmsValue::OctetString(vec![0, 1, 2, 255]),
            MmsValue::VisibleString("LLN0$BR$CB01".into()),
            MmsValue::BitString(BitString::new(vec![0x02, 0x08], 13).unwrap()),
            MmsValue::BinaryTime(BinaryTime {
                millis_of_day: 14_913_234,
                days_since_1984: Some(338),
            }),
            MmsValue::UtcTime(UtcTime {
                seconds: 1_708_425_192,
                fraction: 0x123456,
                quality: 0x0A,
            }),
        ] {
            assert_eq!(roundtrip(&value), value);
        }
    }

    #[test]
    fn test_roundtrip_nested_structure() {
        // Vector { mag: AnalogueValue { f }, ang: AnalogueValue { f } }
        let value = MmsValue::Structure(vec![
            MmsValue::Structure(vec![MmsValue::Float32(230.2)]),
            MmsValue::Structure(vec![MmsValue::Float32(-119.9)]),
        ]);
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn test_roundtrip_array() {
        let value = MmsValue::Array(vec![MmsValue::Uint(1), MmsValue::Uint(2)]);
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn test_known_encodings() {
        assert_eq!(
            encode_value(&MmsValue::Bool(true)).unwrap(),
            vec![0x83, 0x01, 0xFF]
        );
        assert_eq!(
            encode_value(&MmsValue::Uint(5)).unwrap(),
            vec![0x86, 0x01, 0x05]
        );
        assert_eq!(
            encode_value(&MmsValue::Int(5)).unwrap(),
            vec![0x85, 0x01, 0x05]
        );
        // MMS floating-point inside Data: context tag 7
        assert_eq!(
            encode_value(&MmsValue::Float32(50.0)).unwrap(),
            vec![0x87, 0x05, 0x08, 0x42, 0x48, 0x00, 0x00]
        );
    }

    #[test]
    fn test_decode_universal_ia5_string() {
        let bytes = [0x1A, 0x03, b'R', b'P', b'T'];
        let mut decoder = BerDecoder::new(&bytes);
        let tlv = decoder.decode_tlv().unwrap();
        assert_eq!(
            decode_value(&tlv).unwrap(),
            MmsValue::VisibleString("RPT".into())
        );
    }

    #[test]
    fn test_decode_boolean_any_nonzero() {
        let bytes = [0x83, 0x01, 0x01];
        let mut decoder = BerDecoder::new(&bytes);
        let tlv = decoder.decode_tlv().unwrap();
        assert_eq!(decode_value(&tlv).unwrap(), MmsValue::Bool(true));
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let bytes = [0x88, 0x01, 0x00];
        let mut decoder = BerDecoder::new(&bytes);
        let tlv = decoder.decode_tlv().unwrap();
        assert!(decode_value(&tlv).is_err());
    }
}
