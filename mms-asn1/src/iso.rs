//! ISO upper-layer envelopes for MMS
//!
//! MMS APDUs do not travel bare above COTP: each data PDU is wrapped in a
//! presentation PDV list, and the initiate exchange rides inside an ACSE
//! association request/response which itself sits in the presentation
//! CP/CPA user data. This module builds and strips those envelopes; the
//! session SPDUs around them live in the session crate.
//!
//! Object identifiers and selector values follow the association observed
//! on live IEDs.

use crate::ber::decoder::BerDecoder;
use crate::ber::encoder::BerEncoder;
use crate::ber::types::BerTag;
use mms_core::{MmsError, MmsResult};

/// Presentation context id carrying ACSE APDUs.
const ACSE_CONTEXT_ID: i64 = 1;
/// Presentation context id carrying MMS APDUs.
const MMS_CONTEXT_ID: i64 = 3;

/// OID 2.2.1.0.1, ACSE abstract syntax.
const ACSE_ABSTRACT_SYNTAX: &[u8] = &[0x52, 0x01, 0x00, 0x01];
/// OID 1.0.9506.2.1, MMS abstract syntax.
const MMS_ABSTRACT_SYNTAX: &[u8] = &[0x28, 0xCA, 0x22, 0x02, 0x01];
/// OID 1.0.9506.2.3, MMS application context name.
const MMS_APPLICATION_CONTEXT: &[u8] = &[0x28, 0xCA, 0x22, 0x02, 0x03];
/// OID 2.1.1, BER transfer syntax.
const BER_TRANSFER_SYNTAX: &[u8] = &[0x51, 0x01];
/// OID 1.1.1.999.1, the called AP title.
const CALLED_AP_TITLE: &[u8] = &[0x29, 0x01, 0x87, 0x67, 0x01];
/// OID 1.1.1.999, the calling AP title.
const CALLING_AP_TITLE: &[u8] = &[0x29, 0x01, 0x87, 0x67];
/// AE qualifier used on both sides.
const AE_QUALIFIER: i64 = 12;
/// Presentation selectors (4 octets, both directions).
const PRESENTATION_SELECTOR: &[u8] = &[0x00, 0x00, 0x00, 0x01];

/// Wrap an MMS APDU in the presentation PDV list used for data transfer:
/// `[APPLICATION 1] { SEQUENCE { context-id 3, [0] apdu } }`.
pub fn pdv_wrap(apdu: &[u8]) -> MmsResult<Vec<u8>> {
    let mut inner = BerEncoder::new();
    inner.encode_integer(MMS_CONTEXT_ID)?;
    inner.encode_context(0, apdu, true)?;

    let mut seq = BerEncoder::new();
    seq.encode_sequence(inner.as_bytes())?;

    let mut out = BerEncoder::new();
    out.encode_application(1, seq.as_bytes(), true)?;
    Ok(out.into_bytes())
}

/// Strip the data-transfer PDV list and return the MMS APDU inside.
///
/// # Errors
/// Returns `Framing` when the envelope shape does not match.
pub fn pdv_unwrap(data: &[u8]) -> MmsResult<&[u8]> {
    let mut decoder = BerDecoder::new(data);
    let outer = decoder.decode_tlv()?;
    if outer.tag != BerTag::application(true, 1) {
        return Err(MmsError::Framing(format!(
            "expected presentation PDV list, got tag {:?}",
            outer.tag
        )));
    }
    let mut seq_reader = BerDecoder::new(outer.content);
    let seq = seq_reader.expect_tlv(&BerTag::universal(true, 16))?;

    let mut member_reader = BerDecoder::new(seq);
    // presentation-context-identifier
    member_reader.decode_integer()?;
    let payload = member_reader.expect_tlv(&BerTag::context(true, 0))?;
    Ok(payload)
}

/// Build the presentation CP-type for connection setup: normal mode, the
/// ACSE and MMS contexts, and the given ACSE APDU as user data (PDV list on
/// the ACSE context).
pub fn cp_type(acse_apdu: &[u8]) -> MmsResult<Vec<u8>> {
    // mode-selector [0] { mode-value [0] = normal (1) }
    let mut mode = BerEncoder::new();
    mode.encode_context(0, &[0x01], false)?;

    // presentation-context-definition-list [4]
    let mut contexts = BerEncoder::new();
    contexts.encode_raw(&context_definition(ACSE_CONTEXT_ID, ACSE_ABSTRACT_SYNTAX)?);
    contexts.encode_raw(&context_definition(MMS_CONTEXT_ID, MMS_ABSTRACT_SYNTAX)?);

    // user-data: [APPLICATION 1] { SEQUENCE { context-id 1, [0] acse } }
    let mut pdv_inner = BerEncoder::new();
    pdv_inner.encode_integer(ACSE_CONTEXT_ID)?;
    pdv_inner.encode_context(0, acse_apdu, true)?;
    let mut pdv_seq = BerEncoder::new();
    pdv_seq.encode_sequence(pdv_inner.as_bytes())?;

    // normal-mode-parameters [2]
    let mut params = BerEncoder::new();
    params.encode_context(1, PRESENTATION_SELECTOR, false)?;
    params.encode_context(2, PRESENTATION_SELECTOR, false)?;
    params.encode_context(4, contexts.as_bytes(), true)?;
    params.encode_application(1, pdv_seq.as_bytes(), true)?;

    let mut body = BerEncoder::new();
    body.encode_context(0, mode.as_bytes(), true)?;
    body.encode_context(2, params.as_bytes(), true)?;

    // CP-type is a SET
    let mut out = BerEncoder::new();
    out.encode_tlv(&BerTag::universal(true, 17), body.as_bytes())?;
    Ok(out.into_bytes())
}

fn context_definition(id: i64, abstract_syntax: &[u8]) -> MmsResult<Vec<u8>> {
    let mut transfer = BerEncoder::new();
    transfer.encode_tlv(&BerTag::universal(false, 6), BER_TRANSFER_SYNTAX)?;
    let mut transfer_list = BerEncoder::new();
    transfer_list.encode_sequence(transfer.as_bytes())?;

    let mut item = BerEncoder::new();
    item.encode_integer(id)?;
    item.encode_tlv(&BerTag::universal(false, 6), abstract_syntax)?;
    item.encode_raw(transfer_list.as_bytes());

    let mut out = BerEncoder::new();
    out.encode_sequence(item.as_bytes())?;
    Ok(out.into_bytes())
}

/// Extract the ACSE APDU from a presentation CPA (connect accept).
///
/// The walk is lenient: it looks for the normal-mode-parameters member and
/// the fully-encoded user data inside it, ignoring everything else.
pub fn cpa_unwrap(data: &[u8]) -> MmsResult<&[u8]> {
    let mut decoder = BerDecoder::new(data);
    let outer = decoder.decode_tlv()?;
    if !outer.tag.is_universal(17) && !outer.tag.is_universal(16) {
        return Err(MmsError::Framing(format!(
            "expected presentation CPA, got tag {:?}",
            outer.tag
        )));
    }
    let params = find_member(outer.content, &BerTag::context(true, 2))?
        .ok_or_else(|| MmsError::Framing("CPA without normal-mode-parameters".to_string()))?;
    let pdv = find_member(params, &BerTag::application(true, 1))?
        .ok_or_else(|| MmsError::Framing("CPA without user data".to_string()))?;

    let mut seq_reader = BerDecoder::new(pdv);
    let seq = seq_reader.expect_tlv(&BerTag::universal(true, 16))?;
    let payload = find_member(seq, &BerTag::context(true, 0))?
        .ok_or_else(|| MmsError::Framing("CPA user data without PDV payload".to_string()))?;
    Ok(payload)
}

/// Wrap an MMS initiate-RequestPDU in an ACSE AARQ with the MMS application
/// context and the AP titles / AE qualifiers of the observed association.
pub fn aarq_wrap(initiate: &[u8]) -> MmsResult<Vec<u8>> {
    let mut fields = BerEncoder::new();

    // application-context-name [1]
    let mut acn = BerEncoder::new();
    acn.encode_tlv(&BerTag::universal(false, 6), MMS_APPLICATION_CONTEXT)?;
    fields.encode_context(1, acn.as_bytes(), true)?;

    // called-AP-title [2] (form 2: object identifier)
    let mut called = BerEncoder::new();
    called.encode_tlv(&BerTag::universal(false, 6), CALLED_AP_TITLE)?;
    fields.encode_context(2, called.as_bytes(), true)?;

    // called-AE-qualifier [3]
    let mut called_ae = BerEncoder::new();
    called_ae.encode_integer(AE_QUALIFIER)?;
    fields.encode_context(3, called_ae.as_bytes(), true)?;

    // calling-AP-title [6]
    let mut calling = BerEncoder::new();
    calling.encode_tlv(&BerTag::universal(false, 6), CALLING_AP_TITLE)?;
    fields.encode_context(6, calling.as_bytes(), true)?;

    // calling-AE-qualifier [7]
    let mut calling_ae = BerEncoder::new();
    calling_ae.encode_integer(AE_QUALIFIER)?;
    fields.encode_context(7, calling_ae.as_bytes(), true)?;

    // user-information [30]: EXTERNAL { indirect-reference 3, [0] initiate }
    let mut external_body = BerEncoder::new();
    external_body.encode_integer(MMS_CONTEXT_ID)?;
    external_body.encode_context(0, initiate, true)?;
    let mut external = BerEncoder::new();
    external.encode_tlv(&BerTag::universal(true, 8), external_body.as_bytes())?;
    fields.encode_context(30, external.as_bytes(), true)?;

    let mut out = BerEncoder::new();
    out.encode_application(0, fields.as_bytes(), true)?;
    Ok(out.into_bytes())
}

/// Extract the MMS APDU from an ACSE AARE (or AARQ) user-information field.
pub fn acse_unwrap(data: &[u8]) -> MmsResult<&[u8]> {
    let mut decoder = BerDecoder::new(data);
    let outer = decoder.decode_tlv()?;
    let is_acse = outer.tag == BerTag::application(true, 0)
        || outer.tag == BerTag::application(true, 1);
    if !is_acse {
        return Err(MmsError::Framing(format!(
            "expected ACSE APDU, got tag {:?}",
            outer.tag
        )));
    }
    let user_info = find_member(outer.content, &BerTag::context(true, 30))?
        .ok_or_else(|| MmsError::Framing("ACSE APDU without user-information".to_string()))?;

    let mut ext_reader = BerDecoder::new(user_info);
    let external = ext_reader.expect_tlv(&BerTag::universal(true, 8))?;
    let payload = find_member(external, &BerTag::context(true, 0))?
        .ok_or_else(|| MmsError::Framing("EXTERNAL without single-ASN1-type".to_string()))?;
    Ok(payload)
}

/// Scan the members of a constructed value for the first one with the given
/// tag.
fn find_member<'a>(content: &'a [u8], wanted: &BerTag) -> MmsResult<Option<&'a [u8]>> {
    let mut decoder = BerDecoder::new(content);
    while decoder.has_remaining() {
        let tlv = decoder.decode_tlv()?;
        if tlv.tag == *wanted {
            return Ok(Some(tlv.content));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdv_roundtrip() {
        let apdu = [0xA0, 0x03, 0x02, 0x01, 0x2A];
        let wrapped = pdv_wrap(&apdu).unwrap();
        assert_eq!(wrapped[0], 0x61);
        assert_eq!(pdv_unwrap(&wrapped).unwrap(), &apdu);
    }

    #[test]
    fn test_pdv_unwrap_rejects_other_shapes() {
        assert!(pdv_unwrap(&[0x30, 0x00]).is_err());
    }

    #[test]
    fn test_aarq_carries_initiate() {
        let initiate = [0xA8, 0x03, 0x80, 0x01, 0x05];
        let aarq = aarq_wrap(&initiate).unwrap();
        assert_eq!(aarq[0], 0x60);
        assert_eq!(acse_unwrap(&aarq).unwrap(), &initiate);
    }

    #[test]
    fn test_cp_cpa_roundtrip() {
        // cp_type output is shape-compatible with a CPA for the fields the
        // lenient parser reads, so the builder doubles as the test fixture.
        let aarq = aarq_wrap(&[0xA8, 0x00]).unwrap();
        let cp = cp_type(&aarq).unwrap();
        assert_eq!(cp[0], 0x31);
        let acse = cpa_unwrap(&cp).unwrap();
        assert_eq!(acse, &aarq[..]);
        assert_eq!(acse_unwrap(acse).unwrap(), &[0xA8, 0x00]);
    }
}
