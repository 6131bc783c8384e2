//! MMS PDU encoding and decoding
//!
//! The top level of every APDU is a context-tagged CHOICE:
//! confirmed-RequestPDU [0], confirmed-ResponsePDU [1],
//! confirmed-ErrorPDU [2], unconfirmed-PDU [3],
//! initiate-RequestPDU [8], initiate-ResponsePDU [9].
//!
//! Only the services this client drives are encoded (read, write,
//! identify, initiate); decoding covers everything the IED sends back,
//! including the unsolicited `informationReport`.

use crate::data;
use crate::object_name::ObjectName;
use mms_asn1::ber::decoder::parse_integer;
use mms_asn1::ber::encoder::{unsigned_content, BerEncoder};
use mms_asn1::{BerDecoder, BerTagClass};
use mms_core::{DataAccessError, MmsError, MmsResult, MmsValue};

/// Confirmed service CHOICE tags.
const SERVICE_IDENTIFY: u32 = 2;
const SERVICE_READ: u32 = 4;
const SERVICE_WRITE: u32 = 5;

/// Unconfirmed service CHOICE tag.
const SERVICE_INFORMATION_REPORT: u32 = 0;

/// Top-level PDU CHOICE tags.
const PDU_CONFIRMED_REQUEST: u32 = 0;
const PDU_CONFIRMED_RESPONSE: u32 = 1;
const PDU_CONFIRMED_ERROR: u32 = 2;
const PDU_UNCONFIRMED: u32 = 3;
const PDU_INITIATE_REQUEST: u32 = 8;
const PDU_INITIATE_RESPONSE: u32 = 9;

/// Services-supported mask proposed during initiate, as captured from a
/// working association (85 bits, 3 unused).
const SERVICES_SUPPORTED_CALLING: [u8; 11] = [
    0xEE, 0x1C, 0x00, 0x00, 0x04, 0x08, 0x00, 0x00, 0x79, 0xEF, 0x18,
];

/// Parameter CBB proposed during initiate: str1, str2, vnam, valt, vadr,
/// tpy, vlis (11 bits, 5 unused).
const PARAMETER_CBB: [u8; 2] = [0xFB, 0x00];

/// Initiate request parameters.
///
/// Defaults follow the captured association: local detail 65000, ten
/// outstanding services each way, nesting level 5, MMS version 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiateRequest {
    pub local_detail_calling: u32,
    pub max_services_outstanding_calling: u8,
    pub max_services_outstanding_called: u8,
    pub data_structure_nesting_level: u8,
    pub proposed_version: u8,
}

impl Default for InitiateRequest {
    fn default() -> Self {
        Self {
            local_detail_calling: 65000,
            max_services_outstanding_calling: 10,
            max_services_outstanding_called: 10,
            data_structure_nesting_level: 5,
            proposed_version: 1,
        }
    }
}

impl InitiateRequest {
    /// Encode as initiate-RequestPDU (context tag 8 constructed).
    pub fn encode(&self) -> MmsResult<Vec<u8>> {
        let mut detail = BerEncoder::new();
        detail.encode_context(0, &unsigned_content(self.proposed_version as u64), false)?;
        detail.encode_context(1, &PARAMETER_CBB_CONTENT, false)?;
        detail.encode_context(2, &SERVICES_SUPPORTED_CONTENT, false)?;

        let mut body = BerEncoder::new();
        body.encode_context(0, &unsigned_content(self.local_detail_calling as u64), false)?;
        body.encode_context(
            1,
            &unsigned_content(self.max_services_outstanding_calling as u64),
            false,
        )?;
        body.encode_context(
            2,
            &unsigned_content(self.max_services_outstanding_called as u64),
            false,
        )?;
        body.encode_context(
            3,
            &unsigned_content(self.data_structure_nesting_level as u64),
            false,
        )?;
        body.encode_context(4, detail.as_bytes(), true)?;

        let mut out = BerEncoder::new();
        out.encode_context(PDU_INITIATE_REQUEST, body.as_bytes(), true)?;
        Ok(out.into_bytes())
    }
}

/// BIT STRING content (unused-bit octet included) for the parameter CBB.
const PARAMETER_CBB_CONTENT: [u8; 3] = [0x05, PARAMETER_CBB[0], PARAMETER_CBB[1]];

/// BIT STRING content for the services-supported mask.
const SERVICES_SUPPORTED_CONTENT: [u8; 12] = [
    0x03,
    SERVICES_SUPPORTED_CALLING[0],
    SERVICES_SUPPORTED_CALLING[1],
    SERVICES_SUPPORTED_CALLING[2],
    SERVICES_SUPPORTED_CALLING[3],
    SERVICES_SUPPORTED_CALLING[4],
    SERVICES_SUPPORTED_CALLING[5],
    SERVICES_SUPPORTED_CALLING[6],
    SERVICES_SUPPORTED_CALLING[7],
    SERVICES_SUPPORTED_CALLING[8],
    SERVICES_SUPPORTED_CALLING[9],
    SERVICES_SUPPORTED_CALLING[10],
];

/// Parameters the server answered with in its initiate-ResponsePDU.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitiateResponse {
    pub local_detail_called: Option<u32>,
    pub max_services_outstanding_calling: Option<u8>,
    pub max_services_outstanding_called: Option<u8>,
    pub negotiated_version: Option<u8>,
}

impl InitiateResponse {
    fn decode(content: &[u8]) -> MmsResult<Self> {
        let mut out = Self::default();
        let mut decoder = BerDecoder::new(content);
        while decoder.has_remaining() {
            let tlv = decoder.decode_tlv()?;
            if tlv.tag.class() != BerTagClass::ContextSpecific {
                continue;
            }
            match tlv.tag.number() {
                0 => out.local_detail_called = parse_integer(tlv.content).ok().map(|v| v as u32),
                1 => {
                    out.max_services_outstanding_calling =
                        parse_integer(tlv.content).ok().map(|v| v as u8)
                }
                2 => {
                    out.max_services_outstanding_called =
                        parse_integer(tlv.content).ok().map(|v| v as u8)
                }
                4 => {
                    // mmsInitResponseDetail: negotiated version is member [0]
                    let mut detail = BerDecoder::new(tlv.content);
                    while detail.has_remaining() {
                        let inner = detail.decode_tlv()?;
                        if inner.tag.is_context(0) {
                            out.negotiated_version =
                                parse_integer(inner.content).ok().map(|v| v as u8);
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(out)
    }
}

/// Encode a confirmed-RequestPDU `read` for several variables at once.
/// The response's access results align with the variable order.
pub fn encode_read(invoke_id: u16, variables: &[ObjectName]) -> MmsResult<Vec<u8>> {
    let mut list = BerEncoder::new();
    for variable in variables {
        let mut spec = BerEncoder::new();
        spec.encode_context(0, &variable.encode()?, true)?;
        let mut item = BerEncoder::new();
        item.encode_sequence(spec.as_bytes())?;
        list.encode_raw(item.as_bytes());
    }

    // variableAccessSpecification [1] { listOfVariable [0] }
    let mut lov = BerEncoder::new();
    lov.encode_context(0, list.as_bytes(), true)?;
    let mut vas = BerEncoder::new();
    vas.encode_context(1, lov.as_bytes(), true)?;

    confirmed_request(invoke_id, SERVICE_READ, vas.as_bytes())
}

/// Encode a confirmed-RequestPDU `write` of one value to one variable.
pub fn encode_write(invoke_id: u16, variable: &ObjectName, value: &MmsValue) -> MmsResult<Vec<u8>> {
    let mut spec = BerEncoder::new();
    spec.encode_context(0, &variable.encode()?, true)?;
    let mut item = BerEncoder::new();
    item.encode_sequence(spec.as_bytes())?;

    let mut body = BerEncoder::new();
    // variableAccessSpecification: listOfVariable [0]
    body.encode_context(0, item.as_bytes(), true)?;
    // listOfData [0]
    body.encode_context(0, &data::encode_value(value)?, true)?;

    confirmed_request(invoke_id, SERVICE_WRITE, body.as_bytes())
}

/// Encode a confirmed-RequestPDU `identify` (used as keep-alive).
pub fn encode_identify(invoke_id: u16) -> MmsResult<Vec<u8>> {
    confirmed_request(invoke_id, SERVICE_IDENTIFY, &[])
}

fn confirmed_request(invoke_id: u16, service_tag: u32, service_body: &[u8]) -> MmsResult<Vec<u8>> {
    let mut body = BerEncoder::new();
    // invokeID: plain INTEGER
    body.encode_integer(invoke_id as i64)?;
    body.encode_context(service_tag, service_body, service_tag != SERVICE_IDENTIFY)?;

    let mut out = BerEncoder::new();
    out.encode_context(PDU_CONFIRMED_REQUEST, body.as_bytes(), true)?;
    Ok(out.into_bytes())
}

/// One element of a read response or report access-result list.
#[derive(Debug, Clone, PartialEq)]
pub enum AccessResult {
    Success(MmsValue),
    Failure(DataAccessError),
}

impl AccessResult {
    /// The value, for successful results.
    pub fn value(&self) -> Option<&MmsValue> {
        match self {
            AccessResult::Success(value) => Some(value),
            AccessResult::Failure(_) => None,
        }
    }
}

/// One element of a write response list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteResult {
    Success,
    Failure(DataAccessError),
}

/// Server identification from an identify response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerIdentity {
    pub vendor: Option<String>,
    pub model: Option<String>,
    pub revision: Option<String>,
}

/// The service result inside a confirmed-ResponsePDU.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceResponse {
    Read(Vec<AccessResult>),
    Write(Vec<WriteResult>),
    Identify(ServerIdentity),
    /// Service tag this client does not interpret.
    Unknown { tag: u32 },
}

/// Decoded confirmed-ResponsePDU.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmedResponse {
    pub invoke_id: u16,
    pub service: ServiceResponse,
}

/// ServiceError carried by a confirmed-ErrorPDU: the error class is the
/// CHOICE tag, the code its integer value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceError {
    pub class: u8,
    pub code: i64,
}

impl From<ServiceError> for MmsError {
    fn from(e: ServiceError) -> Self {
        MmsError::Service {
            class: e.class,
            code: e.code,
        }
    }
}

/// Decoded unconfirmed informationReport.
#[derive(Debug, Clone, PartialEq)]
pub struct InformationReport {
    /// The named variable list, when reported by name ("RPT" for RCBs).
    pub variable_list: Option<ObjectName>,
    pub access_results: Vec<AccessResult>,
}

/// A decoded MMS PDU.
#[derive(Debug, Clone, PartialEq)]
pub enum MmsPdu {
    /// Request from the peer; this client only ever logs these.
    ConfirmedRequest { invoke_id: u16 },
    ConfirmedResponse(ConfirmedResponse),
    ConfirmedError {
        invoke_id: Option<u16>,
        error: ServiceError,
    },
    InformationReport(InformationReport),
    InitiateRequest,
    InitiateResponse(InitiateResponse),
}

/// Decode one MMS APDU (presentation layers already stripped).
///
/// # Errors
/// `Protocol` on an unknown top-level tag, `Ber` on malformed content.
pub fn decode_pdu(apdu: &[u8]) -> MmsResult<MmsPdu> {
    let mut decoder = BerDecoder::new(apdu);
    let outer = decoder.decode_tlv()?;
    if outer.tag.class() != BerTagClass::ContextSpecific {
        return Err(MmsError::Protocol(format!(
            "unexpected top-level PDU tag: {:?}",
            outer.tag
        )));
    }
    match outer.tag.number() {
        PDU_CONFIRMED_REQUEST => {
            let mut body = BerDecoder::new(outer.content);
            let invoke_id = body.decode_integer()? as u16;
            Ok(MmsPdu::ConfirmedRequest { invoke_id })
        }
        PDU_CONFIRMED_RESPONSE => decode_confirmed_response(outer.content),
        PDU_CONFIRMED_ERROR => decode_confirmed_error(outer.content),
        PDU_UNCONFIRMED => decode_unconfirmed(outer.content),
        PDU_INITIATE_REQUEST => Ok(MmsPdu::InitiateRequest),
        PDU_INITIATE_RESPONSE => Ok(MmsPdu::InitiateResponse(InitiateResponse::decode(
            outer.content,
        )?)),
        other => Err(MmsError::Protocol(format!(
            "unknown MMS PDU tag: [{}]",
            other
        ))),
    }
}

fn decode_confirmed_response(content: &[u8]) -> MmsResult<MmsPdu> {
    let mut body = BerDecoder::new(content);
    let invoke_id = body.decode_integer()? as u16;
    let service_tlv = body.decode_tlv()?;
    if service_tlv.tag.class() != BerTagClass::ContextSpecific {
        return Err(MmsError::Ber(format!(
            "unexpected service tag in confirmed response: {:?}",
            service_tlv.tag
        )));
    }
    let service = match service_tlv.tag.number() {
        SERVICE_READ => ServiceResponse::Read(decode_read_response(service_tlv.content)?),
        SERVICE_WRITE => ServiceResponse::Write(decode_write_response(service_tlv.content)?),
        SERVICE_IDENTIFY => ServiceResponse::Identify(decode_identify_response(
            service_tlv.content,
        )?),
        tag => ServiceResponse::Unknown { tag },
    };
    Ok(MmsPdu::ConfirmedResponse(ConfirmedResponse {
        invoke_id,
        service,
    }))
}

fn decode_read_response(content: &[u8]) -> MmsResult<Vec<AccessResult>> {
    let mut body = BerDecoder::new(content);
    let mut first = body.decode_tlv()?;
    // Optional echoed variableAccessSpecification [0] before the
    // listOfAccessResult [1].
    if first.tag.is_context(0) {
        first = body.decode_tlv()?;
    }
    if !first.tag.is_context(1) {
        return Err(MmsError::Ber(format!(
            "read response without listOfAccessResult: {:?}",
            first.tag
        )));
    }
    decode_access_results(first.content)
}

/// Decode a concatenation of AccessResult TLVs: `failure [0]` carries a
/// DataAccessError code, everything else is `Data`.
pub fn decode_access_results(content: &[u8]) -> MmsResult<Vec<AccessResult>> {
    let mut decoder = BerDecoder::new(content);
    let mut results = Vec::new();
    while decoder.has_remaining() {
        let tlv = decoder.decode_tlv()?;
        if tlv.tag.is_context(0) && !tlv.tag.is_constructed() {
            let code = parse_integer(tlv.content).unwrap_or(-1);
            results.push(AccessResult::Failure(DataAccessError::from_code(
                code as u8,
            )));
        } else {
            results.push(AccessResult::Success(data::decode_value(&tlv)?));
        }
    }
    Ok(results)
}

fn decode_write_response(content: &[u8]) -> MmsResult<Vec<WriteResult>> {
    let mut decoder = BerDecoder::new(content);
    let mut results = Vec::new();
    while decoder.has_remaining() {
        let tlv = decoder.decode_tlv()?;
        if tlv.tag.is_context(1) {
            results.push(WriteResult::Success);
        } else if tlv.tag.is_context(0) {
            let code = parse_integer(tlv.content).unwrap_or(-1);
            results.push(WriteResult::Failure(DataAccessError::from_code(code as u8)));
        } else {
            return Err(MmsError::Ber(format!(
                "unexpected write result tag: {:?}",
                tlv.tag
            )));
        }
    }
    Ok(results)
}

fn decode_identify_response(content: &[u8]) -> MmsResult<ServerIdentity> {
    let mut decoder = BerDecoder::new(content);
    let mut identity = ServerIdentity::default();
    while decoder.has_remaining() {
        let tlv = decoder.decode_tlv()?;
        let text = String::from_utf8_lossy(tlv.content).into_owned();
        match tlv.tag.number() {
            0 => identity.vendor = Some(text),
            1 => identity.model = Some(text),
            2 => identity.revision = Some(text),
            _ => {}
        }
    }
    Ok(identity)
}

fn decode_confirmed_error(content: &[u8]) -> MmsResult<MmsPdu> {
    let mut body = BerDecoder::new(content);
    let mut invoke_id = None;
    let mut error = ServiceError { class: 12, code: -1 };
    while body.has_remaining() {
        let tlv = body.decode_tlv()?;
        if tlv.tag.is_context(0) {
            invoke_id = parse_integer(tlv.content).ok().map(|v| v as u16);
        } else if tlv.tag.is_context(2) {
            // serviceError { errorClass [0] CHOICE { <class> INTEGER } }
            let mut se = BerDecoder::new(tlv.content);
            while se.has_remaining() {
                let member = se.decode_tlv()?;
                if member.tag.is_context(0) && member.tag.is_constructed() {
                    let mut class_reader = BerDecoder::new(member.content);
                    let class_tlv = class_reader.decode_tlv()?;
                    error = ServiceError {
                        class: class_tlv.tag.number() as u8,
                        code: parse_integer(class_tlv.content).unwrap_or(-1),
                    };
                }
            }
        }
    }
    Ok(MmsPdu::ConfirmedError { invoke_id, error })
}

fn decode_unconfirmed(content: &[u8]) -> MmsResult<MmsPdu> {
    let mut body = BerDecoder::new(content);
    let service = body.decode_tlv()?;
    if !service.tag.is_context(SERVICE_INFORMATION_REPORT) {
        return Err(MmsError::Protocol(format!(
            "unknown unconfirmed service: {:?}",
            service.tag
        )));
    }

    let mut report = BerDecoder::new(service.content);
    let first = report.decode_tlv()?;
    let (variable_list, results_tlv) = if first.tag.is_context(1) {
        // variableListName, then listOfAccessResult [0]
        let name = ObjectName::decode(first.content).ok();
        (name, report.decode_tlv()?)
    } else if first.tag.is_context(0) {
        // listOfVariable form: a second [0] holds the results; with only
        // one member the single [0] is the result list itself.
        if report.has_remaining() {
            (None, report.decode_tlv()?)
        } else {
            (None, first)
        }
    } else {
        return Err(MmsError::Protocol(format!(
            "informationReport without variable specification: {:?}",
            first.tag
        )));
    };

    if !results_tlv.tag.is_context(0) {
        return Err(MmsError::Protocol(format!(
            "informationReport without listOfAccessResult: {:?}",
            results_tlv.tag
        )));
    }
    let access_results = decode_access_results(results_tlv.content)?;
    Ok(MmsPdu::InformationReport(InformationReport {
        variable_list,
        access_results,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mms_core::hex_string;

    #[test]
    fn test_initiate_request_layout() {
        let encoded = InitiateRequest::default().encode().unwrap();
        assert_eq!(encoded[0], 0xA8);
        // localDetailCalling 65000 = 00 FD E8
        assert_eq!(&encoded[2..7], &[0x80, 0x03, 0x00, 0xFD, 0xE8]);
        assert_eq!(&encoded[7..10], &[0x81, 0x01, 0x0A]);
        assert_eq!(&encoded[10..13], &[0x82, 0x01, 0x0A]);
        assert_eq!(&encoded[13..16], &[0x83, 0x01, 0x05]);
        // detail: version 1, CBB fb 00 (5 unused), services mask
        let detail = &encoded[16..];
        assert_eq!(&detail[..2], &[0xA4, 0x16]);
        assert_eq!(&detail[2..5], &[0x80, 0x01, 0x01]);
        assert_eq!(&detail[5..10], &[0x81, 0x03, 0x05, 0xFB, 0x00]);
        assert_eq!(&detail[10..12], &[0x82, 0x0C]);
        assert_eq!(&detail[12..15], &[0x03, 0xEE, 0x1C]);
    }

    #[test]
    fn test_encode_read_single_variable() {
        let name = ObjectName::new("D", "I");
        let encoded = encode_read(0x012C, &[name]).unwrap();
        // a0 { 02 02 01 2c, a4 { a1 { a0 { 30 { a0 { a1 { 1a "D", 1a "I" }}}}}}}
        assert_eq!(
            hex_string(&encoded),
            "a0 16 02 02 01 2c a4 10 a1 0e a0 0c 30 0a a0 08 a1 06 1a 01 44 1a 01 49"
        );
    }

    #[test]
    fn test_encode_write_boolean() {
        let name = ObjectName::new("D", "I");
        let encoded = encode_write(0x012D, &name, &MmsValue::Bool(true)).unwrap();
        assert_eq!(
            hex_string(&encoded),
            "a0 19 02 02 01 2d a5 13 a0 0c 30 0a a0 08 a1 06 1a 01 44 1a 01 49 a0 03 83 01 ff"
        );
    }

    #[test]
    fn test_encode_identify() {
        let encoded = encode_identify(0x0001).unwrap();
        assert_eq!(hex_string(&encoded), "a0 05 02 01 01 82 00");
    }

    #[test]
    fn test_decode_read_response() {
        // a1 { invokeID 300, a4 { a1 listOfAccessResult { 83 01 00, 80 01 03 } } }
        let apdu = [
            0xA1, 0x0E, 0x02, 0x02, 0x01, 0x2C, 0xA4, 0x08, 0xA1, 0x06, 0x83, 0x01, 0x00, 0x80,
            0x01, 0x03,
        ];
        match decode_pdu(&apdu).unwrap() {
            MmsPdu::ConfirmedResponse(resp) => {
                assert_eq!(resp.invoke_id, 300);
                match resp.service {
                    ServiceResponse::Read(results) => {
                        assert_eq!(results.len(), 2);
                        assert_eq!(results[0], AccessResult::Success(MmsValue::Bool(false)));
                        assert_eq!(
                            results[1],
                            AccessResult::Failure(DataAccessError::ObjectAccessDenied)
                        );
                    }
                    other => panic!("expected read response, got {:?}", other),
                }
            }
            other => panic!("expected confirmed response, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_write_response() {
        // a1 { invokeID 1, a5 { 81 00 (success), 80 01 03 (access denied) } }
        let apdu = [
            0xA1, 0x0C, 0x02, 0x01, 0x01, 0xA5, 0x07, 0x81, 0x00, 0x80, 0x01, 0x03,
        ];
        match decode_pdu(&apdu).unwrap() {
            MmsPdu::ConfirmedResponse(resp) => match resp.service {
                ServiceResponse::Write(results) => {
                    assert_eq!(
                        results,
                        vec![
                            WriteResult::Success,
                            WriteResult::Failure(DataAccessError::ObjectAccessDenied)
                        ]
                    );
                }
                other => panic!("expected write response, got {:?}", other),
            },
            other => panic!("expected confirmed response, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_confirmed_error() {
        // a2 { [0] invokeID 5, [2] serviceError { [0] { access [7] = 3 } } }
        let apdu = [
            0xA2, 0x0A, 0x80, 0x01, 0x05, 0xA2, 0x05, 0xA0, 0x03, 0x87, 0x01, 0x03,
        ];
        match decode_pdu(&apdu).unwrap() {
            MmsPdu::ConfirmedError { invoke_id, error } => {
                assert_eq!(invoke_id, Some(5));
                assert_eq!(error, ServiceError { class: 7, code: 3 });
            }
            other => panic!("expected confirmed error, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_information_report() {
        // a3 { a0 { a1 { 80 03 "RPT" }, a0 { 8a 02 "AB", 86 01 07 } } }
        let apdu = [
            0xA3, 0x12, 0xA0, 0x10, 0xA1, 0x05, 0x80, 0x03, b'R', b'P', b'T', 0xA0, 0x07, 0x8A,
            0x02, b'A', b'B', 0x86, 0x01, 0x07,
        ];
        match decode_pdu(&apdu).unwrap() {
            MmsPdu::InformationReport(report) => {
                assert_eq!(
                    report.variable_list,
                    Some(ObjectName::new("", "RPT"))
                );
                assert_eq!(report.access_results.len(), 2);
                assert_eq!(
                    report.access_results[0],
                    AccessResult::Success(MmsValue::VisibleString("AB".into()))
                );
                assert_eq!(
                    report.access_results[1],
                    AccessResult::Success(MmsValue::Uint(7))
                );
            }
            other => panic!("expected information report, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_initiate_response() {
        // a9 { 80 02 19 00 (localDetail 6400), a4 { 80 01 01 } }
        let apdu = [
            0xA9, 0x09, 0x80, 0x02, 0x19, 0x00, 0xA4, 0x03, 0x80, 0x01, 0x01,
        ];
        match decode_pdu(&apdu).unwrap() {
            MmsPdu::InitiateResponse(resp) => {
                assert_eq!(resp.local_detail_called, Some(6400));
                assert_eq!(resp.negotiated_version, Some(1));
            }
            other => panic!("expected initiate response, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_unknown_pdu_tag() {
        assert!(matches!(
            decode_pdu(&[0xAB, 0x00]),
            Err(MmsError::Protocol(_))
        ));
    }

    #[test]
    fn test_invoke_id_wraparound_encoding() {
        let low = encode_identify(0x0001).unwrap();
        let high = encode_identify(0xFFFF).unwrap();
        assert_eq!(&low[2..5], &[0x02, 0x01, 0x01]);
        // 0xFFFF as a non-negative INTEGER needs a 0x00 pad
        assert_eq!(&high[2..7], &[0x02, 0x03, 0x00, 0xFF, 0xFF]);
    }
}
