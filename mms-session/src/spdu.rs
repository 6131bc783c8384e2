//! ISO session layer SPDUs (X.225 subset)
//!
//! Association setup travels in a CONNECT SPDU whose user-data parameter
//! carries the presentation CP-type; the peer answers with ACCEPT. After
//! that, every data TSDU is prefixed by the concatenated GIVE-TOKENS and
//! DATA SPDUs, a fixed four octets.

use mms_core::{MmsError, MmsResult};

/// SPDU type codes.
const SPDU_CONNECT: u8 = 0x0D;
const SPDU_ACCEPT: u8 = 0x0E;

/// GIVE-TOKENS + DATA prefix on every data TSDU.
pub const DATA_PREFIX: [u8; 4] = [0x01, 0x00, 0x01, 0x00];

/// Parameter identifiers used in CONNECT/ACCEPT.
const PGI_CONNECT_ACCEPT: u8 = 0x05;
const PI_PROTOCOL_OPTIONS: u8 = 0x13;
const PI_VERSION_NUMBER: u8 = 0x16;
const PI_SESSION_REQUIREMENT: u8 = 0x14;
const PI_CALLING_SESSION_SELECTOR: u8 = 0x33;
const PI_CALLED_SESSION_SELECTOR: u8 = 0x34;
const PI_USER_DATA: u8 = 0xC1;

/// Prefix a data TSDU with the GIVE-TOKENS + DATA SPDUs.
pub fn wrap_data(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(DATA_PREFIX.len() + payload.len());
    out.extend_from_slice(&DATA_PREFIX);
    out.extend_from_slice(payload);
    out
}

/// Strip the GIVE-TOKENS + DATA prefix from an incoming TSDU. Tolerates a
/// missing prefix and returns the input unchanged then.
pub fn unwrap_data(tsdu: &[u8]) -> &[u8] {
    match tsdu.strip_prefix(&DATA_PREFIX[..]) {
        Some(rest) => rest,
        None => tsdu,
    }
}

/// Build a CONNECT SPDU carrying `user_data` (the presentation CP-type).
///
/// Parameters mirror the observed association: protocol options 0,
/// version 2, duplex session requirement, session selectors `00 01`.
///
/// # Errors
/// `Framing` when the SPDU would exceed the one-octet length fields used
/// here (initiate payloads are far below that).
pub fn connect(user_data: &[u8]) -> MmsResult<Vec<u8>> {
    let mut body = Vec::with_capacity(user_data.len() + 24);
    body.extend_from_slice(&[
        PGI_CONNECT_ACCEPT,
        0x06,
        PI_PROTOCOL_OPTIONS,
        0x01,
        0x00,
        PI_VERSION_NUMBER,
        0x01,
        0x02,
    ]);
    body.extend_from_slice(&[PI_SESSION_REQUIREMENT, 0x02, 0x00, 0x02]);
    body.extend_from_slice(&[PI_CALLING_SESSION_SELECTOR, 0x02, 0x00, 0x01]);
    body.extend_from_slice(&[PI_CALLED_SESSION_SELECTOR, 0x02, 0x00, 0x01]);
    if user_data.len() > 0xFE {
        return Err(MmsError::Framing(format!(
            "session user data too long: {} octets",
            user_data.len()
        )));
    }
    body.push(PI_USER_DATA);
    body.push(user_data.len() as u8);
    body.extend_from_slice(user_data);

    if body.len() > 0xFE {
        return Err(MmsError::Framing(format!(
            "CONNECT SPDU too long: {} octets",
            body.len()
        )));
    }
    let mut out = Vec::with_capacity(body.len() + 2);
    out.push(SPDU_CONNECT);
    out.push(body.len() as u8);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Parse an ACCEPT SPDU and return its user-data parameter (the
/// presentation CPA).
///
/// The parameter walk skips everything except user data; an extended
/// (0xFF + two octets) parameter length is accepted.
///
/// # Errors
/// `Protocol` when the SPDU is not an ACCEPT, `Framing` on a malformed
/// parameter list or a missing user-data parameter.
pub fn parse_accept(spdu: &[u8]) -> MmsResult<&[u8]> {
    if spdu.len() < 2 {
        return Err(MmsError::Framing("SPDU too short".to_string()));
    }
    if spdu[0] != SPDU_ACCEPT {
        return Err(MmsError::Protocol(format!(
            "expected session ACCEPT, got SPDU type 0x{:02X}",
            spdu[0]
        )));
    }
    let mut pos = 2;
    while pos < spdu.len() {
        if pos + 2 > spdu.len() {
            return Err(MmsError::Framing("truncated session parameter".to_string()));
        }
        let code = spdu[pos];
        let (length, header) = if spdu[pos + 1] == 0xFF {
            if pos + 4 > spdu.len() {
                return Err(MmsError::Framing(
                    "truncated extended parameter length".to_string(),
                ));
            }
            (
                u16::from_be_bytes([spdu[pos + 2], spdu[pos + 3]]) as usize,
                4,
            )
        } else {
            (spdu[pos + 1] as usize, 2)
        };
        let start = pos + header;
        let end = start + length;
        if end > spdu.len() {
            return Err(MmsError::Framing(format!(
                "session parameter 0x{:02X} overruns SPDU",
                code
            )));
        }
        if code == PI_USER_DATA {
            return Ok(&spdu[start..end]);
        }
        pos = end;
    }
    Err(MmsError::Framing(
        "ACCEPT SPDU without user data".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_unwrap_data() {
        let wrapped = wrap_data(&[0x61, 0x00]);
        assert_eq!(&wrapped[..4], &DATA_PREFIX);
        assert_eq!(unwrap_data(&wrapped), &[0x61, 0x00]);
        // Missing prefix passes through untouched
        assert_eq!(unwrap_data(&[0x61, 0x00]), &[0x61, 0x00]);
    }

    #[test]
    fn test_connect_layout() {
        let user = [0x31, 0x02, 0xA0, 0x00];
        let spdu = connect(&user).unwrap();
        assert_eq!(spdu[0], SPDU_CONNECT);
        assert_eq!(spdu[1] as usize, spdu.len() - 2);
        assert_eq!(&spdu[2..10], &[0x05, 0x06, 0x13, 0x01, 0x00, 0x16, 0x01, 0x02]);
        // Last parameter is user data
        let tail = &spdu[spdu.len() - user.len() - 2..];
        assert_eq!(tail[0], PI_USER_DATA);
        assert_eq!(tail[1] as usize, user.len());
        assert_eq!(&tail[2..], &user);
    }

    #[test]
    fn test_parse_accept_finds_user_data() {
        // ACCEPT with a connect-accept group, a selector, then user data.
        let spdu = [
            SPDU_ACCEPT,
            0x10,
            0x05,
            0x03,
            0x13,
            0x01,
            0x00,
            0x34,
            0x02,
            0x00,
            0x01,
            PI_USER_DATA,
            0x03,
            0xAA,
            0xBB,
            0xCC,
        ];
        assert_eq!(parse_accept(&spdu).unwrap(), &[0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn test_parse_accept_extended_length() {
        let mut spdu = vec![SPDU_ACCEPT, 0x00, PI_USER_DATA, 0xFF, 0x01, 0x04];
        spdu.extend_from_slice(&[1, 2, 3, 4, 5, 6]);
        spdu.extend(std::iter::repeat(0u8).take(254));
        let user = parse_accept(&spdu).unwrap();
        assert_eq!(user.len(), 0x0104);
        assert_eq!(&user[..4], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_parse_accept_rejects_other_spdus() {
        assert!(matches!(
            parse_accept(&[SPDU_CONNECT, 0x00]),
            Err(MmsError::Protocol(_))
        ));
    }

    #[test]
    fn test_connect_roundtrips_through_parse_accept_shape() {
        let user = [0xDE, 0xAD];
        let mut spdu = connect(&user).unwrap();
        spdu[0] = SPDU_ACCEPT;
        assert_eq!(parse_accept(&spdu).unwrap(), &user);
    }
}
