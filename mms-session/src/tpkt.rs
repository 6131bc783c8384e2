//! TPKT (RFC 1006) framing
//!
//! Every ISO payload on the wire is prefixed with a 4-octet header:
//! version (0x03), reserved (0x00) and the big-endian total length
//! including the header itself.

use mms_core::{MmsError, MmsResult};
use mms_transport::StreamAccessor;

/// TPKT protocol version.
pub const TPKT_VERSION: u8 = 0x03;

/// Header length in octets.
pub const TPKT_HEADER_LENGTH: usize = 4;

/// Largest payload a single TPKT can carry.
pub const TPKT_MAX_PAYLOAD: usize = 0xFFFF - TPKT_HEADER_LENGTH;

/// Send one TPKT frame carrying `payload`.
///
/// # Errors
/// Returns `Framing` when the payload exceeds the 16-bit length field,
/// transport errors otherwise.
pub async fn send<S: StreamAccessor + ?Sized>(stream: &mut S, payload: &[u8]) -> MmsResult<()> {
    if payload.len() > TPKT_MAX_PAYLOAD {
        return Err(MmsError::Framing(format!(
            "TPKT payload too long: {} octets",
            payload.len()
        )));
    }
    let length = (TPKT_HEADER_LENGTH + payload.len()) as u16;
    let mut frame = Vec::with_capacity(length as usize);
    frame.push(TPKT_VERSION);
    frame.push(0x00);
    frame.extend_from_slice(&length.to_be_bytes());
    frame.extend_from_slice(payload);
    stream.write_all(&frame).await?;
    stream.flush().await
}

/// Receive one TPKT frame and return its payload.
///
/// Short reads are retried by the transport until the exact count arrives;
/// EOF mid-frame surfaces as `TransportClosed`.
///
/// # Errors
/// `Framing` on a wrong version, non-zero reserved octet or a length below
/// the header size.
pub async fn recv<S: StreamAccessor + ?Sized>(stream: &mut S) -> MmsResult<Vec<u8>> {
    let mut header = [0u8; TPKT_HEADER_LENGTH];
    stream.read_exact(&mut header).await?;

    if header[0] != TPKT_VERSION {
        return Err(MmsError::Framing(format!(
            "unexpected TPKT version: 0x{:02X}",
            header[0]
        )));
    }
    if header[1] != 0x00 {
        return Err(MmsError::Framing(format!(
            "unexpected TPKT reserved octet: 0x{:02X}",
            header[1]
        )));
    }
    let length = u16::from_be_bytes([header[2], header[3]]) as usize;
    if length < TPKT_HEADER_LENGTH {
        return Err(MmsError::Framing(format!("invalid TPKT length: {}", length)));
    }

    let mut payload = vec![0u8; length - TPKT_HEADER_LENGTH];
    stream.read_exact(&mut payload).await?;
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mms_transport::MemoryTransport;

    #[tokio::test]
    async fn test_send_frames_cr_payload() {
        // The 17-octet COTP CR from the protocol captures frames as
        // 03 00 00 15 ++ payload.
        let payload = [
            0xE0, 0x00, 0x00, 0x00, 0x00, 0x00, 0xC1, 0x02, 0x00, 0x01, 0xC2, 0x02, 0x00, 0x01,
            0xC0, 0x01, 0x0A,
        ];
        let mut transport = MemoryTransport::new();
        send(&mut transport, &payload).await.unwrap();
        let frame = transport.take_outbound();
        assert_eq!(&frame[..4], &[0x03, 0x00, 0x00, 0x15]);
        assert_eq!(&frame[4..], &payload);
    }

    #[tokio::test]
    async fn test_roundtrip() {
        let payload: Vec<u8> = (0..=255u8).cycle().take(4000).collect();
        let mut transport = MemoryTransport::new();
        send(&mut transport, &payload).await.unwrap();
        let frame = transport.take_outbound();
        transport.push_inbound(frame);
        assert_eq!(recv(&mut transport).await.unwrap(), payload);
    }

    #[tokio::test]
    async fn test_recv_across_split_reads() {
        let mut transport = MemoryTransport::new();
        transport.push_inbound(vec![0x03]);
        transport.push_inbound(vec![0x00, 0x00]);
        transport.push_inbound(vec![0x07, 0xAA, 0xBB]);
        transport.push_inbound(vec![0xCC]);
        assert_eq!(recv(&mut transport).await.unwrap(), vec![0xAA, 0xBB, 0xCC]);
    }

    #[tokio::test]
    async fn test_recv_rejects_bad_version() {
        let mut transport = MemoryTransport::new();
        transport.push_inbound(vec![0x02, 0x00, 0x00, 0x04]);
        assert!(matches!(
            recv(&mut transport).await,
            Err(MmsError::Framing(_))
        ));
    }

    #[tokio::test]
    async fn test_recv_rejects_short_length() {
        let mut transport = MemoryTransport::new();
        transport.push_inbound(vec![0x03, 0x00, 0x00, 0x03]);
        assert!(matches!(
            recv(&mut transport).await,
            Err(MmsError::Framing(_))
        ));
    }

    #[tokio::test]
    async fn test_eof_mid_frame_is_transport_closed() {
        let mut transport = MemoryTransport::new();
        transport.push_inbound(vec![0x03, 0x00, 0x00, 0x10, 0x01]);
        assert!(matches!(
            recv(&mut transport).await,
            Err(MmsError::TransportClosed)
        ));
    }

    #[tokio::test]
    async fn test_oversized_payload_rejected() {
        let mut transport = MemoryTransport::new();
        let payload = vec![0u8; TPKT_MAX_PAYLOAD + 1];
        assert!(send(&mut transport, &payload).await.is_err());
    }
}
