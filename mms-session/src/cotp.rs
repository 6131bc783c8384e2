//! COTP class 0 (ISO 8073) over TPKT
//!
//! Only the client side of class 0 is needed: a CR/CC handshake, DT
//! transfer with segmentation at the negotiated TPDU size, and DR
//! detection. Flow control, checksums and the other classes do not exist
//! in class 0.

use crate::tpkt;
use mms_core::{MmsError, MmsResult};
use mms_transport::TransportLayer;
use std::time::Duration;
use tracing::{debug, warn};

/// TPDU type codes (high nibble of the second octet).
const TPDU_CR: u8 = 0xE0;
const TPDU_CC: u8 = 0xD0;
const TPDU_DR: u8 = 0x80;
const TPDU_DT: u8 = 0xF0;

/// DT TPDU header: length indicator, type, TPDU-NR/EOT octet.
const DT_HEADER_LENGTH: usize = 3;
/// End-of-TSDU bit in the DT TPDU-NR octet.
const DT_EOT: u8 = 0x80;

/// Parameter codes inside CR/CC.
const PARAM_TPDU_SIZE: u8 = 0xC0;
const PARAM_CALLING_TSAP: u8 = 0xC1;
const PARAM_CALLED_TSAP: u8 = 0xC2;

/// COTP configuration.
#[derive(Debug, Clone)]
pub struct CotpConfig {
    /// Calling transport selector.
    pub calling_tsap: Vec<u8>,
    /// Called transport selector.
    pub called_tsap: Vec<u8>,
    /// Proposed maximum TPDU size as the ISO 8073 power-of-two code
    /// (0x0B = 2048 octets).
    pub tpdu_size_code: u8,
    /// CR/CC handshake timeout.
    pub connect_timeout: Duration,
}

impl Default for CotpConfig {
    fn default() -> Self {
        Self {
            calling_tsap: vec![0x00, 0x01],
            called_tsap: vec![0x00, 0x01],
            tpdu_size_code: 0x0B,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl CotpConfig {
    /// Maximum TPDU size in octets for the configured size code.
    pub fn max_tpdu_size(&self) -> usize {
        1usize << self.tpdu_size_code
    }
}

/// COTP class-0 session over a transport.
///
/// Owns the transport; the connection handshake must complete before data
/// transfer.
#[derive(Debug)]
pub struct CotpSession<T: TransportLayer> {
    transport: T,
    config: CotpConfig,
    src_ref: u16,
    dst_ref: u16,
    connected: bool,
}

impl<T: TransportLayer> CotpSession<T> {
    /// Create a session over an already-constructed transport.
    pub fn new(transport: T, config: CotpConfig) -> Self {
        Self {
            transport,
            config,
            src_ref: rand::random::<u16>(),
            dst_ref: 0,
            connected: false,
        }
    }

    /// Our source reference (random per session).
    pub fn src_ref(&self) -> u16 {
        self.src_ref
    }

    /// Peer reference learned from the CC TPDU.
    pub fn dst_ref(&self) -> u16 {
        self.dst_ref
    }

    /// Access the underlying transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Open the transport and run the CR/CC handshake.
    ///
    /// # Errors
    /// `CotpRefused` when the peer answers with a DR or an unexpected TPDU,
    /// `Timeout` when no CC arrives within the configured window.
    pub async fn connect(&mut self) -> MmsResult<()> {
        self.transport.open().await?;

        let cr = self.build_cr();
        debug!(src_ref = self.src_ref, "sending COTP CR");
        tpkt::send(&mut self.transport, &cr).await?;

        self.transport
            .set_timeout(Some(self.config.connect_timeout))
            .await?;
        let cc = tpkt::recv(&mut self.transport).await?;
        self.parse_cc(&cc)?;
        self.transport.set_timeout(None).await?;

        self.connected = true;
        debug!(dst_ref = self.dst_ref, "COTP connection established");
        Ok(())
    }

    fn build_cr(&self) -> Vec<u8> {
        let mut pdu = Vec::with_capacity(18);
        pdu.push(0); // length indicator, patched below
        pdu.push(TPDU_CR);
        pdu.extend_from_slice(&0u16.to_be_bytes()); // dst-ref, unknown yet
        pdu.extend_from_slice(&self.src_ref.to_be_bytes());
        pdu.push(0x00); // class 0, no options

        pdu.push(PARAM_TPDU_SIZE);
        pdu.push(0x01);
        pdu.push(self.config.tpdu_size_code);
        pdu.push(PARAM_CALLED_TSAP);
        pdu.push(self.config.called_tsap.len() as u8);
        pdu.extend_from_slice(&self.config.called_tsap);
        pdu.push(PARAM_CALLING_TSAP);
        pdu.push(self.config.calling_tsap.len() as u8);
        pdu.extend_from_slice(&self.config.calling_tsap);

        pdu[0] = (pdu.len() - 1) as u8;
        pdu
    }

    fn parse_cc(&mut self, pdu: &[u8]) -> MmsResult<()> {
        if pdu.len() < 7 {
            return Err(MmsError::Framing(format!(
                "CC TPDU too short: {} octets",
                pdu.len()
            )));
        }
        let li = pdu[0] as usize;
        let tpdu_type = pdu[1];
        if tpdu_type == TPDU_DR {
            return Err(MmsError::CotpRefused(
                "peer answered CR with disconnect request".to_string(),
            ));
        }
        if tpdu_type != TPDU_CC {
            return Err(MmsError::CotpRefused(format!(
                "unexpected TPDU during connect: type=0x{:02X}",
                tpdu_type
            )));
        }
        // Some stacks append options beyond LI; only reject when LI
        // overruns the frame.
        if li + 1 > pdu.len() {
            return Err(MmsError::Framing(format!(
                "inconsistent CC TPDU length: LI={}, frame={}",
                li,
                pdu.len()
            )));
        }
        // The peer's src-ref (octets 4..6) becomes our dst-ref.
        self.dst_ref = u16::from_be_bytes([pdu[4], pdu[5]]);
        Ok(())
    }

    /// Send one TSDU, segmenting into DT TPDUs at the negotiated size.
    /// EOT is set on the last (or only) fragment.
    pub async fn send_data(&mut self, user_data: &[u8]) -> MmsResult<()> {
        if !self.connected {
            return Err(MmsError::Protocol(
                "COTP session is not connected".to_string(),
            ));
        }
        if user_data.is_empty() {
            // Zero-length TSDU still needs one (empty) DT.
            return tpkt::send(&mut self.transport, &[0x02, TPDU_DT, DT_EOT]).await;
        }
        let max_fragment = self.config.max_tpdu_size() - DT_HEADER_LENGTH;
        let mut chunks = user_data.chunks(max_fragment).peekable();
        while let Some(chunk) = chunks.next() {
            let eot = if chunks.peek().is_none() { DT_EOT } else { 0x00 };
            let mut pdu = Vec::with_capacity(DT_HEADER_LENGTH + chunk.len());
            pdu.push(0x02);
            pdu.push(TPDU_DT);
            pdu.push(eot);
            pdu.extend_from_slice(chunk);
            tpkt::send(&mut self.transport, &pdu).await?;
        }
        Ok(())
    }

    /// Receive one complete TSDU: DT user-data accumulated until a TPDU
    /// with EOT set.
    ///
    /// # Errors
    /// `PeerDisconnect` on a DR or any other non-DT TPDU.
    pub async fn recv_data(&mut self) -> MmsResult<Vec<u8>> {
        if !self.connected {
            return Err(MmsError::Protocol(
                "COTP session is not connected".to_string(),
            ));
        }
        let mut assembled = Vec::new();
        loop {
            let payload = tpkt::recv(&mut self.transport).await?;
            if payload.len() < DT_HEADER_LENGTH {
                return Err(MmsError::Framing(format!(
                    "TPDU too short: {} octets",
                    payload.len()
                )));
            }
            let tpdu_type = payload[1];
            if tpdu_type != TPDU_DT {
                warn!(tpdu_type, "non-DT TPDU terminates the session");
                self.connected = false;
                return Err(MmsError::PeerDisconnect(tpdu_type));
            }
            assembled.extend_from_slice(&payload[DT_HEADER_LENGTH..]);
            if payload[2] & DT_EOT != 0 {
                return Ok(assembled);
            }
        }
    }

    /// Set the read timeout on the underlying transport.
    pub async fn set_read_timeout(&mut self, timeout: Option<Duration>) -> MmsResult<()> {
        self.transport.set_timeout(timeout).await
    }

    /// True once the CR/CC handshake has completed and no disconnect has
    /// been seen.
    pub fn is_connected(&self) -> bool {
        self.connected && !self.transport.is_closed()
    }

    /// Close the transport. Dropping the TCP session implicitly releases
    /// server-side URCB reservations; no explicit disconnect is sent.
    pub async fn close(&mut self) -> MmsResult<()> {
        self.connected = false;
        self.transport.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mms_transport::MemoryTransport;

    fn cc_frame(src_ref: u16) -> Vec<u8> {
        // TPKT around a minimal CC TPDU echoing dst-ref = our src-ref.
        let cc = [
            0x06,
            TPDU_CC,
            0x12,
            0x34,
            (src_ref >> 8) as u8,
            (src_ref & 0xFF) as u8,
            0x00,
        ];
        let mut frame = vec![0x03, 0x00, 0x00, (4 + cc.len()) as u8];
        frame.extend_from_slice(&cc);
        frame
    }

    fn dt_frame(eot: bool, data: &[u8]) -> Vec<u8> {
        let len = 4 + DT_HEADER_LENGTH + data.len();
        let mut frame = vec![0x03, 0x00, (len >> 8) as u8, (len & 0xFF) as u8];
        frame.extend_from_slice(&[0x02, TPDU_DT, if eot { DT_EOT } else { 0x00 }]);
        frame.extend_from_slice(data);
        frame
    }

    async fn connected_session() -> CotpSession<MemoryTransport> {
        let mut session = CotpSession::new(MemoryTransport::new(), CotpConfig::default());
        session
            .transport_mut()
            .push_inbound(cc_frame(0xBEEF));
        session.connect().await.unwrap();
        session.transport_mut().take_outbound();
        session
    }

    #[tokio::test]
    async fn test_connect_builds_cr_and_learns_dst_ref() {
        let mut session = CotpSession::new(MemoryTransport::new(), CotpConfig::default());
        session.transport_mut().push_inbound(cc_frame(0xCAFE));
        session.connect().await.unwrap();

        let sent = session.transport_mut().take_outbound();
        // TPKT header + CR TPDU
        assert_eq!(&sent[..4], &[0x03, 0x00, 0x00, 0x16]);
        let cr = &sent[4..];
        assert_eq!(cr[0] as usize, cr.len() - 1);
        assert_eq!(cr[1], TPDU_CR);
        assert_eq!(&cr[2..4], &[0x00, 0x00]);
        assert_eq!(
            u16::from_be_bytes([cr[4], cr[5]]),
            session.src_ref()
        );
        assert_eq!(cr[6], 0x00);
        // TPDU size parameter proposes 2048
        assert_eq!(&cr[7..10], &[PARAM_TPDU_SIZE, 0x01, 0x0B]);
        // TSAPs default to 00 01 on both sides
        assert_eq!(&cr[10..14], &[PARAM_CALLED_TSAP, 0x02, 0x00, 0x01]);
        assert_eq!(&cr[14..18], &[PARAM_CALLING_TSAP, 0x02, 0x00, 0x01]);

        assert_eq!(session.dst_ref(), 0xCAFE);
        assert!(session.is_connected());
    }

    #[tokio::test]
    async fn test_connect_refused_on_dr() {
        let mut session = CotpSession::new(MemoryTransport::new(), CotpConfig::default());
        let dr = [0x06, TPDU_DR, 0x00, 0x00, 0x00, 0x00, 0x00];
        let mut frame = vec![0x03, 0x00, 0x00, (4 + dr.len()) as u8];
        frame.extend_from_slice(&dr);
        session.transport_mut().push_inbound(frame);
        assert!(matches!(
            session.connect().await,
            Err(MmsError::CotpRefused(_))
        ));
    }

    #[tokio::test]
    async fn test_send_data_single_fragment() {
        let mut session = connected_session().await;
        session.send_data(&[0xAA, 0xBB]).await.unwrap();
        let sent = session.transport_mut().take_outbound();
        assert_eq!(sent, vec![0x03, 0x00, 0x00, 0x09, 0x02, 0xF0, 0x80, 0xAA, 0xBB]);
    }

    #[tokio::test]
    async fn test_send_data_segments_large_tsdu() {
        let mut session = connected_session().await;
        let max_fragment = CotpConfig::default().max_tpdu_size() - DT_HEADER_LENGTH;
        let data = vec![0x55u8; max_fragment + 10];
        session.send_data(&data).await.unwrap();
        let sent = session.transport_mut().take_outbound();

        // First fragment: full TPDU, EOT clear.
        assert_eq!(sent[4], 0x02);
        assert_eq!(sent[5], TPDU_DT);
        assert_eq!(sent[6], 0x00);
        let first_frame_len = u16::from_be_bytes([sent[2], sent[3]]) as usize;
        assert_eq!(first_frame_len, 4 + DT_HEADER_LENGTH + max_fragment);
        // Second fragment: remainder, EOT set.
        let second = &sent[first_frame_len..];
        assert_eq!(second[6], DT_EOT);
        assert_eq!(second.len(), 4 + DT_HEADER_LENGTH + 10);
    }

    #[tokio::test]
    async fn test_recv_data_reassembles_until_eot() {
        let mut session = connected_session().await;
        session.transport_mut().push_inbound(dt_frame(false, &[1, 2]));
        session.transport_mut().push_inbound(dt_frame(true, &[3]));
        assert_eq!(session.recv_data().await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_recv_data_peer_disconnect_on_dr() {
        let mut session = connected_session().await;
        let dr = [0x06, TPDU_DR, 0x00, 0x00, 0x00, 0x00, 0x00];
        let mut frame = vec![0x03, 0x00, 0x00, (4 + dr.len()) as u8];
        frame.extend_from_slice(&dr);
        session.transport_mut().push_inbound(frame);
        assert!(matches!(
            session.recv_data().await,
            Err(MmsError::PeerDisconnect(0x80))
        ));
        assert!(!session.is_connected());
    }
}
