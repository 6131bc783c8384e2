//! Session layers for the MMS client
//!
//! Three thin layers sit between TCP and the MMS codec:
//!
//! - TPKT (RFC 1006): length-prefixed framing over the byte stream
//! - COTP class 0 (ISO 8073): connection handshake and DT segmentation
//! - ISO session SPDUs: the CONNECT/ACCEPT around association setup and the
//!   GIVE-TOKENS + DATA prefix on every data PDU

pub mod cotp;
pub mod spdu;
pub mod tpkt;

pub use cotp::{CotpConfig, CotpSession};
