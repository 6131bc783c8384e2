//! IEC 61850 MMS reporting client
//!
//! A client that connects to an IED over ISO-on-TCP (TPKT / COTP class 0),
//! establishes an MMS association, enables Report Control Blocks and
//! decodes the unsolicited reports the IED pushes.
//!
//! # Architecture
//!
//! The workspace is organised by protocol layer:
//!
//! - `mms-core`: value types, timestamps, error taxonomy
//! - `mms-asn1`: BER codec and ISO presentation/ACSE envelopes
//! - `mms-transport`: byte-stream abstraction, TCP and in-memory transports
//! - `mms-session`: TPKT framing, COTP class 0, session SPDUs
//! - `mms-application`: MMS PDU codec, RCB attributes, report decoding
//! - `mms-client`: connection lifecycle and receive loop
//! - `mms-scl`: SCL/ICD dataset label extraction
//! - `mms-sink`: time-series push sink
//!
//! # Usage
//!
//! ```no_run
//! use mms::client::{ClientConfig, MmsReportClient};
//! use mms::transport::{TcpSettings, TcpTransport};
//!
//! # async fn run() -> mms::MmsResult<()> {
//! let transport = TcpTransport::new(TcpSettings::new("10.0.0.1:102".parse().unwrap()));
//! let (mut client, mut events) = MmsReportClient::new(transport, ClientConfig::default());
//! client.connect().await?;
//! client.initiate().await?;
//! client.subscribe_all(&["VMC7_1LD0/LLN0$BR$CB_LDPHAS1_CYPO03".to_string()]).await?;
//! # Ok(())
//! # }
//! ```

pub use mms_core::{
    hex_string, BinaryTime, BitString, DataAccessError, MmsError, MmsResult, MmsValue, UtcTime,
};

pub use mms_application::{MmsReport, ObjectName, OptFlds, RcbKind, ReportEntry, TrgOps};

pub mod asn1 {
    pub use mms_asn1::*;
}

pub mod transport {
    pub use mms_transport::*;
}

pub mod session {
    pub use mms_session::*;
}

pub mod application {
    pub use mms_application::*;
}

pub mod client {
    pub use mms_client::*;
}

pub mod scl {
    pub use mms_scl::*;
}

pub mod sink {
    pub use mms_sink::*;
}
