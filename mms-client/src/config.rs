//! Client configuration

use mms_session::CotpConfig;
use std::time::Duration;

/// Default MMS port.
pub const DEFAULT_PORT: u16 = 102;

/// Default MMS domain (logical device) for RCB references given without
/// one.
pub const DEFAULT_DOMAIN: &str = "VMC7_1LD0";

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Default domain for references without a domain part.
    pub domain: String,
    /// COTP parameters (TSAPs, TPDU size, handshake timeout).
    pub cotp: CotpConfig,
    /// Timeout for each confirmed request/response exchange.
    pub request_timeout: Duration,
    /// Receive-loop idle window before the keep-alive decision.
    pub idle_timeout: Duration,
    /// Send an MMS identify when the idle window elapses. Off by default;
    /// with it off an idle window only logs.
    pub keepalive: bool,
    /// Integrity period written to each RCB, in milliseconds.
    pub integrity_period_ms: u32,
    /// Buffer time written to each RCB, in milliseconds.
    pub buffer_time_ms: u32,
    /// Reservation time written to BRCBs, in seconds.
    pub reservation_time_s: u16,
    /// Hex-dump every sent and received PDU at debug level.
    pub trace_pdus: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            domain: DEFAULT_DOMAIN.to_string(),
            cotp: CotpConfig::default(),
            request_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(60),
            keepalive: false,
            integrity_period_ms: 10_000,
            buffer_time_ms: 0,
            reservation_time_s: 60,
            trace_pdus: false,
        }
    }
}
