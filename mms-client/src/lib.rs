//! Report subscription client for IEC 61850 IEDs
//!
//! Drives the whole stack: TCP, COTP class 0, the ISO association, the MMS
//! initiate exchange, the RCB enable dance, and the long-lived receive
//! loop that turns unsolicited `informationReport` PDUs into structured
//! report events.

pub mod client;
pub mod config;

pub use client::{ClientEvent, ConnectionState, MmsReportClient, RcbStep};
pub use config::ClientConfig;
