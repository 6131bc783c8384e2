//! MMS application layer for the IEC 61850 reporting client
//!
//! Encodes the confirmed services needed to drive Report Control Blocks
//! (read, write, identify) and the initiate request, decodes every PDU the
//! IED sends back, and interprets `informationReport` access-result lists
//! as structured reports.

pub mod data;
pub mod object_name;
pub mod pdu;
pub mod rcb;
pub mod report;

pub use object_name::ObjectName;
pub use pdu::{
    AccessResult, ConfirmedResponse, InformationReport, InitiateRequest, InitiateResponse,
    MmsPdu, ServiceError, ServiceResponse, WriteResult,
};
pub use rcb::{OptFlds, RcbKind, TrgOps};
pub use report::{DatasetLabels, MmsReport, ReportEntry, ReportTimestamp};
