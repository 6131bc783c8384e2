//! ASN.1 processing for the MMS client
//!
//! This crate provides the BER encoding/decoding layer the MMS codec is
//! built on, plus the ISO presentation and ACSE envelopes that carry MMS
//! APDUs on the wire.

pub mod ber;
pub mod iso;

pub use ber::{BerDecoder, BerEncoder, BerLength, BerTag, BerTagClass};
