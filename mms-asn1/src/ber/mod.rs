//! BER (ITU-T X.690) encoding and decoding

pub mod decoder;
pub mod encoder;
pub mod types;

pub use decoder::{BerDecoder, Tlv};
pub use encoder::BerEncoder;
pub use types::{BerLength, BerTag, BerTagClass};
