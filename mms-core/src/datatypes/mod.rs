//! Value and timestamp types carried by MMS reports

pub mod bit_string;
pub mod time;
pub mod value;

pub use bit_string::BitString;
pub use time::{BinaryTime, UtcTime};
pub use value::MmsValue;
