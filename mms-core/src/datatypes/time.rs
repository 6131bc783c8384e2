//! MMS timestamp types
//!
//! Two wire formats appear in reports:
//!
//! - `UtcTime` (IEC 61850 Timestamp): 8 octets, 4-byte big-endian seconds
//!   since 1970-01-01 UTC, 3-byte binary fraction of second (numerator over
//!   2^24), 1 quality octet (leap-second-known, clock-failure,
//!   clock-not-synchronized, time-accuracy 0-24).
//! - `BinaryTime` (MMS TimeOfDay): 4 octets milliseconds since midnight, or
//!   6 octets adding a 2-byte day count since 1984-01-01. Longer encodings
//!   seen on some IEDs are tolerated by ignoring the trailing octets.

use crate::error::{MmsError, MmsResult};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Days between 1970-01-01 and 1984-01-01 (the MMS TimeOfDay epoch).
const EPOCH_1984_UNIX_DAYS: i64 = 5113;

/// IEC 61850 UtcTime: seconds + binary fraction + quality flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtcTime {
    /// Seconds since 1970-01-01T00:00:00Z.
    pub seconds: u32,
    /// Fraction of second, numerator over 2^24.
    pub fraction: u32,
    /// Quality octet (leap-second-known 0x80, clock-failure 0x40,
    /// clock-not-synchronized 0x20, accuracy bits 0x1F).
    pub quality: u8,
}

impl UtcTime {
    /// Decode from 4 to 8 content octets.
    ///
    /// # Errors
    ///
    /// Returns `Ber` if fewer than 4 octets are present.
    pub fn from_bytes(raw: &[u8]) -> MmsResult<Self> {
        if raw.len() < 4 {
            return Err(MmsError::Ber(format!(
                "utc-time too short: {} octets",
                raw.len()
            )));
        }
        let seconds = u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]);
        let fraction = if raw.len() >= 7 {
            ((raw[4] as u32) << 16) | ((raw[5] as u32) << 8) | raw[6] as u32
        } else {
            0
        };
        let quality = if raw.len() >= 8 { raw[7] } else { 0 };
        Ok(Self {
            seconds,
            fraction,
            quality,
        })
    }

    /// Encode to the 8-octet wire form.
    pub fn to_bytes(&self) -> [u8; 8] {
        let sec = self.seconds.to_be_bytes();
        [
            sec[0],
            sec[1],
            sec[2],
            sec[3],
            ((self.fraction >> 16) & 0xFF) as u8,
            ((self.fraction >> 8) & 0xFF) as u8,
            (self.fraction & 0xFF) as u8,
            self.quality,
        ]
    }

    /// Convert to a UTC datetime.
    pub fn to_datetime(&self) -> DateTime<Utc> {
        let nanos = (self.fraction as f64 / (1u64 << 24) as f64 * 1e9) as u32;
        Utc.timestamp_opt(self.seconds as i64, nanos)
            .single()
            .unwrap_or_else(|| Utc.timestamp_opt(self.seconds as i64, 0).unwrap())
    }

    /// Milliseconds since the Unix epoch.
    pub fn timestamp_ms(&self) -> i64 {
        self.seconds as i64 * 1000 + (self.fraction as i64 * 1000 >> 24)
    }
}

impl fmt::Display for UtcTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_datetime().to_rfc3339())
    }
}

/// MMS binary-time (TimeOfDay): milliseconds of day, optional day count
/// since 1984-01-01.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryTime {
    /// Milliseconds since midnight.
    pub millis_of_day: u32,
    /// Days since 1984-01-01, absent for the 4-octet form.
    pub days_since_1984: Option<u16>,
}

impl BinaryTime {
    /// Decode from 4 or 6 content octets; longer encodings are accepted and
    /// the trailing octets ignored.
    ///
    /// # Errors
    ///
    /// Returns `Ber` if fewer than 4 octets are present or the millisecond
    /// count exceeds one day.
    pub fn from_bytes(raw: &[u8]) -> MmsResult<Self> {
        if raw.len() < 4 {
            return Err(MmsError::Ber(format!(
                "binary-time too short: {} octets",
                raw.len()
            )));
        }
        let millis_of_day = u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]);
        if millis_of_day >= 86_400_000 {
            return Err(MmsError::Ber(format!(
                "binary-time millisecond count out of range: {}",
                millis_of_day
            )));
        }
        let days_since_1984 = if raw.len() >= 6 {
            Some(u16::from_be_bytes([raw[4], raw[5]]))
        } else {
            None
        };
        Ok(Self {
            millis_of_day,
            days_since_1984,
        })
    }

    /// Encode to the 4- or 6-octet wire form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.millis_of_day.to_be_bytes().to_vec();
        if let Some(days) = self.days_since_1984 {
            out.extend_from_slice(&days.to_be_bytes());
        }
        out
    }

    /// Convert to a UTC datetime. The 4-octet form has no date; it is
    /// anchored to 1984-01-01 so ordering within a day still holds.
    pub fn to_datetime(&self) -> DateTime<Utc> {
        let days = self.days_since_1984.unwrap_or(0) as i64;
        let epoch_secs = (EPOCH_1984_UNIX_DAYS + days) * 86_400;
        Utc.timestamp_opt(epoch_secs, 0).unwrap()
            + Duration::milliseconds(self.millis_of_day as i64)
    }

    /// Milliseconds since the Unix epoch.
    pub fn timestamp_ms(&self) -> i64 {
        let days = self.days_since_1984.unwrap_or(0) as i64;
        (EPOCH_1984_UNIX_DAYS + days) * 86_400_000 + self.millis_of_day as i64
    }
}

impl fmt::Display for BinaryTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_datetime().to_rfc3339())
    }
}
