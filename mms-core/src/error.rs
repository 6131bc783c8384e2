use thiserror::Error;

/// Data access error codes returned by the server inside read/write results
/// (ISO 9506-2 DataAccessError).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataAccessError {
    ObjectInvalidated,
    HardwareFault,
    TemporarilyUnavailable,
    ObjectAccessDenied,
    ObjectUndefined,
    InvalidAddress,
    TypeUnsupported,
    TypeInconsistent,
    ObjectAttributeInconsistent,
    ObjectAccessUnsupported,
    ObjectNonExistent,
    ObjectValueInvalid,
    /// Code outside the standard range.
    Unknown(u8),
}

impl DataAccessError {
    /// Map a wire code to the named error.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => DataAccessError::ObjectInvalidated,
            1 => DataAccessError::HardwareFault,
            2 => DataAccessError::TemporarilyUnavailable,
            3 => DataAccessError::ObjectAccessDenied,
            4 => DataAccessError::ObjectUndefined,
            5 => DataAccessError::InvalidAddress,
            6 => DataAccessError::TypeUnsupported,
            7 => DataAccessError::TypeInconsistent,
            8 => DataAccessError::ObjectAttributeInconsistent,
            9 => DataAccessError::ObjectAccessUnsupported,
            10 => DataAccessError::ObjectNonExistent,
            11 => DataAccessError::ObjectValueInvalid,
            other => DataAccessError::Unknown(other),
        }
    }

    /// The wire code.
    pub fn code(&self) -> u8 {
        match self {
            DataAccessError::ObjectInvalidated => 0,
            DataAccessError::HardwareFault => 1,
            DataAccessError::TemporarilyUnavailable => 2,
            DataAccessError::ObjectAccessDenied => 3,
            DataAccessError::ObjectUndefined => 4,
            DataAccessError::InvalidAddress => 5,
            DataAccessError::TypeUnsupported => 6,
            DataAccessError::TypeInconsistent => 7,
            DataAccessError::ObjectAttributeInconsistent => 8,
            DataAccessError::ObjectAccessUnsupported => 9,
            DataAccessError::ObjectNonExistent => 10,
            DataAccessError::ObjectValueInvalid => 11,
            DataAccessError::Unknown(code) => *code,
        }
    }
}

impl std::fmt::Display for DataAccessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataAccessError::Unknown(code) => write!(f, "data-access-error({})", code),
            other => write!(f, "{:?} ({})", other, other.code()),
        }
    }
}

/// Main error type for MMS client operations
#[derive(Error, Debug)]
pub enum MmsError {
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("Transport closed by peer")]
    TransportClosed,

    #[error("Framing error: {0}")]
    Framing(String),

    #[error("COTP connection refused: {0}")]
    CotpRefused(String),

    #[error("COTP peer disconnect (TPDU type 0x{0:02X})")]
    PeerDisconnect(u8),

    #[error("BER error: {0}")]
    Ber(String),

    #[error("MMS protocol error: {0}")]
    Protocol(String),

    #[error("MMS service error: class={class}, code={code}")]
    Service { class: u8, code: i64 },

    #[error("Data access failed: {0}")]
    DataAccess(DataAccessError),

    #[error("RCB enable failed for {rcb} at step {step}: {cause}")]
    RcbEnable {
        rcb: String,
        step: String,
        #[source]
        cause: Box<MmsError>,
    },

    #[error("Timeout")]
    Timeout,

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Result type alias for MMS client operations
pub type MmsResult<T> = Result<T, MmsError>;

impl MmsError {
    /// True when the error must tear down the connection: transport,
    /// framing and COTP errors are always fatal.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MmsError::Transport(_)
                | MmsError::TransportClosed
                | MmsError::Framing(_)
                | MmsError::CotpRefused(_)
                | MmsError::PeerDisconnect(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_access_error_roundtrip() {
        for code in 0..=12u8 {
            assert_eq!(DataAccessError::from_code(code).code(), code);
        }
    }

    #[test]
    fn test_fatal_classification() {
        assert!(MmsError::TransportClosed.is_fatal());
        assert!(MmsError::Framing("bad version".into()).is_fatal());
        assert!(MmsError::PeerDisconnect(0x80).is_fatal());
        assert!(!MmsError::Timeout.is_fatal());
        assert!(!MmsError::DataAccess(DataAccessError::ObjectAccessDenied).is_fatal());
    }
}
