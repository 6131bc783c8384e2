//! Report Control Block attributes
//!
//! RCB attributes are plain MMS variables named `<rcb>$<Attr>`. The two
//! bit-string attributes get typed wrappers so the setup dance and the
//! report decoder share one definition of the bit layout.

use mms_core::datatypes::BitString;
use mms_core::MmsResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// RCB attribute names.
pub mod attr {
    pub const RPT_ID: &str = "RptID";
    pub const RPT_ENA: &str = "RptEna";
    pub const RESV: &str = "Resv";
    pub const RESV_TMS: &str = "ResvTms";
    pub const DAT_SET: &str = "DatSet";
    pub const CONF_REV: &str = "ConfRev";
    pub const OPT_FLDS: &str = "OptFlds";
    pub const BUF_TM: &str = "BufTm";
    pub const SQ_NUM: &str = "SqNum";
    pub const TRG_OPS: &str = "TrgOps";
    pub const INTG_PD: &str = "IntgPd";
    pub const GI: &str = "GI";
    pub const PURGE_BUF: &str = "PurgeBuf";
    pub const ENTRY_ID: &str = "EntryID";
}

/// Buffered vs unbuffered report control block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RcbKind {
    Buffered,
    Unbuffered,
}

impl RcbKind {
    /// Detect the kind from an RCB reference: `$BR$` marks a BRCB, `$RP$`
    /// a URCB. References without either marker default to unbuffered.
    pub fn from_reference(reference: &str) -> Self {
        if reference.contains("$BR$") {
            RcbKind::Buffered
        } else {
            RcbKind::Unbuffered
        }
    }

    /// The reservation attribute for this kind.
    pub fn reservation_attr(&self) -> &'static str {
        match self {
            RcbKind::Buffered => attr::RESV_TMS,
            RcbKind::Unbuffered => attr::RESV,
        }
    }

    /// Attributes read before reconfiguring, in request order.
    pub fn setup_read_attrs(&self) -> [&'static str; 10] {
        [
            attr::RPT_ENA,
            self.reservation_attr(),
            attr::DAT_SET,
            attr::CONF_REV,
            attr::OPT_FLDS,
            attr::TRG_OPS,
            attr::BUF_TM,
            attr::INTG_PD,
            attr::GI,
            attr::RPT_ID,
        ]
    }
}

/// OptFlds bit positions (bit 0 is the MSB of the bit string).
pub mod optflds_bit {
    pub const SEQUENCE_NUMBER: usize = 1;
    pub const REPORT_TIME_STAMP: usize = 2;
    pub const REASON_FOR_INCLUSION: usize = 3;
    pub const DATA_SET_NAME: usize = 4;
    pub const DATA_REFERENCE: usize = 5;
    pub const BUFFER_OVERFLOW: usize = 6;
    pub const ENTRY_ID: usize = 7;
    pub const CONF_REVISION: usize = 8;
    pub const SEGMENTATION: usize = 9;
}

/// `OptFlds`: which optional fields the IED includes in each report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptFlds(BitString);

impl OptFlds {
    /// The subscription default, `0b0111111010`: sequence-number,
    /// report-time-stamp, reason-for-inclusion, data-set-name,
    /// data-reference, buffer-overflow and conf-revision.
    pub fn subscription_default() -> Self {
        Self(BitString::new(vec![0x7E, 0x80], 10).expect("static bit string"))
    }

    /// Wrap a received bit string.
    pub fn from_bits(bits: BitString) -> Self {
        Self(bits)
    }

    /// The underlying bit string.
    pub fn bits(&self) -> &BitString {
        &self.0
    }

    pub fn sequence_number(&self) -> bool {
        self.0.get_bit(optflds_bit::SEQUENCE_NUMBER)
    }

    pub fn report_time_stamp(&self) -> bool {
        self.0.get_bit(optflds_bit::REPORT_TIME_STAMP)
    }

    pub fn reason_for_inclusion(&self) -> bool {
        self.0.get_bit(optflds_bit::REASON_FOR_INCLUSION)
    }

    pub fn data_set_name(&self) -> bool {
        self.0.get_bit(optflds_bit::DATA_SET_NAME)
    }

    pub fn data_reference(&self) -> bool {
        self.0.get_bit(optflds_bit::DATA_REFERENCE)
    }

    pub fn buffer_overflow(&self) -> bool {
        self.0.get_bit(optflds_bit::BUFFER_OVERFLOW)
    }

    pub fn entry_id(&self) -> bool {
        self.0.get_bit(optflds_bit::ENTRY_ID)
    }

    pub fn conf_revision(&self) -> bool {
        self.0.get_bit(optflds_bit::CONF_REVISION)
    }

    pub fn segmentation(&self) -> bool {
        self.0.get_bit(optflds_bit::SEGMENTATION)
    }
}

impl fmt::Display for OptFlds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OptFlds({})", self.0)
    }
}

/// TrgOps bit positions.
pub mod trgops_bit {
    pub const DATA_CHANGE: usize = 1;
    pub const QUALITY_CHANGE: usize = 2;
    pub const DATA_UPDATE: usize = 3;
    pub const INTEGRITY: usize = 4;
    pub const GENERAL_INTERROGATION: usize = 5;
}

/// `TrgOps`: which events trigger a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrgOps(BitString);

impl TrgOps {
    /// The subscription default: data-change, quality-change, integrity
    /// and general-interrogation.
    pub fn subscription_default() -> Self {
        let mut bits = BitString::zeroed(6);
        for bit in [
            trgops_bit::DATA_CHANGE,
            trgops_bit::QUALITY_CHANGE,
            trgops_bit::INTEGRITY,
            trgops_bit::GENERAL_INTERROGATION,
        ] {
            bits.set_bit(bit, true).expect("static bit string");
        }
        Self(bits)
    }

    /// Wrap a received bit string.
    pub fn from_bits(bits: BitString) -> Self {
        Self(bits)
    }

    /// The underlying bit string.
    pub fn bits(&self) -> &BitString {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mms_asn1::ber::encoder::bit_string_content;

    #[test]
    fn test_kind_detection() {
        assert_eq!(
            RcbKind::from_reference("VMC7_1LD0/LLN0$BR$CB01"),
            RcbKind::Buffered
        );
        assert_eq!(
            RcbKind::from_reference("VMC7_1LD0/LLN0$RP$CB01"),
            RcbKind::Unbuffered
        );
    }

    #[test]
    fn test_reservation_attr() {
        assert_eq!(RcbKind::Buffered.reservation_attr(), "ResvTms");
        assert_eq!(RcbKind::Unbuffered.reservation_attr(), "Resv");
    }

    #[test]
    fn test_optflds_default_bits() {
        let flds = OptFlds::subscription_default();
        assert!(flds.sequence_number());
        assert!(flds.report_time_stamp());
        assert!(flds.reason_for_inclusion());
        assert!(flds.data_set_name());
        assert!(flds.data_reference());
        assert!(flds.buffer_overflow());
        assert!(!flds.entry_id());
        assert!(flds.conf_revision());
        assert!(!flds.segmentation());
        // Wire form: 10 bits, 6 unused in the last octet
        assert_eq!(bit_string_content(flds.bits()), vec![0x06, 0x7E, 0x80]);
    }

    #[test]
    fn test_trgops_default_bits() {
        let ops = TrgOps::subscription_default();
        assert!(ops.bits().get_bit(trgops_bit::DATA_CHANGE));
        assert!(ops.bits().get_bit(trgops_bit::QUALITY_CHANGE));
        assert!(!ops.bits().get_bit(trgops_bit::DATA_UPDATE));
        assert!(ops.bits().get_bit(trgops_bit::INTEGRITY));
        assert!(ops.bits().get_bit(trgops_bit::GENERAL_INTERROGATION));
        assert_eq!(bit_string_content(ops.bits()), vec![0x02, 0x6C]);
    }

    #[test]
    fn test_setup_read_attrs_order() {
        let attrs = RcbKind::Unbuffered.setup_read_attrs();
        assert_eq!(attrs[0], "RptEna");
        assert_eq!(attrs[1], "Resv");
        assert_eq!(attrs[9], "RptID");
    }
}
