//! MMS object names
//!
//! Only the domain-specific form is used by this client: a domain id (the
//! logical device) and an item id with `$` separating the hierarchy levels
//! (`LLN0$BR$urcbName$RptEna`). IEC 61850 textual references separate
//! domain and item with `/`, the MMS rendering uses a single space; both
//! convert here, at the boundary.

use mms_asn1::ber::encoder::BerEncoder;
use mms_asn1::ber::types::BerTag;
use mms_asn1::BerDecoder;
use mms_core::{MmsError, MmsResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Universal IA5String tag number used for MMS identifiers.
const TAG_IA5: u32 = 26;

/// Domain-specific MMS object name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectName {
    pub domain_id: String,
    pub item_id: String,
}

impl ObjectName {
    /// Create a name from its two components.
    pub fn new(domain_id: impl Into<String>, item_id: impl Into<String>) -> Self {
        Self {
            domain_id: domain_id.into(),
            item_id: item_id.into(),
        }
    }

    /// Parse an IEC 61850 textual reference (`LD/LN$BR$name`) or its MMS
    /// rendering (`LD LN$BR$name`).
    ///
    /// # Errors
    /// Returns `InvalidData` when no domain separator is present.
    pub fn from_reference(reference: &str) -> MmsResult<Self> {
        let split = reference
            .find('/')
            .or_else(|| reference.find(' '))
            .ok_or_else(|| {
                MmsError::InvalidData(format!(
                    "object reference without domain separator: {}",
                    reference
                ))
            })?;
        let (domain, item) = reference.split_at(split);
        Ok(Self::new(domain, &item[1..]))
    }

    /// The same object with an attribute appended (`item$Attr`).
    pub fn with_attribute(&self, attribute: &str) -> Self {
        Self {
            domain_id: self.domain_id.clone(),
            item_id: format!("{}${}", self.item_id, attribute),
        }
    }

    /// Encode as the ObjectName CHOICE `domain-specific [1]`: a constructed
    /// context-1 TLV holding two IA5String identifiers.
    pub fn encode(&self) -> MmsResult<Vec<u8>> {
        let mut ids = BerEncoder::new();
        ids.encode_tlv(&BerTag::universal(false, TAG_IA5), self.domain_id.as_bytes())?;
        ids.encode_tlv(&BerTag::universal(false, TAG_IA5), self.item_id.as_bytes())?;
        let mut out = BerEncoder::new();
        out.encode_context(1, ids.as_bytes(), true)?;
        Ok(out.into_bytes())
    }

    /// Decode from an ObjectName CHOICE TLV. Only `domain-specific [1]`
    /// and `vmd-specific [0]` (domain left empty) occur in practice.
    pub fn decode(data: &[u8]) -> MmsResult<Self> {
        let mut decoder = BerDecoder::new(data);
        let outer = decoder.decode_tlv()?;
        if outer.tag.is_context(0) {
            // vmd-specific Identifier
            return Ok(Self::new(
                "",
                String::from_utf8_lossy(outer.content).into_owned(),
            ));
        }
        if !outer.tag.is_context(1) {
            return Err(MmsError::Ber(format!(
                "unsupported ObjectName choice: {:?}",
                outer.tag
            )));
        }
        let mut ids = BerDecoder::new(outer.content);
        let domain = ids.expect_tlv(&BerTag::universal(false, TAG_IA5))?;
        let item = ids.expect_tlv(&BerTag::universal(false, TAG_IA5))?;
        Ok(Self::new(
            String::from_utf8_lossy(domain).into_owned(),
            String::from_utf8_lossy(item).into_owned(),
        ))
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.domain_id.is_empty() {
            write!(f, "{}", self.item_id)
        } else {
            write!(f, "{}/{}", self.domain_id, self.item_id)
        }
    }
}
