//! Report interpretation
//!
//! An `informationReport` from an RCB is a flat access-result list:
//! RptID first, then the report's own OptFlds, then the optional header
//! fields in OptFlds bit order, the inclusion bit string, and finally the
//! included dataset members. Some IEDs omit the OptFlds element, and the
//! per-member columns arrive either row-wise or column-wise; both are
//! handled here by probing element counts and types.

use crate::pdu::AccessResult;
use crate::rcb::OptFlds;
use mms_core::datatypes::{BinaryTime, BitString, UtcTime};
use mms_core::{MmsError, MmsResult, MmsValue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

/// Dataset reference → ordered member labels, as produced by the SCL
/// parser. Immutable once loaded.
pub type DatasetLabels = HashMap<String, Vec<String>>;

/// Timestamp attached to a report or one of its entries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ReportTimestamp {
    Binary(BinaryTime),
    Utc(UtcTime),
}

impl ReportTimestamp {
    /// Milliseconds since the Unix epoch.
    pub fn timestamp_ms(&self) -> i64 {
        match self {
            ReportTimestamp::Binary(t) => t.timestamp_ms(),
            ReportTimestamp::Utc(t) => t.timestamp_ms(),
        }
    }

    fn from_value(value: &MmsValue) -> Option<Self> {
        match value {
            MmsValue::BinaryTime(t) => Some(ReportTimestamp::Binary(*t)),
            MmsValue::UtcTime(t) => Some(ReportTimestamp::Utc(*t)),
            _ => None,
        }
    }
}

impl fmt::Display for ReportTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportTimestamp::Binary(t) => write!(f, "{}", t),
            ReportTimestamp::Utc(t) => write!(f, "{}", t),
        }
    }
}

/// One dataset member carried by a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    /// Index into the dataset (position of this member's inclusion bit).
    pub index: usize,
    /// Label from the SCL mapping, or the data reference when the report
    /// carries one and no mapping matches.
    pub label: Option<String>,
    pub value: MmsValue,
    /// Reason-for-inclusion or quality descriptor, when present.
    pub quality: Option<BitString>,
    /// Per-member timestamp, when present.
    pub timestamp: Option<ReportTimestamp>,
}

/// A decoded MMS report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MmsReport {
    pub rpt_id: String,
    pub dataset_ref: Option<String>,
    pub sequence_number: Option<u64>,
    pub time_of_entry: Option<ReportTimestamp>,
    pub buffer_overflow: Option<bool>,
    pub conf_rev: Option<u64>,
    pub sub_seq_num: Option<u64>,
    pub more_follows: Option<bool>,
    pub entry_id: Option<Vec<u8>>,
    pub inclusion: BitString,
    pub entries: Vec<ReportEntry>,
    /// Soft decode problems: the report is still delivered, with the
    /// successfully parsed prefix.
    pub warnings: Vec<String>,
}

impl MmsReport {
    /// Entry timestamp in milliseconds for the sink: the entry's own
    /// timestamp when present, else the report's TimeOfEntry.
    pub fn entry_timestamp_ms(&self, entry: &ReportEntry) -> Option<i64> {
        entry
            .timestamp
            .map(|t| t.timestamp_ms())
            .or_else(|| self.time_of_entry.map(|t| t.timestamp_ms()))
    }

    /// Fill entry labels from a dataset mapping. Exact `dataset_ref` keys
    /// win; a `$suffix` match covers IEDs whose domain prefix differs from
    /// the SCL. Existing labels (data references) are only used when the
    /// mapping has no entry.
    pub fn apply_labels(&mut self, labels: &DatasetLabels) {
        let Some(dataset_ref) = self.dataset_ref.as_deref() else {
            return;
        };
        let members = labels.get(dataset_ref).or_else(|| {
            dataset_ref.find('$').and_then(|pos| {
                let suffix = &dataset_ref[pos..];
                labels
                    .iter()
                    .find(|(key, _)| key.ends_with(suffix))
                    .map(|(_, members)| members)
            })
        });
        let Some(members) = members else {
            return;
        };
        for entry in &mut self.entries {
            if let Some(label) = members.get(entry.index) {
                entry.label = Some(label.clone());
            }
        }
    }
}

/// Decode a report from its access-result list.
///
/// RCB reports normally carry their own OptFlds as the second element, but
/// that element is indistinguishable from the inclusion bit string when a
/// short dataset reports without OptFlds on the wire. The decoder probes
/// both readings (second element as OptFlds, and `fallback_optflds` with
/// the second element left in place) and keeps the cleaner parse.
///
/// # Errors
/// `Protocol` when the first element is not a visible string, or when no
/// OptFlds source exists at all. Later inconsistencies degrade to warnings
/// on the returned report.
pub fn decode_report(
    results: &[AccessResult],
    fallback_optflds: Option<&OptFlds>,
) -> MmsResult<MmsReport> {
    let mut base_warnings = Vec::new();
    let values: Vec<&MmsValue> = results
        .iter()
        .filter_map(|result| match result {
            AccessResult::Success(value) => Some(value),
            AccessResult::Failure(error) => {
                base_warnings.push(format!("access failure in report: {}", error));
                None
            }
        })
        .collect();

    let rpt_id = match values.first() {
        Some(MmsValue::VisibleString(s)) => s.clone(),
        other => {
            return Err(MmsError::Protocol(format!(
                "report does not start with a visible-string RptID: {:?}",
                other
            )))
        }
    };

    let mut candidates = Vec::new();
    if let Some(MmsValue::BitString(bits)) = values.get(1) {
        if bits.num_bits() <= 10 {
            let optflds = OptFlds::from_bits((*bits).clone());
            candidates.push(decode_with(
                rpt_id.clone(),
                &optflds,
                &values,
                2,
                base_warnings.clone(),
            ));
        }
    }
    if let Some(optflds) = fallback_optflds {
        candidates.push(decode_with(
            rpt_id.clone(),
            optflds,
            &values,
            1,
            base_warnings.clone(),
        ));
    }
    if candidates.is_empty() {
        return Err(MmsError::Protocol(
            "report carries no OptFlds and none was supplied".to_string(),
        ));
    }

    if let Some(clean) = candidates.iter().position(|r| r.warnings.is_empty()) {
        return Ok(candidates.swap_remove(clean));
    }
    // No clean reading: keep the one that recovered the most entries,
    // breaking ties toward fewer warnings and the wire OptFlds reading.
    let best = candidates
        .iter()
        .enumerate()
        .max_by_key(|(i, r)| (r.entries.len(), usize::MAX - r.warnings.len(), usize::MAX - i))
        .map(|(i, _)| i)
        .unwrap_or(0);
    Ok(candidates.swap_remove(best))
}

fn decode_with(
    rpt_id: String,
    optflds: &OptFlds,
    values: &[&MmsValue],
    start: usize,
    warnings: Vec<String>,
) -> MmsReport {
    let mut report = MmsReport {
        rpt_id,
        dataset_ref: None,
        sequence_number: None,
        time_of_entry: None,
        buffer_overflow: None,
        conf_rev: None,
        sub_seq_num: None,
        more_follows: None,
        entry_id: None,
        inclusion: BitString::zeroed(0),
        entries: Vec::new(),
        warnings,
    };

    let mut idx = start;
    if !parse_header(&mut report, optflds, values, &mut idx) {
        // Header mismatch: deliver the parsed prefix only.
        return report;
    }

    match values.get(idx) {
        Some(MmsValue::BitString(bits)) => {
            report.inclusion = (*bits).clone();
            idx += 1;
        }
        other => {
            report.warnings.push(format!(
                "missing inclusion bit string at element {}: {:?}",
                idx, other
            ));
            return report;
        }
    }

    parse_members(&mut report, optflds, &values[idx..]);
    report
}

/// Parse the optional header fields. Returns false (with a warning
/// recorded) when an expected field has the wrong type.
fn parse_header(
    report: &mut MmsReport,
    optflds: &OptFlds,
    values: &[&MmsValue],
    idx: &mut usize,
) -> bool {
    macro_rules! take {
        ($name:literal, $pattern:pat => $assign:expr) => {
            match values.get(*idx) {
                Some($pattern) => {
                    $assign;
                    *idx += 1;
                }
                other => {
                    report
                        .warnings
                        .push(format!("bad {} header field: {:?}", $name, other));
                    return false;
                }
            }
        };
    }

    if optflds.sequence_number() {
        take!("sequence-number", value @ (MmsValue::Uint(_) | MmsValue::Int(_)) =>
            report.sequence_number = value.as_u64());
    }
    if optflds.report_time_stamp() {
        take!("report-time-stamp", value @ (MmsValue::BinaryTime(_) | MmsValue::UtcTime(_)) =>
            report.time_of_entry = ReportTimestamp::from_value(value));
    }
    if optflds.data_set_name() {
        take!("data-set-name", MmsValue::VisibleString(s) =>
            report.dataset_ref = Some(s.clone()));
    }
    if optflds.buffer_overflow() {
        take!("buffer-overflow", MmsValue::Bool(b) =>
            report.buffer_overflow = Some(*b));
    }
    if optflds.entry_id() {
        take!("entryID", MmsValue::OctetString(bytes) =>
            report.entry_id = Some(bytes.clone()));
    }
    if optflds.conf_revision() {
        take!("conf-revision", value @ (MmsValue::Uint(_) | MmsValue::Int(_)) =>
            report.conf_rev = value.as_u64());
    }
    if optflds.segmentation() {
        take!("sub-sequence-number", value @ (MmsValue::Uint(_) | MmsValue::Int(_)) =>
            report.sub_seq_num = value.as_u64());
        take!("more-follows", MmsValue::Bool(b) =>
            report.more_follows = Some(*b));
    }
    true
}

/// Split the member block into entries, accepting both the per-column
/// layout (all values, all qualities, all timestamps) and the per-row
/// layout (value, quality, timestamp per member).
fn parse_members(report: &mut MmsReport, optflds: &OptFlds, remaining: &[&MmsValue]) {
    let positions = report.inclusion.set_positions();
    let present = positions.len();
    if present == 0 {
        if !remaining.is_empty() {
            report.warnings.push(format!(
                "{} member elements but empty inclusion",
                remaining.len()
            ));
        }
        return;
    }

    // Optional data-reference column ahead of the values.
    let mut rest = remaining;
    let mut refs: Option<Vec<String>> = None;
    if optflds.data_reference()
        && rest.len() >= 2 * present
        && rest[..present]
            .iter()
            .all(|v| matches!(v, MmsValue::VisibleString(_)))
    {
        refs = Some(
            rest[..present]
                .iter()
                .filter_map(|v| v.as_str().map(str::to_owned))
                .collect(),
        );
        rest = &rest[present..];
    }

    let columns = if rest.len() % present == 0 {
        rest.len() / present
    } else {
        0
    };

    let (values, qualities, timestamps) = match columns {
        1 => (collect_column(rest, 0, 1), None, None),
        2 => {
            if is_row_layout(rest, present, 2) {
                (
                    collect_column(rest, 0, 2),
                    Some(collect_column(rest, 1, 2)),
                    None,
                )
            } else {
                (
                    rest[..present].to_vec(),
                    Some(rest[present..].to_vec()),
                    None,
                )
            }
        }
        3 => {
            if is_row_layout(rest, present, 3) {
                (
                    collect_column(rest, 0, 3),
                    Some(collect_column(rest, 1, 3)),
                    Some(collect_column(rest, 2, 3)),
                )
            } else {
                (
                    rest[..present].to_vec(),
                    Some(rest[present..2 * present].to_vec()),
                    Some(rest[2 * present..].to_vec()),
                )
            }
        }
        _ => {
            report.warnings.push(format!(
                "member count mismatch: {} elements for {} included members",
                rest.len(),
                present
            ));
            warn!(
                elements = rest.len(),
                present, "report member layout mismatch, taking bare values"
            );
            (
                rest.iter().take(present).copied().collect::<Vec<_>>(),
                None,
                None,
            )
        }
    };

    for (slot, value) in values.iter().enumerate() {
        let quality = qualities
            .as_ref()
            .and_then(|column| column.get(slot))
            .and_then(|v| v.as_bit_string().cloned());
        let timestamp = timestamps
            .as_ref()
            .and_then(|column| column.get(slot))
            .and_then(|v| ReportTimestamp::from_value(v));
        report.entries.push(ReportEntry {
            index: positions[slot],
            label: refs.as_ref().and_then(|r| r.get(slot).cloned()),
            value: (*value).clone(),
            quality,
            timestamp,
        });
    }
}

fn collect_column<'a>(rest: &[&'a MmsValue], offset: usize, stride: usize) -> Vec<&'a MmsValue> {
    rest.iter()
        .skip(offset)
        .step_by(stride)
        .copied()
        .collect()
}

/// Distinguish per-row from per-column by where the bit strings (and time
/// values, for three columns) sit. Ambiguous shapes fall back to
/// per-column, the more common layout.
fn is_row_layout(rest: &[&MmsValue], present: usize, stride: usize) -> bool {
    if present < 2 {
        // A single member: both layouts are identical.
        return false;
    }
    let row_quality = (0..present).all(|i| matches!(rest[i * stride + 1], MmsValue::BitString(_)));
    let column_quality = rest[present..2 * present]
        .iter()
        .all(|v| matches!(v, MmsValue::BitString(_)));
    if stride == 3 {
        let row_time = (0..present).all(|i| {
            matches!(
                rest[i * stride + 2],
                MmsValue::UtcTime(_) | MmsValue::BinaryTime(_)
            )
        });
        let column_time = rest[2 * present..].iter().all(|v| {
            matches!(v, MmsValue::UtcTime(_) | MmsValue::BinaryTime(_))
        });
        return (row_quality && row_time) && !(column_quality && column_time);
    }
    row_quality && !column_quality
}
