//! SCL/ICD (IEC 61850-6) dataset extraction
//!
//! Walks IED → AccessPoint → Server → LDevice → LN0/LN → DataSet → FCDA
//! and produces a `dataset key → ordered member labels` map. A label is
//! `doName` or `doName.daName`; FCCB members contribute their `cbName`.
//!
//! Reports reference their dataset in several textual shapes depending on
//! the IED family (`IED/LN$DS`, `IED_1LD0/LN$DS`, with or without the LN
//! instance), so every dataset registers under all of them; the keys all
//! point at the same member list.

use mms_core::{MmsError, MmsResult};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Dataset key → ordered member labels.
pub type DatasetLabels = HashMap<String, Vec<String>>;

/// Parse an SCL/ICD file.
///
/// # Errors
/// `Transport` when the file cannot be read, `InvalidData` on malformed
/// XML.
pub fn parse(path: impl AsRef<Path>) -> MmsResult<DatasetLabels> {
    let text = std::fs::read_to_string(path)?;
    parse_str(&text)
}

/// Parse SCL/ICD content.
pub fn parse_str(text: &str) -> MmsResult<DatasetLabels> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut result = DatasetLabels::new();
    let mut walk = Walk::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref element)) => walk.open(element, false),
            Ok(Event::Empty(ref element)) => walk.open(element, true),
            Ok(Event::End(ref element)) => {
                if local_name(element.name().as_ref()) == b"DataSet" {
                    walk.close_dataset(&mut result);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(error) => {
                return Err(MmsError::InvalidData(format!(
                    "malformed SCL at offset {}: {}",
                    reader.buffer_position(),
                    error
                )))
            }
        }
    }

    debug!(datasets = result.len(), "SCL parsed");
    Ok(result)
}

/// Attribute values of the enclosing elements during the walk.
#[derive(Default)]
struct Walk {
    ied_name: String,
    ld_inst: String,
    ln_class: String,
    ln_inst: String,
    ds_name: String,
    members: Vec<String>,
    in_dataset: bool,
}

impl Walk {
    fn open(&mut self, element: &BytesStart<'_>, is_empty: bool) {
        match local_name(element.name().as_ref()) {
            b"IED" => self.ied_name = attr_value(element, "name"),
            b"LDevice" => self.ld_inst = attr_value(element, "inst"),
            b"LN0" | b"LN" => {
                self.ln_class = attr_value(element, "lnClass");
                self.ln_inst = attr_value(element, "inst");
            }
            b"DataSet" => {
                self.ds_name = attr_value(element, "name");
                self.members.clear();
                // A self-closing DataSet has no members and must not
                // capture following siblings.
                self.in_dataset = !is_empty;
            }
            b"FCDA" if self.in_dataset => self.members.push(fcda_label(element)),
            b"FCCB" if self.in_dataset => {
                let cb = attr_value(element, "cbName");
                self.members
                    .push(if cb.is_empty() { "FCCB".to_string() } else { cb });
            }
            _ => {}
        }
    }

    fn close_dataset(&mut self, result: &mut DatasetLabels) {
        self.in_dataset = false;
        if self.ds_name.is_empty() || self.members.is_empty() || self.ied_name.is_empty() {
            return;
        }
        let ln_part = if !self.ln_inst.is_empty() && self.ln_inst != "0" {
            format!("{}{}", self.ln_class, self.ln_inst)
        } else {
            self.ln_class.clone()
        };
        let mut ln_variants = vec![ln_part.clone()];
        if ln_part != self.ln_class {
            ln_variants.push(self.ln_class.clone());
        }

        let mut keys = Vec::new();
        for ln in &ln_variants {
            keys.push(format!("{}/{}${}", self.ied_name, ln, self.ds_name));
            keys.push(format!(
                "{}_1{}/{}${}",
                self.ied_name, self.ld_inst, ln, self.ds_name
            ));
        }
        keys.push(format!("{}/{}${}", self.ied_name, self.ld_inst, self.ds_name));
        keys.push(format!(
            "{}_1{}/{}${}",
            self.ied_name, self.ld_inst, self.ld_inst, self.ds_name
        ));

        for key in keys {
            result.entry(key).or_insert_with(|| self.members.clone());
        }
    }
}

/// Strip a namespace prefix.
fn local_name(name: &[u8]) -> &[u8] {
    match name.iter().rposition(|&b| b == b':') {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}

fn attr_value(element: &BytesStart<'_>, wanted: &str) -> String {
    for attribute in element.attributes().flatten() {
        if local_name(attribute.key.as_ref()) == wanted.as_bytes() {
            return String::from_utf8_lossy(&attribute.value).into_owned();
        }
    }
    String::new()
}

/// Readable label for one FCDA: `doName` or `doName.daName`.
fn fcda_label(element: &BytesStart<'_>) -> String {
    let do_name = attr_value(element, "doName");
    let da_name = attr_value(element, "daName");
    match (do_name.is_empty(), da_name.is_empty()) {
        (false, false) => format!("{}.{}", do_name, da_name),
        (false, true) => do_name,
        (true, false) => da_name,
        (true, true) => "?".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<SCL xmlns="http://www.iec.ch/61850/2003/SCL">
  <IED name="VMC7">
    <AccessPoint name="S1">
      <Server>
        <LDevice inst="LD0">
          <LN0 lnClass="LLN0" inst="">
            <DataSet name="DS_LDPHAS1_CYPO">
              <FCDA ldInst="LD0" lnClass="MMXU" lnInst="1" doName="PhV.phsA" daName="cVal" fc="MX"/>
              <FCDA ldInst="LD0" lnClass="MMXU" lnInst="1" doName="Beh" daName="stVal" fc="ST"/>
              <FCDA ldInst="LD0" lnClass="GGIO" lnInst="2" doName="Ind1"/>
            </DataSet>
            <DataSet name="DS_EMPTY"/>
          </LN0>
          <LN lnClass="MMXU" inst="1"/>
        </LDevice>
      </Server>
    </AccessPoint>
  </IED>
</SCL>"#;

    #[test]
    fn test_parse_members_in_order() {
        let labels = parse_str(SAMPLE).unwrap();
        let members = labels.get("VMC7/LLN0$DS_LDPHAS1_CYPO").unwrap();
        assert_eq!(
            members,
            &vec![
                "PhV.phsA.cVal".to_string(),
                "Beh.stVal".to_string(),
                "Ind1".to_string()
            ]
        );
    }

    #[test]
    fn test_key_variants_share_members() {
        let labels = parse_str(SAMPLE).unwrap();
        let a = labels.get("VMC7/LLN0$DS_LDPHAS1_CYPO").unwrap();
        let b = labels.get("VMC7_1LD0/LLN0$DS_LDPHAS1_CYPO").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_dataset_not_registered() {
        let labels = parse_str(SAMPLE).unwrap();
        assert!(!labels.keys().any(|k| k.contains("DS_EMPTY")));
    }

    #[test]
    fn test_parse_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let labels = parse(file.path()).unwrap();
        assert!(labels.contains_key("VMC7/LLN0$DS_LDPHAS1_CYPO"));
    }

    #[test]
    fn test_malformed_xml_rejected() {
        assert!(parse_str("<SCL><IED name=").is_err());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            parse("/nonexistent/file.icd"),
            Err(MmsError::Transport(_))
        ));
    }
}
