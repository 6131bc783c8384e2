//! Time-series push sink
//!
//! Converts decoded reports into Prometheus text lines with explicit
//! timestamps and POSTs them to a VictoriaMetrics-compatible import
//! endpoint. Samples are buffered and flushed by a background task when
//! either the batch size threshold or the flush interval is reached; with
//! batching disabled every push flushes immediately.

use chrono::Utc;
use mms_application::report::MmsReport;
use mms_core::MmsResult;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Flush when this many samples are buffered, regardless of the interval.
pub const BATCH_MAX_SAMPLES: usize = 500;

/// Default flush interval in milliseconds.
pub const DEFAULT_BATCH_INTERVAL_MS: u64 = 200;

/// Import path appended to the base URL.
const IMPORT_PATH: &str = "/api/v1/import/prometheus";

/// Entry timestamps before 2000-01-01 are clock garbage (1984-epoch
/// leftovers); the sample gets the wall clock instead.
const TIMESTAMP_MS_MIN: i64 = 946_684_800_000;

/// Metric name for report values.
const METRIC_NAME: &str = "mms_report_value";

/// One sample for the ingestion endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub metric: String,
    /// Label pairs, already ordered.
    pub labels: Vec<(String, String)>,
    pub value: f64,
    pub timestamp_ms: i64,
}

impl Sample {
    /// Render as one Prometheus text line.
    pub fn to_line(&self) -> String {
        let labels = self
            .labels
            .iter()
            .map(|(key, value)| format!("{}=\"{}\"", key, escape_label(value)))
            .collect::<Vec<_>>()
            .join(",");
        format!("{}{{{}}} {} {}", self.metric, labels, self.value, self.timestamp_ms)
    }
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Sink configuration.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Base URL of the ingestion endpoint.
    pub url: String,
    /// Flush interval; ignored when `batch` is false.
    pub batch_interval: Duration,
    /// Flush on size/interval when true, per push when false.
    pub batch: bool,
}

impl SinkConfig {
    /// Batching sink with the default interval.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            batch_interval: Duration::from_millis(DEFAULT_BATCH_INTERVAL_MS),
            batch: true,
        }
    }
}

/// Handle to the background push task.
pub struct MetricsSink {
    tx: mpsc::UnboundedSender<Vec<Sample>>,
    handle: JoinHandle<()>,
}

impl MetricsSink {
    /// Spawn the sink task.
    pub fn spawn(config: SinkConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_sink(config, rx));
        Self { tx, handle }
    }

    /// Queue samples for delivery.
    pub fn push(&self, samples: Vec<Sample>) {
        if samples.is_empty() {
            return;
        }
        if self.tx.send(samples).is_err() {
            warn!("sink task is gone, dropping samples");
        }
    }

    /// Queue one sample.
    pub fn push_one(
        &self,
        metric: impl Into<String>,
        labels: Vec<(String, String)>,
        value: f64,
        timestamp_ms: i64,
    ) {
        self.push(vec![Sample {
            metric: metric.into(),
            labels,
            value,
            timestamp_ms,
        }]);
    }

    /// Flush the remaining buffer and stop the task.
    pub async fn shutdown(self) {
        drop(self.tx);
        let _ = self.handle.await;
    }
}

async fn run_sink(config: SinkConfig, mut rx: mpsc::UnboundedReceiver<Vec<Sample>>) {
    let client = reqwest::Client::new();
    let url = format!("{}{}", config.url.trim_end_matches('/'), IMPORT_PATH);
    let mut buffer: Vec<Sample> = Vec::new();
    let mut ticker = tokio::time::interval(if config.batch {
        config.batch_interval
    } else {
        // The timer never drives an unbatched sink, only the pushes do.
        Duration::from_secs(3600)
    });
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Some(samples) => {
                    buffer.extend(samples);
                    if !config.batch || buffer.len() >= BATCH_MAX_SAMPLES {
                        post(&client, &url, &mut buffer).await;
                    }
                }
                None => {
                    post(&client, &url, &mut buffer).await;
                    return;
                }
            },
            _ = ticker.tick(), if config.batch => {
                post(&client, &url, &mut buffer).await;
            }
        }
    }
}

async fn post(client: &reqwest::Client, url: &str, buffer: &mut Vec<Sample>) {
    if buffer.is_empty() {
        return;
    }
    let body = buffer
        .iter()
        .map(Sample::to_line)
        .collect::<Vec<_>>()
        .join("\n");
    let count = buffer.len();
    buffer.clear();

    match client
        .post(url)
        .header("Content-Type", "text/plain; charset=utf-8")
        .body(body)
        .timeout(Duration::from_secs(15))
        .send()
        .await
    {
        Ok(response) if response.status().is_success() => {
            debug!(count, "pushed samples");
        }
        Ok(response) => {
            warn!(count, status = %response.status(), "sink push rejected");
        }
        Err(error) => {
            warn!(count, %error, "sink push failed");
        }
    }
}

/// Convert a decoded report into samples: one per numeric leaf of each
/// entry value, labeled with the report id, dataset, member name and (for
/// multi-value members) the component.
///
/// Member names fall back to `member_<index>` without a label; phasor
/// members with two components get `mag`/`ang` component names.
pub fn report_samples(report: &MmsReport) -> MmsResult<Vec<Sample>> {
    let mut samples = Vec::new();
    let rpt_id = report.rpt_id.clone();
    let dataset = report
        .dataset_ref
        .clone()
        .unwrap_or_else(|| "unknown".to_string());
    let now_ms = Utc::now().timestamp_millis();

    for entry in &report.entries {
        let numbers = entry.value.numeric_leaves();
        if numbers.is_empty() {
            continue;
        }
        let member = entry
            .label
            .clone()
            .unwrap_or_else(|| format!("member_{}", entry.index));
        let timestamp_ms = match report.entry_timestamp_ms(entry) {
            Some(ms) if ms >= TIMESTAMP_MS_MIN => ms,
            _ => now_ms,
        };
        let component_names = component_names(&member, numbers.len());

        for (component, value) in numbers.iter().enumerate() {
            let mut labels = vec![
                ("rpt_id".to_string(), rpt_id.clone()),
                ("data_set".to_string(), dataset.clone()),
                ("member".to_string(), member.clone()),
            ];
            if numbers.len() > 1 {
                let name = component_names
                    .as_ref()
                    .and_then(|names| names.get(component).copied())
                    .map(str::to_string)
                    .unwrap_or_else(|| component.to_string());
                labels.push(("component".to_string(), name));
            }
            samples.push(Sample {
                metric: METRIC_NAME.to_string(),
                labels,
                value: *value,
                timestamp_ms,
            });
        }
    }
    Ok(samples)
}

/// Phasor-shaped members (`phsA`/`phsB`/`phsC`) with two numeric
/// components are magnitude and angle.
fn component_names(member: &str, count: usize) -> Option<[&'static str; 2]> {
    if count == 2 && ["phsA", "phsB", "phsC"].iter().any(|p| member.contains(p)) {
        Some(["mag", "ang"])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mms_application::report::{MmsReport, ReportEntry, ReportTimestamp};
    use mms_core::datatypes::{BitString, UtcTime};
    use mms_core::MmsValue;

    fn report_with(entries: Vec<ReportEntry>) -> MmsReport {
        MmsReport {
            rpt_id: "LDPHAS1_CYPO_DEP1".into(),
            dataset_ref: Some("VMC7_1LD0/LLN0$DS_LDPHAS1_CYPO".into()),
            sequence_number: Some(1),
            time_of_entry: Some(ReportTimestamp::Utc(UtcTime {
                seconds: 1_708_425_192,
                fraction: 0,
                quality: 0,
            })),
            buffer_overflow: Some(false),
            conf_rev: None,
            sub_seq_num: None,
            more_follows: None,
            entry_id: None,
            inclusion: BitString::new(vec![0x80], 1).unwrap(),
            entries,
            warnings: vec![],
        }
    }

    fn entry(index: usize, label: Option<&str>, value: MmsValue) -> ReportEntry {
        ReportEntry {
            index,
            label: label.map(str::to_string),
            value,
            quality: None,
            timestamp: None,
        }
    }

    #[test]
    fn test_sample_line_format() {
        let sample = Sample {
            metric: "mms_report_value".into(),
            labels: vec![
                ("rpt_id".into(), "r1".into()),
                ("member".into(), "Beh.stVal".into()),
            ],
            value: 2.0,
            timestamp_ms: 1_708_425_192_000,
        };
        assert_eq!(
            sample.to_line(),
            "mms_report_value{rpt_id=\"r1\",member=\"Beh.stVal\"} 2 1708425192000"
        );
    }

    #[test]
    fn test_label_escaping() {
        let sample = Sample {
            metric: "m".into(),
            labels: vec![("k".into(), "a\"b\\c".into())],
            value: 1.0,
            timestamp_ms: 0,
        };
        assert_eq!(sample.to_line(), "m{k=\"a\\\"b\\\\c\"} 1 0");
    }

    #[test]
    fn test_report_samples_uses_time_of_entry() {
        let report = report_with(vec![entry(0, Some("Beh.stVal"), MmsValue::Uint(2))]);
        let samples = report_samples(&report).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].value, 2.0);
        assert_eq!(samples[0].timestamp_ms, 1_708_425_192_000);
        assert!(samples[0]
            .labels
            .contains(&("member".to_string(), "Beh.stVal".to_string())));
    }

    #[test]
    fn test_report_samples_skips_non_numeric() {
        let report = report_with(vec![entry(
            0,
            None,
            MmsValue::VisibleString("text".into()),
        )]);
        assert!(report_samples(&report).unwrap().is_empty());
    }

    #[test]
    fn test_phasor_components() {
        let vector = MmsValue::Structure(vec![
            MmsValue::Structure(vec![MmsValue::Float32(230.0)]),
            MmsValue::Structure(vec![MmsValue::Float32(-120.0)]),
        ]);
        let report = report_with(vec![entry(0, Some("PhV.phsA.cVal"), vector)]);
        let samples = report_samples(&report).unwrap();
        assert_eq!(samples.len(), 2);
        let components: Vec<_> = samples
            .iter()
            .map(|s| {
                s.labels
                    .iter()
                    .find(|(k, _)| k == "component")
                    .map(|(_, v)| v.clone())
                    .unwrap()
            })
            .collect();
        assert_eq!(components, vec!["mag".to_string(), "ang".to_string()]);
    }

    #[test]
    fn test_old_timestamp_replaced_by_now() {
        let mut report = report_with(vec![entry(0, None, MmsValue::Uint(1))]);
        // 1984-epoch TimeOfEntry: before the 2000 cutoff
        report.time_of_entry = Some(ReportTimestamp::Utc(UtcTime {
            seconds: 470_981_313,
            fraction: 0,
            quality: 0,
        }));
        let samples = report_samples(&report).unwrap();
        assert!(samples[0].timestamp_ms >= TIMESTAMP_MS_MIN);
    }

    #[test]
    fn test_bool_maps_to_one_zero() {
        let report = report_with(vec![
            entry(0, Some("a"), MmsValue::Bool(true)),
            entry(1, Some("b"), MmsValue::Bool(false)),
        ]);
        let samples = report_samples(&report).unwrap();
        assert_eq!(samples[0].value, 1.0);
        assert_eq!(samples[1].value, 0.0);
    }
}
