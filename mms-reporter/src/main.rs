//! Subscribe to IEC 61850 MMS reports and forward them downstream.
//!
//! ```text
//! mms-reporter <host> [port] [rcb_ref...] [--domain D] [--scl file.icd]
//!              [--sink-url URL] [--debug] [--verbose]
//! ```
//!
//! RCB references use the IEC textual form (`LD/LN$BR$name`) or a bare
//! item id resolved against `--domain`. Exit codes: 0 normal shutdown,
//! 1 argument error, 2 connect failure, 3 MMS initiate failure.

use clap::error::ErrorKind;
use clap::Parser;
use mms_client::{ClientConfig, ClientEvent, MmsReportClient};
use mms_sink::{MetricsSink, SinkConfig};
use mms_transport::{TcpSettings, TcpTransport};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const EXIT_OK: u8 = 0;
const EXIT_ARGS: u8 = 1;
const EXIT_CONNECT: u8 = 2;
const EXIT_INITIATE: u8 = 3;

#[derive(Debug, Parser)]
#[command(name = "mms-reporter", about = "IEC 61850 MMS report subscriber")]
struct Args {
    /// IED host name or address.
    host: String,

    /// Optional port (default 102) followed by RCB references. A first
    /// value that parses as a number is taken as the port.
    #[arg(value_name = "PORT_OR_RCB")]
    rest: Vec<String>,

    /// Default MMS domain for references without one.
    #[arg(long, default_value = "VMC7_1LD0")]
    domain: String,

    /// SCL/ICD file used to label dataset members.
    #[arg(long)]
    scl: Option<PathBuf>,

    /// Hex-dump sent and received PDUs.
    #[arg(long)]
    debug: bool,

    /// Dump every report entry in full.
    #[arg(long)]
    verbose: bool,

    /// Push decoded values to this ingestion endpoint.
    #[arg(long)]
    sink_url: Option<String>,

    /// Sink flush interval in milliseconds.
    #[arg(long, default_value_t = 200)]
    sink_batch_ms: u64,

    /// One HTTP POST per report instead of batching.
    #[arg(long)]
    sink_no_batch: bool,

    /// Send an MMS identify as keep-alive on idle connections.
    #[arg(long)]
    keepalive: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(error) => {
            let code = match error.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => EXIT_OK,
                _ => EXIT_ARGS,
            };
            let _ = error.print();
            return ExitCode::from(code);
        }
    };

    let default_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    ExitCode::from(run(args).await)
}

async fn run(args: Args) -> u8 {
    // The optional positional port shares its slot with the RCB list.
    let mut rcbs = args.rest.clone();
    let port = match rcbs.first().map(|s| s.parse::<u16>()) {
        Some(Ok(port)) => {
            rcbs.remove(0);
            port
        }
        _ => mms_client::config::DEFAULT_PORT,
    };
    if rcbs.is_empty() {
        error!("no RCB references given (quote them: 'LD/LLN0$BR$name')");
        return EXIT_ARGS;
    }

    let labels = match &args.scl {
        Some(path) => match mms_scl::parse(path) {
            Ok(labels) => {
                info!(datasets = labels.len(), scl = %path.display(), "dataset labels loaded");
                labels
            }
            Err(error) => {
                error!(%error, scl = %path.display(), "cannot parse SCL file");
                return EXIT_ARGS;
            }
        },
        None => Default::default(),
    };

    let address = match tokio::net::lookup_host((args.host.as_str(), port)).await {
        Ok(mut addrs) => match addrs.next() {
            Some(address) => address,
            None => {
                error!(host = %args.host, "host resolves to no address");
                return EXIT_CONNECT;
            }
        },
        Err(error) => {
            error!(host = %args.host, %error, "cannot resolve host");
            return EXIT_CONNECT;
        }
    };

    let config = ClientConfig {
        domain: args.domain.clone(),
        keepalive: args.keepalive,
        trace_pdus: args.debug,
        ..ClientConfig::default()
    };
    let transport = TcpTransport::new(TcpSettings::new(address));
    let (mut client, events) = MmsReportClient::new(transport, config);
    client.set_dataset_labels(labels);

    info!(%address, "connecting");
    if let Err(error) = client.connect().await {
        error!(%error, "connection failed");
        return EXIT_CONNECT;
    }
    if let Err(error) = client.initiate().await {
        error!(%error, "MMS initiate failed");
        let _ = client.close().await;
        return EXIT_INITIATE;
    }

    match client.subscribe_all(&rcbs).await {
        Ok(0) => warn!("no RCB could be enabled; waiting anyway"),
        Ok(count) => info!(subscribed = count, requested = rcbs.len(), "subscriptions active"),
        Err(error) => {
            error!(%error, "subscription aborted");
            let _ = client.close().await;
            return EXIT_CONNECT;
        }
    }

    let sink = args.sink_url.as_ref().map(|url| {
        MetricsSink::spawn(SinkConfig {
            url: url.clone(),
            batch_interval: Duration::from_millis(args.sink_batch_ms),
            batch: !args.sink_no_batch,
        })
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer = tokio::spawn(consume_events(events, sink, args.verbose));

    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown requested");
        let _ = shutdown_tx.send(true);
    });

    let code = match client.run(shutdown_rx).await {
        Ok(()) => EXIT_OK,
        Err(error) => {
            error!(%error, "connection lost");
            EXIT_CONNECT
        }
    };
    // The consumer drains until the client's event sender is gone.
    drop(client);
    if let Some(sink) = consumer.await.ok().flatten() {
        sink.shutdown().await;
    }
    code
}

/// Print reports and forward them to the sink. Returns the sink so the
/// final batch can be flushed after the loop ends.
async fn consume_events(
    mut events: tokio::sync::mpsc::Receiver<ClientEvent>,
    sink: Option<MetricsSink>,
    verbose: bool,
) -> Option<MetricsSink> {
    while let Some(event) = events.recv().await {
        match event {
            ClientEvent::Connected => info!("MMS association up"),
            ClientEvent::Subscribed { rcb } => info!(%rcb, "subscribed"),
            ClientEvent::SubscriptionFailed { rcb, step, error } => {
                warn!(%rcb, step = step.as_str(), %error, "subscription failed");
            }
            ClientEvent::Report(report) => {
                info!(
                    rpt_id = %report.rpt_id,
                    dataset = report.dataset_ref.as_deref().unwrap_or("-"),
                    seq = ?report.sequence_number,
                    entries = report.entries.len(),
                    "report"
                );
                if verbose {
                    for entry in &report.entries {
                        info!(
                            index = entry.index,
                            label = entry.label.as_deref().unwrap_or("-"),
                            value = %entry.value,
                            quality = ?entry.quality.as_ref().map(ToString::to_string),
                            timestamp = ?entry.timestamp.map(|t| t.to_string()),
                            "  entry"
                        );
                    }
                }
                if let Some(sink) = &sink {
                    match mms_sink::report_samples(&report) {
                        Ok(samples) => sink.push(samples),
                        Err(error) => warn!(%error, "cannot convert report"),
                    }
                }
            }
            ClientEvent::Disconnected { reason } => {
                warn!(%reason, "disconnected");
            }
        }
    }
    sink
}
