//! Client orchestrator
//!
//! Owns the COTP session and all protocol state. Control flow is a single
//! receive loop once the subscriptions are set up; writes happen only
//! during setup and (optionally) as keep-alive.

use crate::config::ClientConfig;
use mms_application::pdu::{
    self, ConfirmedResponse, InformationReport, InitiateRequest, MmsPdu, ServiceResponse,
    WriteResult,
};
use mms_application::report::{self, DatasetLabels, MmsReport};
use mms_application::{ObjectName, OptFlds, RcbKind, TrgOps};
use mms_application::rcb::attr;
use mms_asn1::iso;
use mms_core::{hex_string, DataAccessError, MmsError, MmsResult, MmsValue};
use mms_session::{spdu, CotpSession};
use mms_transport::TransportLayer;
use std::collections::HashMap;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// First invoke id of each session; later requests increment with
/// wraparound at 65535.
const INITIAL_INVOKE_ID: u16 = 0x012C;

/// Buffered client events before the consumer falls behind.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    CotpUp,
    MmsUp,
    Subscribed,
    Closed,
}

/// Steps of the RCB enable dance, for failure reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RcbStep {
    Read,
    Disable,
    Reserve,
    OptFlds,
    TrgOps,
    BufTm,
    IntgPd,
    Gi,
    Enable,
}

impl RcbStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            RcbStep::Read => "read",
            RcbStep::Disable => "disable",
            RcbStep::Reserve => "reserve",
            RcbStep::OptFlds => "optflds",
            RcbStep::TrgOps => "trgops",
            RcbStep::BufTm => "buftm",
            RcbStep::IntgPd => "intgpd",
            RcbStep::Gi => "gi",
            RcbStep::Enable => "enable",
        }
    }
}

/// Events emitted by the client.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// MMS association established.
    Connected,
    /// An RCB finished its enable dance.
    Subscribed { rcb: String },
    /// An RCB enable step failed; the client continues with other RCBs.
    SubscriptionFailed {
        rcb: String,
        step: RcbStep,
        error: String,
    },
    /// A decoded (and labeled) report.
    Report(Box<MmsReport>),
    /// The connection is gone.
    Disconnected { reason: String },
}

/// MMS reporting client over any transport.
pub struct MmsReportClient<T: TransportLayer> {
    session: CotpSession<T>,
    config: ClientConfig,
    state: ConnectionState,
    invoke_id: u16,
    /// Outstanding confirmed requests, keyed on the raw invoke id so
    /// wraparound cannot alias an old request.
    pending: HashMap<u16, &'static str>,
    subscribed: Vec<String>,
    dataset_labels: DatasetLabels,
    event_tx: mpsc::Sender<ClientEvent>,
}

impl<T: TransportLayer> MmsReportClient<T> {
    /// Create a client over a transport, returning it together with the
    /// receiving end of its event stream. The transport is opened by
    /// [`connect`](Self::connect).
    pub fn new(transport: T, config: ClientConfig) -> (Self, mpsc::Receiver<ClientEvent>) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let client = Self {
            session: CotpSession::new(transport, config.cotp.clone()),
            config,
            state: ConnectionState::Idle,
            invoke_id: INITIAL_INVOKE_ID,
            pending: HashMap::new(),
            subscribed: Vec::new(),
            dataset_labels: DatasetLabels::new(),
            event_tx,
        };
        (client, event_rx)
    }

    /// Access the underlying session (mock transports in tests script
    /// their frames through this).
    pub fn session_mut(&mut self) -> &mut CotpSession<T> {
        &mut self.session
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// RCB references successfully subscribed so far.
    pub fn subscribed(&self) -> &[String] {
        &self.subscribed
    }

    /// Register the dataset label mapping. Read-only after this call.
    pub fn set_dataset_labels(&mut self, labels: DatasetLabels) {
        self.dataset_labels = labels;
    }

    /// Open the transport and establish the COTP connection.
    pub async fn connect(&mut self) -> MmsResult<()> {
        self.session.connect().await?;
        self.state = ConnectionState::CotpUp;
        Ok(())
    }

    /// Run the MMS initiate exchange inside the ISO association setup.
    pub async fn initiate(&mut self) -> MmsResult<()> {
        if self.state != ConnectionState::CotpUp {
            return Err(MmsError::Protocol(format!(
                "initiate in state {:?}",
                self.state
            )));
        }

        let initiate = InitiateRequest::default().encode()?;
        let aarq = iso::aarq_wrap(&initiate)?;
        let cp = iso::cp_type(&aarq)?;
        let connect_spdu = spdu::connect(&cp)?;
        if self.config.trace_pdus {
            debug!(pdu = %hex_string(&connect_spdu), "TX association request");
        }
        self.session.send_data(&connect_spdu).await?;

        self.session
            .set_read_timeout(Some(self.config.request_timeout))
            .await?;
        let accept = self.session.recv_data().await?;
        self.session.set_read_timeout(None).await?;
        if self.config.trace_pdus {
            debug!(pdu = %hex_string(&accept), "RX association response");
        }

        let cpa = spdu::parse_accept(&accept)?;
        let acse = iso::cpa_unwrap(cpa)?;
        let apdu = iso::acse_unwrap(acse)?;
        match pdu::decode_pdu(apdu)? {
            MmsPdu::InitiateResponse(response) => {
                info!(
                    version = ?response.negotiated_version,
                    local_detail = ?response.local_detail_called,
                    "MMS association established"
                );
            }
            MmsPdu::InitiateRequest => {
                // Some stacks answer under the request tag; treat it as a
                // completed exchange.
                info!("MMS association established (initiate echoed)");
            }
            other => {
                return Err(MmsError::Protocol(format!(
                    "unexpected PDU during initiate: {:?}",
                    other
                )))
            }
        }
        self.state = ConnectionState::MmsUp;
        self.emit(ClientEvent::Connected);
        Ok(())
    }

    /// Enable reporting on every RCB in configured order. A failing RCB is
    /// reported and skipped; partial subscription is acceptable. Returns
    /// the number of successful subscriptions.
    pub async fn subscribe_all(&mut self, references: &[String]) -> MmsResult<usize> {
        let mut enabled = 0;
        for reference in references {
            match self.enable_rcb(reference).await {
                Ok(()) => enabled += 1,
                Err(error @ MmsError::RcbEnable { .. }) => {
                    warn!(rcb = %reference, %error, "RCB subscription failed");
                }
                Err(fatal) => return Err(fatal),
            }
        }
        Ok(enabled)
    }

    /// Run the eight-write enable dance on one RCB. All writes of one RCB
    /// complete before the next RCB starts.
    pub async fn enable_rcb(&mut self, reference: &str) -> MmsResult<()> {
        if !matches!(
            self.state,
            ConnectionState::MmsUp | ConnectionState::Subscribed
        ) {
            return Err(MmsError::Protocol(format!(
                "enable_rcb in state {:?}",
                self.state
            )));
        }

        let name = if reference.contains('/') || reference.contains(' ') {
            ObjectName::from_reference(reference)?
        } else {
            ObjectName::new(self.config.domain.clone(), reference)
        };
        let kind = RcbKind::from_reference(&name.item_id);
        info!(rcb = %name, ?kind, "enabling RCB");

        // Step 1: read the current configuration in one request.
        let attrs = kind.setup_read_attrs();
        let variables: Vec<ObjectName> =
            attrs.iter().map(|a| name.with_attribute(a)).collect();
        let results = match self.read(&variables).await {
            Ok(results) => results,
            Err(cause) => return Err(self.rcb_failure(reference, RcbStep::Read, cause).await),
        };
        let was_enabled = results
            .first()
            .and_then(|r| r.value())
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        // Step 2: the server requires a disabled RCB for reconfiguration.
        if was_enabled {
            match self
                .write(&name.with_attribute(attr::RPT_ENA), &MmsValue::Bool(false))
                .await
            {
                Ok(()) => {}
                // A URCB owned by another client refuses the disable; the
                // reservation step below decides whether we may proceed.
                Err(MmsError::DataAccess(DataAccessError::ObjectAccessDenied))
                    if kind == RcbKind::Unbuffered =>
                {
                    debug!(rcb = %name, "disable refused on unowned URCB, continuing");
                }
                Err(cause) => {
                    return Err(self.rcb_failure(reference, RcbStep::Disable, cause).await)
                }
            }
        }

        // Step 3: reserve.
        let reserve = match kind {
            RcbKind::Unbuffered => (attr::RESV, MmsValue::Bool(true)),
            RcbKind::Buffered => (
                attr::RESV_TMS,
                MmsValue::Uint(self.config.reservation_time_s as u64),
            ),
        };
        if let Err(cause) = self.write(&name.with_attribute(reserve.0), &reserve.1).await {
            return Err(self.rcb_failure(reference, RcbStep::Reserve, cause).await);
        }

        // Steps 4-7: report shape and triggers.
        let writes: [(RcbStep, &str, MmsValue); 5] = [
            (
                RcbStep::OptFlds,
                attr::OPT_FLDS,
                MmsValue::BitString(OptFlds::subscription_default().bits().clone()),
            ),
            (
                RcbStep::TrgOps,
                attr::TRG_OPS,
                MmsValue::BitString(TrgOps::subscription_default().bits().clone()),
            ),
            (
                RcbStep::BufTm,
                attr::BUF_TM,
                MmsValue::Uint(self.config.buffer_time_ms as u64),
            ),
            (
                RcbStep::IntgPd,
                attr::INTG_PD,
                MmsValue::Uint(self.config.integrity_period_ms as u64),
            ),
            (RcbStep::Gi, attr::GI, MmsValue::Bool(true)),
        ];
        for (step, attribute, value) in writes {
            if let Err(cause) = self.write(&name.with_attribute(attribute), &value).await {
                return Err(self.rcb_failure(reference, step, cause).await);
            }
        }

        // Step 8: enable.
        if let Err(cause) = self
            .write(&name.with_attribute(attr::RPT_ENA), &MmsValue::Bool(true))
            .await
        {
            return Err(self.rcb_failure(reference, RcbStep::Enable, cause).await);
        }

        self.state = ConnectionState::Subscribed;
        self.subscribed.push(reference.to_string());
        info!(rcb = %name, "RCB enabled");
        self.emit(ClientEvent::Subscribed {
            rcb: reference.to_string(),
        });
        Ok(())
    }

    /// Receive loop: decode incoming TSDUs, emit reports, answer idle
    /// windows with a keep-alive when configured. Returns when the
    /// shutdown signal fires or a fatal error tears the connection down.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> MmsResult<()> {
        loop {
            if *shutdown.borrow() {
                break;
            }
            let received = tokio::select! {
                _ = shutdown.changed() => continue,
                received =
                    tokio::time::timeout(self.config.idle_timeout, self.session.recv_data()) =>
                {
                    received
                }
            };
            match received {
                Err(_elapsed) => {
                    if self.config.keepalive {
                        debug!("idle window elapsed, sending identify keep-alive");
                        if let Err(error) = self.identify().await {
                            if error.is_fatal() {
                                return self.fail(error).await;
                            }
                            warn!(%error, "keep-alive failed");
                        }
                    } else {
                        debug!("idle window elapsed, waiting for reports");
                    }
                }
                Ok(Ok(tsdu)) => {
                    if let Err(error) = self.dispatch(&tsdu).await {
                        if error.is_fatal() || matches!(error, MmsError::Ber(_)) {
                            return self.fail(error).await;
                        }
                        warn!(%error, "discarding undecodable PDU");
                    }
                }
                Ok(Err(error)) if error.is_fatal() => return self.fail(error).await,
                Ok(Err(error)) => warn!(%error, "receive error"),
            }
        }
        self.close().await
    }

    /// Close the connection. Dropping the TCP session releases URCB
    /// reservations server-side; no explicit unsubscribe exists.
    pub async fn close(&mut self) -> MmsResult<()> {
        if self.state != ConnectionState::Closed {
            self.state = ConnectionState::Closed;
            self.session.close().await?;
        }
        Ok(())
    }

    async fn fail(&mut self, error: MmsError) -> MmsResult<()> {
        self.emit(ClientEvent::Disconnected {
            reason: error.to_string(),
        });
        let _ = self.close().await;
        Err(error)
    }

    async fn dispatch(&mut self, tsdu: &[u8]) -> MmsResult<()> {
        if self.config.trace_pdus {
            debug!(pdu = %hex_string(tsdu), "RX");
        }
        let apdu = iso::pdv_unwrap(spdu::unwrap_data(tsdu))?;
        match pdu::decode_pdu(apdu)? {
            MmsPdu::InformationReport(ir) => self.handle_report(ir).await,
            MmsPdu::ConfirmedResponse(response) => {
                if self.pending.remove(&response.invoke_id).is_none() {
                    debug!(
                        invoke_id = response.invoke_id,
                        "discarding response without pending request"
                    );
                }
                Ok(())
            }
            other => {
                debug!(?other, "discarding unexpected PDU");
                Ok(())
            }
        }
    }

    async fn handle_report(&mut self, ir: InformationReport) -> MmsResult<()> {
        let fallback = OptFlds::subscription_default();
        match report::decode_report(&ir.access_results, Some(&fallback)) {
            Ok(mut decoded) => {
                decoded.apply_labels(&self.dataset_labels);
                for warning in &decoded.warnings {
                    warn!(rpt_id = %decoded.rpt_id, warning, "report decode warning");
                }
                self.emit(ClientEvent::Report(Box::new(decoded)));
                Ok(())
            }
            Err(error) => {
                // A malformed report is a soft error; the loop keeps going.
                warn!(%error, "undecodable information report");
                Ok(())
            }
        }
    }

    fn emit(&self, event: ClientEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(?event, "event channel full, dropping");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("event receiver dropped");
            }
        }
    }

    fn next_invoke_id(&mut self) -> u16 {
        let id = self.invoke_id;
        self.invoke_id = self.invoke_id.wrapping_add(1);
        id
    }

    /// Read several variables in one confirmed request.
    pub async fn read(
        &mut self,
        variables: &[ObjectName],
    ) -> MmsResult<Vec<pdu::AccessResult>> {
        let invoke_id = self.next_invoke_id();
        let apdu = pdu::encode_read(invoke_id, variables)?;
        let response = self.request(invoke_id, "read", apdu).await?;
        match response.service {
            ServiceResponse::Read(results) => Ok(results),
            other => Err(MmsError::Protocol(format!(
                "read answered with {:?}",
                other
            ))),
        }
    }

    /// Write one value, mapping a per-variable failure to `DataAccess`.
    pub async fn write(&mut self, variable: &ObjectName, value: &MmsValue) -> MmsResult<()> {
        let invoke_id = self.next_invoke_id();
        let apdu = pdu::encode_write(invoke_id, variable, value)?;
        let response = self.request(invoke_id, "write", apdu).await?;
        match response.service {
            ServiceResponse::Write(results) => match results.first() {
                Some(WriteResult::Success) => Ok(()),
                Some(WriteResult::Failure(code)) => Err(MmsError::DataAccess(*code)),
                None => Err(MmsError::Protocol("empty write response".to_string())),
            },
            other => Err(MmsError::Protocol(format!(
                "write answered with {:?}",
                other
            ))),
        }
    }

    /// Identify request, used as keep-alive.
    async fn identify(&mut self) -> MmsResult<()> {
        let invoke_id = self.next_invoke_id();
        let apdu = pdu::encode_identify(invoke_id)?;
        let response = self.request(invoke_id, "identify", apdu).await?;
        if let ServiceResponse::Identify(identity) = response.service {
            debug!(?identity, "keep-alive answered");
        }
        Ok(())
    }

    /// One confirmed exchange: send, then receive until the matching
    /// response arrives. Reports received in between are dispatched, not
    /// lost.
    async fn request(
        &mut self,
        invoke_id: u16,
        label: &'static str,
        apdu: Vec<u8>,
    ) -> MmsResult<ConfirmedResponse> {
        self.pending.insert(invoke_id, label);
        let result = tokio::time::timeout(
            self.config.request_timeout,
            self.exchange(invoke_id, apdu),
        )
        .await
        .unwrap_or(Err(MmsError::Timeout));
        self.pending.remove(&invoke_id);
        result
    }

    async fn exchange(&mut self, invoke_id: u16, apdu: Vec<u8>) -> MmsResult<ConfirmedResponse> {
        if self.config.trace_pdus {
            debug!(pdu = %hex_string(&apdu), "TX");
        }
        let tsdu = spdu::wrap_data(&iso::pdv_wrap(&apdu)?);
        self.session.send_data(&tsdu).await?;

        loop {
            let incoming = self.session.recv_data().await?;
            if self.config.trace_pdus {
                debug!(pdu = %hex_string(&incoming), "RX");
            }
            let response = iso::pdv_unwrap(spdu::unwrap_data(&incoming))?;
            match pdu::decode_pdu(response)? {
                MmsPdu::InformationReport(ir) => {
                    self.handle_report(ir).await?;
                }
                MmsPdu::ConfirmedResponse(resp) if resp.invoke_id == invoke_id => {
                    return Ok(resp);
                }
                MmsPdu::ConfirmedError {
                    invoke_id: Some(id),
                    error,
                } if id == invoke_id => {
                    return Err(error.into());
                }
                other => {
                    debug!(?other, "discarding PDU while waiting for response");
                }
            }
        }
    }

    async fn rcb_failure(
        &mut self,
        reference: &str,
        step: RcbStep,
        cause: MmsError,
    ) -> MmsError {
        self.emit(ClientEvent::SubscriptionFailed {
            rcb: reference.to_string(),
            step,
            error: cause.to_string(),
        });
        MmsError::RcbEnable {
            rcb: reference.to_string(),
            step: step.as_str().to_string(),
            cause: Box::new(cause),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rcb_step_names() {
        assert_eq!(RcbStep::Reserve.as_str(), "reserve");
        assert_eq!(RcbStep::Enable.as_str(), "enable");
    }

    #[test]
    fn test_invoke_id_wraps() {
        let (mut client, _events) = MmsReportClient::new(
            mms_transport::MemoryTransport::new(),
            ClientConfig::default(),
        );
        client.invoke_id = u16::MAX;
        assert_eq!(client.next_invoke_id(), u16::MAX);
        assert_eq!(client.next_invoke_id(), 0);
        assert_eq!(client.next_invoke_id(), 1);
    }
}
