//! Test doubles for the E2 session and service models

use crate::servicemodel::{NodeIdentity, RanFunction, ServiceModel};
use crate::subscription::{subscription_delete_response, Admission};
use async_trait::async_trait;
use bytes::Bytes;
use common::types::{Coordinate, Ecgi, GnbId, PlmnId, RanFunctionId};
use interfaces::channel::{
    ConnectionUpdateOutcome, ControlOutcome, SetupOutcome, SubscriptionDeleteOutcome, SubscriptionOutcome,
};
use interfaces::{
    Cause, CauseMisc, E2Channel, E2ConnectionUpdate, E2Connector, E2Error, E2NodeHandler, E2SetupFailure,
    E2SetupRequest, E2SetupResponse, InterfaceError, ProcedureOutcome, RicControlRequest, RicIndication,
    RicSubscriptionDeleteRequest, RicSubscriptionRequest,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use store::{Cell, SubscriptionId};
use tokio::sync::watch;

pub fn test_node() -> NodeIdentity {
    NodeIdentity {
        gnb_id: GnbId(5152),
        plmn_id: PlmnId::parse("00101").unwrap(),
    }
}

pub fn test_cell(ecgi: u64) -> Cell {
    Cell {
        ecgi: Ecgi(ecgi),
        location: Coordinate { lat: 52.52, lng: 13.40 },
        sector: None,
        max_ues: 100,
        tx_power_db: 10.0,
    }
}

/// How a fake RIC answers E2 setup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupBehavior {
    Accept,
    Reject,
    Drop,
}

/// In-memory E2 session recording everything the node sends
pub struct RecordingChannel {
    setup: SetupBehavior,
    setup_requests: Mutex<Vec<E2SetupRequest>>,
    indications: Mutex<Vec<RicIndication>>,
    fail_indications: AtomicBool,
    closed_tx: watch::Sender<bool>,
}

impl RecordingChannel {
    pub fn new() -> Arc<Self> {
        Self::with_setup(SetupBehavior::Accept)
    }

    pub fn with_setup(setup: SetupBehavior) -> Arc<Self> {
        let (closed_tx, _) = watch::channel(false);
        Arc::new(Self {
            setup,
            setup_requests: Mutex::new(Vec::new()),
            indications: Mutex::new(Vec::new()),
            fail_indications: AtomicBool::new(false),
            closed_tx,
        })
    }

    /// Open channel on which every indication send fails
    pub fn failing_indications() -> Arc<Self> {
        let channel = Self::new();
        channel.fail_indications.store(true, Ordering::SeqCst);
        channel
    }

    pub fn indications(&self) -> Vec<RicIndication> {
        self.indications.lock().unwrap().clone()
    }

    pub fn setup_requests(&self) -> Vec<E2SetupRequest> {
        self.setup_requests.lock().unwrap().clone()
    }

    /// Poll until at least `count` indications arrived or `timeout` elapsed
    pub async fn wait_for_indications(&self, count: usize, timeout: Duration) -> Vec<RicIndication> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let indications = self.indications();
            if indications.len() >= count || tokio::time::Instant::now() >= deadline {
                return indications;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl E2Channel for RecordingChannel {
    async fn e2_setup(&self, request: E2SetupRequest) -> Result<SetupOutcome, InterfaceError> {
        let accepted = request.ran_functions.iter().map(|f| f.id).collect();
        self.setup_requests.lock().unwrap().push(request);
        match self.setup {
            SetupBehavior::Accept => Ok(ProcedureOutcome::Success(E2SetupResponse {
                ran_functions_accepted: accepted,
                ran_functions_rejected: vec![],
            })),
            SetupBehavior::Reject => Ok(ProcedureOutcome::Failure(E2SetupFailure {
                cause: Cause::Misc(CauseMisc::OmIntervention),
            })),
            SetupBehavior::Drop => Err(InterfaceError::ChannelClosed),
        }
    }

    async fn ric_indication(&self, indication: RicIndication) -> Result<(), InterfaceError> {
        if self.is_closed() {
            return Err(InterfaceError::ChannelClosed);
        }
        if self.fail_indications.load(Ordering::SeqCst) {
            return Err(InterfaceError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "indication send failed",
            )));
        }
        self.indications.lock().unwrap().push(indication);
        Ok(())
    }

    async fn closed(&self) {
        let mut rx = self.closed_tx.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }

    fn is_closed(&self) -> bool {
        *self.closed_tx.borrow()
    }

    async fn close(&self) -> Result<(), InterfaceError> {
        self.closed_tx.send_replace(true);
        Ok(())
    }
}

/// Connector handing out recording channels
pub struct FakeConnector {
    setup: SetupBehavior,
    refuse: bool,
    connects: AtomicUsize,
    channels: Mutex<Vec<Arc<RecordingChannel>>>,
    handler: Mutex<Option<Arc<dyn E2NodeHandler>>>,
}

impl FakeConnector {
    pub fn new(setup: SetupBehavior) -> Arc<Self> {
        Arc::new(Self {
            setup,
            refuse: false,
            connects: AtomicUsize::new(0),
            channels: Mutex::new(Vec::new()),
            handler: Mutex::new(None),
        })
    }

    pub fn refusing() -> Arc<Self> {
        Arc::new(Self {
            setup: SetupBehavior::Accept,
            refuse: true,
            connects: AtomicUsize::new(0),
            channels: Mutex::new(Vec::new()),
            handler: Mutex::new(None),
        })
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn last_channel(&self) -> Option<Arc<RecordingChannel>> {
        self.channels.lock().unwrap().last().cloned()
    }

    /// Handler the node registered for inbound RIC requests
    pub fn handler(&self) -> Option<Arc<dyn E2NodeHandler>> {
        self.handler.lock().unwrap().clone()
    }
}

#[async_trait]
impl E2Connector for FakeConnector {
    async fn connect(
        &self,
        address: &str,
        handler: Arc<dyn E2NodeHandler>,
    ) -> Result<Arc<dyn E2Channel>, InterfaceError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.refuse {
            return Err(InterfaceError::ConnectionFailed(address.to_string()));
        }
        let channel = RecordingChannel::with_setup(self.setup);
        self.channels.lock().unwrap().push(channel.clone());
        *self.handler.lock().unwrap() = Some(handler);
        Ok(channel)
    }
}

/// Service model that counts the requests routed to it
pub struct SpyServiceModel {
    function: RanFunction,
    pub subscriptions: AtomicUsize,
    pub deletes: AtomicUsize,
    pub controls: AtomicUsize,
}

impl SpyServiceModel {
    pub fn new(id: RanFunctionId) -> Self {
        Self {
            function: RanFunction {
                id,
                model_name: "SPY".to_string(),
                revision: 1,
                oid: format!("1.3.6.1.4.1.0.{}", id.0),
                version: "v1".to_string(),
                description: Bytes::from_static(b"spy"),
            },
            subscriptions: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            controls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
            + self.deletes.load(Ordering::SeqCst)
            + self.controls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServiceModel for SpyServiceModel {
    fn ran_function(&self) -> &RanFunction {
        &self.function
    }

    async fn ric_subscription(
        &self,
        _channel: Arc<dyn E2Channel>,
        request: RicSubscriptionRequest,
    ) -> Result<SubscriptionOutcome, E2Error> {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        let mut admission = Admission::new(SubscriptionId::new(request.request_id, request.ran_function_id));
        for action in &request.actions {
            admission.accept(action.action_id);
        }
        Ok(ProcedureOutcome::Success(admission.response()))
    }

    async fn ric_subscription_delete(
        &self,
        request: RicSubscriptionDeleteRequest,
    ) -> Result<SubscriptionDeleteOutcome, E2Error> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(ProcedureOutcome::Success(subscription_delete_response(SubscriptionId::new(
            request.request_id,
            request.ran_function_id,
        ))))
    }

    async fn ric_control(&self, _request: RicControlRequest) -> Result<ControlOutcome, E2Error> {
        self.controls.fetch_add(1, Ordering::SeqCst);
        Err(E2Error::NotSupported("spy offers no control".into()))
    }

    async fn e2_connection_update(
        &self,
        _request: E2ConnectionUpdate,
    ) -> Result<ConnectionUpdateOutcome, E2Error> {
        Err(E2Error::NotSupported("spy handles no connection updates".into()))
    }
}
