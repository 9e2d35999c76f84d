//! E2 Agent
//!
//! Owns the session of one simulated node to its RIC, announces the node's
//! RAN functions at E2 setup, and dispatches inbound RIC requests to the
//! service model registered for the addressed RAN function.

use crate::servicemodel::{NodeIdentity, ServiceModel, ServiceModelRegistry};
use async_trait::async_trait;
use interfaces::channel::{ConnectionUpdateOutcome, ControlOutcome, SubscriptionDeleteOutcome, SubscriptionOutcome};
use interfaces::{
    E2Channel, E2ConnectionUpdate, E2Connector, E2Error, E2NodeHandler, E2SetupRequest, ProcedureOutcome,
    RicControlRequest, RicSubscriptionDeleteRequest, RicSubscriptionRequest,
};
use common::types::RanFunctionId;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, error, info, warn};

/// Agent session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Disconnected,
    Connecting,
    SetupPending,
    Active,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AgentState::Disconnected => "disconnected",
            AgentState::Connecting => "connecting",
            AgentState::SetupPending => "setup pending",
            AgentState::Active => "active",
        };
        f.write_str(name)
    }
}

/// Agent configuration
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub node: NodeIdentity,
    /// RIC E2 termination, `host:port`
    pub controller_address: String,
}

/// Routes RIC requests to service models by RAN function id
struct Dispatcher {
    models: ServiceModelRegistry,
    channel: RwLock<Option<Arc<dyn E2Channel>>>,
}

impl Dispatcher {
    fn model(&self, id: RanFunctionId) -> Result<Arc<dyn ServiceModel>, E2Error> {
        self.models
            .get(id)
            .ok_or_else(|| E2Error::NotSupported(format!("RAN function {} is not supported", id)))
    }

    async fn attach(&self, channel: Arc<dyn E2Channel>) {
        *self.channel.write().await = Some(channel);
    }

    async fn detach(&self) -> Option<Arc<dyn E2Channel>> {
        self.channel.write().await.take()
    }
}

#[async_trait]
impl E2NodeHandler for Dispatcher {
    async fn ric_subscription(
        &self,
        request: RicSubscriptionRequest,
    ) -> Result<SubscriptionOutcome, E2Error> {
        let model = self.model(request.ran_function_id)?;
        let channel = self
            .channel
            .read()
            .await
            .clone()
            .ok_or_else(|| E2Error::Unknown("no active E2 session".into()))?;
        model.ric_subscription(channel, request).await
    }

    async fn ric_subscription_delete(
        &self,
        request: RicSubscriptionDeleteRequest,
    ) -> Result<SubscriptionDeleteOutcome, E2Error> {
        self.model(request.ran_function_id)?
            .ric_subscription_delete(request)
            .await
    }

    async fn ric_control(&self, request: RicControlRequest) -> Result<ControlOutcome, E2Error> {
        self.model(request.ran_function_id)?.ric_control(request).await
    }

    async fn e2_connection_update(
        &self,
        _request: E2ConnectionUpdate,
    ) -> Result<ConnectionUpdateOutcome, E2Error> {
        Err(E2Error::NotSupported("E2 connection update is not supported".into()))
    }
}

/// E2 agent of one simulated node
pub struct E2Agent {
    config: AgentConfig,
    dispatcher: Arc<Dispatcher>,
    connector: Arc<dyn E2Connector>,
    state_tx: Arc<watch::Sender<AgentState>>,
    /// Serializes start/stop; the value identifies the current session
    lifecycle: Arc<Mutex<u64>>,
}

impl E2Agent {
    pub fn new(config: AgentConfig, models: ServiceModelRegistry, connector: Arc<dyn E2Connector>) -> Self {
        info!(
            "Creating E2 agent for gNB {} with {} RAN function(s)",
            config.node.gnb_id.0,
            models.len()
        );
        let (state_tx, _) = watch::channel(AgentState::Disconnected);
        Self {
            config,
            dispatcher: Arc::new(Dispatcher {
                models,
                channel: RwLock::new(None),
            }),
            connector,
            state_tx: Arc::new(state_tx),
            lifecycle: Arc::new(Mutex::new(0)),
        }
    }

    pub fn state(&self) -> AgentState {
        *self.state_tx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<AgentState> {
        self.state_tx.subscribe()
    }

    fn set_state(&self, state: AgentState) {
        debug!("E2 agent of gNB {} is {}", self.config.node.gnb_id.0, state);
        self.state_tx.send_replace(state);
    }

    /// Connect to the RIC and run E2 setup
    pub async fn start(&self) -> Result<(), E2Error> {
        let mut session = self.lifecycle.lock().await;
        let state = self.state();
        if state != AgentState::Disconnected {
            return Err(E2Error::Invalid(format!("E2 agent is already {}", state)));
        }
        *session += 1;
        let session_id = *session;

        info!(
            "Starting E2 agent for gNB {} towards {}",
            self.config.node.gnb_id.0, self.config.controller_address
        );
        self.set_state(AgentState::Connecting);

        let handler: Arc<dyn E2NodeHandler> = self.dispatcher.clone();
        let channel = match self.connector.connect(&self.config.controller_address, handler).await {
            Ok(channel) => channel,
            Err(e) => {
                error!("Failed to connect to {}: {}", self.config.controller_address, e);
                self.set_state(AgentState::Disconnected);
                return Err(E2Error::Unknown(format!(
                    "connecting to {} failed: {}",
                    self.config.controller_address, e
                )));
            }
        };
        self.dispatcher.attach(channel.clone()).await;
        self.set_state(AgentState::SetupPending);

        let request = E2SetupRequest {
            global_e2_node_id: self.config.node.gnb_id,
            plmn_id: self.config.node.plmn_id.encode(),
            ran_functions: self.dispatcher.models.ran_functions(),
        };
        let failure = match channel.e2_setup(request).await {
            Ok(ProcedureOutcome::Success(response)) => {
                info!(
                    "E2 setup of gNB {} accepted {} RAN function(s)",
                    self.config.node.gnb_id.0,
                    response.ran_functions_accepted.len()
                );
                for (id, cause) in &response.ran_functions_rejected {
                    warn!("RIC rejected RAN function {}: {:?}", id, cause);
                }
                None
            }
            Ok(ProcedureOutcome::Failure(failure)) => {
                Some(E2Error::Invalid(format!("E2 setup rejected: {:?}", failure.cause)))
            }
            Err(e) => Some(E2Error::Unknown(format!("E2 setup failed: {}", e))),
        };
        if let Some(e) = failure {
            error!("E2 agent of gNB {} could not start: {}", self.config.node.gnb_id.0, e);
            self.dispatcher.detach().await;
            if let Err(close_err) = channel.close().await {
                debug!("Closing failed session: {}", close_err);
            }
            self.set_state(AgentState::Disconnected);
            return Err(e);
        }

        self.set_state(AgentState::Active);
        tokio::spawn(monitor_session(
            channel,
            session_id,
            self.config.node.gnb_id.0,
            self.dispatcher.clone(),
            self.lifecycle.clone(),
            self.state_tx.clone(),
        ));

        info!("E2 agent for gNB {} started successfully", self.config.node.gnb_id.0);
        Ok(())
    }

    /// Close the session; stopping a stopped agent is a no-op
    pub async fn stop(&self) -> Result<(), E2Error> {
        let mut session = self.lifecycle.lock().await;
        *session += 1;

        let Some(channel) = self.dispatcher.detach().await else {
            self.set_state(AgentState::Disconnected);
            return Ok(());
        };
        info!("Stopping E2 agent for gNB {}", self.config.node.gnb_id.0);
        let result = channel.close().await;
        self.set_state(AgentState::Disconnected);
        result?;
        Ok(())
    }
}

/// Mark the agent disconnected once the RIC ends the session
async fn monitor_session(
    channel: Arc<dyn E2Channel>,
    session_id: u64,
    gnb_id: u64,
    dispatcher: Arc<Dispatcher>,
    lifecycle: Arc<Mutex<u64>>,
    state_tx: Arc<watch::Sender<AgentState>>,
) {
    channel.closed().await;

    let session = lifecycle.lock().await;
    if *session != session_id {
        return;
    }
    warn!("E2 session of gNB {} closed by the RIC", gnb_id);
    dispatcher.detach().await;
    state_tx.send_replace(AgentState::Disconnected);
}
