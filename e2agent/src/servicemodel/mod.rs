//! E2 Service Models
//!
//! A service model serves the RIC requests addressed to one RAN function.

pub mod kpm;
pub mod registry;

use async_trait::async_trait;
use bytes::Bytes;
use common::types::{GnbId, PlmnId, RanFunctionId};
use interfaces::channel::{ConnectionUpdateOutcome, ControlOutcome, SubscriptionDeleteOutcome, SubscriptionOutcome};
use interfaces::{
    E2Channel, E2ConnectionUpdate, E2Error, RanFunctionItem, RicControlRequest, RicSubscriptionDeleteRequest,
    RicSubscriptionRequest,
};
use std::sync::Arc;

pub use registry::ServiceModelRegistry;

/// Identity of the simulated E2 node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeIdentity {
    pub gnb_id: GnbId,
    pub plmn_id: PlmnId,
}

/// Registration of a service model under a RAN function id
#[derive(Debug, Clone, PartialEq)]
pub struct RanFunction {
    pub id: RanFunctionId,
    pub model_name: String,
    pub revision: u16,
    pub oid: String,
    pub version: String,
    /// Encoded RAN function definition announced at E2 setup
    pub description: Bytes,
}

impl RanFunction {
    pub fn to_item(&self) -> RanFunctionItem {
        RanFunctionItem {
            id: self.id,
            revision: self.revision,
            oid: self.oid.clone(),
            definition: self.description.clone(),
        }
    }
}

/// Handler for the RIC procedures of one RAN function
#[async_trait]
pub trait ServiceModel: Send + Sync {
    fn ran_function(&self) -> &RanFunction;

    /// Admit a subscription received on `channel`
    async fn ric_subscription(
        &self,
        channel: Arc<dyn E2Channel>,
        request: RicSubscriptionRequest,
    ) -> Result<SubscriptionOutcome, E2Error>;

    async fn ric_subscription_delete(
        &self,
        request: RicSubscriptionDeleteRequest,
    ) -> Result<SubscriptionDeleteOutcome, E2Error>;

    async fn ric_control(&self, request: RicControlRequest) -> Result<ControlOutcome, E2Error>;

    async fn e2_connection_update(
        &self,
        request: E2ConnectionUpdate,
    ) -> Result<ConnectionUpdateOutcome, E2Error>;
}
