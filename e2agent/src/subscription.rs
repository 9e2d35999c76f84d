//! Subscription procedure responses
//!
//! Builds the PDUs answering subscription and subscription-delete requests.

use common::types::RicActionId;
use interfaces::{
    Cause, RicSubscriptionDeleteResponse, RicSubscriptionFailure, RicSubscriptionResponse,
};
use std::collections::BTreeMap;
use store::SubscriptionId;

/// Outcome of action admission for one subscription request
#[derive(Debug, Clone, PartialEq)]
pub struct Admission {
    pub id: SubscriptionId,
    pub actions_accepted: Vec<RicActionId>,
    pub actions_not_admitted: BTreeMap<RicActionId, Cause>,
}

impl Admission {
    pub fn new(id: SubscriptionId) -> Self {
        Self {
            id,
            actions_accepted: Vec::new(),
            actions_not_admitted: BTreeMap::new(),
        }
    }

    pub fn accept(&mut self, action_id: RicActionId) {
        self.actions_accepted.push(action_id);
    }

    pub fn reject(&mut self, action_id: RicActionId, cause: Cause) {
        self.actions_not_admitted.insert(action_id, cause);
    }

    pub fn any_accepted(&self) -> bool {
        !self.actions_accepted.is_empty()
    }

    pub fn response(&self) -> RicSubscriptionResponse {
        RicSubscriptionResponse {
            request_id: self.id.request_id(),
            ran_function_id: self.id.ran_function_id,
            actions_admitted: self.actions_accepted.clone(),
            actions_not_admitted: self
                .actions_not_admitted
                .iter()
                .map(|(action_id, cause)| (*action_id, *cause))
                .collect(),
        }
    }
}

pub fn subscription_failure(id: SubscriptionId, cause: Cause) -> RicSubscriptionFailure {
    RicSubscriptionFailure {
        request_id: id.request_id(),
        ran_function_id: id.ran_function_id,
        cause,
    }
}

pub fn subscription_delete_response(id: SubscriptionId) -> RicSubscriptionDeleteResponse {
    RicSubscriptionDeleteResponse {
        request_id: id.request_id(),
        ran_function_id: id.ran_function_id,
    }
}
