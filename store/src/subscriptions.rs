//! Subscription Registry
//!
//! Keyed store of admitted RIC subscriptions.

use crate::StoreError;
use common::types::{RanFunctionId, RicActionId, RicRequestId};
use interfaces::{Cause, E2Channel};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::debug;

/// Subscription key: (RIC instance id, requestor id, RAN function id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    pub instance_id: u32,
    pub requestor_id: u32,
    pub ran_function_id: RanFunctionId,
}

impl SubscriptionId {
    pub fn new(request_id: RicRequestId, ran_function_id: RanFunctionId) -> Self {
        Self {
            instance_id: request_id.instance_id,
            requestor_id: request_id.requestor_id,
            ran_function_id,
        }
    }

    pub fn request_id(&self) -> RicRequestId {
        RicRequestId {
            requestor_id: self.requestor_id,
            instance_id: self.instance_id,
        }
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.instance_id, self.requestor_id, self.ran_function_id)
    }
}

/// Stop handle of a subscription's report task
#[derive(Debug, Clone)]
pub struct ReportTicker {
    stop_tx: Arc<watch::Sender<bool>>,
}

/// Task side of a [`ReportTicker`]
pub struct TickerStop {
    stop_rx: watch::Receiver<bool>,
}

impl ReportTicker {
    pub fn new() -> (Self, TickerStop) {
        let (stop_tx, stop_rx) = watch::channel(false);
        (
            Self {
                stop_tx: Arc::new(stop_tx),
            },
            TickerStop { stop_rx },
        )
    }

    /// Stop the ticker; the report task exits at its next wake-up
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// Whether both handles control the same task
    pub fn same_task(&self, other: &ReportTicker) -> bool {
        Arc::ptr_eq(&self.stop_tx, &other.stop_tx)
    }
}

impl TickerStop {
    /// Resolves once the ticker is stopped or every handle is gone
    pub async fn stopped(&mut self) {
        let _ = self.stop_rx.wait_for(|stopped| *stopped).await;
    }
}

/// Admitted RIC subscription
#[derive(Clone)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub actions_accepted: Vec<RicActionId>,
    pub actions_not_admitted: BTreeMap<RicActionId, Cause>,
    /// Session the subscription was admitted on
    pub channel: Arc<dyn E2Channel>,
    pub ticker: Option<ReportTicker>,
}

impl Subscription {
    pub fn new(
        id: SubscriptionId,
        actions_accepted: Vec<RicActionId>,
        actions_not_admitted: BTreeMap<RicActionId, Cause>,
        channel: Arc<dyn E2Channel>,
    ) -> Self {
        Self {
            id,
            actions_accepted,
            actions_not_admitted,
            channel,
            ticker: None,
        }
    }

    /// Bind the report task's ticker before the subscription is stored
    pub fn with_ticker(mut self, ticker: ReportTicker) -> Self {
        self.ticker = Some(ticker);
        self
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("actions_accepted", &self.actions_accepted)
            .field("actions_not_admitted", &self.actions_not_admitted)
            .field("ticker", &self.ticker)
            .finish_non_exhaustive()
    }
}

/// Registry of live subscriptions
#[derive(Default)]
pub struct SubscriptionRegistry {
    subscriptions: RwLock<HashMap<SubscriptionId, Subscription>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new subscription; an existing key is never replaced
    pub async fn add(&self, subscription: Subscription) -> Result<(), StoreError> {
        let mut subscriptions = self.subscriptions.write().await;
        if subscriptions.contains_key(&subscription.id) {
            return Err(StoreError::AlreadyExists(format!("subscription {}", subscription.id)));
        }
        debug!("Adding subscription {}", subscription.id);
        subscriptions.insert(subscription.id, subscription);
        Ok(())
    }

    pub async fn get(&self, id: &SubscriptionId) -> Result<Subscription, StoreError> {
        self.subscriptions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("subscription {}", id)))
    }

    pub async fn remove(&self, id: &SubscriptionId) -> Result<Subscription, StoreError> {
        let subscription = self
            .subscriptions
            .write()
            .await
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(format!("subscription {}", id)))?;
        debug!("Removed subscription {}", id);
        Ok(subscription)
    }

    /// Remove the subscription only while it is still driven by `ticker`
    pub async fn remove_if_owned(&self, id: &SubscriptionId, ticker: &ReportTicker) -> bool {
        let mut subscriptions = self.subscriptions.write().await;
        let owned = subscriptions
            .get(id)
            .and_then(|subscription| subscription.ticker.as_ref())
            .is_some_and(|current| current.same_task(ticker));
        if owned {
            subscriptions.remove(id);
            debug!("Removed subscription {} with its session", id);
        }
        owned
    }

    pub async fn ids(&self) -> Vec<SubscriptionId> {
        self.subscriptions.read().await.keys().copied().collect()
    }

    pub async fn len(&self) -> usize {
        self.subscriptions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.subscriptions.read().await.is_empty()
    }
}
