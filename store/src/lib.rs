//! Simulation State Stores
//!
//! In-memory, concurrency-safe registries for cells, UEs and RIC subscriptions.

pub mod cells;
pub mod subscriptions;
pub mod ues;

use interfaces::E2Error;
use thiserror::Error;

pub use cells::{Cell, CellRegistry, CellSource};
pub use subscriptions::{ReportTicker, Subscription, SubscriptionId, SubscriptionRegistry, TickerStop};
pub use ues::{Ue, UeCell, UeEvent, UeEventType, UeRegistry, WatchHandle, WatchOptions};

/// Store errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("No cells available")]
    NoCells,

    #[error("IMSI space exhausted")]
    ImsiSpaceExhausted,
}

impl From<StoreError> for E2Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => E2Error::NotFound(what),
            other => E2Error::Invalid(other.to_string()),
        }
    }
}
