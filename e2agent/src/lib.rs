//! E2 Agent Library
//! 
//! This crate implements the node side of the E2 interface: service models,
//! subscription admission, periodic indication reporting, and the agent that
//! owns the session to the RIC and dispatches its requests.

pub mod agent;
pub mod indication;
pub mod servicemodel;
pub mod subscription;

#[cfg(test)]
pub(crate) mod testing;

pub use agent::{AgentConfig, AgentState, E2Agent};
pub use interfaces::E2Error;
pub use servicemodel::kpm::{KpmServiceModel, KPM_RAN_FUNCTION_ID};
pub use servicemodel::{NodeIdentity, RanFunction, ServiceModel, ServiceModelRegistry};
