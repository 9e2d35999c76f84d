//! E2 Session Abstractions
//!
//! The node-side view of an E2 association: an outbound channel to the RIC,
//! the handler that serves inbound RIC requests, and the connector that ties
//! the two together.

use crate::e2ap::*;
use crate::{E2Error, InterfaceError};
use async_trait::async_trait;
use std::sync::Arc;

/// Result of an E2AP procedure that has a successful and an unsuccessful outcome
#[derive(Debug, Clone, PartialEq)]
pub enum ProcedureOutcome<S, F> {
    Success(S),
    Failure(F),
}

impl<S, F> ProcedureOutcome<S, F> {
    pub fn is_success(&self) -> bool {
        matches!(self, ProcedureOutcome::Success(_))
    }

    pub fn success(self) -> Option<S> {
        match self {
            ProcedureOutcome::Success(s) => Some(s),
            ProcedureOutcome::Failure(_) => None,
        }
    }

    pub fn failure(self) -> Option<F> {
        match self {
            ProcedureOutcome::Success(_) => None,
            ProcedureOutcome::Failure(f) => Some(f),
        }
    }
}

pub type SetupOutcome = ProcedureOutcome<E2SetupResponse, E2SetupFailure>;
pub type SubscriptionOutcome = ProcedureOutcome<RicSubscriptionResponse, RicSubscriptionFailure>;
pub type SubscriptionDeleteOutcome =
    ProcedureOutcome<RicSubscriptionDeleteResponse, RicSubscriptionDeleteFailure>;
pub type ControlOutcome = ProcedureOutcome<RicControlAcknowledge, RicControlFailure>;
pub type ConnectionUpdateOutcome =
    ProcedureOutcome<E2ConnectionUpdateAcknowledge, E2ConnectionUpdateFailure>;

/// Outbound half of an E2 session
#[async_trait]
pub trait E2Channel: Send + Sync {
    /// Run the E2 setup procedure
    async fn e2_setup(&self, request: E2SetupRequest) -> Result<SetupOutcome, InterfaceError>;

    /// Send a RIC indication
    async fn ric_indication(&self, indication: RicIndication) -> Result<(), InterfaceError>;

    /// Resolves once the session has ended
    async fn closed(&self);

    /// Whether the session has ended
    fn is_closed(&self) -> bool;

    /// Close the session; closing a closed session is a no-op
    async fn close(&self) -> Result<(), InterfaceError>;
}

/// Handler for requests initiated by the RIC
#[async_trait]
pub trait E2NodeHandler: Send + Sync {
    async fn ric_subscription(
        &self,
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

/// Opens E2 sessions towards a RIC
#[async_trait]
pub trait E2Connector: Send + Sync {
    async fn connect(
        &self,
        address: &str,
        handler: Arc<dyn E2NodeHandler>,
    ) -> Result<Arc<dyn E2Channel>, InterfaceError>;
}

/// Serve one inbound request PDU, producing the PDU to send back
///
/// Handler errors become an error indication; PDUs that are not RIC-initiated
/// requests are rejected.
pub async fn serve_request(handler: &dyn E2NodeHandler, pdu: E2ApPdu) -> Result<E2ApPdu, InterfaceError> {
    let reply = match pdu {
        E2ApPdu::RicSubscriptionRequest(request) => {
            let ids = (request.request_id, request.ran_function_id);
            match handler.ric_subscription(request).await {
                Ok(ProcedureOutcome::Success(response)) => E2ApPdu::RicSubscriptionResponse(response),
                Ok(ProcedureOutcome::Failure(failure)) => E2ApPdu::RicSubscriptionFailure(failure),
                Err(e) => error_indication(Some(ids), &e),
            }
        }
        E2ApPdu::RicSubscriptionDeleteRequest(request) => {
            let ids = (request.request_id, request.ran_function_id);
            match handler.ric_subscription_delete(request).await {
                Ok(ProcedureOutcome::Success(response)) => {
                    E2ApPdu::RicSubscriptionDeleteResponse(response)
                }
                Ok(ProcedureOutcome::Failure(failure)) => E2ApPdu::RicSubscriptionDeleteFailure(failure),
                Err(e) => error_indication(Some(ids), &e),
            }
        }
        E2ApPdu::RicControlRequest(request) => {
            let ids = (request.request_id, request.ran_function_id);
            match handler.ric_control(request).await {
                Ok(ProcedureOutcome::Success(ack)) => E2ApPdu::RicControlAcknowledge(ack),
                Ok(ProcedureOutcome::Failure(failure)) => E2ApPdu::RicControlFailure(failure),
                Err(e) => error_indication(Some(ids), &e),
            }
        }
        E2ApPdu::E2ConnectionUpdate(request) => match handler.e2_connection_update(request).await {
            Ok(ProcedureOutcome::Success(ack)) => E2ApPdu::E2ConnectionUpdateAcknowledge(ack),
            Ok(ProcedureOutcome::Failure(failure)) => E2ApPdu::E2ConnectionUpdateFailure(failure),
            Err(e) => error_indication(None, &e),
        },
        other => return Err(InterfaceError::UnexpectedPdu(other.name().to_string())),
    };
    Ok(reply)
}

fn error_indication(
    ids: Option<(common::types::RicRequestId, common::types::RanFunctionId)>,
    error: &E2Error,
) -> E2ApPdu {
    E2ApPdu::ErrorIndication(ErrorIndication {
        request_id: ids.map(|(request_id, _)| request_id),
        ran_function_id: ids.map(|(_, ran_function_id)| ran_function_id),
        cause: error.cause(),
    })
}
