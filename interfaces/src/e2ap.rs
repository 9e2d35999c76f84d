//! E2AP Message Types
//!
//! Defines the E2 application protocol PDUs exchanged between the E2 node and
//! the RIC, and the length-prefixed frame format that carries them.

use crate::InterfaceError;
use bytes::{BufMut, Bytes, BytesMut};
use common::types::{GnbId, RanFunctionId, RicActionId, RicActionType, RicIndicationType, RicRequestId};
use serde::{Deserialize, Serialize};

/// Largest frame accepted from a peer
pub const MAX_FRAME_LEN: usize = 1 << 20;

/// Maximum number of actions in one subscription request
pub const MAX_RIC_ACTIONS: usize = 16;

/// E2AP cause value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cause {
    RicRequest(CauseRicRequest),
    RicService(CauseRicService),
    Protocol(CauseProtocol),
    Misc(CauseMisc),
}

/// RIC request causes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CauseRicRequest {
    RanFunctionIdInvalid,
    ActionNotSupported,
    ExcessiveActions,
    DuplicateAction,
    DuplicateEvent,
    FunctionResourceLimit,
    RequestIdUnknown,
    ControlMessageInvalid,
    Unspecified,
}

/// RIC service causes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CauseRicService {
    FunctionNotRequired,
    ExcessiveFunctions,
    RicResourceLimit,
}

/// Protocol causes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CauseProtocol {
    TransferSyntaxError,
    AbstractSyntaxErrorReject,
    MessageNotCompatibleWithReceiverState,
    Unspecified,
}

/// Miscellaneous causes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CauseMisc {
    ControlProcessingOverload,
    HardwareFailure,
    OmIntervention,
    Unspecified,
}

/// RAN function announced in E2 setup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RanFunctionItem {
    pub id: RanFunctionId,
    pub revision: u16,
    /// Service model object identifier
    pub oid: String,
    /// Encoded RAN function definition
    pub definition: Bytes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct E2SetupRequest {
    pub global_e2_node_id: GnbId,
    /// Encoded PLMN identity
    pub plmn_id: [u8; 3],
    pub ran_functions: Vec<RanFunctionItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct E2SetupResponse {
    pub ran_functions_accepted: Vec<RanFunctionId>,
    pub ran_functions_rejected: Vec<(RanFunctionId, Cause)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct E2SetupFailure {
    pub cause: Cause,
}

/// Action requested within a subscription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RicActionToBeSetup {
    pub action_id: RicActionId,
    pub action_type: RicActionType,
    pub action_definition: Option<Bytes>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RicSubscriptionRequest {
    pub request_id: RicRequestId,
    pub ran_function_id: RanFunctionId,
    /// Service-model encoded event trigger definition
    pub event_trigger: Bytes,
    pub actions: Vec<RicActionToBeSetup>,
}

impl RicSubscriptionRequest {
    /// Check the fields every subscription request must carry
    pub fn validate(&self) -> Result<(), crate::E2Error> {
        if self.ran_function_id.0 > RanFunctionId::MAX {
            return Err(crate::E2Error::Invalid(format!(
                "RAN function id {} out of range",
                self.ran_function_id
            )));
        }
        if self.actions.len() > MAX_RIC_ACTIONS {
            return Err(crate::E2Error::Invalid(format!(
                "subscription carries {} actions",
                self.actions.len()
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for action in &self.actions {
            if !seen.insert(action.action_id) {
                return Err(crate::E2Error::Invalid(format!(
                    "duplicate action id {}",
                    action.action_id.0
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RicSubscriptionResponse {
    pub request_id: RicRequestId,
    pub ran_function_id: RanFunctionId,
    pub actions_admitted: Vec<RicActionId>,
    pub actions_not_admitted: Vec<(RicActionId, Cause)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RicSubscriptionFailure {
    pub request_id: RicRequestId,
    pub ran_function_id: RanFunctionId,
    pub cause: Cause,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RicSubscriptionDeleteRequest {
    pub request_id: RicRequestId,
    pub ran_function_id: RanFunctionId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RicSubscriptionDeleteResponse {
    pub request_id: RicRequestId,
    pub ran_function_id: RanFunctionId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RicSubscriptionDeleteFailure {
    pub request_id: RicRequestId,
    pub ran_function_id: RanFunctionId,
    pub cause: Cause,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RicControlRequest {
    pub request_id: RicRequestId,
    pub ran_function_id: RanFunctionId,
    pub call_process_id: Option<Bytes>,
    pub header: Bytes,
    pub message: Bytes,
    pub ack_requested: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RicControlAcknowledge {
    pub request_id: RicRequestId,
    pub ran_function_id: RanFunctionId,
    pub call_process_id: Option<Bytes>,
    pub outcome: Option<Bytes>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RicControlFailure {
    pub request_id: RicRequestId,
    pub ran_function_id: RanFunctionId,
    pub call_process_id: Option<Bytes>,
    pub cause: Cause,
}

/// Request to change the set of transport associations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct E2ConnectionUpdate {
    pub add: Vec<String>,
    pub remove: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct E2ConnectionUpdateAcknowledge {
    pub setup: Vec<String>,
    pub failed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct E2ConnectionUpdateFailure {
    pub cause: Cause,
}

/// Report sent from the node to the RIC
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RicIndication {
    pub request_id: RicRequestId,
    pub ran_function_id: RanFunctionId,
    pub action_id: RicActionId,
    pub sequence_number: Option<u32>,
    pub indication_type: RicIndicationType,
    pub header: Bytes,
    pub message: Bytes,
    pub call_process_id: Option<Bytes>,
}

/// Error report for a request that produced no response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorIndication {
    pub request_id: Option<RicRequestId>,
    pub ran_function_id: Option<RanFunctionId>,
    pub cause: Cause,
}

/// E2AP PDU envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum E2ApPdu {
    E2SetupRequest(E2SetupRequest),
    E2SetupResponse(E2SetupResponse),
    E2SetupFailure(E2SetupFailure),
    RicSubscriptionRequest(RicSubscriptionRequest),
    RicSubscriptionResponse(RicSubscriptionResponse),
    RicSubscriptionFailure(RicSubscriptionFailure),
    RicSubscriptionDeleteRequest(RicSubscriptionDeleteRequest),
    RicSubscriptionDeleteResponse(RicSubscriptionDeleteResponse),
    RicSubscriptionDeleteFailure(RicSubscriptionDeleteFailure),
    RicControlRequest(RicControlRequest),
    RicControlAcknowledge(RicControlAcknowledge),
    RicControlFailure(RicControlFailure),
    E2ConnectionUpdate(E2ConnectionUpdate),
    E2ConnectionUpdateAcknowledge(E2ConnectionUpdateAcknowledge),
    E2ConnectionUpdateFailure(E2ConnectionUpdateFailure),
    RicIndication(RicIndication),
    ErrorIndication(ErrorIndication),
}

impl E2ApPdu {
    /// Procedure name for logging
    pub fn name(&self) -> &'static str {
        match self {
            E2ApPdu::E2SetupRequest(_) => "E2SetupRequest",
            E2ApPdu::E2SetupResponse(_) => "E2SetupResponse",
            E2ApPdu::E2SetupFailure(_) => "E2SetupFailure",
            E2ApPdu::RicSubscriptionRequest(_) => "RICsubscriptionRequest",
            E2ApPdu::RicSubscriptionResponse(_) => "RICsubscriptionResponse",
            E2ApPdu::RicSubscriptionFailure(_) => "RICsubscriptionFailure",
            E2ApPdu::RicSubscriptionDeleteRequest(_) => "RICsubscriptionDeleteRequest",
            E2ApPdu::RicSubscriptionDeleteResponse(_) => "RICsubscriptionDeleteResponse",
            E2ApPdu::RicSubscriptionDeleteFailure(_) => "RICsubscriptionDeleteFailure",
            E2ApPdu::RicControlRequest(_) => "RICcontrolRequest",
            E2ApPdu::RicControlAcknowledge(_) => "RICcontrolAcknowledge",
            E2ApPdu::RicControlFailure(_) => "RICcontrolFailure",
            E2ApPdu::E2ConnectionUpdate(_) => "E2connectionUpdate",
            E2ApPdu::E2ConnectionUpdateAcknowledge(_) => "E2connectionUpdateAcknowledge",
            E2ApPdu::E2ConnectionUpdateFailure(_) => "E2connectionUpdateFailure",
            E2ApPdu::RicIndication(_) => "RICindication",
            E2ApPdu::ErrorIndication(_) => "ErrorIndication",
        }
    }

    /// Encode into a length-prefixed frame
    pub fn to_frame(&self) -> Result<Bytes, InterfaceError> {
        let body = bincode::serialize(self)?;
        if body.len() > MAX_FRAME_LEN {
            return Err(InterfaceError::FrameTooLarge(body.len()));
        }

        let mut frame = BytesMut::with_capacity(4 + body.len());
        frame.put_u32(body.len() as u32);
        frame.put_slice(&body);
        Ok(frame.freeze())
    }

    /// Decode a frame body (without its length prefix)
    pub fn from_frame_body(body: &[u8]) -> Result<Self, InterfaceError> {
        Ok(bincode::deserialize(body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscription_request(actions: Vec<RicActionToBeSetup>) -> RicSubscriptionRequest {
        RicSubscriptionRequest {
            request_id: RicRequestId { requestor_id: 22, instance_id: 6 },
            ran_function_id: RanFunctionId(1),
            event_trigger: Bytes::from_static(&[0x01]),
            actions,
        }
    }

    fn report_action(id: u8) -> RicActionToBeSetup {
        RicActionToBeSetup {
            action_id: RicActionId(id),
            action_type: RicActionType::Report,
            action_definition: None,
        }
    }

    #[test]
    fn test_frame_length_prefix() {
        let pdu = E2ApPdu::RicSubscriptionRequest(subscription_request(vec![report_action(1)]));
        let frame = pdu.to_frame().unwrap();

        let len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        assert_eq!(len, frame.len() - 4);
        assert_eq!(E2ApPdu::from_frame_body(&frame[4..]).unwrap(), pdu);
    }

    #[test]
    fn test_truncated_frame_rejected() {
        let pdu = E2ApPdu::E2SetupFailure(E2SetupFailure {
            cause: Cause::Misc(CauseMisc::Unspecified),
        });
        let frame = pdu.to_frame().unwrap();
        assert!(E2ApPdu::from_frame_body(&frame[4..frame.len() - 1]).is_err());
    }

    #[test]
    fn test_subscription_request_validation() {
        assert!(subscription_request(vec![report_action(1)]).validate().is_ok());
        assert!(subscription_request(vec![]).validate().is_ok());
        let oversized = (1..=17).map(report_action).collect();
        assert!(subscription_request(oversized).validate().is_err());
        assert!(subscription_request(vec![report_action(1), report_action(1)])
            .validate()
            .is_err());

        let mut request = subscription_request(vec![report_action(1)]);
        request.ran_function_id = RanFunctionId(RanFunctionId::MAX + 1);
        assert!(request.validate().is_err());
    }
}
