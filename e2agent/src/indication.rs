//! RIC Indication assembly

use bytes::Bytes;
use common::types::{RanFunctionId, RicActionId, RicIndicationType, RicRequestId};
use interfaces::{E2Error, RicIndication};

/// Fields of a RIC indication
#[derive(Debug, Clone, PartialEq)]
pub struct IndicationParams {
    pub request_id: RicRequestId,
    pub ran_function_id: RanFunctionId,
    pub action_id: RicActionId,
    pub sequence_number: Option<u32>,
    pub indication_type: RicIndicationType,
    /// Service-model encoded indication header
    pub header: Bytes,
    /// Service-model encoded indication message
    pub message: Bytes,
    pub call_process_id: Option<Bytes>,
}

impl IndicationParams {
    /// Assemble the indication PDU
    pub fn build(self) -> Result<RicIndication, E2Error> {
        if self.ran_function_id.0 > RanFunctionId::MAX {
            return Err(E2Error::Invalid(format!(
                "RAN function id {} out of range",
                self.ran_function_id
            )));
        }
        if self.header.is_empty() {
            return Err(E2Error::Invalid("indication header is empty".into()));
        }
        if self.message.is_empty() {
            return Err(E2Error::Invalid("indication message is empty".into()));
        }

        Ok(RicIndication {
            request_id: self.request_id,
            ran_function_id: self.ran_function_id,
            action_id: self.action_id,
            sequence_number: self.sequence_number,
            indication_type: self.indication_type,
            header: self.header,
            message: self.message,
            call_process_id: self.call_process_id,
        })
    }
}
