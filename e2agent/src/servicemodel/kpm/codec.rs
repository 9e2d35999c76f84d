//! KPM Information Element Codec
//!
//! Encoding of the E2SM-KPM RAN function description, event trigger,
//! indication header and indication message.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use interfaces::E2Error;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// KPM codec errors
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

impl From<CodecError> for E2Error {
    fn from(err: CodecError) -> Self {
        E2Error::Codec(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerStyle {
    pub style_type: i32,
    pub name: String,
    pub format_type: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportStyle {
    pub style_type: i32,
    pub name: String,
    pub header_format_type: i32,
    pub message_format_type: i32,
}

/// Capabilities announced for the KPM RAN function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RanFunctionDescription {
    pub short_name: String,
    pub oid: String,
    pub description: String,
    pub instance: i32,
    pub trigger_styles: Vec<TriggerStyle>,
    pub report_styles: Vec<ReportStyle>,
}

/// Event trigger of a periodic report subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTriggerDefinition {
    pub report_period_ms: u32,
}

/// Context carried by every indication of a subscription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicationHeader {
    pub plmn_id: [u8; 3],
    pub gnb_id: u64,
    /// Slice/service type
    pub sst: String,
    /// Slice differentiator
    pub sd: String,
    pub nr_cgi_plmn_id: [u8; 3],
    /// Milliseconds since the Unix epoch
    pub collection_start_time: i64,
}

impl IndicationHeader {
    pub fn collection_start(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.collection_start_time)
    }
}

/// Measurement snapshot of one report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicationMessage {
    pub number_of_active_ues: u32,
}

/// Encoder/decoder for KPM information elements
pub trait KpmCodec: Send + Sync {
    fn encode_ran_function_description(&self, description: &RanFunctionDescription) -> Result<Bytes, CodecError>;

    fn encode_event_trigger(&self, trigger: &EventTriggerDefinition) -> Result<Bytes, CodecError>;

    fn decode_event_trigger(&self, bytes: &[u8]) -> Result<EventTriggerDefinition, CodecError>;

    fn encode_indication_header(&self, header: &IndicationHeader) -> Result<Bytes, CodecError>;

    fn encode_indication_message(&self, message: &IndicationMessage) -> Result<Bytes, CodecError>;
}

/// Bincode rendition of the KPM information elements
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeKpmCodec;

fn invalid(field: &'static str, reason: impl Into<String>) -> CodecError {
    CodecError::InvalidField {
        field,
        reason: reason.into(),
    }
}

fn check_period(trigger: &EventTriggerDefinition) -> Result<(), CodecError> {
    if trigger.report_period_ms == 0 {
        return Err(invalid("report period", "must be positive"));
    }
    Ok(())
}

impl KpmCodec for BincodeKpmCodec {
    fn encode_ran_function_description(&self, description: &RanFunctionDescription) -> Result<Bytes, CodecError> {
        if description.short_name.is_empty() {
            return Err(invalid("short name", "empty"));
        }
        if description.oid.is_empty() {
            return Err(invalid("oid", "empty"));
        }
        if description.report_styles.iter().any(|style| style.name.is_empty())
            || description.trigger_styles.iter().any(|style| style.name.is_empty())
        {
            return Err(invalid("style name", "empty"));
        }
        Ok(Bytes::from(bincode::serialize(description)?))
    }

    fn encode_event_trigger(&self, trigger: &EventTriggerDefinition) -> Result<Bytes, CodecError> {
        check_period(trigger)?;
        Ok(Bytes::from(bincode::serialize(trigger)?))
    }

    fn decode_event_trigger(&self, bytes: &[u8]) -> Result<EventTriggerDefinition, CodecError> {
        let trigger: EventTriggerDefinition = bincode::deserialize(bytes)?;
        check_period(&trigger)?;
        Ok(trigger)
    }

    fn encode_indication_header(&self, header: &IndicationHeader) -> Result<Bytes, CodecError> {
        if header.sst.parse::<u8>().is_err() {
            return Err(invalid("sst", format!("{:?} is not an 8-bit value", header.sst)));
        }
        if header.sd.len() != 3 {
            return Err(invalid("sd", format!("{:?} is not 3 octets", header.sd)));
        }
        Ok(Bytes::from(bincode::serialize(header)?))
    }

    fn encode_indication_message(&self, message: &IndicationMessage) -> Result<Bytes, CodecError> {
        Ok(Bytes::from(bincode::serialize(message)?))
    }
}
