//! E2 Communication Interfaces Library
//! 
//! This crate provides the E2AP message model, the session abstractions used
//! between the E2 node and its controller, and a TCP transport for them.

pub mod e2ap;
pub mod channel;
pub mod tcp_channel;

use thiserror::Error;

pub use channel::{E2Channel, E2Connector, E2NodeHandler, ProcedureOutcome};
pub use e2ap::*;

/// Interface errors
#[derive(Error, Debug)]
pub enum InterfaceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Channel closed")]
    ChannelClosed,

    #[error("Unexpected PDU: {0}")]
    UnexpectedPdu(String),

    #[error("Frame of {0} bytes exceeds limit")]
    FrameTooLarge(usize),

    #[error("E2 setup timed out")]
    SetupTimeout,
}

/// Procedure-level errors returned by E2 node handlers
///
/// These prevent any protocol response from being produced; admission
/// failures are reported as failure PDUs instead.
#[derive(Error, Debug)]
pub enum E2Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid: {0}")]
    Invalid(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Unknown: {0}")]
    Unknown(String),

    #[error("Encoding failed: {0}")]
    Codec(String),

    #[error(transparent)]
    Interface(#[from] InterfaceError),
}

impl E2Error {
    /// Cause reported to the controller in an error indication
    pub fn cause(&self) -> Cause {
        match self {
            E2Error::NotFound(_) => Cause::RicRequest(CauseRicRequest::RequestIdUnknown),
            E2Error::Invalid(_) => Cause::Protocol(CauseProtocol::AbstractSyntaxErrorReject),
            E2Error::NotSupported(_) => Cause::RicRequest(CauseRicRequest::RanFunctionIdInvalid),
            E2Error::Unknown(_) | E2Error::Codec(_) | E2Error::Interface(_) => {
                Cause::Misc(CauseMisc::Unspecified)
            }
        }
    }
}
