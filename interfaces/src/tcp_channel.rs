//! TCP E2 Transport
//!
//! Carries E2AP PDUs over a TCP stream as length-prefixed frames. One reader
//! task per session dispatches inbound RIC requests to the node handler and
//! completes the pending E2 setup procedure.

use crate::channel::{serve_request, E2Channel, E2Connector, E2NodeHandler, SetupOutcome};
use crate::e2ap::{E2ApPdu, E2SetupRequest, RicIndication, MAX_FRAME_LEN};
use crate::{InterfaceError, ProcedureOutcome};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, watch, Mutex};
use tracing::{debug, error, info, warn};

/// Read one frame; `None` on a clean end of stream
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<E2ApPdu>, InterfaceError> {
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if len > MAX_FRAME_LEN {
        return Err(InterfaceError::FrameTooLarge(len));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    E2ApPdu::from_frame_body(&body).map(Some)
}

/// Write one frame
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, pdu: &E2ApPdu) -> Result<(), InterfaceError> {
    let frame = pdu.to_frame()?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Connector opening TCP sessions
pub struct TcpE2Connector {
    setup_timeout: Duration,
}

impl TcpE2Connector {
    pub fn new(setup_timeout: Duration) -> Self {
        Self { setup_timeout }
    }
}

impl Default for TcpE2Connector {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl E2Connector for TcpE2Connector {
    async fn connect(
        &self,
        address: &str,
        handler: Arc<dyn E2NodeHandler>,
    ) -> Result<Arc<dyn E2Channel>, InterfaceError> {
        info!("Connecting E2 session to {}", address);

        let stream = TcpStream::connect(address)
            .await
            .map_err(|e| InterfaceError::ConnectionFailed(format!("{}: {}", address, e)))?;
        stream.set_nodelay(true)?;
        let (reader, writer) = stream.into_split();

        let (closed_tx, _) = watch::channel(false);
        let shared = Arc::new(SessionShared {
            peer: address.to_string(),
            writer: Mutex::new(writer),
            pending_setup: Mutex::new(None),
            closed_tx,
            setup_timeout: self.setup_timeout,
        });

        tokio::spawn(read_loop(shared.clone(), reader, handler));

        info!("E2 session to {} established", address);
        Ok(Arc::new(TcpE2Channel { shared }))
    }
}

struct SessionShared {
    peer: String,
    writer: Mutex<OwnedWriteHalf>,
    pending_setup: Mutex<Option<oneshot::Sender<SetupOutcome>>>,
    closed_tx: watch::Sender<bool>,
    setup_timeout: Duration,
}

impl SessionShared {
    fn is_closed(&self) -> bool {
        *self.closed_tx.borrow()
    }

    fn mark_closed(&self) -> bool {
        !self.closed_tx.send_replace(true)
    }

    async fn send(&self, pdu: &E2ApPdu) -> Result<(), InterfaceError> {
        if self.is_closed() {
            return Err(InterfaceError::ChannelClosed);
        }

        let mut writer = self.writer.lock().await;
        debug!("Sending {} to {}", pdu.name(), self.peer);
        write_frame(&mut *writer, pdu).await
    }
}

async fn read_loop(shared: Arc<SessionShared>, mut reader: OwnedReadHalf, handler: Arc<dyn E2NodeHandler>) {
    let mut closed_rx = shared.closed_tx.subscribe();

    loop {
        let result = tokio::select! {
            result = read_frame(&mut reader) => result,
            _ = closed_rx.wait_for(|closed| *closed) => break,
        };

        let pdu = match result {
            Ok(Some(pdu)) => pdu,
            Ok(None) => {
                info!("E2 peer {} closed the session", shared.peer);
                break;
            }
            Err(e) => {
                error!("E2 session to {} failed: {}", shared.peer, e);
                break;
            }
        };

        debug!("Received {} from {}", pdu.name(), shared.peer);
        match pdu {
            E2ApPdu::E2SetupResponse(response) => {
                complete_setup(&shared, ProcedureOutcome::Success(response)).await;
            }
            E2ApPdu::E2SetupFailure(failure) => {
                complete_setup(&shared, ProcedureOutcome::Failure(failure)).await;
            }
            E2ApPdu::RicSubscriptionRequest(_)
            | E2ApPdu::RicSubscriptionDeleteRequest(_)
            | E2ApPdu::RicControlRequest(_)
            | E2ApPdu::E2ConnectionUpdate(_) => {
                let shared = shared.clone();
                let handler = handler.clone();
                tokio::spawn(async move {
                    let reply = match serve_request(handler.as_ref(), pdu).await {
                        Ok(reply) => reply,
                        Err(e) => {
                            warn!("Dropping request from {}: {}", shared.peer, e);
                            return;
                        }
                    };
                    if let Err(e) = shared.send(&reply).await {
                        error!("Failed to send {} to {}: {}", reply.name(), shared.peer, e);
                    }
                });
            }
            other => warn!("Ignoring unexpected {} from {}", other.name(), shared.peer),
        }
    }

    shared.mark_closed();
    // Drops a setup waiter, if any
    shared.pending_setup.lock().await.take();
}

async fn complete_setup(shared: &SessionShared, outcome: SetupOutcome) {
    match shared.pending_setup.lock().await.take() {
        Some(waiter) => {
            let _ = waiter.send(outcome);
        }
        None => warn!("Unsolicited E2 setup outcome from {}", shared.peer),
    }
}

/// E2 session over TCP
pub struct TcpE2Channel {
    shared: Arc<SessionShared>,
}

#[async_trait]
impl E2Channel for TcpE2Channel {
    async fn e2_setup(&self, request: E2SetupRequest) -> Result<SetupOutcome, InterfaceError> {
        let (tx, rx) = oneshot::channel();
        *self.shared.pending_setup.lock().await = Some(tx);

        self.shared.send(&E2ApPdu::E2SetupRequest(request)).await?;

        match tokio::time::timeout(self.shared.setup_timeout, rx).await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(_)) => Err(InterfaceError::ChannelClosed),
            Err(_) => {
                self.shared.pending_setup.lock().await.take();
                Err(InterfaceError::SetupTimeout)
            }
        }
    }

    async fn ric_indication(&self, indication: RicIndication) -> Result<(), InterfaceError> {
        self.shared.send(&E2ApPdu::RicIndication(indication)).await
    }

    async fn closed(&self) {
        let mut closed_rx = self.shared.closed_tx.subscribe();
        let _ = closed_rx.wait_for(|closed| *closed).await;
    }

    fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    async fn close(&self) -> Result<(), InterfaceError> {
        if !self.shared.mark_closed() {
            return Ok(());
        }

        info!("Closing E2 session to {}", self.shared.peer);
        let mut writer = self.shared.writer.lock().await;
        match writer.shutdown().await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ConnectionUpdateOutcome, ControlOutcome, SubscriptionDeleteOutcome, SubscriptionOutcome};
    use crate::e2ap::*;
    use crate::E2Error;
    use bytes::Bytes;
    use common::types::{GnbId, RanFunctionId, RicActionId, RicActionType, RicRequestId};
    use tokio::net::TcpListener;

    struct AdmitAll;

    #[async_trait]
    impl E2NodeHandler for AdmitAll {
        async fn ric_subscription(&self, request: RicSubscriptionRequest) -> Result<SubscriptionOutcome, E2Error> {
            Ok(ProcedureOutcome::Success(RicSubscriptionResponse {
                request_id: request.request_id,
                ran_function_id: request.ran_function_id,
                actions_admitted: request.actions.iter().map(|a| a.action_id).collect(),
                actions_not_admitted: vec![],
            }))
        }

        async fn ric_subscription_delete(
            &self,
            _request: RicSubscriptionDeleteRequest,
        ) -> Result<SubscriptionDeleteOutcome, E2Error> {
            Err(E2Error::NotFound("subscription".into()))
        }

        async fn ric_control(&self, _request: RicControlRequest) -> Result<ControlOutcome, E2Error> {
            Err(E2Error::NotSupported("control".into()))
        }

        async fn e2_connection_update(&self, _request: E2ConnectionUpdate) -> Result<ConnectionUpdateOutcome, E2Error> {
            Err(E2Error::NotSupported("connection update".into()))
        }
    }

    fn setup_request() -> E2SetupRequest {
        E2SetupRequest {
            global_e2_node_id: GnbId(5153),
            plmn_id: [0x00, 0xF1, 0x10],
            ran_functions: vec![],
        }
    }

    #[tokio::test]
    async fn test_setup_and_inbound_subscription() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let ric = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let setup = read_frame(&mut stream).await.unwrap().unwrap();
            assert!(matches!(setup, E2ApPdu::E2SetupRequest(_)));
            let response = E2ApPdu::E2SetupResponse(E2SetupResponse {
                ran_functions_accepted: vec![RanFunctionId(1)],
                ran_functions_rejected: vec![],
            });
            write_frame(&mut stream, &response).await.unwrap();

            let request = E2ApPdu::RicSubscriptionRequest(RicSubscriptionRequest {
                request_id: RicRequestId { requestor_id: 1, instance_id: 2 },
                ran_function_id: RanFunctionId(1),
                event_trigger: Bytes::new(),
                actions: vec![RicActionToBeSetup {
                    action_id: RicActionId(4),
                    action_type: RicActionType::Report,
                    action_definition: None,
                }],
            });
            write_frame(&mut stream, &request).await.unwrap();
            let reply = read_frame(&mut stream).await.unwrap().unwrap();

            let delete = E2ApPdu::RicSubscriptionDeleteRequest(RicSubscriptionDeleteRequest {
                request_id: RicRequestId { requestor_id: 1, instance_id: 2 },
                ran_function_id: RanFunctionId(1),
            });
            write_frame(&mut stream, &delete).await.unwrap();
            let error = read_frame(&mut stream).await.unwrap().unwrap();
            (reply, error)
        });

        let channel = TcpE2Connector::default()
            .connect(&addr, Arc::new(AdmitAll))
            .await
            .unwrap();
        let outcome = channel.e2_setup(setup_request()).await.unwrap();
        assert!(outcome.is_success());

        let (reply, error) = ric.await.unwrap();
        match reply {
            E2ApPdu::RicSubscriptionResponse(response) => {
                assert_eq!(response.actions_admitted, vec![RicActionId(4)]);
            }
            other => panic!("unexpected reply {:?}", other),
        }
        match error {
            E2ApPdu::ErrorIndication(indication) => {
                assert_eq!(indication.cause, Cause::RicRequest(CauseRicRequest::RequestIdUnknown));
                assert_eq!(indication.ran_function_id, Some(RanFunctionId(1)));
            }
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_peer_close_ends_session() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let ric = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let channel = TcpE2Connector::default()
            .connect(&addr, Arc::new(AdmitAll))
            .await
            .unwrap();
        ric.await.unwrap();

        tokio::time::timeout(Duration::from_secs(2), channel.closed())
            .await
            .unwrap();
        assert!(channel.is_closed());
        assert!(channel.e2_setup(setup_request()).await.is_err());
        assert!(channel.close().await.is_ok());
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let result = TcpE2Connector::default().connect(&addr, Arc::new(AdmitAll)).await;
        assert!(matches!(result, Err(InterfaceError::ConnectionFailed(_))));
    }
}
