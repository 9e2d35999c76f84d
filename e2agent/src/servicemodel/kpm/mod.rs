//! KPM Service Model
//!
//! Key performance measurement reporting: admits report actions only and
//! sends one indication per report period for every admitted subscription.

pub mod codec;
mod report;

use crate::servicemodel::{NodeIdentity, RanFunction, ServiceModel};
use crate::subscription::{subscription_delete_response, subscription_failure, Admission};
use async_trait::async_trait;
use codec::{KpmCodec, RanFunctionDescription, ReportStyle, TriggerStyle};
use common::types::{RanFunctionId, RicActionType};
use interfaces::channel::{ConnectionUpdateOutcome, ControlOutcome, SubscriptionDeleteOutcome, SubscriptionOutcome};
use interfaces::{
    Cause, CauseRicRequest, E2Channel, E2ConnectionUpdate, E2Error, ProcedureOutcome, RicControlRequest,
    RicSubscriptionDeleteRequest, RicSubscriptionRequest,
};
use std::sync::Arc;
use std::time::Duration;
use store::{ReportTicker, StoreError, Subscription, SubscriptionId, SubscriptionRegistry, UeRegistry};
use tracing::{debug, info, warn};

pub const KPM_RAN_FUNCTION_ID: RanFunctionId = RanFunctionId(1);
pub const MODEL_NAME: &str = "ORAN-E2SM-KPM";
pub const MODEL_OID: &str = "1.3.6.1.4.1.53148.1.1.2.2";
pub const MODEL_VERSION: &str = "v1";
pub const MODEL_DESCRIPTION: &str = "KPM Monitor";
const MODEL_INSTANCE: i32 = 1;
const MODEL_REVISION: u16 = 1;

const TRIGGER_STYLE_PERIODIC: i32 = 1;
const TRIGGER_FORMAT: i32 = 5;
const REPORT_STYLE_CU_CP: i32 = 1;
const HEADER_FORMAT: i32 = 1;
const MESSAGE_FORMAT: i32 = 1;

/// Capabilities announced for KPM at E2 setup
pub fn ran_function_description() -> RanFunctionDescription {
    RanFunctionDescription {
        short_name: MODEL_NAME.to_string(),
        oid: MODEL_OID.to_string(),
        description: MODEL_DESCRIPTION.to_string(),
        instance: MODEL_INSTANCE,
        trigger_styles: vec![TriggerStyle {
            style_type: TRIGGER_STYLE_PERIODIC,
            name: "Periodic report".to_string(),
            format_type: TRIGGER_FORMAT,
        }],
        report_styles: vec![ReportStyle {
            style_type: REPORT_STYLE_CU_CP,
            name: "O-CU-CP Measurement Container for the 5GC connected deployment".to_string(),
            header_format_type: HEADER_FORMAT,
            message_format_type: MESSAGE_FORMAT,
        }],
    }
}

/// KPM service model bound to one node
pub struct KpmServiceModel {
    function: RanFunction,
    node: NodeIdentity,
    codec: Arc<dyn KpmCodec>,
    ues: Arc<UeRegistry>,
    subscriptions: Arc<SubscriptionRegistry>,
}

impl KpmServiceModel {
    pub fn new(
        node: NodeIdentity,
        codec: Arc<dyn KpmCodec>,
        ues: Arc<UeRegistry>,
        subscriptions: Arc<SubscriptionRegistry>,
    ) -> Result<Self, E2Error> {
        info!("Initializing KPM service model for gNB {}", node.gnb_id.0);
        let description = codec.encode_ran_function_description(&ran_function_description())?;

        Ok(Self {
            function: RanFunction {
                id: KPM_RAN_FUNCTION_ID,
                model_name: MODEL_NAME.to_string(),
                revision: MODEL_REVISION,
                oid: MODEL_OID.to_string(),
                version: MODEL_VERSION.to_string(),
                description,
            },
            node,
            codec,
            ues,
            subscriptions,
        })
    }

    fn admit(request: &RicSubscriptionRequest, id: SubscriptionId) -> Admission {
        let mut admission = Admission::new(id);
        for action in &request.actions {
            match action.action_type {
                RicActionType::Report => admission.accept(action.action_id),
                RicActionType::Insert | RicActionType::Policy => {
                    admission.reject(action.action_id, Cause::RicRequest(CauseRicRequest::ActionNotSupported))
                }
            }
        }
        admission
    }
}

#[async_trait]
impl ServiceModel for KpmServiceModel {
    fn ran_function(&self) -> &RanFunction {
        &self.function
    }

    async fn ric_subscription(
        &self,
        channel: Arc<dyn E2Channel>,
        request: RicSubscriptionRequest,
    ) -> Result<SubscriptionOutcome, E2Error> {
        request.validate()?;
        let id = SubscriptionId::new(request.request_id, request.ran_function_id);
        debug!("Received subscription request {}", id);

        let admission = Self::admit(&request, id);
        if !admission.any_accepted() {
            warn!("Subscription {} has no report action to admit", id);
            return Ok(ProcedureOutcome::Failure(subscription_failure(
                id,
                Cause::RicRequest(CauseRicRequest::ActionNotSupported),
            )));
        }

        let trigger = match self.codec.decode_event_trigger(&request.event_trigger) {
            Ok(trigger) => trigger,
            Err(e) => {
                warn!("Subscription {} carries no usable report period: {}", id, e);
                return Ok(ProcedureOutcome::Failure(subscription_failure(
                    id,
                    Cause::RicRequest(CauseRicRequest::Unspecified),
                )));
            }
        };

        let (ticker, stop) = ReportTicker::new();
        let subscription = Subscription::new(
            id,
            admission.actions_accepted.clone(),
            admission.actions_not_admitted.clone(),
            channel.clone(),
        )
        .with_ticker(ticker.clone());
        match self.subscriptions.add(subscription).await {
            Ok(()) => {}
            Err(StoreError::AlreadyExists(_)) => {
                warn!("Subscription {} already exists", id);
                return Ok(ProcedureOutcome::Failure(subscription_failure(
                    id,
                    Cause::RicRequest(CauseRicRequest::Unspecified),
                )));
            }
            Err(e) => return Err(e.into()),
        }

        let task = report::ReportTask {
            id,
            period: Duration::from_millis(u64::from(trigger.report_period_ms)),
            node: self.node,
            codec: self.codec.clone(),
            ues: self.ues.clone(),
            subscriptions: self.subscriptions.clone(),
            channel,
            ticker,
        };
        tokio::spawn(task.run(stop));

        info!(
            "Admitted subscription {} with {} report action(s) every {} ms",
            id,
            admission.actions_accepted.len(),
            trigger.report_period_ms
        );
        Ok(ProcedureOutcome::Success(admission.response()))
    }

    async fn ric_subscription_delete(
        &self,
        request: RicSubscriptionDeleteRequest,
    ) -> Result<SubscriptionDeleteOutcome, E2Error> {
        let id = SubscriptionId::new(request.request_id, request.ran_function_id);
        debug!("Received subscription delete request {}", id);

        let subscription = self.subscriptions.remove(&id).await?;
        if let Some(ticker) = &subscription.ticker {
            ticker.stop();
        }

        info!("Deleted subscription {}", id);
        Ok(ProcedureOutcome::Success(subscription_delete_response(id)))
    }

    async fn ric_control(&self, _request: RicControlRequest) -> Result<ControlOutcome, E2Error> {
        Err(E2Error::NotSupported("KPM offers no control actions".into()))
    }

    async fn e2_connection_update(
        &self,
        _request: E2ConnectionUpdate,
    ) -> Result<ConnectionUpdateOutcome, E2Error> {
        Err(E2Error::NotSupported("KPM does not handle connection updates".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_cell, test_node, RecordingChannel};
    use bytes::Bytes;
    use super::codec::{BincodeKpmCodec, EventTriggerDefinition, IndicationMessage};
    use common::types::{RicActionId, RicRequestId};
    use interfaces::RicActionToBeSetup;
    use store::CellRegistry;

    struct Fixture {
        model: KpmServiceModel,
        ues: Arc<UeRegistry>,
        subscriptions: Arc<SubscriptionRegistry>,
    }

    async fn fixture(ue_count: usize) -> Fixture {
        let cells = Arc::new(CellRegistry::new(vec![test_cell(1), test_cell(2)]));
        let ues = Arc::new(UeRegistry::new(ue_count, cells).await.unwrap());
        let subscriptions = Arc::new(SubscriptionRegistry::new());
        let model = KpmServiceModel::new(
            test_node(),
            Arc::new(BincodeKpmCodec),
            ues.clone(),
            subscriptions.clone(),
        )
        .unwrap();
        Fixture {
            model,
            ues,
            subscriptions,
        }
    }

    fn trigger(report_period_ms: u32) -> Bytes {
        BincodeKpmCodec
            .encode_event_trigger(&EventTriggerDefinition { report_period_ms })
            .unwrap()
    }

    fn action(id: u8, action_type: RicActionType) -> RicActionToBeSetup {
        RicActionToBeSetup {
            action_id: RicActionId(id),
            action_type,
            action_definition: None,
        }
    }

    fn request(instance_id: u32, event_trigger: Bytes, actions: Vec<RicActionToBeSetup>) -> RicSubscriptionRequest {
        RicSubscriptionRequest {
            request_id: RicRequestId {
                requestor_id: 21,
                instance_id,
            },
            ran_function_id: KPM_RAN_FUNCTION_ID,
            event_trigger,
            actions,
        }
    }

    fn key(instance_id: u32) -> SubscriptionId {
        SubscriptionId::new(
            RicRequestId {
                requestor_id: 21,
                instance_id,
            },
            KPM_RAN_FUNCTION_ID,
        )
    }

    fn delete(instance_id: u32) -> RicSubscriptionDeleteRequest {
        RicSubscriptionDeleteRequest {
            request_id: key(instance_id).request_id(),
            ran_function_id: KPM_RAN_FUNCTION_ID,
        }
    }

    #[tokio::test]
    async fn test_registration_encodes_description() {
        let f = fixture(0).await;
        let function = f.model.ran_function();
        assert_eq!(function.id, KPM_RAN_FUNCTION_ID);
        assert_eq!(function.oid, MODEL_OID);
        let expected = BincodeKpmCodec
            .encode_ran_function_description(&ran_function_description())
            .unwrap();
        assert_eq!(function.description, expected);
    }

    #[tokio::test]
    async fn test_insert_and_policy_only_rejected() {
        let f = fixture(2).await;
        let channel = RecordingChannel::new();
        let outcome = f
            .model
            .ric_subscription(
                channel.clone(),
                request(
                    1,
                    trigger(10),
                    vec![action(1, RicActionType::Insert), action(2, RicActionType::Policy)],
                ),
            )
            .await
            .unwrap();

        let failure = outcome.failure().unwrap();
        assert_eq!(failure.cause, Cause::RicRequest(CauseRicRequest::ActionNotSupported));
        assert!(matches!(f.subscriptions.get(&key(1)).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_bad_period_rejected() {
        let f = fixture(2).await;
        let outcome = f
            .model
            .ric_subscription(
                RecordingChannel::new(),
                request(1, Bytes::from_static(b"\x00"), vec![action(1, RicActionType::Report)]),
            )
            .await
            .unwrap();

        assert_eq!(
            outcome.failure().unwrap().cause,
            Cause::RicRequest(CauseRicRequest::Unspecified)
        );
        assert!(f.subscriptions.is_empty().await);
    }

    #[tokio::test]
    async fn test_empty_action_list_rejected() {
        let f = fixture(0).await;
        let outcome = f
            .model
            .ric_subscription(RecordingChannel::new(), request(1, trigger(10), vec![]))
            .await
            .unwrap();

        assert_eq!(
            outcome.failure().unwrap().cause,
            Cause::RicRequest(CauseRicRequest::ActionNotSupported)
        );
        assert!(f.subscriptions.is_empty().await);
    }

    #[tokio::test]
    async fn test_malformed_request_is_error() {
        let f = fixture(0).await;
        let result = f
            .model
            .ric_subscription(
                RecordingChannel::new(),
                request(
                    1,
                    trigger(10),
                    vec![action(1, RicActionType::Report), action(1, RicActionType::Report)],
                ),
            )
            .await;
        assert!(matches!(result, Err(E2Error::Invalid(_))));
        assert!(f.subscriptions.is_empty().await);
    }

    #[tokio::test]
    async fn test_report_subscription_admitted_and_reports() {
        let f = fixture(3).await;
        let channel = RecordingChannel::new();
        let outcome = f
            .model
            .ric_subscription(
                channel.clone(),
                request(
                    7,
                    trigger(20),
                    vec![
                        action(4, RicActionType::Report),
                        action(5, RicActionType::Insert),
                        action(6, RicActionType::Report),
                    ],
                ),
            )
            .await
            .unwrap();

        let response = outcome.success().unwrap();
        assert_eq!(response.actions_admitted, vec![RicActionId(4), RicActionId(6)]);
        assert_eq!(
            response.actions_not_admitted,
            vec![(RicActionId(5), Cause::RicRequest(CauseRicRequest::ActionNotSupported))]
        );

        let stored = f.subscriptions.get(&key(7)).await.unwrap();
        assert_eq!(stored.actions_accepted, vec![RicActionId(4), RicActionId(6)]);
        assert!(stored.ticker.is_some());

        let indications = channel.wait_for_indications(2, Duration::from_secs(2)).await;
        assert!(indications.len() >= 2);
        let first = &indications[0];
        assert_eq!(first.request_id, key(7).request_id());
        assert_eq!(first.action_id, RicActionId(4));
        assert_eq!(first.sequence_number, Some(1));
        assert_eq!(indications[1].sequence_number, Some(2));
        assert_eq!(first.header, indications[1].header);

        let message: IndicationMessage = bincode::deserialize(&first.message).unwrap();
        assert_eq!(message.number_of_active_ues, f.ues.len().await as u32);
    }

    #[tokio::test]
    async fn test_duplicate_key_never_starts_second_task() {
        let f = fixture(1).await;
        let channel = RecordingChannel::new();
        let first = f
            .model
            .ric_subscription(channel.clone(), request(3, trigger(1000), vec![action(1, RicActionType::Report)]))
            .await
            .unwrap();
        assert!(first.is_success());
        let ticker = f.subscriptions.get(&key(3)).await.unwrap().ticker.unwrap();

        let second = f
            .model
            .ric_subscription(channel, request(3, trigger(10), vec![action(1, RicActionType::Report)]))
            .await
            .unwrap();
        assert_eq!(
            second.failure().unwrap().cause,
            Cause::RicRequest(CauseRicRequest::Unspecified)
        );
        let current = f.subscriptions.get(&key(3)).await.unwrap().ticker.unwrap();
        assert!(current.same_task(&ticker));
    }

    #[tokio::test]
    async fn test_delete_stops_reports() {
        let f = fixture(2).await;
        let channel = RecordingChannel::new();
        f.model
            .ric_subscription(channel.clone(), request(9, trigger(10), vec![action(1, RicActionType::Report)]))
            .await
            .unwrap();
        channel.wait_for_indications(1, Duration::from_secs(2)).await;
        let ticker = f.subscriptions.get(&key(9)).await.unwrap().ticker.unwrap();

        let response = f.model.ric_subscription_delete(delete(9)).await.unwrap();
        assert_eq!(response.success().unwrap().request_id, key(9).request_id());
        assert!(ticker.is_stopped());
        assert!(matches!(f.subscriptions.get(&key(9)).await, Err(StoreError::NotFound(_))));

        // let an in-flight tick drain before sampling
        tokio::time::sleep(Duration::from_millis(30)).await;
        let sent = channel.indications().len();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(channel.indications().len(), sent);
    }

    #[tokio::test]
    async fn test_delete_unknown_is_not_found() {
        let f = fixture(0).await;
        assert!(matches!(
            f.model.ric_subscription_delete(delete(42)).await,
            Err(E2Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_session_close_removes_subscription() {
        let f = fixture(1).await;
        let channel = RecordingChannel::new();
        f.model
            .ric_subscription(channel.clone(), request(5, trigger(1000), vec![action(1, RicActionType::Report)]))
            .await
            .unwrap();

        channel.close().await.unwrap();
        for _ in 0..50 {
            if f.subscriptions.is_empty().await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(f.subscriptions.is_empty().await);
    }

    #[tokio::test]
    async fn test_send_failure_releases_subscription() {
        let f = fixture(1).await;
        let channel = RecordingChannel::failing_indications();
        let outcome = f
            .model
            .ric_subscription(channel.clone(), request(6, trigger(50), vec![action(1, RicActionType::Report)]))
            .await
            .unwrap();
        assert!(outcome.is_success());
        let ticker = f.subscriptions.get(&key(6)).await.unwrap().ticker.unwrap();

        for _ in 0..100 {
            if f.subscriptions.is_empty().await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(f.subscriptions.is_empty().await);
        assert!(ticker.is_stopped());
        assert!(channel.indications().is_empty());

        let again = f
            .model
            .ric_subscription(RecordingChannel::new(), request(6, trigger(1000), vec![action(1, RicActionType::Report)]))
            .await
            .unwrap();
        assert!(again.is_success());
        let current = f.subscriptions.get(&key(6)).await.unwrap().ticker.unwrap();
        assert!(!current.same_task(&ticker));
    }

    #[tokio::test]
    async fn test_control_and_connection_update_not_supported() {
        let f = fixture(0).await;
        let control = RicControlRequest {
            request_id: key(1).request_id(),
            ran_function_id: KPM_RAN_FUNCTION_ID,
            call_process_id: None,
            header: Bytes::from_static(b"h"),
            message: Bytes::from_static(b"m"),
            ack_requested: true,
        };
        assert!(matches!(f.model.ric_control(control).await, Err(E2Error::NotSupported(_))));

        let update = E2ConnectionUpdate {
            add: vec!["127.0.0.1:36421".into()],
            remove: vec![],
        };
        assert!(matches!(
            f.model.e2_connection_update(update).await,
            Err(E2Error::NotSupported(_))
        ));
    }
}
