//! Periodic KPM report task

use super::codec::{IndicationHeader, IndicationMessage, KpmCodec};
use crate::indication::IndicationParams;
use crate::servicemodel::NodeIdentity;
use bytes::Bytes;
use chrono::Utc;
use common::types::RicIndicationType;
use common::utils::payload_summary;
use interfaces::{E2Channel, E2Error};
use std::sync::Arc;
use std::time::Duration;
use store::{ReportTicker, SubscriptionId, SubscriptionRegistry, TickerStop, UeRegistry};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, trace};

const SLICE_SST: &str = "1";
const SLICE_SD: &str = "SD1";

pub(super) struct ReportTask {
    pub id: SubscriptionId,
    pub period: Duration,
    pub node: NodeIdentity,
    pub codec: Arc<dyn KpmCodec>,
    pub ues: Arc<UeRegistry>,
    pub subscriptions: Arc<SubscriptionRegistry>,
    pub channel: Arc<dyn E2Channel>,
    pub ticker: ReportTicker,
}

impl ReportTask {
    pub async fn run(self, mut stop: TickerStop) {
        let header = match self.header() {
            Ok(header) => header,
            Err(e) => {
                error!("Failed to build indication header for subscription {}: {}", self.id, e);
                self.ticker.stop();
                self.subscriptions.remove_if_owned(&self.id, &self.ticker).await;
                return;
            }
        };

        let mut interval = interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sequence_number: u32 = 0;

        loop {
            tokio::select! {
                biased;
                _ = stop.stopped() => {
                    debug!("Report ticker for subscription {} stopped", self.id);
                    break;
                }
                _ = self.channel.closed() => {
                    debug!("E2 session of subscription {} closed", self.id);
                    self.ticker.stop();
                    self.subscriptions.remove_if_owned(&self.id, &self.ticker).await;
                    break;
                }
                _ = interval.tick() => {
                    sequence_number = sequence_number.wrapping_add(1);
                    match self.report(&header, sequence_number).await {
                        Ok(true) => {}
                        Ok(false) => break,
                        Err(e) => {
                            error!("Sending indication report for subscription {} failed: {}", self.id, e);
                            self.ticker.stop();
                            self.subscriptions.remove_if_owned(&self.id, &self.ticker).await;
                            break;
                        }
                    }
                }
            }
        }
        debug!("Report task for subscription {} finished", self.id);
    }

    fn header(&self) -> Result<Bytes, E2Error> {
        let plmn_id = self.node.plmn_id.encode();
        let header = IndicationHeader {
            plmn_id,
            gnb_id: self.node.gnb_id.0,
            sst: SLICE_SST.to_string(),
            sd: SLICE_SD.to_string(),
            nr_cgi_plmn_id: plmn_id,
            collection_start_time: Utc::now().timestamp_millis(),
        };
        Ok(self.codec.encode_indication_header(&header)?)
    }

    /// Send one report; `Ok(false)` once the subscription is gone
    async fn report(&self, header: &Bytes, sequence_number: u32) -> Result<bool, E2Error> {
        let subscription = match self.subscriptions.get(&self.id).await {
            Ok(subscription) => subscription,
            Err(_) => return Ok(false),
        };
        let Some(action_id) = subscription.actions_accepted.first().copied() else {
            return Ok(false);
        };

        let active_ues = u32::try_from(self.ues.len().await).unwrap_or(u32::MAX);
        let message = self.codec.encode_indication_message(&IndicationMessage {
            number_of_active_ues: active_ues,
        })?;

        let summary = payload_summary(&message);
        let indication = IndicationParams {
            request_id: self.id.request_id(),
            ran_function_id: self.id.ran_function_id,
            action_id,
            sequence_number: Some(sequence_number),
            indication_type: RicIndicationType::Report,
            header: header.clone(),
            message,
            call_process_id: None,
        }
        .build()?;

        trace!(
            "Sending indication report {} for subscription {}: {}",
            sequence_number, self.id, summary
        );
        self.channel.ric_indication(indication).await?;
        Ok(true)
    }
}
