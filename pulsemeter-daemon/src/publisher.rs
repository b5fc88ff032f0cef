//! Snapshot publishing over MQTT
//!
//! The wire format predates this implementation and is consumed by
//! fielded dashboards, so it is bit-exact: a form-encoded ASCII string,
//! fields in fixed order, channel-prefixed names (`w_` water, `g_` gas),
//! plus `dbg_uptime`/`dbg_version` for remote triage.
//!
//! The publisher is deliberately dumb: it encodes and hands the bytes to
//! rumqttc at QoS 0. Throttling happened upstream in the processor;
//! failure policy (log and retry next cycle) lives in the publisher task.

use async_trait::async_trait;
use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS};
use std::time::Duration;
use thiserror::Error;

use pulsemeter_core::processor::Snapshot;
use pulsemeter_core::time::{Clock, SystemClock, Timestamp};

use crate::config::DaemonConfig;

/// Version tag carried in every payload's `dbg_version` field
pub const VERSION_TAG: &str = concat!("pulsemeter-", env!("CARGO_PKG_VERSION"));

/// Transport-layer publish failures
#[derive(Debug, Error)]
pub enum PublishError {
    /// rumqttc rejected or failed the publish
    #[error("mqtt publish failed: {0}")]
    Mqtt(#[from] rumqttc::ClientError),
}

/// Capability accepted by the publisher task
#[async_trait]
pub trait MetricsPublisher: Send {
    /// Ship one snapshot off-box
    async fn publish(&mut self, snapshot: &Snapshot) -> Result<(), PublishError>;
}

/// Form-encode one snapshot.
///
/// Field order and spelling are fixed by the consumers; do not "clean
/// this up".
pub fn encode_payload(
    device_id: &str,
    prefix: &str,
    snapshot: &Snapshot,
    uptime_ms: u64,
) -> String {
    format!(
        "device_id={device_id}&\
         {prefix}absolute_l={absolute}&\
         {prefix}relative_l={relative}&\
         {prefix}flow_mlps={flow}&\
         dbg_uptime={uptime_ms}&\
         dbg_version={VERSION_TAG}",
        absolute = snapshot.absolute_liters,
        relative = snapshot.relative_liters,
        flow = snapshot.flow_mlps,
    )
}

/// MQTT-backed publisher
pub struct MqttPublisher {
    client: AsyncClient,
    topic: String,
    device_id: String,
    prefix: &'static str,
    started_at: Timestamp,
}

impl MqttPublisher {
    /// Build the client from config; the returned [`EventLoop`] must be
    /// driven by its own task for anything to actually leave the box.
    pub fn connect(
        config: &DaemonConfig,
        started_at: Timestamp,
    ) -> Result<(Self, EventLoop), PublishError> {
        let client_id = format!("pulsemeter-{}", std::process::id());
        let mut options = MqttOptions::new(client_id, &config.broker, config.port);
        options.set_keep_alive(Duration::from_secs(30));

        let (client, event_loop) = AsyncClient::new(options, 10);
        Ok((
            Self {
                client,
                topic: config.topic.clone(),
                device_id: config.device_id.clone(),
                prefix: config.channel.field_prefix(),
                started_at,
            },
            event_loop,
        ))
    }
}

#[async_trait]
impl MetricsPublisher for MqttPublisher {
    async fn publish(&mut self, snapshot: &Snapshot) -> Result<(), PublishError> {
        let uptime_ms = SystemClock.now_ms().saturating_sub(self.started_at);
        let payload = encode_payload(&self.device_id, self.prefix, snapshot, uptime_ms);

        log::info!(
            "publish: {} {} {}",
            snapshot.absolute_liters,
            snapshot.relative_liters,
            snapshot.flow_mlps
        );
        self.client
            .publish(&self.topic, QoS::AtMostOnce, false, payload.clone())
            .await?;
        log::debug!("published: {payload}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_is_byte_exact() {
        let snapshot = Snapshot {
            absolute_liters: -1,
            relative_liters: 123,
            flow_mlps: 250,
        };
        let payload = encode_payload("EUI48:11:22:33:44:55:66", "w_", &snapshot, 98_765);
        assert_eq!(
            payload,
            format!(
                "device_id=EUI48:11:22:33:44:55:66&w_absolute_l=-1&\
                 w_relative_l=123&w_flow_mlps=250&dbg_uptime=98765&\
                 dbg_version={VERSION_TAG}"
            )
        );
        assert!(payload.is_ascii());
    }

    #[test]
    fn gas_channel_payload_uses_its_prefix() {
        let snapshot = Snapshot {
            absolute_liters: -1,
            relative_liters: 40,
            flow_mlps: 0,
        };
        let payload = encode_payload("EUI48:aa:bb:cc:dd:ee:ff", "g_", &snapshot, 0);
        assert!(payload.contains("g_relative_l=40"));
        assert!(payload.contains("g_flow_mlps=0"));
        assert!(!payload.contains("w_"));
    }
}
