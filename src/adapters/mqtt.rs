//! MQTT broker adapter.
//!
//! Implements [`BrokerPort`] over the ESP-IDF MQTT client.  The client
//! delivers events on its own task; the callback only pushes inbound
//! publishes into a queue that the supervisory loop drains via
//! `poll_inbound`, keeping all dispatch on the single loop thread.
//!
//! On non-ESP targets a log-and-succeed simulation stands in; the real
//! session behaviour is exercised in tests through mock ports.

use log::info;
#[cfg(target_os = "espidf")]
use log::warn;

use crate::app::ports::{BrokerError, BrokerPort, InboundMessage, SessionParams};

#[cfg(target_os = "espidf")]
use std::collections::VecDeque;
#[cfg(target_os = "espidf")]
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(target_os = "espidf")]
use std::sync::{Arc, Mutex};

#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::{
    EspMqttClient, EventPayload, LwtConfiguration, MqttClientConfiguration, QoS,
};

#[cfg(target_os = "espidf")]
pub struct MqttAdapter {
    client: Option<EspMqttClient<'static>>,
    connected: Arc<AtomicBool>,
    inbound: Arc<Mutex<VecDeque<InboundMessage>>>,
}

#[cfg(target_os = "espidf")]
impl MqttAdapter {
    pub fn new() -> Self {
        Self {
            client: None,
            connected: Arc::new(AtomicBool::new(false)),
            inbound: Arc::new(Mutex::new(VecDeque::new())),
        }
    }
}

#[cfg(target_os = "espidf")]
impl Default for MqttAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "espidf")]
impl BrokerPort for MqttAdapter {
    fn connect(&mut self, params: &SessionParams<'_>) -> Result<(), BrokerError> {
        // Drop any previous client first; its task must stop before the
        // broker sees the reconnect.
        self.client = None;
        self.connected.store(false, Ordering::Release);
        self.inbound.lock().unwrap().clear();

        let config = params.config;
        let mut url = std::string::String::new();
        use core::fmt::Write;
        let _ = write!(url, "mqtt://{}:{}", config.broker_host, config.broker_port);

        let mqtt_config = MqttClientConfiguration {
            client_id: Some(params.client_id),
            username: (!config.broker_username.is_empty()).then(|| config.broker_username.as_str()),
            password: (!config.broker_password.is_empty()).then(|| config.broker_password.as_str()),
            keep_alive_interval: Some(core::time::Duration::from_secs(u64::from(
                config.keep_alive_secs,
            ))),
            lwt: Some(LwtConfiguration {
                topic: params.will_topic,
                payload: params.will_payload,
                qos: QoS::AtLeastOnce,
                retain: true,
            }),
            ..Default::default()
        };

        let connected = Arc::clone(&self.connected);
        let inbound = Arc::clone(&self.inbound);

        let client = EspMqttClient::new_cb(&url, &mqtt_config, move |event| {
            match event.payload() {
                EventPayload::Connected(_) => {
                    connected.store(true, Ordering::Release);
                }
                EventPayload::Disconnected => {
                    connected.store(false, Ordering::Release);
                }
                EventPayload::Received { topic, data, .. } => {
                    if let Some(topic) = topic {
                        inbound.lock().unwrap().push_back(InboundMessage {
                            topic: topic.to_string(),
                            payload: data.to_vec(),
                        });
                    }
                }
                _ => {}
            }
        })
        .map_err(|e| {
            warn!("mqtt: client init failed: {}", e);
            BrokerError::ConnectFailed
        })?;

        self.client = Some(client);

        // The CONNECT handshake completes on the client task; give it a
        // bounded window before declaring the attempt failed.
        for _ in 0..50 {
            if self.connected.load(Ordering::Acquire) {
                return Ok(());
            }
            super::time::sleep_ms(100);
        }
        self.client = None;
        Err(BrokerError::ConnectFailed)
    }

    fn is_connected(&self) -> bool {
        self.client.is_some() && self.connected.load(Ordering::Acquire)
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
        let client = self.client.as_mut().ok_or(BrokerError::NotConnected)?;
        client
            .subscribe(topic, QoS::AtLeastOnce)
            .map(|_| ())
            .map_err(|e| {
                warn!("mqtt: subscribe to {} failed: {}", topic, e);
                BrokerError::Rejected
            })
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), BrokerError> {
        let client = self.client.as_mut().ok_or(BrokerError::NotConnected)?;
        client
            .publish(topic, QoS::AtMostOnce, retain, payload)
            .map(|_| ())
            .map_err(|e| {
                warn!("mqtt: publish to {} failed: {}", topic, e);
                BrokerError::Rejected
            })
    }

    fn poll_inbound(&mut self) -> Option<InboundMessage> {
        self.inbound.lock().unwrap().pop_front()
    }

    fn disconnect(&mut self) {
        self.client = None;
        self.connected.store(false, Ordering::Release);
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation backend
// ───────────────────────────────────────────────────────────────

/// Host-side stand-in: connects instantly, publishes to the log, never
/// delivers inbound traffic.
#[cfg(not(target_os = "espidf"))]
pub struct MqttAdapter {
    connected: bool,
}

#[cfg(not(target_os = "espidf"))]
impl MqttAdapter {
    pub fn new() -> Self {
        Self { connected: false }
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for MqttAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_os = "espidf"))]
impl BrokerPort for MqttAdapter {
    fn connect(&mut self, params: &SessionParams<'_>) -> Result<(), BrokerError> {
        info!(
            "mqtt(sim): connected as '{}' (will on '{}')",
            params.client_id, params.will_topic
        );
        self.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
        if !self.connected {
            return Err(BrokerError::NotConnected);
        }
        info!("mqtt(sim): subscribed to {}", topic);
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), BrokerError> {
        if !self.connected {
            return Err(BrokerError::NotConnected);
        }
        info!(
            "mqtt(sim): publish to {} ({} bytes, retain={})",
            topic,
            payload.len(),
            retain
        );
        Ok(())
    }

    fn poll_inbound(&mut self) -> Option<InboundMessage> {
        None
    }

    fn disconnect(&mut self) {
        if self.connected {
            info!("mqtt(sim): disconnected");
        }
        self.connected = false;
    }
}
