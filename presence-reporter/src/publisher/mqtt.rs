//! MQTT transport
//!
//! Publishes plain-text states on the destination topic and listens on the
//! configured request topic; every message received there is forwarded as a
//! [`Trigger`] to the dispatch bridge.

use async_trait::async_trait;
use parking_lot::Mutex;
use rumqttc::{AsyncClient, Event, Incoming, LastWill, MqttOptions, Outgoing, QoS, Transport};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::Publisher;
use crate::config::MqttConfig;
use crate::error::PublishError;
use crate::models::Trigger;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

pub struct MqttPublisher {
    client: AsyncClient,
    stop: CancellationToken,
    event_loop: Mutex<Option<JoinHandle<()>>>,
}

impl MqttPublisher {
    /// Build the client and start its event loop in background.
    ///
    /// When `triggers` is given and a request topic is configured, the topic
    /// is (re)subscribed on every connection acknowledgement.
    pub fn connect(config: &MqttConfig, triggers: Option<mpsc::Sender<Trigger>>) -> Self {
        let options = Self::options(config);
        info!("Configuring the MQTT Broker {}:{}", config.host, config.port);

        let (client, mut eventloop) = AsyncClient::new(options, 10);
        let stop = CancellationToken::new();

        let request_topic = config.request_topic.clone().filter(|_| triggers.is_some());
        let loop_client = client.clone();
        let loop_stop = stop.clone();

        let handle = tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = loop_stop.cancelled() => break,
                    event = eventloop.poll() => event,
                };

                match event {
                    Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                        info!("Connected to the MQTT broker");
                        if let Some(topic) = &request_topic {
                            match loop_client.try_subscribe(topic.as_str(), QoS::AtLeastOnce) {
                                Ok(()) => info!("Subscribed to state requests on: {}", topic),
                                Err(e) => error!("Failed to subscribe to {}: {}", topic, e),
                            }
                        }
                    }
                    Ok(Event::Incoming(Incoming::Publish(publish))) => {
                        let Some(topic) = request_topic.as_deref() else {
                            continue;
                        };
                        if !is_state_request(&publish.topic, topic) {
                            continue;
                        }
                        info!(
                            "Received a request for current state, publishing (topic: {}, {} bytes)",
                            publish.topic,
                            publish.payload.len()
                        );
                        if let Some(tx) = &triggers {
                            if let Err(e) = tx.try_send(Trigger::new(publish.topic.clone())) {
                                debug!("Dropping state request: {}", e);
                            }
                        }
                    }
                    Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                        info!("Successfully disconnected from the MQTT server");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("MQTT connection error: {}", e);
                        tokio::select! {
                            _ = loop_stop.cancelled() => break,
                            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                        }
                    }
                }
            }
            debug!("MQTT event loop stopped");
        });

        Self {
            client,
            stop,
            event_loop: Mutex::new(Some(handle)),
        }
    }

    fn options(config: &MqttConfig) -> MqttOptions {
        let mut options = MqttOptions::new(config.effective_client_id(), &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
        options.set_clean_session(true);

        if let Some(user) = &config.user {
            options.set_credentials(user, config.password.clone().unwrap_or_default());
        }
        if let Some(topic) = &config.lwt_topic {
            options.set_last_will(LastWill::new(
                topic,
                config.lwt_message.clone(),
                QoS::AtMostOnce,
                false,
            ));
        }
        if config.tls {
            options.set_transport(Transport::tls_with_default_config());
        }
        options
    }
}

/// Whether `topic` falls under the request filter, wildcards included
fn is_state_request(topic: &str, filter: &str) -> bool {
    rumqttc::matches(topic, filter)
}

#[async_trait]
impl Publisher for MqttPublisher {
    async fn publish(&self, value: &str, destination: &str) -> Result<(), PublishError> {
        if self.stop.is_cancelled() {
            return Err(PublishError::Disconnected);
        }
        self.client
            .publish(destination, QoS::AtLeastOnce, false, value.as_bytes().to_vec())
            .await?;
        debug!("Published {} to {}", value, destination);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), PublishError> {
        let handle = self.event_loop.lock().take();
        let Some(handle) = handle else {
            return Ok(());
        };

        let result = self.client.disconnect().await;
        if tokio::time::timeout(DISCONNECT_TIMEOUT, handle).await.is_err() {
            warn!("MQTT event loop did not stop in time");
        }
        self.stop.cancel();
        result.map_err(PublishError::from)
    }

    fn name(&self) -> &'static str {
        "mqtt"
    }
}
