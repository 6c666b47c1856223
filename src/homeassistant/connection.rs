use super::{mqtt_options, publish_availability, Availability, DeviceIdentity, Topics};
use crate::settings::MQTTConfig;
use rumqttc::{AsyncClient, Event, EventLoop, Outgoing, Packet};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const REQUEST_QUEUE_CAPACITY: usize = 200;
const RECONNECT_INTERVAL: Duration = Duration::from_secs(10);
const STARTUP_RETRY_INTERVAL: Duration = Duration::from_secs(1);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("no connection to the MQTT broker within {0:?}")]
    Timeout(Duration),
    #[error("failed to announce availability: {0}")]
    Announce(#[from] super::PublishError),
}

/// Whether the broker connection is currently up.
///
/// Written only by the event loop driver, read by the health check and the pipeline.
#[derive(Debug, Default)]
pub struct ConnectionState {
    connected: RwLock<bool>,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        match self.connected.read() {
            Ok(connected) => *connected,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        match self.connected.write() {
            Ok(mut guard) => *guard = connected,
            Err(poisoned) => *poisoned.into_inner() = connected,
        }
    }
}

/// A live broker session and the task that keeps it alive.
pub struct MqttConnection {
    client: AsyncClient,
    topics: Topics,
    state: Arc<ConnectionState>,
    driver: JoinHandle<()>,
}

impl MqttConnection {
    /// Connects to the broker, waiting at most `wait` for the first successful handshake.
    ///
    /// Once connected, reconnection after any later failure is handled in the background.
    pub async fn establish(
        config: &MQTTConfig,
        identity: &DeviceIdentity,
        topics: &Topics,
        wait: Duration,
    ) -> Result<Self, ConnectionError> {
        let options = mqtt_options(config, identity, topics);
        let (host, port) = options.broker_address();
        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_QUEUE_CAPACITY);

        tokio::time::timeout(wait, wait_for_connack(&mut eventloop))
            .await
            .map_err(|_| ConnectionError::Timeout(wait))?;

        info!(host = %host, port, "MQTT connected");

        let state = Arc::new(ConnectionState::default());
        state.set_connected(true);
        publish_availability(&client, topics, Availability::Online)?;

        let driver = tokio::spawn(drive(
            eventloop,
            client.clone(),
            topics.clone(),
            Arc::clone(&state),
        ));

        Ok(Self {
            client,
            topics: topics.clone(),
            state,
            driver,
        })
    }

    pub fn client(&self) -> AsyncClient {
        self.client.clone()
    }

    pub fn state(&self) -> Arc<ConnectionState> {
        Arc::clone(&self.state)
    }

    /// Marks the device offline and closes the session.
    ///
    /// A clean disconnect suppresses the last will, so `offline` has to be sent explicitly.
    pub async fn shutdown(self) {
        if let Err(e) = publish_availability(&self.client, &self.topics, Availability::Offline) {
            error!(error = %e, "Failed to publish offline status");
        }

        if let Err(e) = self.client.try_disconnect() {
            error!(error = %e, "Failed to request MQTT disconnect");
            self.driver.abort();
            return;
        }

        match tokio::time::timeout(SHUTDOWN_GRACE, self.driver).await {
            Ok(_) => info!("MQTT disconnected"),
            Err(_) => warn!("Timeout while flushing MQTT session, dropping it"),
        }
    }
}

async fn wait_for_connack(eventloop: &mut EventLoop) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => return,
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "MQTT connection attempt failed, retrying");
                tokio::time::sleep(STARTUP_RETRY_INTERVAL).await;
            }
        }
    }
}

async fn drive(
    mut eventloop: EventLoop,
    client: AsyncClient,
    topics: Topics,
    state: Arc<ConnectionState>,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                state.set_connected(true);
                info!("MQTT reconnected");

                if let Err(e) = publish_availability(&client, &topics, Availability::Online) {
                    error!(error = %e, "Failed to publish availability status");
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                state.set_connected(false);
                debug!("MQTT event loop stopped after disconnect");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                if state.is_connected() {
                    warn!(error = %e, "MQTT connection lost");
                } else {
                    debug!(error = %e, "MQTT reconnect attempt failed");
                }
                state.set_connected(false);
                tokio::time::sleep(RECONNECT_INTERVAL).await;
            }
        }
    }
}
