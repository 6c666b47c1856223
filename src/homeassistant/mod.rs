pub mod connection;
pub mod messages;

#[cfg(test)]
pub(crate) mod recording;

use crate::settings::MQTTConfig;
use crate::weather::sensors::SensorDefinition;
use crate::weather::{Reading, UnitSystem};
use messages::{DeviceInfo, DiscoveryPayload, OriginInfo, SensorAttributes};
use rumqttc::{AsyncClient, LastWill, MqttOptions, QoS};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const KEEP_ALIVE: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("MQTT client rejected the message: {0}")]
    Client(#[from] rumqttc::ClientError),
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The one thing the pipeline needs from an MQTT client.
///
/// Implementations must not block: a message that cannot be queued right away is an error.
pub trait MqttPublish: Send + Sync {
    fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<(), PublishError>;
}

impl MqttPublish for AsyncClient {
    fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<(), PublishError> {
        self.try_publish(topic, QoS::AtLeastOnce, retain, payload)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Online,
    Offline,
}

impl Availability {
    pub fn as_str(self) -> &'static str {
        match self {
            Availability::Online => "online",
            Availability::Offline => "offline",
        }
    }
}

/// Who the sensors belong to, as shown in the Home Assistant device registry.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceIdentity {
    pub id: String,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
}

/// Topic layout of one device under the discovery prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct Topics {
    prefix: String,
    device_id: String,
}

impl Topics {
    pub fn new(prefix: &str, device_id: &str) -> Self {
        Self {
            prefix: prefix.trim_end_matches('/').to_owned(),
            device_id: device_id.to_owned(),
        }
    }

    pub fn availability(&self) -> String {
        format!("{}/sensor/{}/availability", self.prefix, self.device_id)
    }

    pub fn config(&self, sensor_key: &str) -> String {
        format!("{}/config", self.sensor_base(sensor_key))
    }

    pub fn state(&self, sensor_key: &str) -> String {
        format!("{}/state", self.sensor_base(sensor_key))
    }

    pub fn attributes(&self, sensor_key: &str) -> String {
        format!("{}/attributes", self.sensor_base(sensor_key))
    }

    pub fn unique_id(&self, sensor_key: &str) -> String {
        format!("{}_{}", self.device_id, sensor_key)
    }

    fn sensor_base(&self, sensor_key: &str) -> String {
        format!("{}/sensor/{}", self.prefix, self.unique_id(sensor_key))
    }
}

pub fn mqtt_options(config: &MQTTConfig, identity: &DeviceIdentity, topics: &Topics) -> MqttOptions {
    let mut options = MqttOptions::new(
        format!("weatherbridge-{}", identity.id),
        config.host.clone(),
        config.port(),
    );
    options.set_keep_alive(KEEP_ALIVE).set_last_will(LastWill::new(
        topics.availability(),
        Availability::Offline.as_str(),
        QoS::AtLeastOnce,
        true,
    ));

    if !config.user.is_empty() {
        options.set_credentials(config.user.clone(), config.password.clone());
    }

    options
}

/// Publishes sensors to Home Assistant through MQTT discovery.
///
/// Every reading republishes the full discovery config. All messages are retained, so
/// repeating them is harmless and a restarted Home Assistant always finds the entities.
pub struct HAPublisher {
    client: Box<dyn MqttPublish>,
    topics: Topics,
    identity: DeviceIdentity,
    units: UnitSystem,
}

impl HAPublisher {
    pub fn new(
        client: Box<dyn MqttPublish>,
        topics: Topics,
        identity: DeviceIdentity,
        units: UnitSystem,
    ) -> Self {
        Self {
            client,
            topics,
            identity,
            units,
        }
    }

    pub fn discovery_payload(&self, sensor: &SensorDefinition) -> DiscoveryPayload {
        let unit = sensor.unit(self.units);

        DiscoveryPayload {
            name: format!("{} {}", self.identity.name, sensor.display_name),
            state_topic: self.topics.state(sensor.key),
            unique_id: self.topics.unique_id(sensor.key),
            device_class: sensor.device_class.map(str::to_owned),
            state_class: sensor.state_class.map(str::to_owned),
            unit_of_measurement: (!unit.is_empty()).then(|| unit.to_owned()),
            icon: sensor.icon.map(str::to_owned),
            suggested_display_precision: sensor.precision,
            availability_topic: self.topics.availability(),
            json_attributes_topic: self.topics.attributes(sensor.key),
            device: DeviceInfo {
                identifiers: vec![self.identity.id.clone()],
                name: self.identity.name.clone(),
                manufacturer: self.identity.manufacturer.clone(),
                model: self.identity.model.clone(),
            },
            origin: OriginInfo::default(),
        }
    }

    /// Publishes config, state and attributes of one reading, in that order.
    ///
    /// Stops at the first failed publish; the remaining topics keep their previous values.
    pub fn publish_reading(&self, reading: &Reading, measured_on: &str) -> Result<(), PublishError> {
        let key = reading.sensor.key;

        self.register_sensor(reading.sensor)?;
        self.register_sensor_value(key, &reading.formatted)?;
        self.register_sensor_attributes(
            key,
            &SensorAttributes {
                measured_on,
                cardinal: reading.cardinal(),
            },
        )?;

        debug!(sensor = key, value = %reading.formatted, "Published sensor data");
        Ok(())
    }

    fn register_sensor(&self, sensor: &SensorDefinition) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(&self.discovery_payload(sensor))?;
        let topic = self.topics.config(sensor.key);

        self.client.publish(&topic, payload, true)?;
        debug!(sensor = sensor.key, topic = %topic, "Published sensor config");
        Ok(())
    }

    fn register_sensor_value(&self, key: &str, value: &str) -> Result<(), PublishError> {
        self.client
            .publish(&self.topics.state(key), value.as_bytes().to_vec(), true)
    }

    fn register_sensor_attributes(
        &self,
        key: &str,
        attributes: &SensorAttributes,
    ) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(attributes)?;
        self.client
            .publish(&self.topics.attributes(key), payload, true)
    }
}

pub(crate) fn publish_availability(
    client: &dyn MqttPublish,
    topics: &Topics,
    availability: Availability,
) -> Result<(), PublishError> {
    let topic = topics.availability();
    client.publish(&topic, availability.as_str().as_bytes().to_vec(), true)?;
    debug!(topic = %topic, status = availability.as_str(), "Published availability status");
    Ok(())
}
