use serde::Serialize;

/// MQTT discovery config for a single sensor entity.
///
/// See <https://www.home-assistant.io/integrations/sensor.mqtt/> for the meaning of each field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveryPayload {
    /// Name of the MQTT sensor.
    pub name: String,

    /// The MQTT topic subscribed to receive sensor values.
    pub state_topic: String,

    /// Unique ID for this sensor, the key of the Home Assistant entity registry.
    pub unique_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_class: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<String>,

    /// Icon for the entity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    /// Number of decimals used in the sensor's state after rounding.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_display_precision: Option<u8>,

    /// The MQTT topic subscribed to receive availability updates.
    pub availability_topic: String,

    /// Topic subscribed to receive a JSON dictionary payload.
    pub json_attributes_topic: String,

    /// Information about the device.
    pub device: DeviceInfo,

    pub origin: OriginInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    /// List of IDs that uniquely identify the device.
    pub identifiers: Vec<String>,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
}

/// The application that supplies the discovered MQTT item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OriginInfo {
    pub name: String,
    pub sw_version: String,
}

impl Default for OriginInfo {
    fn default() -> Self {
        Self {
            name: "HA Weatherbridge".to_owned(),
            sw_version: env!("CARGO_PKG_VERSION").to_owned(),
        }
    }
}

/// JSON dictionary published on a sensor's attributes topic.
#[derive(Debug, Serialize)]
pub struct SensorAttributes<'a> {
    pub measured_on: &'a str,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cardinal: Option<&'a str>,
}
