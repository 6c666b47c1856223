use std::sync::Arc;

use chrono_tz::Tz;
use homeassistant::connection::ConnectionState;
use homeassistant::HAPublisher;
use tracing::{error, info, warn};
use upload::StationUpload;
use weather::sensors::SENSORS;
use weather::timestamp::measured_on;
use weather::{Reading, UnitSystem};
use wunderground::WundergroundRelay;

pub mod homeassistant;
pub mod http;
pub mod settings;
pub mod upload;
pub mod weather;
pub mod wunderground;

/// Outcome of one station upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    /// Sensors whose config, state and attributes were all handed to the MQTT client.
    pub published: usize,
}

/// Turns station uploads into Home Assistant sensor updates.
pub struct WeatherBridge {
    publisher: HAPublisher,
    units: UnitSystem,
    timezone: Tz,
    connection: Arc<ConnectionState>,
    relay: Option<Arc<WundergroundRelay>>,
}

impl WeatherBridge {
    pub fn new(
        publisher: HAPublisher,
        units: UnitSystem,
        timezone: Tz,
        connection: Arc<ConnectionState>,
    ) -> Self {
        Self {
            publisher,
            units,
            timezone,
            connection,
            relay: None,
        }
    }

    pub fn with_relay(mut self, relay: Arc<WundergroundRelay>) -> Self {
        self.relay = Some(relay);
        self
    }

    /// Publishes every known sensor present in the upload.
    ///
    /// Missing or unparsable values are skipped and a failed publish only costs that one
    /// sensor. Nothing here is reported back to the station.
    pub fn ingest(&self, upload: &StationUpload) -> IngestReport {
        if !self.connection.is_connected() {
            warn!("MQTT not connected, sensor updates may be delayed or dropped");
        }

        let measured_on = measured_on(upload, self.timezone);
        let mut published = 0;

        for sensor in SENSORS.iter() {
            let Some(raw) = upload
                .get(sensor.source_field)
                .filter(|value| !value.is_empty())
            else {
                continue;
            };

            let value = match raw.parse::<f64>() {
                Ok(value) => value,
                Err(e) => {
                    warn!(field = sensor.source_field, value = %raw, error = %e, "Failed to parse sensor value");
                    continue;
                }
            };

            let reading = Reading::new(sensor, value, self.units);
            match self.publisher.publish_reading(&reading, &measured_on) {
                Ok(()) => published += 1,
                Err(e) => error!(sensor = sensor.key, error = %e, "Failed to publish sensor"),
            }
        }

        info!(published, "Published sensors to MQTT");

        if let Some(relay) = &self.relay {
            relay.dispatch(upload.clone());
        }

        IngestReport { published }
    }
}
