use super::UnitSystem;

/// What a sensor measures. Drives conversion and formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measurement {
    Temperature,
    Pressure,
    Humidity,
    Precipitation,
    WindDirection,
    WindSpeed,
    UvIndex,
    Irradiance,
}

#[derive(Debug, PartialEq)]
pub struct SensorDefinition {
    /// Human readable name, e.g. "Dew Point".
    pub display_name: &'static str,
    /// Snake case identifier used in topics and unique ids, e.g. "dew_point".
    pub key: &'static str,
    /// Query parameter of the upload protocol carrying the reading.
    pub source_field: &'static str,
    pub measurement: Measurement,
    pub device_class: Option<&'static str>,
    pub state_class: Option<&'static str>,
    /// Material Design icon, only for sensors whose device class implies none.
    pub icon: Option<&'static str>,
    pub metric_unit: &'static str,
    pub imperial_unit: &'static str,
    pub precision: Option<u8>,
}

impl SensorDefinition {
    pub fn unit(&self, units: UnitSystem) -> &'static str {
        match units {
            UnitSystem::Metric => self.metric_unit,
            UnitSystem::Imperial => self.imperial_unit,
        }
    }
}

pub static SENSORS: [SensorDefinition; 11] = [
    SensorDefinition {
        display_name: "Barometric Pressure",
        key: "barometric_pressure",
        source_field: "baromin",
        measurement: Measurement::Pressure,
        device_class: Some("atmospheric_pressure"),
        state_class: Some("measurement"),
        icon: None,
        metric_unit: "hPa",
        imperial_unit: "inHg",
        precision: None,
    },
    SensorDefinition {
        display_name: "Temperature",
        key: "temperature",
        source_field: "tempf",
        measurement: Measurement::Temperature,
        device_class: Some("temperature"),
        state_class: Some("measurement"),
        icon: None,
        metric_unit: "°C",
        imperial_unit: "°F",
        precision: None,
    },
    SensorDefinition {
        display_name: "Humidity",
        key: "humidity",
        source_field: "humidity",
        measurement: Measurement::Humidity,
        device_class: Some("humidity"),
        state_class: Some("measurement"),
        icon: None,
        metric_unit: "%",
        imperial_unit: "%",
        precision: None,
    },
    SensorDefinition {
        display_name: "Dew Point",
        key: "dew_point",
        source_field: "dewptf",
        measurement: Measurement::Temperature,
        device_class: Some("temperature"),
        state_class: Some("measurement"),
        icon: None,
        metric_unit: "°C",
        imperial_unit: "°F",
        precision: None,
    },
    SensorDefinition {
        display_name: "Rainfall",
        key: "rainfall",
        source_field: "rainin",
        measurement: Measurement::Precipitation,
        device_class: Some("precipitation"),
        state_class: Some("measurement"),
        icon: None,
        metric_unit: "mm",
        imperial_unit: "in",
        precision: None,
    },
    SensorDefinition {
        display_name: "Daily Rainfall",
        key: "daily_rainfall",
        source_field: "dailyrainin",
        measurement: Measurement::Precipitation,
        device_class: Some("precipitation"),
        state_class: Some("total_increasing"),
        icon: None,
        metric_unit: "mm",
        imperial_unit: "in",
        precision: None,
    },
    SensorDefinition {
        display_name: "Wind Direction",
        key: "wind_direction",
        source_field: "winddir",
        measurement: Measurement::WindDirection,
        device_class: None,
        state_class: None,
        icon: Some("mdi:compass-outline"),
        metric_unit: "°",
        imperial_unit: "°",
        precision: Some(0),
    },
    SensorDefinition {
        display_name: "Wind Speed",
        key: "wind_speed",
        source_field: "windspeedmph",
        measurement: Measurement::WindSpeed,
        device_class: Some("wind_speed"),
        state_class: Some("measurement"),
        icon: None,
        metric_unit: "km/h",
        imperial_unit: "mph",
        precision: None,
    },
    SensorDefinition {
        display_name: "Wind Gust Speed",
        key: "wind_gust_speed",
        source_field: "windgustmph",
        measurement: Measurement::WindSpeed,
        device_class: Some("wind_speed"),
        state_class: Some("measurement"),
        icon: None,
        metric_unit: "km/h",
        imperial_unit: "mph",
        precision: None,
    },
    SensorDefinition {
        display_name: "UV Index",
        key: "uv_index",
        source_field: "UV",
        measurement: Measurement::UvIndex,
        device_class: None,
        state_class: Some("measurement"),
        icon: None,
        metric_unit: "index",
        imperial_unit: "index",
        precision: None,
    },
    SensorDefinition {
        display_name: "Solar Radiation",
        key: "solar_radiation",
        source_field: "solarRadiation",
        measurement: Measurement::Irradiance,
        device_class: Some("irradiance"),
        state_class: Some("measurement"),
        icon: None,
        metric_unit: "W/m²",
        imperial_unit: "W/m²",
        precision: None,
    },
];

pub fn lookup_by_source_field(field: &str) -> Option<&'static SensorDefinition> {
    SENSORS.iter().find(|sensor| sensor.source_field == field)
}
