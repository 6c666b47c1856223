use crate::homeassistant::DeviceIdentity;
use crate::weather::UnitSystem;
use crate::wunderground::settings::WundergroundConfig;
use chrono_tz::Tz;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use tracing::{warn, Level};

/// Everything configurable, read once at startup.
///
/// Environment variables map onto nested keys by splitting on `_`, so `MQTT_HOST`
/// sets `mqtt.host` and `WU_FORWARD` sets `wu.forward`. Variables that are set but empty
/// keep the default, and values that fail to parse fall back when they are read.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub mqtt: MQTTConfig,
    pub device: DeviceConfig,
    pub tz: String,
    pub units: String,
    pub wu: WundergroundConfig,
    pub log: LogConfig,
    pub http: HttpConfig,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .set_default("mqtt.host", "localhost")?
            .set_default("mqtt.port", 1883)?
            .set_default("mqtt.user", "")?
            .set_default("mqtt.password", "")?
            .set_default("mqtt.prefix", "homeassistant")?
            .set_default("device.id", "")?
            .set_default("device.name", "Weather Station")?
            .set_default("device.manufacturer", "VEVOR")?
            .set_default("device.model", "7-in-1 Weather Station")?
            .set_default("tz", "Europe/Berlin")?
            .set_default("units", "metric")?
            .set_default("wu.forward", false)?
            .set_default("wu.username", "")?
            .set_default("wu.password", "")?
            .set_default("log.level", "INFO")?
            .set_default("http.bind", "0.0.0.0:80")?
            .add_source(File::with_name("config/default.toml").required(false))
            .add_source(File::with_name("config/secrets.toml").required(false))
            .add_source(Environment::default().separator("_").ignore_empty(true))
            .build()?;

        settings.try_deserialize()
    }

    /// Display timezone for measurement times. Unknown names fall back to UTC.
    pub fn timezone(&self) -> Tz {
        self.tz.parse::<Tz>().unwrap_or_else(|e| {
            warn!(timezone = %self.tz, error = %e, "Invalid timezone, using UTC");
            Tz::UTC
        })
    }

    /// Unit system to publish in. Unknown values fall back to metric.
    pub fn unit_system(&self) -> UnitSystem {
        self.units.parse::<UnitSystem>().unwrap_or_else(|e| {
            warn!(units = %self.units, error = %e, "Invalid units, defaulting to metric");
            UnitSystem::Metric
        })
    }

    pub fn log_level(&self) -> Level {
        self.log.level()
    }
}

const DEFAULT_MQTT_PORT: u16 = 1883;
const DEFAULT_HTTP_BIND: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 80);

/// Parses a raw setting, warning and substituting `default` when it is not valid.
fn parse_or<T: FromStr + std::fmt::Display>(key: &str, raw: &str, default: T) -> T {
    raw.trim().parse().unwrap_or_else(|_| {
        warn!(key, value = raw, default = %default, "Invalid setting, using default");
        default
    })
}

#[derive(Debug, Deserialize, Clone)]
pub struct MQTTConfig {
    pub host: String,
    /// Raw value, read through [`MQTTConfig::port`].
    pub port: String,
    pub user: String,
    pub password: String,
    pub prefix: String,
}

impl MQTTConfig {
    pub fn port(&self) -> u16 {
        parse_or("mqtt.port", &self.port, DEFAULT_MQTT_PORT)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DeviceConfig {
    pub id: String,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
}

impl DeviceConfig {
    /// Resolves the device identity, deriving the id from the name when none is configured.
    ///
    /// The id ends up in every topic and unique id, so changing it orphans the entities
    /// Home Assistant already discovered.
    pub fn identity(&self) -> DeviceIdentity {
        let id = match self.id.trim() {
            "" => self.name.trim().to_lowercase().replace(' ', "_"),
            id => id.to_owned(),
        };

        DeviceIdentity {
            id,
            name: self.name.clone(),
            manufacturer: self.manufacturer.clone(),
            model: self.model.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    pub level: String,
}

impl LogConfig {
    pub fn level(&self) -> Level {
        match self.level.trim().to_uppercase().as_str() {
            "TRACE" => Level::TRACE,
            "DEBUG" => Level::DEBUG,
            "WARN" | "WARNING" => Level::WARN,
            "ERROR" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    /// Raw value, read through [`HttpConfig::bind`].
    pub bind: String,
}

impl HttpConfig {
    pub fn bind(&self) -> SocketAddr {
        parse_or("http.bind", &self.bind, DEFAULT_HTTP_BIND)
    }
}
