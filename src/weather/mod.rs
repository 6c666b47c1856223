pub mod compass;
pub mod convert;
pub mod sensors;
pub mod timestamp;

use convert::{f_to_c, inch_to_mm, inhg_to_hpa, mph_to_kmh, round_to};
use sensors::{Measurement, SensorDefinition};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnitSystem {
    #[default]
    Metric,
    Imperial,
}

impl UnitSystem {
    pub fn is_metric(self) -> bool {
        self == UnitSystem::Metric
    }
}

impl FromStr for UnitSystem {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "metric" => Ok(UnitSystem::Metric),
            "imperial" => Ok(UnitSystem::Imperial),
            other => Err(format!("unknown unit system '{other}'")),
        }
    }
}

impl Display for UnitSystem {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            UnitSystem::Metric => write!(f, "metric"),
            UnitSystem::Imperial => write!(f, "imperial"),
        }
    }
}

/// One sensor value from one upload, ready to be published.
#[derive(Debug)]
pub struct Reading {
    pub sensor: &'static SensorDefinition,
    pub raw: f64,
    pub converted: f64,
    pub formatted: String,
}

impl Reading {
    pub fn new(sensor: &'static SensorDefinition, raw: f64, units: UnitSystem) -> Self {
        let converted = convert_value(sensor.measurement, raw, units);
        let formatted = format_value(sensor.measurement, converted, units);

        Self {
            sensor,
            raw,
            converted,
            formatted,
        }
    }

    /// Compass label for wind direction readings, empty when the angle is not a number.
    pub fn cardinal(&self) -> Option<&'static str> {
        match self.sensor.measurement {
            Measurement::WindDirection => Some(compass::to_cardinal(self.raw).unwrap_or_default()),
            _ => None,
        }
    }
}

/// Converts a value reported in the station's imperial units into the configured system.
///
/// Imperial output is left unconverted but rounded the same way metric output is.
pub fn convert_value(measurement: Measurement, value: f64, units: UnitSystem) -> f64 {
    match (units, measurement) {
        (UnitSystem::Metric, Measurement::Temperature) => f_to_c(value),
        (UnitSystem::Metric, Measurement::Pressure) => inhg_to_hpa(value),
        (UnitSystem::Metric, Measurement::WindSpeed) => mph_to_kmh(value),
        (UnitSystem::Metric, Measurement::Precipitation) => inch_to_mm(value),
        (
            UnitSystem::Imperial,
            Measurement::Temperature | Measurement::Pressure | Measurement::WindSpeed,
        ) => round_to(value, 1),
        (UnitSystem::Imperial, Measurement::Precipitation) => round_to(value, 2),
        _ => value,
    }
}

pub fn format_value(measurement: Measurement, value: f64, units: UnitSystem) -> String {
    match measurement {
        Measurement::Humidity | Measurement::UvIndex | Measurement::WindDirection => {
            if value.is_nan() {
                String::new()
            } else {
                value.to_string()
            }
        }
        Measurement::Precipitation if !units.is_metric() => format!("{value:.2}"),
        _ => format!("{value:.1}"),
    }
}
