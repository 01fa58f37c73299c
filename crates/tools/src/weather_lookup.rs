//! `get_weather` — deterministic mock weather.
//!
//! Derives plausible conditions from a hash of the city name so turns that
//! call it can be exercised end-to-end without network access.

use async_trait::async_trait;
use parley_core::error::ToolError;
use serde_json::{Map, Value};
use std::fmt;

use crate::native::NativeFunction;

const CONDITIONS: [&str; 8] = [
    "sunny",
    "partly cloudy",
    "overcast",
    "light rain",
    "heavy rain",
    "thunderstorms",
    "snow",
    "fog",
];

const WIND_DIRECTIONS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];

pub struct WeatherLookup;

#[async_trait]
impl NativeFunction for WeatherLookup {
    fn name(&self) -> &str {
        "get_weather"
    }

    async fn call(&self, parameters: &Map<String, Value>) -> Result<Value, ToolError> {
        let city = parameters
            .get("city")
            .or_else(|| parameters.get("location"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("city is required".into()))?;

        let units = match parameters.get("units").and_then(Value::as_str) {
            None | Some("metric") => Units::Metric,
            Some("imperial") => Units::Imperial,
            Some(other) => {
                return Err(ToolError::InvalidArguments(format!(
                    "units must be 'metric' or 'imperial', got '{other}'"
                )));
            }
        };

        Ok(Value::String(WeatherReport::for_city(city, units).to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Units {
    Metric,
    Imperial,
}

#[derive(Debug)]
struct WeatherReport {
    temperature: f64,
    units: Units,
    conditions: &'static str,
    humidity: u32,
    wind_kph: u32,
    wind_direction: &'static str,
}

impl WeatherReport {
    fn for_city(city: &str, units: Units) -> Self {
        let hash = city
            .to_lowercase()
            .bytes()
            .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(u32::from(b)));

        let celsius = f64::from(hash % 40) - 5.0;
        let temperature = match units {
            Units::Metric => celsius,
            Units::Imperial => (celsius * 9.0 / 5.0 + 32.0).round(),
        };

        Self {
            temperature,
            units,
            conditions: CONDITIONS[(hash as usize / 7) % CONDITIONS.len()],
            humidity: 30 + hash % 60,
            wind_kph: 5 + hash % 30,
            wind_direction: WIND_DIRECTIONS[(hash as usize / 3) % WIND_DIRECTIONS.len()],
        }
    }
}

impl fmt::Display for WeatherReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.units {
            Units::Metric => "C",
            Units::Imperial => "F",
        };
        write!(
            f,
            "{}{unit}, {}, humidity {}%, wind {} km/h {}",
            self.temperature, self.conditions, self.humidity, self.wind_kph, self.wind_direction
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, &str)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), Value::from(*v)))
            .collect()
    }

    #[tokio::test]
    async fn reports_weather_for_city() {
        let out = WeatherLookup.call(&args(&[("city", "Paris")])).await.unwrap();
        let text = out.as_str().unwrap();
        assert!(text.contains("C, "));
        assert!(text.contains("humidity"));
    }

    #[tokio::test]
    async fn deterministic_and_case_insensitive() {
        let a = WeatherLookup.call(&args(&[("city", "London")])).await.unwrap();
        let b = WeatherLookup.call(&args(&[("city", "london")])).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn accepts_location_alias_and_imperial() {
        let out = WeatherLookup
            .call(&args(&[("location", "New York"), ("units", "imperial")]))
            .await
            .unwrap();
        assert!(out.as_str().unwrap().contains("F, "));
    }

    #[tokio::test]
    async fn missing_city_is_invalid() {
        let err = WeatherLookup.call(&Map::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));

        let blank = WeatherLookup.call(&args(&[("city", "  ")])).await.unwrap_err();
        assert!(matches!(blank, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn rejects_unknown_units() {
        let err = WeatherLookup
            .call(&args(&[("city", "Oslo"), ("units", "kelvin")]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("kelvin"));
    }
}
