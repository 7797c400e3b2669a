//! Deterministic environment overrides used by benchmark runs.

use serde::{Deserialize, Serialize};

/// Replacement values for the location/weather and time tools.
///
/// When a request carries mocks, both environment tools answer from these
/// fields only and make no external calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvMocks {
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub season: Option<String>,
    #[serde(default)]
    pub weather: Option<String>,
    #[serde(default)]
    pub temperature_c: Option<f64>,
}

impl EnvMocks {
    /// Text returned by the location/weather tool.
    pub fn render_weather(&self) -> String {
        let location = non_empty(&self.location);
        let weather = non_empty(&self.weather);
        if location.is_none() && weather.is_none() && self.temperature_c.is_none() {
            return "Ubicación: No disponible | Clima: No disponible".to_string();
        }
        let location = location.unwrap_or("Ubicación desconocida");
        let weather = weather.unwrap_or("clima desconocido");
        match self.temperature_c {
            Some(t) => format!("Ubicación: {location} | Clima: {weather}, {t:?}°C"),
            None => format!("Ubicación: {location} | Clima: {weather}"),
        }
    }

    /// Text returned by the time tool.
    pub fn render_time(&self) -> String {
        let mut parts = Vec::new();
        if let Some(time) = non_empty(&self.time) {
            parts.push(time.to_string());
        }
        if let Some(season) = non_empty(&self.season) {
            parts.push(format!("season={season}"));
        }
        if parts.is_empty() {
            return "Tiempo: No disponible".to_string();
        }
        parts.join(" | ")
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
