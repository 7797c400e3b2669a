//! HTTP environment provider: IP geolocation (ipwho.is) followed by the
//! current weather at those coordinates (open-meteo).

use std::time::Duration;

use serde::Deserialize;

use cadence_core::environment::{EnvironmentProvider, weather_description};

const GEO_URL: &str = "https://ipwho.is/";
const WEATHER_URL: &str = "https://api.open-meteo.com/v1/forecast";

#[derive(Debug, Clone, Default, Deserialize)]
struct GeoResponse {
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct WeatherResponse {
    #[serde(default)]
    current_weather: Option<CurrentWeather>,
}

#[derive(Debug, Clone, Deserialize)]
struct CurrentWeather {
    #[serde(default)]
    temperature: f64,
    #[serde(default)]
    weathercode: i64,
}

pub struct HttpEnvironment {
    client: reqwest::Client,
    geo_url: String,
    weather_url: String,
}

impl HttpEnvironment {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            geo_url: GEO_URL.to_string(),
            weather_url: WEATHER_URL.to_string(),
        })
    }

    async fn lookup(&self) -> Result<String, reqwest::Error> {
        let geo: GeoResponse = self
            .client
            .get(&self.geo_url)
            .send()
            .await?
            .json()
            .await?;

        let (Some(lat), Some(lon)) = (geo.latitude, geo.longitude) else {
            return Ok(render(&geo, None, false));
        };

        let weather: WeatherResponse = self
            .client
            .get(&self.weather_url)
            .query(&[
                ("latitude", lat.to_string()),
                ("longitude", lon.to_string()),
                ("current_weather", "true".to_string()),
            ])
            .send()
            .await?
            .json()
            .await?;

        Ok(render(&geo, weather.current_weather.as_ref(), true))
    }
}

impl EnvironmentProvider for HttpEnvironment {
    async fn location_and_weather(&self) -> String {
        match self.lookup().await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "Environment lookup failed");
                format!("Error obteniendo ubicación y clima: {e}")
            }
        }
    }
}

fn render(geo: &GeoResponse, weather: Option<&CurrentWeather>, has_coordinates: bool) -> String {
    let city = geo.city.as_deref().unwrap_or("Unknown");
    let country = geo.country.as_deref().unwrap_or("Unknown");
    let location = format!("Ubicación: {city}, {country}");

    match (has_coordinates, weather) {
        (false, _) => format!("{location} | Error obteniendo coordenadas"),
        (true, None) => format!("{location} | Clima: No disponible"),
        (true, Some(w)) => format!(
            "{location} | Clima: {}, {:?}°C",
            weather_description(w.weathercode),
            w.temperature
        ),
    }
}
