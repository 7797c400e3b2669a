//! Ambient environment port: location, weather and time of day.

use chrono::{Local, NaiveDateTime, Timelike};

/// Source of the real-world context the recommendation tools describe.
///
/// Implementations never fail: problems are reported in the returned text.
pub trait EnvironmentProvider: Send + Sync {
    /// `"Ubicación: {city}, {country} | Clima: {description}, {temp}°C"` or an error sentence.
    fn location_and_weather(&self) -> impl std::future::Future<Output = String> + Send;

    /// Weekday, clock time and part of the day for the local clock.
    fn time_context(&self) -> String {
        describe_time(Local::now().naive_local())
    }
}

/// `mañana` for 05-11, `tarde` for 12-17, `noche` otherwise.
pub fn time_period(hour: u32) -> &'static str {
    match hour {
        5..=11 => "mañana",
        12..=17 => "tarde",
        _ => "noche",
    }
}

/// Render as `"{Weekday}, {h}:{mm} ({period})"`.
pub fn describe_time(now: NaiveDateTime) -> String {
    format!(
        "{}, {}:{:02} ({})",
        now.format("%A"),
        now.hour(),
        now.minute(),
        time_period(now.hour())
    )
}

/// Spanish description of a WMO weather code as reported by open-meteo.
pub fn weather_description(code: i64) -> &'static str {
    match code {
        0 => "despejado",
        1 => "mayormente despejado",
        2 => "parcialmente nublado",
        3 => "nublado",
        45 => "niebla",
        48 => "niebla helada",
        51 => "llovizna ligera",
        53 => "llovizna moderada",
        55 => "llovizna densa",
        61 => "lluvia ligera",
        63 => "lluvia moderada",
        65 => "lluvia intensa",
        71 => "nieve ligera",
        73 => "nieve moderada",
        75 => "nieve intensa",
        77 => "granizo",
        80 => "chubascos ligeros",
        81 => "chubascos moderados",
        82 => "chubascos intensos",
        85 => "chubascos de nieve ligeros",
        86 => "chubascos de nieve intensos",
        95 => "tormenta eléctrica",
        96 => "tormenta con granizo ligero",
        99 => "tormenta con granizo intenso",
        _ => "condiciones variables",
    }
}
