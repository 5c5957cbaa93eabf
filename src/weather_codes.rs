//! WMO weather interpretation codes, as reported by Open-Meteo in
//! `current_weather.weathercode`.

pub const UNKNOWN_WEATHER: &str = "Unknown";

static WEATHER_CODES: &[(u16, &str)] = &[
    (0, "Clear sky ☀️"),
    (1, "Mainly clear 🌤️"),
    (2, "Partly cloudy ⛅"),
    (3, "Overcast ☁️"),
    (45, "Fog 🌫️"),
    (48, "Depositing rime fog 🌫️❄️"),
    (51, "Light drizzle 🌦️"),
    (53, "Moderate drizzle 🌦️"),
    (55, "Dense drizzle 🌧️"),
    (56, "Light freezing drizzle 🌧️❄️"),
    (57, "Dense freezing drizzle 🌧️❄️"),
    (61, "Slight rain 🌧️"),
    (63, "Moderate rain 🌧️"),
    (65, "Heavy rain 🌧️🌧️"),
    (66, "Light freezing rain 🌧️❄️"),
    (67, "Heavy freezing rain 🌧️❄️❄️"),
    (71, "Slight snow 🌨️"),
    (73, "Moderate snow 🌨️🌨️"),
    (75, "Heavy snow ❄️❄️❄️"),
    (77, "Snow grains ❄️"),
    (80, "Slight rain showers 🌦️"),
    (81, "Moderate rain showers 🌦️🌦️"),
    (82, "Violent rain showers 🌧️🌧️"),
    (85, "Slight snow showers 🌨️"),
    (86, "Heavy snow showers ❄️❄️"),
    (95, "Thunderstorm ⛈️"),
    (96, "Thunderstorm with slight hail ⛈️🌨️"),
    (99, "Thunderstorm with heavy hail ⛈️🌨️❄️"),
];

/// Human description for a weather code; `"Unknown"` when unmapped.
pub fn describe(code: i64) -> &'static str {
    WEATHER_CODES
        .iter()
        .find(|(c, _)| i64::from(*c) == code)
        .map(|(_, d)| *d)
        .unwrap_or(UNKNOWN_WEATHER)
}
