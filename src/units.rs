//! # Unit conversions
//! Pure helpers used by the popup projection. Upstream services report metric
//! units (°C, km/h); the map UI displays imperial ones.

const KM_PER_MILE: f64 = 1.609_344_6;

/// Celsius → Fahrenheit.
pub fn c_to_f(c: f64) -> f64 {
    c * 9.0 / 5.0 + 32.0
}

/// Fahrenheit → Celsius.
pub fn f_to_c(f: f64) -> f64 {
    (f - 32.0) * 5.0 / 9.0
}

/// Kilometres per hour → miles per hour.
pub fn kph_to_mph(kph: f64) -> f64 {
    kph / KM_PER_MILE
}

/// Fixed one-decimal display, e.g. `68.0`.
pub fn one_decimal(x: f64) -> String {
    format!("{:.1}", x)
}
