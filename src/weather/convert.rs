const HPA_PER_INHG: f64 = 33.8639;
const KMH_PER_MPH: f64 = 1.60934;
const MM_PER_INCH: f64 = 25.4;

/// Fahrenheit to Celsius, rounded to one decimal.
pub fn f_to_c(fahrenheit: f64) -> f64 {
    round_to((fahrenheit - 32.0) * 5.0 / 9.0, 1)
}

/// Inches of mercury to hectopascals, rounded to one decimal.
pub fn inhg_to_hpa(inhg: f64) -> f64 {
    round_to(inhg * HPA_PER_INHG, 1)
}

/// Miles per hour to kilometers per hour, rounded to one decimal.
pub fn mph_to_kmh(mph: f64) -> f64 {
    round_to(mph * KMH_PER_MPH, 1)
}

/// Inches to millimeters, rounded to one decimal.
pub fn inch_to_mm(inch: f64) -> f64 {
    round_to(inch * MM_PER_INCH, 1)
}

/// Rounds to `decimals` places, ties away from zero. NaN and infinities pass through.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}
