const CARDINAL_DIRECTIONS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

const SECTOR_WIDTH: f64 = 360.0 / 16.0;

/// Maps a wind direction in degrees to one of the 16 compass rose labels.
///
/// Each label covers a 22.5° sector centered on its nominal angle, so north spans
/// `[348.75, 360) ∪ [0, 11.25)`. Angles outside `[0, 360)` wrap around.
/// Returns `None` when there is no direction to report (`NaN` or infinite input).
pub fn to_cardinal(degrees: f64) -> Option<&'static str> {
    if !degrees.is_finite() {
        return None;
    }

    let normalized = degrees.rem_euclid(360.0);
    let index = ((normalized + SECTOR_WIDTH / 2.0) / SECTOR_WIDTH).floor() as usize % 16;

    Some(CARDINAL_DIRECTIONS[index])
}
