use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct WundergroundConfig {
    /// Raw switch for relaying every upload to Weather Underground, read through
    /// [`WundergroundConfig::enabled`].
    pub forward: String,
    /// Station ID replacing the `ID` parameter the station sent. Empty keeps it.
    pub username: String,
    /// Station key replacing the `PASSWORD` parameter the station sent. Empty keeps it.
    pub password: String,
}

impl WundergroundConfig {
    /// `true`, `1` and `yes` in any case switch relaying on. Anything else leaves it off.
    pub fn enabled(&self) -> bool {
        matches!(
            self.forward.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes"
        )
    }
}
