use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical weather condition taxonomy every provider vocabulary maps into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Clear,
    MostlyClear,
    PartlyCloudy,
    Cloudy,
    Overcast,
    Fog,
    Drizzle,
    LightRain,
    Rain,
    HeavyRain,
    Showers,
    Thunderstorm,
    Sleet,
    Snow,
    /// Placeholder when no step of the inference chain produced a condition
    #[default]
    Unavailable,
}

impl Condition {
    /// Get a human-readable description
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Clear => "Clear",
            Self::MostlyClear => "Mostly clear",
            Self::PartlyCloudy => "Partly cloudy",
            Self::Cloudy => "Cloudy",
            Self::Overcast => "Overcast",
            Self::Fog => "Fog",
            Self::Drizzle => "Drizzle",
            Self::LightRain => "Light rain",
            Self::Rain => "Rain",
            Self::HeavyRain => "Heavy rain",
            Self::Showers => "Showers",
            Self::Thunderstorm => "Thunderstorm",
            Self::Sleet => "Sleet",
            Self::Snow => "Snow",
            Self::Unavailable => "Condition unavailable",
        }
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        *self != Self::Unavailable
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unavailable() {
        assert_eq!(Condition::default(), Condition::Unavailable);
        assert!(!Condition::Unavailable.is_available());
        assert!(Condition::Rain.is_available());
    }

    #[test]
    fn test_serialized_names() {
        let json = serde_json::to_string(&Condition::PartlyCloudy).unwrap();
        assert_eq!(json, "\"partly_cloudy\"");
        assert_eq!(Condition::Unavailable.to_string(), "Condition unavailable");
    }
}
