use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MeteoError;

/// Identity of a registered forecast source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProviderId {
    #[serde(rename = "open_meteo")]
    OpenMeteo,
    #[serde(rename = "ilmeteo")]
    IlMeteo,
    #[serde(rename = "3bmeteo")]
    ThreeBMeteo,
    #[serde(rename = "meteo_it")]
    MeteoIt,
}

impl ProviderId {
    pub const ALL: [ProviderId; 4] = [
        ProviderId::OpenMeteo,
        ProviderId::IlMeteo,
        ProviderId::ThreeBMeteo,
        ProviderId::MeteoIt,
    ];

    /// Stable machine name, also used in config and query strings
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenMeteo => "open_meteo",
            ProviderId::IlMeteo => "ilmeteo",
            ProviderId::ThreeBMeteo => "3bmeteo",
            ProviderId::MeteoIt => "meteo_it",
        }
    }

    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderId::OpenMeteo => "Open-Meteo",
            ProviderId::IlMeteo => "IlMeteo",
            ProviderId::ThreeBMeteo => "3BMeteo",
            ProviderId::MeteoIt => "Meteo.it",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for ProviderId {
    type Err = MeteoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        ProviderId::ALL
            .into_iter()
            .find(|id| id.as_str() == wanted || id.display_name().to_lowercase() == wanted)
            .ok_or_else(|| MeteoError::config(format!("Unknown provider '{s}'")))
    }
}

/// Who was asked and who actually answered
///
/// An adapter that hands an out-of-range request to another adapter reports
/// itself as `source` and the answering adapter as `served_by`, so the
/// substitution stays visible to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribution {
    pub source: ProviderId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub served_by: Option<ProviderId>,
}

impl Attribution {
    #[must_use]
    pub fn direct(source: ProviderId) -> Self {
        Self {
            source,
            served_by: None,
        }
    }

    /// Re-label an answer produced by `delegate` on behalf of `source`
    #[must_use]
    pub fn delegated(source: ProviderId, delegate: Attribution) -> Self {
        Self {
            source,
            served_by: Some(delegate.served_by.unwrap_or(delegate.source)),
        }
    }

    #[must_use]
    pub fn is_delegated(&self) -> bool {
        self.served_by.is_some_and(|s| s != self.source)
    }
}

impl fmt::Display for Attribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.served_by {
            Some(delegate) if delegate != self.source => {
                write!(f, "{} (via {})", self.source, delegate)
            }
            _ => write!(f, "{}", self.source),
        }
    }
}
