//! Day addressing shared by every provider

use chrono::{DateTime, Duration, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Distance in days from "today" in the reference timezone (0 = today)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct DayOffset(u8);

impl DayOffset {
    pub const TODAY: DayOffset = DayOffset(0);

    #[must_use]
    pub const fn new(days: u8) -> Self {
        Self(days)
    }

    #[must_use]
    pub const fn days(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn is_today(self) -> bool {
        self.0 == 0
    }

    /// Calendar date this offset designates, counted from `now`'s local date
    #[must_use]
    pub fn date<Tz: TimeZone>(self, now: &DateTime<Tz>) -> NaiveDate {
        now.date_naive() + Duration::days(i64::from(self.0))
    }
}

impl From<u8> for DayOffset {
    fn from(days: u8) -> Self {
        Self(days)
    }
}

impl fmt::Display for DayOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{}d", self.0)
    }
}

/// Coarse day-part bucket used when a source has no hour-by-hour data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayPart {
    Night,
    Morning,
    Afternoon,
    Evening,
}

impl DayPart {
    pub const ALL: [DayPart; 4] = [
        DayPart::Night,
        DayPart::Morning,
        DayPart::Afternoon,
        DayPart::Evening,
    ];

    /// Representative hour label the bucket is reported under
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            DayPart::Night => "03:00",
            DayPart::Morning => "09:00",
            DayPart::Afternoon => "15:00",
            DayPart::Evening => "21:00",
        }
    }

    /// Match Italian bucket names ("notte", "mattina", "pomeriggio", "sera")
    #[must_use]
    pub fn from_italian(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase();
        if name.starts_with("nott") {
            Some(DayPart::Night)
        } else if name.starts_with("mattin") {
            Some(DayPart::Morning)
        } else if name.starts_with("pomerigg") {
            Some(DayPart::Afternoon)
        } else if name.starts_with("sera") {
            Some(DayPart::Evening)
        } else {
            None
        }
    }
}
