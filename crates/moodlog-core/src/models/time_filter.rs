use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Window used by the stats screen
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimeFilter {
    OneDay,
    SevenDays,
    ThirtyDays,
    AllTime,
}

impl Default for TimeFilter {
    fn default() -> Self {
        Self::SevenDays
    }
}

impl TimeFilter {
    /// Window length, `None` for all time
    pub fn seconds(&self) -> Option<i64> {
        match self {
            Self::OneDay => Some(86400),
            Self::SevenDays => Some(604800),
            Self::ThirtyDays => Some(2592000),
            Self::AllTime => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::OneDay => "1d",
            Self::SevenDays => "7d",
            Self::ThirtyDays => "30d",
            Self::AllTime => "all",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "1d" | "day" => Some(Self::OneDay),
            "7d" | "week" => Some(Self::SevenDays),
            "30d" | "month" => Some(Self::ThirtyDays),
            "all" => Some(Self::AllTime),
            _ => None,
        }
    }

    pub fn cycle_next(current: Self) -> Self {
        match current {
            Self::OneDay => Self::SevenDays,
            Self::SevenDays => Self::ThirtyDays,
            Self::ThirtyDays => Self::AllTime,
            Self::AllTime => Self::OneDay,
        }
    }

    /// Lower bound of the window ending at `now`
    pub fn since(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.seconds().map(|secs| now - Duration::seconds(secs))
    }
}

impl std::str::FromStr for TimeFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("{} is not a window. Use 1d, 7d, 30d or all.", s))
    }
}
