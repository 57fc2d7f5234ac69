use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SecretError;

/// The fixed set of lifetimes a secret may be stored for.
///
/// Clients pick a label; arbitrary durations are never accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ttl {
    Hour,
    #[default]
    Day,
    Week,
}

impl Ttl {
    pub const ALL: [Ttl; 3] = [Ttl::Hour, Ttl::Day, Ttl::Week];

    pub fn as_secs(self) -> u64 {
        match self {
            Self::Hour => 3_600,
            Self::Day => 86_400,
            Self::Week => 604_800,
        }
    }

    pub fn as_duration(self) -> Duration {
        Duration::from_secs(self.as_secs())
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
        }
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Ttl {
    type Err = SecretError;

    /// Labels are matched case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hour" => Ok(Self::Hour),
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            _ => Err(SecretError::validation(format!(
                "ttl must be one of hour, day, week (got {s:?})"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_match_table() {
        assert_eq!(Ttl::Hour.as_secs(), 3600);
        assert_eq!(Ttl::Day.as_secs(), 86400);
        assert_eq!(Ttl::Week.as_secs(), 604800);
    }

    #[test]
    fn parses_labels_case_insensitively() {
        assert_eq!("hour".parse::<Ttl>().unwrap(), Ttl::Hour);
        assert_eq!("Day".parse::<Ttl>().unwrap(), Ttl::Day);
        assert_eq!("WEEK".parse::<Ttl>().unwrap(), Ttl::Week);
    }

    #[test]
    fn rejects_labels_outside_allow_list() {
        for bad in ["", "month", "3600", "1h", "minute"] {
            assert!(matches!(
                bad.parse::<Ttl>(),
                Err(SecretError::Validation(_))
            ));
        }
    }

    #[test]
    fn label_round_trips_through_parse() {
        for ttl in Ttl::ALL {
            assert_eq!(ttl.label().parse::<Ttl>().unwrap(), ttl);
        }
    }
}
