use std::{fmt::Display, str::FromStr};

use serde::{de, Deserialize, Deserializer};

/// A byte quantity written the way yt-dlp expects it, e.g. `100K` or `10M`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRate {
    value: u32,
    unit: Unit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Bytes,
    Kilo,
    Mega,
}

impl FromStr for ByteRate {
    type Err = Box<dyn std::error::Error + Sync + Send>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        let (num, unit) = if let Some(num) = s.strip_suffix('k') {
            (num, Unit::Kilo)
        } else if let Some(num) = s.strip_suffix('m') {
            (num, Unit::Mega)
        } else {
            (s.as_str(), Unit::Bytes)
        };

        if num.is_empty() {
            return Err(Box::from("Rate has no numeric part"));
        }

        Ok(Self {
            value: num.parse()?,
            unit,
        })
    }
}

impl Display for ByteRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.unit {
            Unit::Bytes => write!(f, "{}", self.value),
            Unit::Kilo => write!(f, "{}K", self.value),
            Unit::Mega => write!(f, "{}M", self.value),
        }
    }
}

impl<'de> Deserialize<'de> for ByteRate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
