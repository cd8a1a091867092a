// SPDX-License-Identifier: Apache-2.0

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::NaiveDate;

use crate::error::{EtlError, EtlErrorCode};

const SNAPSHOT_FORMAT: &str = "%Y-%m-%d";

/// Dated snapshot partition key, rendered as `YYYY-MM-DD`.
///
/// Archive prefixes that do not parse with this format are not snapshots
/// and must be ignored during discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SnapshotDate(NaiveDate);

impl SnapshotDate {
    #[must_use]
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    #[must_use]
    pub fn today() -> Self {
        Self(chrono::Utc::now().date_naive())
    }

    pub fn parse(raw: &str) -> Result<Self, EtlError> {
        NaiveDate::parse_from_str(raw, SNAPSHOT_FORMAT)
            .map(Self)
            .map_err(|_| {
                EtlError::new(
                    EtlErrorCode::InvalidData,
                    format!("invalid snapshot date: {raw}"),
                )
            })
    }

    #[must_use]
    pub fn date(self) -> NaiveDate {
        self.0
    }
}

impl Display for SnapshotDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format(SNAPSHOT_FORMAT))
    }
}

impl FromStr for SnapshotDate {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl serde::Serialize for SnapshotDate {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for SnapshotDate {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = <String as serde::Deserialize>::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::SnapshotDate;

    #[test]
    fn parse_and_render_round_trip() {
        let d = SnapshotDate::parse("2024-01-31").expect("parse");
        assert_eq!(d.to_string(), "2024-01-31");
    }

    #[test]
    fn unparseable_names_are_rejected() {
        assert!(SnapshotDate::parse("latest").is_err());
        assert!(SnapshotDate::parse("2024-13-01").is_err());
        assert!(SnapshotDate::parse("2024-01-31T00:00:00Z").is_err());
    }

    #[test]
    fn ordering_follows_the_calendar() {
        let a = SnapshotDate::parse("2023-12-31").expect("a");
        let b = SnapshotDate::parse("2024-01-01").expect("b");
        assert!(a < b);
    }
}
