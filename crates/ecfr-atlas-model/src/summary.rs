// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use ecfr_atlas_core::{EtlError, EtlErrorCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryKind {
    Agency,
    Title,
    Section,
}

impl SummaryKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Agency => "agency",
            Self::Title => "title",
            Self::Section => "section",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, EtlError> {
        match raw {
            "agency" => Ok(Self::Agency),
            "title" => Ok(Self::Title),
            "section" => Ok(Self::Section),
            other => Err(EtlError::new(
                EtlErrorCode::InvalidData,
                format!("unknown summary kind: {other}"),
            )),
        }
    }
}

/// Text produced by the external summarizer, keyed on `(kind, key)`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Summary {
    pub kind: SummaryKind,
    pub key: String,
    pub text: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::SummaryKind;

    #[test]
    fn kind_round_trips_through_strings() {
        for kind in [SummaryKind::Agency, SummaryKind::Title, SummaryKind::Section] {
            assert_eq!(SummaryKind::parse(kind.as_str()).expect("parse"), kind);
        }
        assert!(SummaryKind::parse("chapter").is_err());
    }
}
