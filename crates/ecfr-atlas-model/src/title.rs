// SPDX-License-Identifier: Apache-2.0

use std::fmt::{Display, Formatter};

use chrono::NaiveDate;
use ecfr_atlas_core::{EtlError, EtlErrorCode, TITLE_COUNT};

/// CFR Title number, 1 through 50 inclusive, rendered as a short decimal
/// string everywhere it is stored or joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TitleId(u16);

impl TitleId {
    pub fn new(n: u16) -> Result<Self, EtlError> {
        if n == 0 || n > TITLE_COUNT {
            return Err(EtlError::new(
                EtlErrorCode::InvalidData,
                format!("title number out of range 1..={TITLE_COUNT}: {n}"),
            ));
        }
        Ok(Self(n))
    }

    #[must_use]
    pub fn number(self) -> u16 {
        self.0
    }

    /// Storage/join key, e.g. `"40"`.
    #[must_use]
    pub fn key(self) -> String {
        self.0.to_string()
    }
}

impl Display for TitleId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Title {
    pub number: u16,
    pub name: String,
    pub latest_amended_on: Option<NaiveDate>,
}

impl Title {
    #[must_use]
    pub fn id(&self) -> TitleId {
        // Constructed only through enumerate(), which stays in range.
        TitleId(self.number)
    }

    /// The 50 Titles enumerated per snapshot run. Several are reserved
    /// upstream and will 404; the fetcher reports those as NotFound.
    #[must_use]
    pub fn enumerate() -> Vec<Title> {
        (1..=TITLE_COUNT)
            .map(|n| Title {
                number: n,
                name: format!("Title {n}"),
                latest_amended_on: None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enumerate_yields_all_fifty() {
        let titles = Title::enumerate();
        assert_eq!(titles.len(), 50);
        assert_eq!(titles[0].id().key(), "1");
        assert_eq!(titles[49].id().key(), "50");
    }

    #[test]
    fn out_of_range_numbers_are_rejected() {
        assert!(TitleId::new(0).is_err());
        assert!(TitleId::new(51).is_err());
        assert_eq!(TitleId::new(40).expect("valid").key(), "40");
    }
}
