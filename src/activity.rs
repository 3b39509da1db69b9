//! Activity catalog
//!
//! The closed set of habits a user can check in for. Stores persist whatever
//! code they are handed; validation against this catalog happens at the API
//! boundary.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TrackerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activity {
    /// Reading research papers
    Paper,
    Fitness,
    /// Algorithm practice
    Algorithm,
    /// Quant interview preparation
    Quant,
}

impl Activity {
    /// Catalog order, as shown to users
    pub const ALL: [Activity; 4] = [
        Activity::Paper,
        Activity::Fitness,
        Activity::Algorithm,
        Activity::Quant,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Activity::Paper => "paper",
            Activity::Fitness => "fitness",
            Activity::Algorithm => "algorithm",
            Activity::Quant => "quant",
        }
    }

    pub fn glyph(&self) -> &'static str {
        match self {
            Activity::Paper => "📄",
            Activity::Fitness => "💪",
            Activity::Algorithm => "💻",
            Activity::Quant => "📈",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Activity::Paper => "Paper Reading",
            Activity::Fitness => "Fitness",
            Activity::Algorithm => "Algorithm Practice",
            Activity::Quant => "Quant Interview Prep",
        }
    }

    /// Catalog entry for a stored code, `None` for codes outside the catalog.
    pub fn lookup(code: &str) -> Option<Activity> {
        Self::ALL.into_iter().find(|a| a.code() == code)
    }
}

impl FromStr for Activity {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Activity::lookup(s).ok_or_else(|| {
            TrackerError::InvalidInput(format!("unknown activity '{}'", s))
        })
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
