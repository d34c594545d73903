use serde::{Deserialize, Serialize};
use std::fmt;

/// Compliance label with total order `Unsat < Partial < Sat`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Label {
    Unsat,
    Partial,
    Sat,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unsat => "UNSAT",
            Self::Partial => "PARTIAL",
            Self::Sat => "SAT",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
