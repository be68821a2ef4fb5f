//! Suite families: named task corpora selectable at runtime.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A named corpus of task definitions.
///
/// The set of families is a static table; an unknown key is a configuration
/// error, never a silent fallback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuiteFamily {
    /// The primary MoBench corpus.
    #[default]
    MobileWorld,
    /// Ported AndroidWorld-style tasks.
    AndroidWorld,
}

impl SuiteFamily {
    /// All known families, for listings and validation messages.
    pub const ALL: [SuiteFamily; 2] = [Self::MobileWorld, Self::AndroidWorld];

    /// Stable string key used on the wire and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MobileWorld => "mobile_world",
            Self::AndroidWorld => "android_world",
        }
    }
}

impl fmt::Display for SuiteFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SuiteFamily {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mobile_world" => Ok(Self::MobileWorld),
            "android_world" => Ok(Self::AndroidWorld),
            other => Err(ConfigError::UnknownSuiteFamily(other.to_string())),
        }
    }
}
