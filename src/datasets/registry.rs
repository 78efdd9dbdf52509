//! Regional Internet Registries.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the five Regional Internet Registries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Registry {
    RipeNcc,
    Apnic,
    Arin,
    Afrinic,
    Lacnic,
}

impl Registry {
    /// All registries, in the order their extended-stats files are ingested
    pub fn all() -> [Registry; 5] {
        [
            Registry::RipeNcc,
            Registry::Apnic,
            Registry::Arin,
            Registry::Afrinic,
            Registry::Lacnic,
        ]
    }

    /// Name used in extended-stats file names and as the RIR index key
    pub fn name(&self) -> &'static str {
        match self {
            Registry::RipeNcc => "ripencc",
            Registry::Apnic => "apnic",
            Registry::Arin => "arin",
            Registry::Afrinic => "afrinic",
            Registry::Lacnic => "lacnic",
        }
    }

    /// File name of the registry's extended-stats feed
    pub fn delegated_file_name(&self) -> String {
        format!("delegated-{}-extended-latest", self.name())
    }
}

impl fmt::Display for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Registry {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ripencc" | "ripe" | "ripe-ncc" => Ok(Registry::RipeNcc),
            "apnic" => Ok(Registry::Apnic),
            "arin" => Ok(Registry::Arin),
            "afrinic" => Ok(Registry::Afrinic),
            "lacnic" => Ok(Registry::Lacnic),
            _ => Err(format!(
                "Unknown registry '{}'. Valid registries: {}",
                s,
                Registry::all().map(|r| r.name()).join(", ")
            )),
        }
    }
}
