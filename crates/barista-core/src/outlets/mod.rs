//! Outlet data: the records, their SQLite store and the natural-language
//! query engine over it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::AgentError;

pub mod query;
pub mod store;

pub use query::{validate_select, OutletAnswer, OutletQa, SqlQueryEngine};
pub use store::OutletStore;

pub const DEFAULT_OPERATING_HOURS: &str = "8:00 AM - 10:00 PM Daily";
pub const UNKNOWN_STATE: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutletStatus {
    Open,
    Closed,
}

impl OutletStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutletStatus::Open => "Open",
            OutletStatus::Closed => "Closed",
        }
    }
}

impl fmt::Display for OutletStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutletStatus {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Open" => Ok(OutletStatus::Open),
            "Closed" => Ok(OutletStatus::Closed),
            other => Err(AgentError::ParsingError(format!(
                "unknown outlet status '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutletRecord {
    pub name: String,
    pub address: String,
    /// A known state name, or "N/A" when the address names none.
    pub state: String,
    pub status: OutletStatus,
    pub operating_hours: String,
}

impl OutletRecord {
    /// A listed outlet with the state inferred from its address, open with the
    /// default hours.
    pub fn from_listing(name: impl Into<String>, address: impl Into<String>) -> Self {
        let address = address.into();
        Self {
            name: name.into(),
            state: infer_state(&address).to_string(),
            address,
            status: OutletStatus::Open,
            operating_hours: DEFAULT_OPERATING_HOURS.to_string(),
        }
    }
}

/// State of an outlet from an explicit mention in its address.
///
/// "Kuala Lumpur" is checked before "Selangor", case-insensitively. Postcodes
/// are not used; an address naming neither state gives "N/A".
pub fn infer_state(address: &str) -> &'static str {
    let address = address.to_lowercase();
    if address.contains("kuala lumpur") {
        "Kuala Lumpur"
    } else if address.contains("selangor") {
        "Selangor"
    } else {
        UNKNOWN_STATE
    }
}
