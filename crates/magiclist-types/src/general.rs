use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

/// Booking state of a show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ShowStatus {
    #[serde(rename = "confirmado")]
    Confirmed,
    #[default]
    #[serde(rename = "negociacao")]
    Negotiation,
    #[serde(rename = "reservado")]
    Reserved,
    #[serde(rename = "cancelado")]
    Cancelled,
}

impl ShowStatus {
    pub const ALL: [ShowStatus; 4] = [
        ShowStatus::Confirmed,
        ShowStatus::Negotiation,
        ShowStatus::Reserved,
        ShowStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ShowStatus::Confirmed => "confirmado",
            ShowStatus::Negotiation => "negociacao",
            ShowStatus::Reserved => "reservado",
            ShowStatus::Cancelled => "cancelado",
        }
    }
}

impl Display for ShowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid show status: {0}")]
pub struct InvalidShowStatus(pub String);

impl FromStr for ShowStatus {
    type Err = InvalidShowStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "confirmado" => Ok(ShowStatus::Confirmed),
            "negociacao" | "negociação" => Ok(ShowStatus::Negotiation),
            "reservado" => Ok(ShowStatus::Reserved),
            "cancelado" => Ok(ShowStatus::Cancelled),
            _ => Err(InvalidShowStatus(s.to_string())),
        }
    }
}
