//! Catalog types shared by every component: the supported currencies, the
//! fee directions and the identifiers derived from a selection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const LOCKING_UNIT: &str = "sat/kb";
pub const UNLOCKING_UNIT: &str = "total sats";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

/// Foreign chains whose fees can be managed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Btc,
    Ltc,
    Doge,
    Dgb,
    Rvn,
    Arrr,
}

impl Currency {
    pub const ALL: [Currency; 6] = [
        Currency::Btc,
        Currency::Ltc,
        Currency::Doge,
        Currency::Dgb,
        Currency::Rvn,
        Currency::Arrr,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            Currency::Btc => "BTC",
            Currency::Ltc => "LTC",
            Currency::Doge => "DOGE",
            Currency::Dgb => "DGB",
            Currency::Rvn => "RVN",
            Currency::Arrr => "ARRR",
        }
    }

    /// Lowercased symbol, as the fee authority expects it.
    pub fn coin_param(self) -> &'static str {
        match self {
            Currency::Btc => "btc",
            Currency::Ltc => "ltc",
            Currency::Doge => "doge",
            Currency::Dgb => "dgb",
            Currency::Rvn => "rvn",
            Currency::Arrr => "arrr",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Currency {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::ALL
            .into_iter()
            .find(|c| c.symbol().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownVariant {
                kind: "currency",
                value: s.to_string(),
            })
    }
}

/// Which side of a trade the fee applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Locking,
    Unlocking,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::Locking, Direction::Unlocking];

    pub fn label(self) -> &'static str {
        match self {
            Direction::Locking => "LOCKING",
            Direction::Unlocking => "UNLOCKING",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Direction::Locking => LOCKING_UNIT,
            Direction::Unlocking => UNLOCKING_UNIT,
        }
    }

    pub fn fee_field(self, unlocking: UnlockingField) -> FeeField {
        match (self, unlocking) {
            (Direction::Locking, _) => FeeField::FeeKb,
            (Direction::Unlocking, UnlockingField::Required) => FeeField::FeeRequired,
            (Direction::Unlocking, UnlockingField::Ceiling) => FeeField::FeeCeiling,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Direction {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Direction::ALL
            .into_iter()
            .find(|d| d.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownVariant {
                kind: "direction",
                value: s.to_string(),
            })
    }
}

/// Which remote field backs the unlocking direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnlockingField {
    #[default]
    Required,
    Ceiling,
}

/// Remote field names understood by the fee authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeeField {
    FeeKb,
    FeeRequired,
    FeeCeiling,
}

impl FeeField {
    pub fn as_str(self) -> &'static str {
        match self {
            FeeField::FeeKb => "feekb",
            FeeField::FeeRequired => "feerequired",
            FeeField::FeeCeiling => "feeceiling",
        }
    }
}

impl fmt::Display for FeeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selection {
    pub currency: Currency,
    pub direction: Direction,
}

impl Selection {
    pub fn new(currency: Currency, direction: Direction) -> Self {
        Self {
            currency,
            direction,
        }
    }

    pub fn record_key(&self) -> RecordKey {
        RecordKey::new(self.currency, self.direction)
    }

    pub fn unit(&self) -> &'static str {
        self.direction.unit()
    }
}

/// Content-store identifier derived from a selection, e.g. `btc-LOCKING`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey(String);

impl RecordKey {
    pub fn new(currency: Currency, direction: Direction) -> Self {
        Self(format!("{}-{}", currency.coin_param(), direction.label()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub address: String,
    pub registered_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountName {
    pub name: String,
}

/// A pending fee transaction awaiting the account's signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObligationSummary {
    #[serde(default)]
    pub at_address: String,
    #[serde(default)]
    pub fee: u64,
    #[serde(default)]
    pub timestamp: u64,
}
