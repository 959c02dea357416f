use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Money value exactly as the API wrote it
///
/// The wire string is kept as-is, so no digit or trailing zero is lost however
/// long the value is. Arithmetic goes through [`Amount::to_decimal`], which
/// fails rather than round.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Amount(String);

impl Amount {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The value as a `Decimal`, or an error if it does not fit without rounding
    pub fn to_decimal(&self) -> Result<Decimal, rust_decimal::Error> {
        Decimal::from_str_exact(&self.0)
    }

    pub fn is_zero(&self) -> bool {
        self.0.bytes().all(|b| matches!(b, b'0' | b'.' | b'-'))
    }
}

impl FromStr for Amount {
    type Err = String;

    /// Accepts `-?digits(.digits)?`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unsigned = s.strip_prefix('-').unwrap_or(s);
        let (int, frac) = match unsigned.split_once('.') {
            Some((int, frac)) => (int, Some(frac)),
            None => (unsigned, None),
        };
        let digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
        if digits(int) && frac.map_or(true, digits) {
            Ok(Self(s.to_string()))
        } else {
            Err(format!("invalid decimal amount: {:?}", s))
        }
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trading account of a profile, as returned by `GET /accounts`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListAccount {
    pub id: String,
    pub currency: String,
    /// Total funds in the account
    pub balance: Amount,
    /// Funds available to withdraw or trade
    pub available: Amount,
    /// Funds on hold
    pub hold: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trading_enabled: Option<bool>,
}

/// Single account, as returned by `GET /accounts/{id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub balance: Amount,
    pub holds: Amount,
    pub available: Amount,
    pub currency: String,
}

/// Ledger entry: one increase or decrease of an account balance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountActivity {
    pub id: String,
    pub created_at: String,
    pub amount: Amount,
    /// Balance after this entry
    pub balance: Amount,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    /// Trade metadata, present for `match` and `fee` entries
    #[serde(default)]
    pub details: ActivityDetail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    /// Funds moved to or from Coinbase
    Transfer,
    /// Funds moved as a result of a trade
    Match,
    /// Fee as a result of a trade
    Fee,
    /// Fee rebate
    Rebate,
    /// Funds converted between fiat currency and a stablecoin
    Conversion,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
}

/// Funds reserved for an open order or a pending withdrawal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountHold {
    pub id: String,
    pub account_id: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    pub amount: Amount,
    #[serde(rename = "type")]
    pub hold_type: HoldType,
    /// Id of the order or transfer that created the hold
    #[serde(rename = "ref")]
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldType {
    Order,
    Transfer,
    #[serde(other)]
    Other,
}
