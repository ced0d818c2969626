//! Amounts on the XRP Ledger: native drops, currency codes and issued values

use bigdecimal::{BigDecimal, ToPrimitive};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::Address;

/// Number of drops in one XRP
pub const DROPS_PER_XRP: u64 = 1_000_000;

/// Largest native amount the ledger accepts (100 billion XRP), in drops
pub const MAX_DROPS: u64 = 100_000_000_000 * DROPS_PER_XRP;

/// Errors raised while building or parsing amounts
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AmountError {
    #[error("Invalid XRP amount: {0}")]
    InvalidXrp(String),
    #[error("Invalid issued value: {0}")]
    InvalidValue(String),
    #[error("Invalid currency code: {0}")]
    InvalidCurrency(String),
}

/// Native amount expressed in the indivisible base unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Drops(pub u64);

impl Drops {
    /// Convert an XRP value to drops.
    ///
    /// The value must be non-negative, a whole number of drops, and no larger
    /// than the total supply.
    pub fn from_xrp(xrp: &BigDecimal) -> Result<Self, AmountError> {
        if *xrp < BigDecimal::from(0) {
            return Err(AmountError::InvalidXrp(format!("{} is negative", xrp)));
        }

        let drops = xrp * &BigDecimal::from(DROPS_PER_XRP);
        if drops.with_scale(0) != drops {
            return Err(AmountError::InvalidXrp(format!(
                "{} XRP is not a whole number of drops",
                xrp
            )));
        }

        match drops.to_u64() {
            Some(value) if value <= MAX_DROPS => Ok(Drops(value)),
            _ => Err(AmountError::InvalidXrp(format!(
                "{} XRP exceeds the maximum supply",
                xrp
            ))),
        }
    }

    /// Convert back to XRP with exactly six decimal places of scale
    pub fn to_xrp(self) -> BigDecimal {
        BigDecimal::new(self.0.into(), 6)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Drops {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Drops {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Drops)
            .map_err(|_| AmountError::InvalidXrp(format!("'{}' is not a drop count", s)))
    }
}

/// Convert an XRP amount to drops
pub fn xrp_to_drops(xrp: &BigDecimal) -> Result<Drops, AmountError> {
    Drops::from_xrp(xrp)
}

/// Convert drops to an XRP amount
pub fn drops_to_xrp(drops: Drops) -> BigDecimal {
    drops.to_xrp()
}

/// Render a decimal without trailing fractional zeros ("10.500000" -> "10.5")
pub fn format_decimal(value: &BigDecimal) -> String {
    let rendered = value.to_string();
    if rendered.contains('.') && !rendered.contains(['e', 'E']) {
        rendered
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    } else {
        rendered
    }
}

/// Hex-encode a UTF-8 string the way the ledger expects URIs and memos
pub fn str_to_hex(value: &str) -> String {
    hex::encode_upper(value.as_bytes())
}

/// Decode a hex string produced by [`str_to_hex`]
pub fn hex_to_str(value: &str) -> Option<String> {
    let bytes = hex::decode(value).ok()?;
    String::from_utf8(bytes).ok()
}

/// Currency code of an issued asset.
///
/// Standard codes are three ASCII characters other than `XRP`. Anything else
/// travels as 40 hex characters (160 bits).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn new(code: &str) -> Result<Self, AmountError> {
        let code = code.trim();

        if code.len() == 3 {
            if code.eq_ignore_ascii_case("XRP") {
                return Err(AmountError::InvalidCurrency(
                    "XRP is the native asset and cannot be issued".to_string(),
                ));
            }
            let allowed = |c: char| {
                c.is_ascii_alphanumeric() || "?!@#$%^&*<>(){}[]|".contains(c)
            };
            if !code.chars().all(allowed) {
                return Err(AmountError::InvalidCurrency(format!(
                    "'{}' contains characters not allowed in a standard code",
                    code
                )));
            }
            return Ok(Self(code.to_string()));
        }

        if code.len() == 40 && code.chars().all(|c| c.is_ascii_hexdigit()) {
            // A non-standard code must not start with the zero byte
            if code.starts_with("00") {
                return Err(AmountError::InvalidCurrency(format!(
                    "'{}' uses the reserved standard-code prefix",
                    code
                )));
            }
            return Ok(Self(code.to_ascii_uppercase()));
        }

        Err(AmountError::InvalidCurrency(format!(
            "'{}' must be three characters or 40 hex digits",
            code
        )))
    }

    /// Encode a longer ticker (4 to 20 bytes) as a non-standard hex code
    pub fn from_ticker(ticker: &str) -> Result<Self, AmountError> {
        if ticker.len() == 3 {
            return Self::new(ticker);
        }
        if ticker.len() < 4 || ticker.len() > 20 {
            return Err(AmountError::InvalidCurrency(format!(
                "ticker '{}' must be between 4 and 20 bytes",
                ticker
            )));
        }
        let mut encoded = str_to_hex(ticker);
        while encoded.len() < 40 {
            encoded.push('0');
        }
        Self::new(&encoded)
    }

    /// Code as it appears on the wire
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Human-readable form: hex codes are decoded when they hold printable text
    pub fn display_name(&self) -> String {
        if self.0.len() == 40 {
            if let Some(text) = hex_to_str(&self.0) {
                let trimmed = text.trim_end_matches('\0');
                if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_graphic()) {
                    return trimmed.to_string();
                }
            }
        }
        self.0.clone()
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

impl FromStr for CurrencyCode {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Parse a decimal string without going through floating point
pub fn parse_value(value: &str) -> Result<BigDecimal, AmountError> {
    BigDecimal::from_str(value.trim())
        .map_err(|_| AmountError::InvalidValue(format!("'{}' is not a decimal number", value)))
}

/// Amount of an issued currency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuedAmount {
    pub currency: CurrencyCode,
    pub issuer: Address,
    pub value: BigDecimal,
}

impl IssuedAmount {
    pub fn new(currency: CurrencyCode, issuer: Address, value: BigDecimal) -> Self {
        Self {
            currency,
            issuer,
            value,
        }
    }

    /// Value as the decimal string sent on the wire
    pub fn value_string(&self) -> String {
        self.value.to_string()
    }
}

/// Either native XRP (in drops) or an issued currency amount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Amount {
    Xrp(Drops),
    Issued(IssuedAmount),
}

impl Amount {
    /// Native amount from an XRP value
    pub fn xrp(xrp: &BigDecimal) -> Result<Self, AmountError> {
        Ok(Amount::Xrp(Drops::from_xrp(xrp)?))
    }

    pub fn issued(currency: CurrencyCode, issuer: Address, value: BigDecimal) -> Self {
        Amount::Issued(IssuedAmount::new(currency, issuer, value))
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Amount::Xrp(_))
    }

    /// Whether the amount is strictly greater than zero
    pub fn is_positive(&self) -> bool {
        match self {
            Amount::Xrp(drops) => drops.0 > 0,
            Amount::Issued(issued) => issued.value > BigDecimal::from(0),
        }
    }

    /// Wire representation: drops as a string, or a currency/issuer/value object
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Amount::Xrp(drops) => serde_json::Value::String(drops.to_string()),
            Amount::Issued(issued) => serde_json::json!({
                "currency": issued.currency.as_str(),
                "issuer": issued.issuer.as_str(),
                "value": issued.value_string(),
            }),
        }
    }

    /// Parse the wire representation used in ledger responses
    pub fn from_json(value: &serde_json::Value) -> Result<Self, AmountError> {
        match value {
            serde_json::Value::String(drops) => Ok(Amount::Xrp(drops.parse()?)),
            serde_json::Value::Object(fields) => {
                let field = |name: &str| {
                    fields
                        .get(name)
                        .and_then(|v| v.as_str())
                        .ok_or_else(|| AmountError::InvalidValue(format!("missing '{}'", name)))
                };
                let currency = CurrencyCode::new(field("currency")?)?;
                let issuer = Address::parse(field("issuer")?)
                    .map_err(|e| AmountError::InvalidValue(e.to_string()))?;
                let value = parse_value(field("value")?)?;
                Ok(Amount::issued(currency, issuer, value))
            }
            other => Err(AmountError::InvalidValue(format!(
                "unexpected amount shape: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Amount::Xrp(drops) => write!(f, "{} XRP", format_decimal(&drops.to_xrp())),
            Amount::Issued(issued) => write!(
                f,
                "{} {} (issuer {})",
                issued.value_string(),
                issued.currency,
                issued.issuer
            ),
        }
    }
}
