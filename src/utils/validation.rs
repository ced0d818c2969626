//! Validation utilities

use crate::amount::Amount;
use crate::ledger::transaction::{Intent, MAX_TRANSFER_FEE};
use crate::traits::*;
use crate::types::*;

/// Alphabet of the ledger's base58 encoding
pub const LEDGER_ALPHABET: &str = "rpshnaf39wBUDNEGHJKLM4PQRST7VWXYZ2bcdeCg65jkm8oFqi1tuvAxyz";

/// Validate the shape of a classic address.
///
/// Only the prefix, length and alphabet are checked; the checksum is left to
/// the ledger.
pub fn validate_classic_address(address: &str) -> LedgerResult<()> {
    if !address.starts_with('r') {
        return Err(LedgerError::Validation(format!(
            "Address '{}' must start with 'r'",
            address
        )));
    }

    if address.len() < 25 || address.len() > 35 {
        return Err(LedgerError::Validation(format!(
            "Address '{}' must be 25 to 35 characters long",
            address
        )));
    }

    if let Some(bad) = address.chars().find(|c| !LEDGER_ALPHABET.contains(*c)) {
        return Err(LedgerError::Validation(format!(
            "Address '{}' contains invalid character '{}'",
            address, bad
        )));
    }

    Ok(())
}

/// Validate an external identifier (phone number) used as a registry key
pub fn validate_identifier(identifier: &str) -> LedgerResult<()> {
    if identifier.trim().is_empty() {
        return Err(LedgerError::Validation(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if identifier.len() > 20 {
        return Err(LedgerError::Validation(
            "Identifier cannot exceed 20 characters".to_string(),
        ));
    }

    if !identifier
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == ' ')
    {
        return Err(LedgerError::Validation(
            "Identifier can only contain digits, letters, '+', '-' and spaces".to_string(),
        ));
    }

    Ok(())
}

/// Validate a display name
pub fn validate_username(name: &str) -> LedgerResult<()> {
    if name.trim().is_empty() {
        return Err(LedgerError::Validation(
            "Username cannot be empty".to_string(),
        ));
    }

    if name.len() > 100 {
        return Err(LedgerError::Validation(
            "Username cannot exceed 100 characters".to_string(),
        ));
    }

    Ok(())
}

/// Reduce an uploaded file name to a safe basename.
///
/// Path components are dropped, whitespace becomes `_`, and anything outside
/// ASCII letters, digits, `.`, `-` and `_` is removed. Leading dots are
/// stripped so the result is never hidden or a parent reference. Returns
/// `None` when nothing usable is left.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let cleaned: String = base
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();

    let cleaned = cleaned.trim_start_matches(['.', '_']).to_string();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Default validator: rules that hold regardless of ledger state
pub struct DefaultIntentValidator;

impl IntentValidator for DefaultIntentValidator {
    fn validate_intent(&self, account: &Address, intent: &Intent) -> Result<(), Precondition> {
        match intent {
            Intent::Payment {
                destination,
                amount,
            } => {
                if destination == account {
                    return Err(Precondition::Invalid(
                        "Cannot send a payment to yourself".to_string(),
                    ));
                }
                require_positive(amount, "Payment amount")
            }
            Intent::TrustSet { limit, .. } => {
                if &limit.issuer == account {
                    return Err(Precondition::Invalid(
                        "Cannot open a trust line to yourself".to_string(),
                    ));
                }
                if limit.value < bigdecimal::BigDecimal::from(0) {
                    return Err(Precondition::Invalid(
                        "Trust line limit cannot be negative".to_string(),
                    ));
                }
                Ok(())
            }
            Intent::OfferCreate { pay, get } => {
                require_positive(pay, "Offer pay amount")?;
                require_positive(get, "Offer get amount")?;
                if same_asset(pay, get) {
                    return Err(Precondition::Invalid(
                        "An offer cannot exchange an asset for itself".to_string(),
                    ));
                }
                Ok(())
            }
            Intent::NftMint { transfer_fee, .. } => {
                if *transfer_fee > MAX_TRANSFER_FEE {
                    return Err(Precondition::Invalid(format!(
                        "Transfer fee {} exceeds {}",
                        transfer_fee, MAX_TRANSFER_FEE
                    )));
                }
                Ok(())
            }
            Intent::NftSellOffer {
                nftoken_id,
                destination,
                ..
            } => {
                if nftoken_id.len() != 64 || !nftoken_id.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(Precondition::Invalid(format!(
                        "'{}' is not an NFT id",
                        nftoken_id
                    )));
                }
                if destination.as_ref() == Some(account) {
                    return Err(Precondition::Invalid(
                        "Cannot offer an NFT to yourself".to_string(),
                    ));
                }
                Ok(())
            }
            Intent::AccountSet { set, clear } => {
                if set.is_none() && clear.is_none() {
                    return Err(Precondition::Invalid(
                        "Account settings change has no flag".to_string(),
                    ));
                }
                if set.is_some() && set == clear {
                    return Err(Precondition::Invalid(
                        "Cannot set and clear the same flag".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

fn require_positive(amount: &Amount, what: &str) -> Result<(), Precondition> {
    if amount.is_positive() {
        Ok(())
    } else {
        Err(Precondition::Invalid(format!("{} must be positive", what)))
    }
}

fn same_asset(a: &Amount, b: &Amount) -> bool {
    match (a, b) {
        (Amount::Xrp(_), Amount::Xrp(_)) => true,
        (Amount::Issued(x), Amount::Issued(y)) => x.currency == y.currency && x.issuer == y.issuer,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::{CurrencyCode, Drops};

    fn alice() -> Address {
        Address::parse("rPT1Sjq2YGrBMTttX4GZHjKu9dyfzbpAYe").unwrap()
    }

    fn bob() -> Address {
        Address::parse("rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh").unwrap()
    }

    #[test]
    fn test_classic_address_shape() {
        assert!(validate_classic_address("rPT1Sjq2YGrBMTttX4GZHjKu9dyfzbpAYe").is_ok());
        assert!(validate_classic_address("xPT1Sjq2YGrBMTttX4GZHjKu9dyfzbpAYe").is_err());
        assert!(validate_classic_address("rShort").is_err());
        // '0' is not in the alphabet
        assert!(validate_classic_address("rPT1Sjq2YGrBMTttX4GZHjKu9dyfzbpAY0").is_err());
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("cat.png").as_deref(), Some("cat.png"));
        assert_eq!(
            sanitize_filename("../../etc/passwd").as_deref(),
            Some("passwd")
        );
        assert_eq!(
            sanitize_filename("C:\\Users\\me\\my photo.jpg").as_deref(),
            Some("my_photo.jpg")
        );
        assert_eq!(sanitize_filename(".hidden").as_deref(), Some("hidden"));
        assert_eq!(sanitize_filename("../"), None);
        assert_eq!(sanitize_filename("日本.png").as_deref(), Some("png"));
    }

    #[test]
    fn test_identifier_rules() {
        assert!(validate_identifier("+27 82 555 0101").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("123456789012345678901").is_err());
        assert!(validate_identifier("555;drop").is_err());
    }

    #[test]
    fn test_validator_rejects_self_payment_and_zero() {
        let validator = DefaultIntentValidator;
        let to_self = Intent::Payment {
            destination: alice(),
            amount: Amount::Xrp(Drops(10)),
        };
        assert!(validator.validate_intent(&alice(), &to_self).is_err());

        let zero = Intent::Payment {
            destination: bob(),
            amount: Amount::Xrp(Drops(0)),
        };
        assert!(validator.validate_intent(&alice(), &zero).is_err());

        let fine = Intent::Payment {
            destination: bob(),
            amount: Amount::Xrp(Drops(10)),
        };
        assert!(validator.validate_intent(&alice(), &fine).is_ok());
    }

    #[test]
    fn test_validator_rejects_same_asset_offer() {
        let aud = Amount::issued(
            CurrencyCode::new("AUD").unwrap(),
            bob(),
            bigdecimal::BigDecimal::from(5),
        );
        let intent = Intent::OfferCreate {
            pay: aud.clone(),
            get: aud,
        };
        assert!(DefaultIntentValidator
            .validate_intent(&alice(), &intent)
            .is_err());
    }
}
