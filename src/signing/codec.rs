//! Canonical binary form of a transaction, used for signing and `tx_blob`

use bigdecimal::num_bigint::Sign;
use bigdecimal::{BigDecimal, ToPrimitive, Zero};
use serde_json::Value;

use super::keys::decode_address;
use crate::amount::{Amount, CurrencyCode};
use crate::types::*;

/// Smallest and largest normalized mantissa of an issued amount
const MIN_MANTISSA: u64 = 1_000_000_000_000_000;
const MAX_MANTISSA: u64 = 9_999_999_999_999_999;
const MIN_EXPONENT: i64 = -96;
const MAX_EXPONENT: i64 = 80;

const NOT_NATIVE_BIT: u64 = 0x8000_0000_0000_0000;
const POSITIVE_BIT: u64 = 0x4000_0000_0000_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    UInt16,
    UInt32,
    Hash256,
    Amount,
    Blob,
    AccountId,
}

impl FieldKind {
    fn type_code(self) -> u8 {
        match self {
            FieldKind::UInt16 => 1,
            FieldKind::UInt32 => 2,
            FieldKind::Hash256 => 5,
            FieldKind::Amount => 6,
            FieldKind::Blob => 7,
            FieldKind::AccountId => 8,
        }
    }
}

/// Fields this crate puts in a transaction, with their type and field code
const FIELDS: [(&str, FieldKind, u8); 19] = [
    ("TransactionType", FieldKind::UInt16, 2),
    ("TransferFee", FieldKind::UInt16, 4),
    ("Flags", FieldKind::UInt32, 2),
    ("Sequence", FieldKind::UInt32, 4),
    ("LastLedgerSequence", FieldKind::UInt32, 27),
    ("SetFlag", FieldKind::UInt32, 33),
    ("ClearFlag", FieldKind::UInt32, 34),
    ("NFTokenTaxon", FieldKind::UInt32, 42),
    ("NFTokenID", FieldKind::Hash256, 10),
    ("Amount", FieldKind::Amount, 1),
    ("LimitAmount", FieldKind::Amount, 3),
    ("TakerPays", FieldKind::Amount, 4),
    ("TakerGets", FieldKind::Amount, 5),
    ("Fee", FieldKind::Amount, 8),
    ("SigningPubKey", FieldKind::Blob, 3),
    ("TxnSignature", FieldKind::Blob, 4),
    ("URI", FieldKind::Blob, 5),
    ("Account", FieldKind::AccountId, 1),
    ("Destination", FieldKind::AccountId, 3),
];

fn transaction_type_code(name: &str) -> Option<u16> {
    match name {
        "Payment" => Some(0),
        "AccountSet" => Some(3),
        "OfferCreate" => Some(7),
        "TrustSet" => Some(20),
        "NFTokenMint" => Some(25),
        "NFTokenCreateOffer" => Some(27),
        _ => None,
    }
}

/// Serialize a `tx_json` object. With `for_signing` the signature is left out.
pub fn encode_transaction(tx_json: &Value, for_signing: bool) -> LedgerResult<Vec<u8>> {
    let fields = tx_json
        .as_object()
        .ok_or_else(|| LedgerError::Validation("Transaction must be a JSON object".to_string()))?;

    let mut known = Vec::with_capacity(fields.len());
    for (name, value) in fields {
        if for_signing && name == "TxnSignature" {
            continue;
        }
        let (_, kind, nth) = FIELDS
            .iter()
            .find(|(field, _, _)| field == name)
            .ok_or_else(|| {
                LedgerError::Validation(format!("Field {} cannot be serialized", name))
            })?;
        known.push((name.as_str(), *kind, *nth, value));
    }
    known.sort_by_key(|(_, kind, nth, _)| (kind.type_code(), *nth));

    let mut out = Vec::new();
    for (name, kind, nth, value) in known {
        write_field_id(&mut out, kind.type_code(), nth);
        write_value(&mut out, name, kind, value)?;
    }
    Ok(out)
}

fn write_field_id(out: &mut Vec<u8>, type_code: u8, nth: u8) {
    match (type_code < 16, nth < 16) {
        (true, true) => out.push(type_code << 4 | nth),
        (true, false) => out.extend_from_slice(&[type_code << 4, nth]),
        (false, true) => out.extend_from_slice(&[nth, type_code]),
        (false, false) => out.extend_from_slice(&[0, type_code, nth]),
    }
}

fn write_value(out: &mut Vec<u8>, name: &str, kind: FieldKind, value: &Value) -> LedgerResult<()> {
    let invalid = || LedgerError::Validation(format!("Field {} has an invalid value: {}", name, value));

    match kind {
        FieldKind::UInt16 => {
            let number = match value {
                Value::String(type_name) if name == "TransactionType" => {
                    transaction_type_code(type_name)
                }
                other => other.as_u64().and_then(|n| u16::try_from(n).ok()),
            }
            .ok_or_else(invalid)?;
            out.extend_from_slice(&number.to_be_bytes());
        }
        FieldKind::UInt32 => {
            let number = value
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(invalid)?;
            out.extend_from_slice(&number.to_be_bytes());
        }
        FieldKind::Hash256 => {
            let bytes = value
                .as_str()
                .and_then(|h| hex::decode(h).ok())
                .filter(|b| b.len() == 32)
                .ok_or_else(invalid)?;
            out.extend_from_slice(&bytes);
        }
        FieldKind::Amount => write_amount(out, &Amount::from_json(value)?)?,
        FieldKind::Blob => {
            let bytes = value
                .as_str()
                .and_then(|h| hex::decode(h).ok())
                .ok_or_else(invalid)?;
            write_length(out, bytes.len())?;
            out.extend_from_slice(&bytes);
        }
        FieldKind::AccountId => {
            let address = value.as_str().ok_or_else(invalid)?;
            let id = decode_address(&Address::parse(address)?)?;
            write_length(out, id.len())?;
            out.extend_from_slice(&id);
        }
    }
    Ok(())
}

fn write_length(out: &mut Vec<u8>, len: usize) -> LedgerResult<()> {
    match len {
        0..=192 => out.push(len as u8),
        193..=12_480 => {
            let rest = len - 193;
            out.extend_from_slice(&[193 + (rest >> 8) as u8, (rest & 0xff) as u8]);
        }
        12_481..=918_744 => {
            let rest = len - 12_481;
            out.extend_from_slice(&[
                241 + (rest >> 16) as u8,
                ((rest >> 8) & 0xff) as u8,
                (rest & 0xff) as u8,
            ]);
        }
        _ => {
            return Err(LedgerError::Validation(format!(
                "Field of {} bytes is too long",
                len
            )))
        }
    }
    Ok(())
}

fn write_amount(out: &mut Vec<u8>, amount: &Amount) -> LedgerResult<()> {
    match amount {
        Amount::Xrp(drops) => out.extend_from_slice(&(drops.0 | POSITIVE_BIT).to_be_bytes()),
        Amount::Issued(issued) => {
            out.extend_from_slice(&issued_value_bits(&issued.value)?.to_be_bytes());
            out.extend_from_slice(&currency_bytes(&issued.currency)?);
            out.extend_from_slice(&decode_address(&issued.issuer)?);
        }
    }
    Ok(())
}

/// 64-bit issued value: not-native bit, sign bit, 8-bit exponent, 54-bit mantissa
fn issued_value_bits(value: &BigDecimal) -> LedgerResult<u64> {
    if value.is_zero() {
        return Ok(NOT_NATIVE_BIT);
    }

    let out_of_range = || LedgerError::Validation(format!("Issued value {} is out of range", value));

    let (digits, scale) = value.abs().normalized().as_bigint_and_exponent();
    let mut mantissa = digits
        .to_u64()
        .filter(|m| *m <= MAX_MANTISSA)
        .ok_or_else(|| {
            LedgerError::Validation(format!("Issued value {} has more than 16 digits", value))
        })?;
    let mut exponent = -scale;
    while mantissa < MIN_MANTISSA {
        mantissa *= 10;
        exponent -= 1;
    }
    if !(MIN_EXPONENT..=MAX_EXPONENT).contains(&exponent) {
        return Err(out_of_range());
    }

    let mut bits = NOT_NATIVE_BIT | ((exponent + 97) as u64) << 54 | mantissa;
    if value.sign() != Sign::Minus {
        bits |= POSITIVE_BIT;
    }
    Ok(bits)
}

fn currency_bytes(currency: &CurrencyCode) -> LedgerResult<[u8; 20]> {
    let mut bytes = [0u8; 20];
    let code = currency.as_str();
    if code.len() == 3 {
        bytes[12..15].copy_from_slice(code.as_bytes());
    } else {
        let decoded = hex::decode(code)
            .map_err(|_| LedgerError::Validation(format!("Currency {} is not hex", code)))?;
        bytes.copy_from_slice(&decoded);
    }
    Ok(bytes)
}
