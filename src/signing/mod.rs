//! Local transaction signing for Ed25519 wallets

pub mod codec;
pub mod keys;

use serde_json::Value;

use crate::types::*;
pub use codec::encode_transaction;
pub use keys::{generate_wallet, Keypair};

/// Prepended to the signing encoding before it is signed
const SIGNING_PREFIX: [u8; 4] = *b"STX\0";

/// Prepended to the signed blob to compute the transaction hash
const TRANSACTION_ID_PREFIX: [u8; 4] = *b"TXN\0";

/// A transaction ready for `submit`
#[derive(Debug, Clone, PartialEq)]
pub struct SignedTransaction {
    /// Hex of the signed binary form
    pub tx_blob: String,
    /// Hash the ledger will know the transaction by
    pub hash: String,
}

/// Sign a complete `tx_json` (Sequence, Fee and LastLedgerSequence already set).
///
/// `SigningPubKey` and `TxnSignature` are filled in on `tx_json`.
pub fn sign(tx_json: &mut Value, keypair: &Keypair) -> LedgerResult<SignedTransaction> {
    let account = tx_json["Account"].as_str().unwrap_or_default();
    if account != keypair.address()?.as_str() {
        return Err(LedgerError::Validation(format!(
            "Key for {} cannot sign for {}",
            keypair.address()?,
            account
        )));
    }

    let fields = tx_json
        .as_object_mut()
        .ok_or_else(|| LedgerError::Validation("Transaction must be a JSON object".to_string()))?;
    fields.insert(
        "SigningPubKey".to_string(),
        Value::String(keypair.public_key_hex()),
    );
    fields.remove("TxnSignature");

    let mut message = SIGNING_PREFIX.to_vec();
    message.extend_from_slice(&encode_transaction(tx_json, true)?);
    let signature = keypair.sign(&message);

    if let Some(fields) = tx_json.as_object_mut() {
        fields.insert(
            "TxnSignature".to_string(),
            Value::String(hex::encode_upper(signature)),
        );
    }

    let blob = encode_transaction(tx_json, false)?;
    let mut hashed = TRANSACTION_ID_PREFIX.to_vec();
    hashed.extend_from_slice(&blob);

    Ok(SignedTransaction {
        tx_blob: hex::encode_upper(&blob),
        hash: hex::encode_upper(keys::sha512_half(&hashed)),
    })
}
