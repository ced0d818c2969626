//! Ed25519 wallets: family seeds, key derivation and classic addresses

use bs58::Alphabet;
use ed25519_dalek::{Signer, SigningKey};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256, Sha512};
use std::fmt;

use crate::types::*;

/// Version bytes that make an encoded Ed25519 seed start with `sEd`
const ED25519_SEED_PREFIX: [u8; 3] = [0x01, 0xE1, 0x4B];

/// Version byte of a classic address
const ACCOUNT_ID_PREFIX: u8 = 0x00;

/// Marks a 33-byte public key as Ed25519
const ED25519_KEY_PREFIX: u8 = 0xED;

const ENTROPY_LEN: usize = 16;

/// Signing key derived from a family seed
pub struct Keypair {
    signing: SigningKey,
    public: [u8; 33],
}

impl Keypair {
    /// Derive the key the ledger associates with 16 bytes of seed entropy
    pub fn from_entropy(entropy: &[u8; ENTROPY_LEN]) -> Self {
        let secret: [u8; 32] = sha512_half(entropy);
        let signing = SigningKey::from_bytes(&secret);

        let mut public = [0u8; 33];
        public[0] = ED25519_KEY_PREFIX;
        public[1..].copy_from_slice(signing.verifying_key().as_bytes());

        Self { signing, public }
    }

    /// Derive the key for an encoded `sEd...` seed
    pub fn from_seed(seed: &str) -> LedgerResult<Self> {
        Ok(Self::from_entropy(&decode_seed(seed)?))
    }

    /// Prefixed public key as sent in `SigningPubKey`
    pub fn public_key(&self) -> &[u8; 33] {
        &self.public
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode_upper(self.public)
    }

    pub fn account_id(&self) -> [u8; 20] {
        let digest = Ripemd160::digest(Sha256::digest(self.public));
        let mut id = [0u8; 20];
        id.copy_from_slice(&digest);
        id
    }

    pub fn address(&self) -> LedgerResult<Address> {
        Address::parse(&encode_account_id(&self.account_id()))
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing.sign(message).to_bytes()
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("public", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

/// Fresh wallet with a random Ed25519 seed; it exists on the ledger only once funded
pub fn generate_wallet() -> LedgerResult<Wallet> {
    let entropy: [u8; ENTROPY_LEN] = rand::random();
    let keypair = Keypair::from_entropy(&entropy);
    Ok(Wallet::new(
        keypair.address()?,
        encode_seed(&entropy),
        Some(keypair.public_key_hex()),
    ))
}

pub fn encode_seed(entropy: &[u8; ENTROPY_LEN]) -> String {
    let mut payload = ED25519_SEED_PREFIX.to_vec();
    payload.extend_from_slice(entropy);
    encode_check(&payload)
}

/// Seed entropy of an `sEd...` seed. Other key types are refused.
pub fn decode_seed(seed: &str) -> LedgerResult<[u8; ENTROPY_LEN]> {
    let payload = decode_check(seed)
        .ok_or_else(|| LedgerError::Validation("Seed is not a valid encoded seed".to_string()))?;

    if payload.len() != ED25519_SEED_PREFIX.len() + ENTROPY_LEN
        || payload[..ED25519_SEED_PREFIX.len()] != ED25519_SEED_PREFIX
    {
        return Err(LedgerError::Validation(
            "Only Ed25519 seeds (sEd...) can be signed locally; use server signing for other keys"
                .to_string(),
        ));
    }

    let mut entropy = [0u8; ENTROPY_LEN];
    entropy.copy_from_slice(&payload[ED25519_SEED_PREFIX.len()..]);
    Ok(entropy)
}

pub fn encode_account_id(account_id: &[u8; 20]) -> String {
    let mut payload = Vec::with_capacity(21);
    payload.push(ACCOUNT_ID_PREFIX);
    payload.extend_from_slice(account_id);
    encode_check(&payload)
}

/// 20-byte account id behind a classic address
pub fn decode_address(address: &Address) -> LedgerResult<[u8; 20]> {
    let payload = decode_check(address.as_str())
        .filter(|p| p.len() == 21 && p[0] == ACCOUNT_ID_PREFIX)
        .ok_or_else(|| {
            LedgerError::Validation(format!("Address {} has a bad checksum", address))
        })?;

    let mut id = [0u8; 20];
    id.copy_from_slice(&payload[1..]);
    Ok(id)
}

/// First half of SHA-512, the ledger's standard hash
pub fn sha512_half(data: &[u8]) -> [u8; 32] {
    let digest = Sha512::digest(data);
    let mut half = [0u8; 32];
    half.copy_from_slice(&digest[..32]);
    half
}

fn encode_check(payload: &[u8]) -> String {
    bs58::encode(payload)
        .with_alphabet(Alphabet::RIPPLE)
        .with_check()
        .into_string()
}

fn decode_check(encoded: &str) -> Option<Vec<u8>> {
    bs58::decode(encoded)
        .with_alphabet(Alphabet::RIPPLE)
        .with_check(None)
        .into_vec()
        .ok()
}
