//! Payload signing for swap submissions. The bundler accepts a JSON
//! payload plus a secp256k1 signature over its keccak-256 digest; the key
//! scheme is Ethereum-compatible, so the wallet stack covers it.

use std::fmt;

use ethers::signers::{LocalWallet, Signer};
use ethers::types::H256;
use ethers::utils::keccak256;

use crate::errors::TransportError;

/// Seam between the transport and the key material, so tests and dry-run
/// wiring never need a real key.
pub trait PayloadSigner: Send + Sync + fmt::Debug {
    /// Hex signature (65-byte r||s||v) over the keccak-256 of `payload`.
    fn sign(&self, payload: &[u8]) -> Result<String, TransportError>;

    /// The signing identity in `eth|<hex>` form.
    fn address(&self) -> String;
}

/// In-process signer backed by a local secp256k1 key.
pub struct LocalKeySigner {
    wallet: LocalWallet,
}

impl LocalKeySigner {
    pub fn new(private_key: &str) -> Result<Self, TransportError> {
        let trimmed = private_key.trim().trim_start_matches("0x");
        let wallet: LocalWallet = trimmed
            .parse()
            .map_err(|_| TransportError::Signing("invalid private key material".to_string()))?;
        Ok(Self { wallet })
    }
}

impl fmt::Debug for LocalKeySigner {
    // Key material must never reach a log line, so Debug shows only the
    // derived address.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalKeySigner")
            .field("address", &format!("{:#x}", self.wallet.address()))
            .finish()
    }
}

impl PayloadSigner for LocalKeySigner {
    fn sign(&self, payload: &[u8]) -> Result<String, TransportError> {
        let digest = H256::from(keccak256(payload));
        let signature = self
            .wallet
            .sign_hash(digest)
            .map_err(|e| TransportError::Signing(e.to_string()))?;
        Ok(format!("0x{signature}"))
    }

    fn address(&self) -> String {
        format!("eth|{:x}", self.wallet.address())
    }
}
