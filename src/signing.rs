//! License token signing.
//!
//! Ed25519 detached signatures over the canonical payload bytes. The signer
//! is constructed once at startup, held immutably (`Arc`), and injected into
//! the activation path; there is no ambient global. If no key material is
//! configured the server holds no signer at all and activation requests fail
//! with a server-side error rather than issuing unsigned tokens.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier as _, VerifyingKey};
use rand::rngs::OsRng;

use crate::error::{AppError, Result};

/// Ed25519 seed size in bytes.
const SEED_SIZE: usize = 32;

/// Holds the process-wide signing key.
#[derive(Clone)]
pub struct Signer {
    signing_key: SigningKey,
}

impl Signer {
    /// Construct a signer from a base64-encoded 32-byte Ed25519 seed.
    pub fn from_seed_base64(encoded: &str) -> Result<Self> {
        let decoded = BASE64
            .decode(encoded.trim())
            .map_err(|e| AppError::Internal(format!("Invalid signing key encoding: {}", e)))?;

        if decoded.len() != SEED_SIZE {
            return Err(AppError::Internal(format!(
                "Signing key seed must be {} bytes, got {}",
                SEED_SIZE,
                decoded.len()
            )));
        }

        let mut seed = [0u8; SEED_SIZE];
        seed.copy_from_slice(&decoded);
        Ok(Self {
            signing_key: SigningKey::from_bytes(&seed),
        })
    }

    /// Generate an ephemeral keypair from OS entropy.
    ///
    /// For development and tests only; the seed is never persisted, so
    /// tokens signed with it do not survive a restart.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Sign a message, returning the base64-encoded detached signature.
    pub fn sign(&self, message: &[u8]) -> String {
        let signature = self.signing_key.sign(message);
        BASE64.encode(signature.to_bytes())
    }

    /// The base64-encoded public key clients verify against.
    pub fn public_key_base64(&self) -> String {
        BASE64.encode(self.signing_key.verifying_key().to_bytes())
    }

    /// Verify a detached signature. This is the client-side half of the
    /// contract; it lives next to `sign` so the two can never drift apart.
    pub fn verify(message: &[u8], sig_base64: &str, public_key_base64: &str) -> bool {
        let Ok(sig_bytes) = BASE64.decode(sig_base64) else {
            return false;
        };
        let Ok(sig_array) = <[u8; 64]>::try_from(sig_bytes.as_slice()) else {
            return false;
        };
        let signature = Signature::from_bytes(&sig_array);

        let Ok(key_bytes) = BASE64.decode(public_key_base64) else {
            return false;
        };
        let Ok(key_array) = <[u8; 32]>::try_from(key_bytes.as_slice()) else {
            return false;
        };
        let Ok(verifying_key) = VerifyingKey::from_bytes(&key_array) else {
            return false;
        };

        verifying_key.verify(message, &signature).is_ok()
    }

    /// The base64-encoded seed, for persisting a generated key.
    pub fn seed_base64(&self) -> String {
        BASE64.encode(self.signing_key.to_bytes())
    }
}
