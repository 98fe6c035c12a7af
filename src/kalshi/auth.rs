//! Kalshi RAPI v2 request signing.
//!
//! Every request is signed over `timestamp_ms || METHOD || PATH` (path
//! excludes the query string, includes the API version prefix). The
//! signature is base64-encoded and sent as a header. Kalshi accepts either
//! an Ed25519 key or an RSA key signed with RSA-PSS/SHA-256 (MGF1-SHA256,
//! salt length = digest length) — the key type is detected once at load
//! time from the PEM.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use ed25519_dalek::pkcs8::DecodePrivateKey as Ed25519DecodePrivateKey;
use ed25519_dalek::{Signer as Ed25519Signer, SigningKey as Ed25519SigningKey};
use rsa::pkcs8::DecodePrivateKey as RsaDecodePrivateKey;
use rsa::pss::SigningKey as RsaPssSigningKey;
use rsa::signature::{RandomizedSigner, SignatureEncoding};
use rsa::RsaPrivateKey;
use sha2::Sha256;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("failed to read private key file {0}: {1}")]
    ReadKey(String, std::io::Error),
    #[error("private key at {0} is not a valid Ed25519 or RSA PEM key")]
    UnsupportedKey(String),
}

enum SigningKey {
    Ed25519(Box<Ed25519SigningKey>),
    Rsa(Box<RsaPrivateKey>),
}

/// Generates signed request headers for Kalshi RAPI v2.
///
/// Loaded once at startup; signing is CPU-bound but fast enough to sit on
/// the order-placement hot path.
pub struct KalshiAuth {
    api_key_id: String,
    key: SigningKey,
}

impl KalshiAuth {
    pub fn load(api_key_id: String, private_key_path: &Path) -> Result<Self, AuthError> {
        let pem = std::fs::read_to_string(private_key_path)
            .map_err(|e| AuthError::ReadKey(private_key_path.display().to_string(), e))?;

        let key = if let Ok(signing_key) = Ed25519SigningKey::from_pkcs8_pem(&pem) {
            tracing::info!(key_id = %api_key_id, key_type = "ed25519", "kalshi auth initialized");
            SigningKey::Ed25519(Box::new(signing_key))
        } else if let Ok(rsa_key) = RsaPrivateKey::from_pkcs8_pem(&pem) {
            tracing::info!(key_id = %api_key_id, key_type = "rsa", "kalshi auth initialized");
            SigningKey::Rsa(Box::new(rsa_key))
        } else {
            return Err(AuthError::UnsupportedKey(private_key_path.display().to_string()));
        };

        Ok(Self { api_key_id, key })
    }

    /// Build signed auth headers for a single request. `path` may include a
    /// query string — it is stripped before signing, since Kalshi signs the
    /// path only.
    pub fn headers(&self, method: &str, path: &str) -> Vec<(&'static str, String)> {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis()
            .to_string();
        let sign_path = path.split('?').next().unwrap_or(path);
        let message = format!("{timestamp_ms}{}{sign_path}", method.to_uppercase());
        let signature = self.sign(message.as_bytes());

        vec![
            ("KALSHI-ACCESS-KEY", self.api_key_id.clone()),
            ("KALSHI-ACCESS-TIMESTAMP", timestamp_ms),
            ("KALSHI-ACCESS-SIGNATURE", signature),
        ]
    }

    fn sign(&self, message: &[u8]) -> String {
        let sig_bytes = match &self.key {
            SigningKey::Ed25519(key) => key.sign(message).to_bytes().to_vec(),
            SigningKey::Rsa(key) => {
                let signing_key = RsaPssSigningKey::<Sha256>::new((**key).clone());
                let sig = signing_key.sign_with_rng(&mut rand_source(), message);
                sig.to_vec()
            }
        };
        base64::engine::general_purpose::STANDARD.encode(sig_bytes)
    }
}

fn rand_source() -> impl rand_core::CryptoRngCore {
    rand_core::OsRng
}
