pub mod hmac_signer;
pub mod sha256_signer;

use crate::traits::signature::SignatureContext;

pub use hmac_signer::HmacSha256Signer;
pub use sha256_signer::Sha256Signer;

/// Pick the signature for a configured key: HMAC-SHA256 when a key is set,
/// plain SHA-256 otherwise.
pub fn signer_for_key(key: &str) -> Result<Box<dyn SignatureContext>, String> {
    if key.is_empty() {
        Ok(Box::new(Sha256Signer::new()))
    } else {
        Ok(Box::new(HmacSha256Signer::new(key.as_bytes())?))
    }
}
