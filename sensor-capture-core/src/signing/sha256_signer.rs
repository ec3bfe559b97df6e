use sha2::{Digest, Sha256};

use crate::traits::signature::SignatureContext;

/// Unkeyed SHA-256 digest, used when no HMAC key is configured.
#[derive(Default)]
pub struct Sha256Signer {
    hasher: Option<Sha256>,
}

impl Sha256Signer {
    pub fn new() -> Self {
        Self {
            hasher: Some(Sha256::new()),
        }
    }
}

impl SignatureContext for Sha256Signer {
    fn update(&mut self, data: &[u8]) -> Result<(), String> {
        let hasher = self.hasher.as_mut().ok_or("signature already finished")?;
        hasher.update(data);
        Ok(())
    }

    fn finish(&mut self, out: &mut [u8]) -> Result<usize, String> {
        let len = self.digest_len();
        if out.len() < len * 2 {
            return Err(format!("digest buffer too small: {} < {}", out.len(), len * 2));
        }
        let hasher = self.hasher.take().ok_or("signature already finished")?;
        out[..len].copy_from_slice(&hasher.finalize());
        Ok(len)
    }

    fn reset(&mut self) {
        self.hasher = Some(Sha256::new());
    }

    fn digest_len(&self) -> usize {
        32
    }

    fn algorithm(&self) -> &str {
        "SHA256"
    }
}
