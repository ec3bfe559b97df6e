use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::traits::signature::SignatureContext;

type HmacSha256 = Hmac<Sha256>;

/// Keyed HMAC-SHA256 signature ("HS256").
pub struct HmacSha256Signer {
    key: Vec<u8>,
    mac: Option<HmacSha256>,
}

impl HmacSha256Signer {
    pub fn new(key: &[u8]) -> Result<Self, String> {
        let mac = HmacSha256::new_from_slice(key).map_err(|e| format!("invalid HMAC key: {}", e))?;
        Ok(Self {
            key: key.to_vec(),
            mac: Some(mac),
        })
    }
}

impl SignatureContext for HmacSha256Signer {
    fn update(&mut self, data: &[u8]) -> Result<(), String> {
        let mac = self.mac.as_mut().ok_or("signature already finished")?;
        mac.update(data);
        Ok(())
    }

    fn finish(&mut self, out: &mut [u8]) -> Result<usize, String> {
        let len = self.digest_len();
        if out.len() < len * 2 {
            return Err(format!("digest buffer too small: {} < {}", out.len(), len * 2));
        }
        let mac = self.mac.take().ok_or("signature already finished")?;
        out[..len].copy_from_slice(&mac.finalize().into_bytes());
        Ok(len)
    }

    fn reset(&mut self) {
        // Key length was accepted once already; HMAC takes keys of any length.
        self.mac = HmacSha256::new_from_slice(&self.key).ok();
    }

    fn digest_len(&self) -> usize {
        32
    }

    fn algorithm(&self) -> &str {
        "HS256"
    }
}
