use serde::Serialize;

use crate::models::sensor_models::{ChannelDescriptor, PayloadInfo};
use crate::traits::header_builder::{HeaderBlock, HeaderBuilder, SignatureSpec};

const SIGNATURE_KEY: &[u8] = b"\"signature\":\"";

#[derive(Serialize)]
struct Protected<'a> {
    ver: &'a str,
    alg: &'a str,
    iat: i64,
}

#[derive(Serialize)]
struct Payload<'a> {
    device_name: &'a str,
    device_type: &'a str,
    interval_ms: f32,
    sensors: &'a [ChannelDescriptor],
}

#[derive(Serialize)]
struct Envelope<'a> {
    protected: Protected<'a>,
    signature: String,
    payload: Payload<'a>,
}

/// Header templater producing a compact JSON envelope.
///
/// ```text
/// {"protected":{"ver":"v1","alg":"HS256","iat":...},
///  "signature":"0000…0000",
///  "payload":{"device_name":...,"device_type":...,"interval_ms":...,"sensors":[...]}}
/// ```
///
/// The signature value is a run of `2 * digest_len` ASCII `'0'` characters
/// that the session overwrites with the hex digest once the record is sealed.
/// The buffer is `capacity` bytes, zero padded after the JSON text.
#[derive(Debug, Clone)]
pub struct JsonHeaderBuilder {
    capacity: usize,
    issued_at: Option<i64>,
}

impl JsonHeaderBuilder {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            issued_at: None,
        }
    }

    /// Pin the `iat` timestamp instead of reading the clock.
    pub fn with_issued_at(mut self, unix_secs: i64) -> Self {
        self.issued_at = Some(unix_secs);
        self
    }
}

impl HeaderBuilder for JsonHeaderBuilder {
    fn build(&self, payload: &PayloadInfo, signature: SignatureSpec<'_>) -> Result<HeaderBlock, String> {
        let envelope = Envelope {
            protected: Protected {
                ver: "v1",
                alg: signature.algorithm,
                iat: self.issued_at.unwrap_or_else(|| chrono::Utc::now().timestamp()),
            },
            signature: "0".repeat(signature.digest_len * 2),
            payload: Payload {
                device_name: &payload.device_id,
                device_type: &payload.device_type,
                interval_ms: payload.sample_interval_ms,
                sensors: &payload.channels,
            },
        };

        let json = serde_json::to_vec(&envelope).map_err(|e| format!("failed to serialize header: {}", e))?;
        if json.len() > self.capacity {
            return Err(format!(
                "header needs {} bytes, buffer holds {}",
                json.len(),
                self.capacity
            ));
        }

        let signature_index = json
            .windows(SIGNATURE_KEY.len())
            .position(|w| w == SIGNATURE_KEY)
            .map(|pos| pos + SIGNATURE_KEY.len())
            .ok_or("signature field missing from header")?;

        let mut bytes = vec![0u8; self.capacity];
        bytes[..json.len()].copy_from_slice(&json);

        Ok(HeaderBlock {
            bytes,
            used_len: json.len(),
            signature_index,
        })
    }
}
