use crate::user::UserId;
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

/// Opaque URL-safe string that identifies the user who shares it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub(crate) struct ReferralCode(String);

impl ReferralCode {
    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReferralCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reversible obfuscation of user ids keyed by a secret.
///
/// The id is XOR-ed with a 64-bit keystream derived from the secret and
/// the resulting 8 big-endian bytes are encoded as unpadded base64url.
///
/// Decoding with a different secret doesn't fail. It yields some other
/// number instead, so the decoded id must always be checked for existence.
#[derive(Clone)]
pub(crate) struct ReferralCodec {
    keystream: u64,
}

impl ReferralCodec {
    pub(crate) fn new(secret: &str) -> Self {
        let digest = Sha256::digest(secret.as_bytes());

        let mut keystream = [0; 8];
        keystream.copy_from_slice(&digest[..8]);

        Self {
            keystream: u64::from_be_bytes(keystream),
        }
    }

    pub(crate) fn encode(&self, user_id: UserId) -> ReferralCode {
        ReferralCode(self.encode_raw(user_id.get()))
    }

    pub(crate) fn encode_raw(&self, raw: u64) -> String {
        URL_SAFE_NO_PAD.encode((raw ^ self.keystream).to_be_bytes())
    }

    /// Returns [`None`] if the code is not a base64url encoding of exactly
    /// 8 bytes. Trailing `=` padding is optional.
    pub(crate) fn decode(&self, code: &str) -> Option<u64> {
        let padding = (4 - code.len() % 4) % 4;
        let padded = format!("{code}{}", "=".repeat(padding));

        let bytes: [u8; 8] = URL_SAFE.decode(padded).ok()?.try_into().ok()?;

        Some(u64::from_be_bytes(bytes) ^ self.keystream)
    }
}

impl fmt::Debug for ReferralCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferralCodec").finish_non_exhaustive()
    }
}
