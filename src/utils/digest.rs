// ! WS-Security password digest
// !
// ! `base64(sha1(nonce_bytes + created + password))`, as defined by the
// ! UsernameToken profile. The nonce participates as decoded bytes, the
// ! timestamp and password as their raw UTF-8 text.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use sha1::{Digest, Sha1};

use crate::core::error::{SoapError, SoapResult};

/// Compute a UsernameToken `PasswordDigest`
///
/// `nonce` is the base64 text that is also sent in `wsse:Nonce`; an empty
/// nonce contributes no bytes.
pub fn password_digest(nonce: &str, created: &str, password: &str) -> SoapResult<String> {
    let raw_nonce = STANDARD
        .decode(nonce)
        .map_err(|e| SoapError::configuration(format!("Nonce is not valid base64: {e}")))?;

    let mut hasher = Sha1::new();
    hasher.update(&raw_nonce);
    hasher.update(created.as_bytes());
    hasher.update(password.as_bytes());
    Ok(STANDARD.encode(hasher.finalize()))
}
