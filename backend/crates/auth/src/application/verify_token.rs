//! Verify Token Use Case
//!
//! Stateless bearer tokens: `<uid>.<base64url(HMAC-SHA256(uid))>`.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use platform::client::AuthenticatedUser;
use sha2::Sha256;

use crate::error::{AuthError, AuthResult, ConfigIssue};

/// Minimum length for the token signing secret (in characters)
pub const TOKEN_SECRET_MIN_LENGTH: usize = 32;

/// Issues and verifies signed bearer tokens
#[derive(Clone)]
pub struct SignedTokenVerifier {
    mac: Hmac<Sha256>,
}

impl SignedTokenVerifier {
    pub fn new(secret: &str) -> Result<Self, ConfigIssue> {
        let length = secret.chars().count();
        let too_short = ConfigIssue::TokenSecretTooShort {
            min: TOKEN_SECRET_MIN_LENGTH,
            actual: length,
        };
        if length < TOKEN_SECRET_MIN_LENGTH {
            return Err(too_short);
        }

        let mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| too_short)?;
        Ok(Self { mac })
    }

    /// Sign a token for `uid`
    pub fn issue(&self, uid: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(uid.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("{uid}.{signature}")
    }

    /// Verify a token and return the user it was issued for
    pub fn verify(&self, token: &str) -> AuthResult<AuthenticatedUser> {
        // uid may itself contain dots; the signature never does
        let (uid, signature_b64) = token.rsplit_once('.').ok_or(AuthError::InvalidToken)?;
        if uid.is_empty() {
            return Err(AuthError::InvalidToken);
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| AuthError::InvalidToken)?;

        let mut mac = self.mac.clone();
        mac.update(uid.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| AuthError::InvalidToken)?;

        Ok(AuthenticatedUser::new(uid))
    }
}
