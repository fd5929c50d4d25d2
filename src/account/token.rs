use super::Account;
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("failed to generate token")]
    Entropy(#[from] rand::Error),
}

/// Issues the authentication token returned after register/login.
pub trait TokenIssuer: Send + Sync {
    /// Issue a token for `account`.
    /// # Errors
    /// Returns an error if the token cannot be produced
    fn issue(&self, account: &Account) -> Result<String, TokenError>;
}

/// Random 256-bit bearer token, base64url without padding.
#[derive(Clone, Debug, Default)]
pub struct OpaqueTokenIssuer;

impl TokenIssuer for OpaqueTokenIssuer {
    fn issue(&self, _account: &Account) -> Result<String, TokenError> {
        let mut bytes = [0u8; 32];
        OsRng.try_fill_bytes(&mut bytes)?;
        Ok(Base64UrlUnpadded::encode_string(&bytes))
    }
}
