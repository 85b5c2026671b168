//! HS256 signed bearer tokens.
//!
//! Only the compact `header.payload.signature` form is accepted, the header
//! must announce `HS256`, and the signature is checked with `Mac::verify_slice`
//! before the payload is parsed. Expiry is not decided here: the session
//! whitelist owns it.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use utoipa::ToSchema;

const ALGORITHM: &str = "HS256";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("signing key must not be empty")]
    EmptyKey,
    #[error("invalid token format")]
    Format,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json,
    #[error("unsupported token header")]
    Header,
    #[error("invalid signature")]
    Signature,
    #[error("invalid claims")]
    Claims,
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

/// Payload carried by every session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Claims {
    pub user_id: i64,
    /// Whitelist key of the session.
    pub jti: String,
    /// Issued-at, unix seconds.
    pub iat: i64,
    /// Expiry at issuance, unix seconds.
    pub exp: i64,
}

impl Claims {
    /// Total lifetime the session was issued with.
    #[must_use]
    pub fn original_duration(&self) -> chrono::Duration {
        chrono::Duration::try_seconds(self.exp.saturating_sub(self.iat))
            .unwrap_or(chrono::Duration::MAX)
    }
}

/// Signs and verifies tokens with the process-wide symmetric key.
#[derive(Clone)]
pub struct TokenSigner {
    key: SecretString,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner").field("key", &"***").finish()
    }
}

impl TokenSigner {
    /// # Errors
    /// Returns `TokenError::EmptyKey` for an empty secret.
    pub fn new(key: SecretString) -> Result<Self, TokenError> {
        if key.expose_secret().is_empty() {
            return Err(TokenError::EmptyKey);
        }
        Ok(Self { key })
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        HmacSha256::new_from_slice(self.key.expose_secret().as_bytes())
            .map_err(|_| TokenError::EmptyKey)
    }

    /// # Errors
    /// Returns an error if the claims cannot be serialized.
    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        let header = Header {
            alg: ALGORITHM.to_string(),
            typ: "JWT".to_string(),
        };
        let signing_input = format!("{}.{}", encode_json(&header)?, encode_json(claims)?);

        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();

        Ok(format!(
            "{signing_input}.{}",
            Base64UrlUnpadded::encode_string(&signature)
        ))
    }

    /// Check structure and signature, then return the claims.
    ///
    /// # Errors
    /// Returns an error for malformed, forged or wrong-algorithm tokens.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut parts = token.trim().split('.');
        let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Format);
        };

        let header: Header = decode_json(header_b64)?;
        if header.alg != ALGORITHM || !header.typ.eq_ignore_ascii_case("JWT") {
            return Err(TokenError::Header);
        }

        let signature =
            Base64UrlUnpadded::decode_vec(signature_b64).map_err(|_| TokenError::Base64)?;
        let mut mac = self.mac()?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(payload_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::Signature)?;

        let claims: Claims = decode_json(payload_b64)?;
        if claims.jti.is_empty() || claims.exp <= claims.iat {
            return Err(TokenError::Claims);
        }
        Ok(claims)
    }
}

fn encode_json<T: Serialize>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value).map_err(|_| TokenError::Json)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn decode_json<T: DeserializeOwned>(segment: &str) -> Result<T, TokenError> {
    let raw = Base64UrlUnpadded::decode_vec(segment).map_err(|_| TokenError::Base64)?;
    serde_json::from_slice(&raw).map_err(|_| TokenError::Json)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer(key: &str) -> TokenSigner {
        TokenSigner::new(SecretString::from(key.to_string())).unwrap_or_else(|err| panic!("{err}"))
    }

    fn claims() -> Claims {
        Claims {
            user_id: 42,
            jti: "6f1c2b0e-token".to_string(),
            iat: 1_700_000_000,
            exp: 1_700_000_000 + 3600,
        }
    }

    #[test]
    fn sign_then_verify() -> Result<(), TokenError> {
        let signer = signer("secret");
        let token = signer.sign(&claims())?;
        assert_eq!(token.split('.').count(), 3);
        assert_eq!(signer.verify(&token)?, claims());
        Ok(())
    }

    #[test]
    fn rejects_foreign_key() -> Result<(), TokenError> {
        let token = signer("secret").sign(&claims())?;
        assert_eq!(signer("other").verify(&token), Err(TokenError::Signature));
        Ok(())
    }

    #[test]
    fn rejects_tampered_payload() -> Result<(), TokenError> {
        let signer = signer("secret");
        let token = signer.sign(&claims())?;
        let mut forged = claims();
        forged.user_id = 1;
        let forged_payload = encode_json(&forged)?;
        let parts: Vec<&str> = token.split('.').collect();
        let tampered = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);
        assert_eq!(signer.verify(&tampered), Err(TokenError::Signature));
        Ok(())
    }

    #[test]
    fn rejects_wrong_algorithm() -> Result<(), TokenError> {
        let signer = signer("secret");
        let token = signer.sign(&claims())?;
        let none_header = encode_json(&Header {
            alg: "none".to_string(),
            typ: "JWT".to_string(),
        })?;
        let parts: Vec<&str> = token.split('.').collect();
        let downgraded = format!("{}.{}.{}", none_header, parts[1], parts[2]);
        assert_eq!(signer.verify(&downgraded), Err(TokenError::Header));
        Ok(())
    }

    #[test]
    fn rejects_malformed() {
        let signer = signer("secret");
        assert_eq!(signer.verify(""), Err(TokenError::Format));
        assert_eq!(signer.verify("a.b"), Err(TokenError::Format));
        assert_eq!(signer.verify("a.b.c.d"), Err(TokenError::Format));
        assert_eq!(signer.verify("!!.b.c"), Err(TokenError::Base64));
    }

    #[test]
    fn rejects_inverted_lifetime() -> Result<(), TokenError> {
        let signer = signer("secret");
        let mut bad = claims();
        bad.exp = bad.iat;
        let token = signer.sign(&bad)?;
        assert_eq!(signer.verify(&token), Err(TokenError::Claims));
        Ok(())
    }

    #[test]
    fn empty_key_rejected() {
        assert_eq!(
            TokenSigner::new(SecretString::from(String::new())).err(),
            Some(TokenError::EmptyKey)
        );
    }

    #[test]
    fn original_duration_from_claims() {
        assert_eq!(claims().original_duration(), chrono::Duration::hours(1));
    }
}
