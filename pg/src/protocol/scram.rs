//! SCRAM-SHA-256 (RFC 5802 / RFC 7677) client-side authentication.
//!
//! The observed upstream source ships a placeholder proof
//! (`"proof_placeholder"`) in this exact spot; spec.md's Open Questions call
//! that out explicitly as something to replace, never copy. This is the full
//! derivation: `SaltedPassword = PBKDF2-HMAC-SHA-256`, `ClientKey =
//! HMAC(SaltedPassword, "Client Key")`, `StoredKey = SHA-256(ClientKey)`,
//! `ClientSignature = HMAC(StoredKey, AuthMessage)`, `ClientProof = ClientKey
//! XOR ClientSignature`.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::{PgError, PgResult};

type HmacSha256 = Hmac<Sha256>;

/// Drives one SCRAM-SHA-256 exchange for a single connection attempt.
pub struct ScramClient {
    user: String,
    password: String,
    client_nonce: String,
    client_first_bare: String,
    server_first: Option<String>,
    salted_password: Option<[u8; 32]>,
    auth_message: Option<String>,
}

fn saslprep_escape(s: &str) -> String {
    s.replace('=', "=3D").replace(',', "=2C")
}

impl ScramClient {
    pub fn new(user: &str, password: &str) -> Self {
        let mut nonce_bytes = [0u8; 24];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let client_nonce = BASE64.encode(nonce_bytes);
        let client_first_bare = format!("n={},r={}", saslprep_escape(user), client_nonce);
        Self {
            user: user.to_string(),
            password: password.to_string(),
            client_nonce,
            client_first_bare,
            server_first: None,
            salted_password: None,
            auth_message: None,
        }
    }

    /// The `SASLInitialResponse` payload: `gs2-header || client-first-bare`.
    pub fn client_first_message(&self) -> Vec<u8> {
        format!("n,,{}", self.client_first_bare).into_bytes()
    }

    /// Consume the server's `SASLContinue` payload and produce the
    /// `SASLResponse` (client-final-message) bytes.
    pub fn process_server_first(&mut self, data: &[u8]) -> PgResult<Vec<u8>> {
        let server_first = std::str::from_utf8(data)
            .map_err(|_| PgError::Auth("SCRAM server-first is not valid UTF-8".into()))?
            .to_string();

        let mut server_nonce = None;
        let mut salt_b64 = None;
        let mut iterations = None;
        for part in server_first.split(',') {
            if let Some(r) = part.strip_prefix("r=") {
                server_nonce = Some(r.to_string());
            } else if let Some(s) = part.strip_prefix("s=") {
                salt_b64 = Some(s.to_string());
            } else if let Some(i) = part.strip_prefix("i=") {
                iterations = i.parse::<u32>().ok();
            }
        }
        let server_nonce =
            server_nonce.ok_or_else(|| PgError::Auth("SCRAM server-first missing nonce".into()))?;
        let salt_b64 = salt_b64.ok_or_else(|| PgError::Auth("SCRAM server-first missing salt".into()))?;
        let iterations =
            iterations.ok_or_else(|| PgError::Auth("SCRAM server-first missing iteration count".into()))?;

        if !server_nonce.starts_with(&self.client_nonce) {
            return Err(PgError::Auth(
                "SCRAM server nonce does not extend the client nonce".into(),
            ));
        }

        let salt = BASE64
            .decode(salt_b64.as_bytes())
            .map_err(|_| PgError::Auth("SCRAM salt is not valid base64".into()))?;

        let mut salted_password = [0u8; 32];
        pbkdf2::pbkdf2_hmac::<Sha256>(self.password.as_bytes(), &salt, iterations, &mut salted_password);

        let client_final_without_proof = format!("c=biws,r={}", server_nonce);
        let auth_message = format!(
            "{},{},{}",
            self.client_first_bare, server_first, client_final_without_proof
        );

        let client_key = hmac_sha256(&salted_password, b"Client Key")?;
        let stored_key = Sha256::digest(client_key);
        let client_signature = hmac_sha256(&stored_key, auth_message.as_bytes())?;

        let mut client_proof = [0u8; 32];
        for i in 0..32 {
            client_proof[i] = client_key[i] ^ client_signature[i];
        }

        self.server_first = Some(server_first);
        self.salted_password = Some(salted_password);
        self.auth_message = Some(auth_message.clone());

        let final_message = format!(
            "{},p={}",
            client_final_without_proof,
            BASE64.encode(client_proof)
        );
        Ok(final_message.into_bytes())
    }

    /// Verify the server's `SASLFinal` payload (`v=<ServerSignature>`).
    pub fn verify_server_final(&self, data: &[u8]) -> PgResult<()> {
        let text = std::str::from_utf8(data)
            .map_err(|_| PgError::Auth("SCRAM server-final is not valid UTF-8".into()))?;
        let v = text
            .strip_prefix("v=")
            .ok_or_else(|| PgError::Auth("SCRAM server-final missing signature".into()))?;
        let server_signature = BASE64
            .decode(v.trim_end().as_bytes())
            .map_err(|_| PgError::Auth("SCRAM server signature is not valid base64".into()))?;

        let salted_password = self
            .salted_password
            .ok_or_else(|| PgError::Auth("SCRAM verify called before process_server_first".into()))?;
        let auth_message = self
            .auth_message
            .as_ref()
            .ok_or_else(|| PgError::Auth("SCRAM verify called before process_server_first".into()))?;

        let server_key = hmac_sha256(&salted_password, b"Server Key")?;
        let expected = hmac_sha256(&server_key, auth_message.as_bytes())?;

        if expected.as_slice() != server_signature.as_slice() {
            return Err(PgError::Auth("SCRAM server signature mismatch".into()));
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn user(&self) -> &str {
        &self.user
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> PgResult<[u8; 32]> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|_| PgError::Auth("HMAC key error".into()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().into())
}

/// PostgreSQL MD5 password hash: `"md5" + hex(md5(hex(md5(password + user)) + salt))`.
pub fn md5_password_hash(user: &str, password: &str, salt: [u8; 4]) -> String {
    use md5::{Digest as Md5Digest, Md5};

    let mut inner = Md5::new();
    inner.update(password.as_bytes());
    inner.update(user.as_bytes());
    let inner_hex = hex_encode(&inner.finalize());

    let mut outer = Md5::new();
    outer.update(inner_hex.as_bytes());
    outer.update(salt);
    let outer_hex = hex_encode(&outer.finalize());

    format!("md5{outer_hex}")
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_first_message_has_gs2_header_and_nonce() {
        let client = ScramClient::new("postgres", "secret");
        let msg = String::from_utf8(client.client_first_message()).unwrap();
        assert!(msg.starts_with("n,,n=postgres,r="));
    }

    #[test]
    fn rejects_server_nonce_not_extending_client_nonce() {
        let mut client = ScramClient::new("postgres", "secret");
        let bogus = b"r=totally-different-nonce,s=aGVsbG8=,i=4096";
        assert!(client.process_server_first(bogus).is_err());
    }

    #[test]
    fn produces_client_final_with_proof() {
        let mut client = ScramClient::new("postgres", "secret");
        let nonce = client.client_nonce.clone();
        let server_first = format!("r={nonce}server-extra,s=aGVsbG8=,i=4096");
        let final_msg = client.process_server_first(server_first.as_bytes()).unwrap();
        let final_msg = String::from_utf8(final_msg).unwrap();
        assert!(final_msg.starts_with(&format!("c=biws,r={nonce}server-extra,p=")));
    }

    #[test]
    fn md5_hash_has_prefix_and_length() {
        let hash = md5_password_hash("postgres", "secret", [1, 2, 3, 4]);
        assert!(hash.starts_with("md5"));
        assert_eq!(hash.len(), 3 + 32);
    }
}
