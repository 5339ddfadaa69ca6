//! Challenge-response login
//!
//! The password never leaves the machine. The service hands out a random
//! challenge and the account's password salt; the client answers with
//! `SHA-256(challenge ++ SHA-256(salt ++ utf8(password)))` and receives a
//! session token in return.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use roxmltree::Document;
use sha2::{Digest, Sha256};
use std::fmt;
use tracing::{debug, info};

use crate::api::envelope;
use crate::api::transport::{ApiRequest, Transport};
use crate::core::{ExportError, Result};

const CHALLENGE_METHOD: &str = "GetChallenge";
const AUTHENTICATE_METHOD: &str = "Authenticate";

/// Authenticated session token attached to every subsequent call
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
}

impl Session {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("token", &"<redacted>").finish()
    }
}

/// Server-issued login challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub challenge: Vec<u8>,
    pub password_salt: Vec<u8>,
}

/// Compute the login proof for a challenge
pub fn compute_proof(challenge: &[u8], password_salt: &[u8], password: &str) -> Vec<u8> {
    let password_hash = Sha256::new()
        .chain_update(password_salt)
        .chain_update(password.as_bytes())
        .finalize();

    Sha256::new()
        .chain_update(challenge)
        .chain_update(password_hash)
        .finalize()
        .to_vec()
}

/// Request a login challenge for `login_name`
pub async fn get_challenge(transport: &dyn Transport, login_name: &str) -> Result<Challenge> {
    let request = ApiRequest::new(CHALLENGE_METHOD).field("loginName", login_name);
    let body = transport.call(&request).await.map_err(rejected)?;

    let doc = envelope::parse(CHALLENGE_METHOD, &body)?;
    Ok(Challenge {
        challenge: decode_field(&doc, "Challenge")?,
        password_salt: decode_field(&doc, "PasswordSalt")?,
    })
}

/// Log in and obtain a session token
///
/// Any failure here is fatal for the run; nothing is retried.
pub async fn authenticate(transport: &dyn Transport, login_name: &str, password: &str) -> Result<Session> {
    let challenge = get_challenge(transport, login_name).await?;
    debug!(bytes = challenge.challenge.len(), "Received login challenge");

    let proof = compute_proof(&challenge.challenge, &challenge.password_salt, password);
    let request = ApiRequest::new(AUTHENTICATE_METHOD)
        .field("challenge", STANDARD.encode(&challenge.challenge))
        .field("proof", STANDARD.encode(&proof));
    let body = transport.call(&request).await.map_err(rejected)?;

    let doc = envelope::parse(AUTHENTICATE_METHOD, &body)?;
    let token = envelope::find(&doc, "AuthenticateResult")
        .and_then(envelope::text)
        .ok_or_else(|| ExportError::Auth {
            message: "no session token in response".to_string(),
        })?;

    info!(login = login_name, "Authenticated");
    Ok(Session::new(token))
}

fn decode_field(doc: &Document<'_>, name: &str) -> Result<Vec<u8>> {
    let text = envelope::find(doc, name).and_then(envelope::text).ok_or_else(|| ExportError::Auth {
        message: format!("challenge response is missing '{name}'"),
    })?;
    Ok(STANDARD.decode(text)?)
}

/// Credential rejections surface as auth errors; transport failures pass through
fn rejected(error: ExportError) -> ExportError {
    match error {
        ExportError::ApiStatus { action, status, body } => ExportError::Auth {
            message: format!("{action} returned HTTP {status}: {}", body.trim()),
        },
        other => other,
    }
}
