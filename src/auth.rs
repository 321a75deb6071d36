//! Credential and session handling for the single admin account.
//!
//! Passwords are hashed with PBKDF2-HMAC-SHA256 under a random per-password
//! salt and stored as `salt_hex:hash_hex`. Sessions are HMAC-SHA256 signed
//! bearer tokens carrying a role claim with a fixed 2 hour lifetime.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD as base64};
use chrono::Utc;
use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const PBKDF2_ITERATIONS: u32 = 100_000;
const MIN_PASSWORD_LENGTH: usize = 8;
const SPECIAL_CHARS: &str = "!@#$%^&*(),.?\":{}|<>";

pub const TOKEN_TTL_SECS: i64 = 2 * 60 * 60;
pub const TOKEN_TTL_LABEL: &str = "2h";
pub const ADMIN_ROLE: &str = "admin";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Claims {
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

fn generate_random_salt() -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..16).map(|_| rng.gen()).collect()
}

fn derive_hash(password: &str, salt: &[u8]) -> Vec<u8> {
    let mut hash = vec![0u8; 32];

    pbkdf2::<HmacSha256>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut hash);

    hash
}

pub fn hash_password(password: &str) -> String {
    let salt = generate_random_salt();
    let hash = derive_hash(password, &salt);

    format!("{}:{}", hex::encode(&salt), hex::encode(hash))
}

/// Malformed stored values verify false rather than erroring, so a corrupt
/// admin record behaves like a wrong password.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_hex, hash_hex)) = stored.split_once(':') else {
        return false;
    };
    let Ok(salt) = hex::decode(salt_hex) else {
        return false;
    };

    hex::encode(derive_hash(password, &salt)) == hash_hex
}

/// Returns every unmet requirement, not just the first. An empty vec means
/// the password is acceptable.
pub fn validate_password_strength(password: &str) -> Vec<String> {
    let mut errors = Vec::new();

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.push(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters long"
        ));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        errors.push("Password must contain at least one uppercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        errors.push("Password must contain at least one lowercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push("Password must contain at least one number".to_string());
    }
    if !password.chars().any(|c| SPECIAL_CHARS.contains(c)) {
        errors.push("Password must contain at least one special character".to_string());
    }

    errors
}

fn sign(secret: &str, payload: &[u8]) -> Vec<u8> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(payload);

    mac.finalize().into_bytes().to_vec()
}

pub(crate) fn make_token(secret: &str, claims: &Claims) -> String {
    let payload = serde_json::to_vec(claims).expect("claims serialize to json");

    format!(
        "{}.{}",
        base64.encode(&payload),
        base64.encode(sign(secret, &payload))
    )
}

pub fn issue_token(secret: &str, role: &str) -> String {
    let iat = Utc::now().timestamp();

    make_token(
        secret,
        &Claims {
            role: role.to_string(),
            iat,
            exp: iat + TOKEN_TTL_SECS,
        },
    )
}

/// Signature then expiry check. Any failure (malformed, tampered, expired)
/// is `None` so callers cannot distinguish why a token was rejected.
pub fn verify_token(secret: &str, token: &str) -> Option<Claims> {
    let (payload_b64, sig_b64) = token.split_once('.')?;

    let payload = base64.decode(payload_b64).ok()?;
    let sig = base64.decode(sig_b64).ok()?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(&payload);
    mac.verify_slice(&sig).ok()?;

    let claims: Claims = serde_json::from_slice(&payload).ok()?;
    if claims.exp <= Utc::now().timestamp() {
        return None;
    }

    Some(claims)
}

pub fn extract_bearer(header_value: &str) -> Option<&str> {
    header_value.strip_prefix("Bearer ")
}
