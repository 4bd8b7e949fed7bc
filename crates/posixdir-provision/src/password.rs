//! Password generation and `{SSHA}` encoding.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use sha1::{Digest, Sha1};
use std::fmt;

/// Length of generated passwords.
pub const GENERATED_PASSWORD_LENGTH: usize = 16;

const SALT_LENGTH: usize = 16;
const SSHA_PREFIX: &str = "{SSHA}";
const PASSWORD_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz\
ABCDEFGHIJKLMNOPQRSTUVWXYZ\
0123456789\
!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

/// A password in `{SSHA}` form, ready to be stored as `userPassword`.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedPassword(String);

impl EncodedPassword {
    /// Hashes the plaintext with a fresh 16-byte salt from the OS RNG.
    #[must_use]
    pub fn ssha(plaintext: &SecretString) -> Self {
        let mut salt = [0u8; SALT_LENGTH];
        OsRng.fill_bytes(&mut salt);
        Self::with_salt(plaintext.expose_secret(), &salt)
    }

    fn with_salt(plaintext: &str, salt: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(plaintext.as_bytes());
        hasher.update(salt);
        let mut payload = hasher.finalize().to_vec();
        payload.extend_from_slice(salt);
        Self(format!("{SSHA_PREFIX}{}", STANDARD.encode(payload)))
    }

    /// Textual form, including the scheme prefix.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[cfg(test)]
    fn verify(&self, plaintext: &str) -> bool {
        let Some(encoded) = self.0.strip_prefix(SSHA_PREFIX) else {
            return false;
        };
        let Ok(payload) = STANDARD.decode(encoded) else {
            return false;
        };
        if payload.len() <= 20 {
            return false;
        }
        let (_, salt) = payload.split_at(20);
        Self::with_salt(plaintext, salt) == *self
    }
}

impl fmt::Debug for EncodedPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncodedPassword({SSHA}[REDACTED])")
    }
}

/// Generates a random password from ASCII letters, digits and punctuation.
#[must_use]
pub fn generate_password() -> SecretString {
    let password: String = (0..GENERATED_PASSWORD_LENGTH)
        .map(|_| char::from(PASSWORD_ALPHABET[OsRng.gen_range(0..PASSWORD_ALPHABET.len())]))
        .collect();
    SecretString::from(password)
}
