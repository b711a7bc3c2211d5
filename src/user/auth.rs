//! Password hashing and verification

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

mod vidstream_argon2 {
    use anyhow::{anyhow, Result};
    use argon2::{
        password_hash::{
            rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
        },
        Argon2,
    };

    #[cfg(not(feature = "test-fast-hasher"))]
    fn argon2() -> Argon2<'static> {
        Argon2::default()
    }

    // Minimal work factor, only acceptable for tests.
    #[cfg(feature = "test-fast-hasher")]
    fn argon2() -> Argon2<'static> {
        let params = argon2::Params::new(8, 1, 1, None).expect("invalid argon2 test params");
        Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params)
    }

    pub fn generate_b64_salt() -> String {
        SaltString::generate(&mut OsRng).to_string()
    }

    pub fn hash<T: AsRef<str>>(plain: &[u8], b64_salt: T) -> Result<String> {
        let salt = SaltString::from_b64(b64_salt.as_ref()).map_err(|err| anyhow!("{}", err))?;
        let hash_string = argon2()
            .hash_password(plain, &salt)
            .map_err(|err| anyhow!("{}", err))?
            .to_string();
        Ok(hash_string)
    }

    pub fn verify<T: AsRef<str>>(plain_pw: &[u8], target_hash: T) -> Result<bool> {
        let password_hash =
            PasswordHash::new(target_hash.as_ref()).map_err(|err| anyhow!("{}", err))?;
        Ok(argon2().verify_password(plain_pw, &password_hash).is_ok())
    }
}

/// Maximum accepted plaintext password length in bytes.
pub const MAX_PASSWORD_LENGTH: usize = 64;

#[derive(Clone, Serialize, Deserialize, Debug)]
pub enum VidstreamHasher {
    Argon2,
}

impl FromStr for VidstreamHasher {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "argon2" => Ok(VidstreamHasher::Argon2),
            _ => bail!("Unknown hasher {}", s),
        }
    }
}

impl fmt::Display for VidstreamHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VidstreamHasher::Argon2 => write!(f, "argon2"),
        }
    }
}

impl VidstreamHasher {
    pub fn generate_b64_salt(&self) -> String {
        match self {
            VidstreamHasher::Argon2 => vidstream_argon2::generate_b64_salt(),
        }
    }

    pub fn hash(&self, plain: &str, b64_salt: &str) -> Result<String> {
        if plain.is_empty() {
            bail!("The password cannot be empty.");
        }
        if plain.len() > MAX_PASSWORD_LENGTH {
            bail!("The password is too long.");
        }
        match self {
            VidstreamHasher::Argon2 => vidstream_argon2::hash(plain.as_bytes(), b64_salt),
        }
    }

    /// Constant-time verification of a candidate password against a stored
    /// PHC hash string. Never errs on a mismatch, only on malformed input.
    pub fn verify(&self, plain_pw: &str, target_hash: &str) -> Result<bool> {
        if plain_pw.is_empty() || plain_pw.len() > MAX_PASSWORD_LENGTH {
            return Ok(false);
        }
        match self {
            VidstreamHasher::Argon2 => {
                vidstream_argon2::verify(plain_pw.as_bytes(), target_hash)
            }
        }
    }
}
