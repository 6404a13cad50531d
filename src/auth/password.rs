//! Password Hashing
//! Mission: Salted, deliberately slow one-way hashing of user passwords

use std::fmt;

/// bcrypt only reads this many bytes of input; anything past it would be ignored.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Hashing or verification could not complete
#[derive(Debug)]
pub enum PasswordError {
    TooLong(usize),
    Bcrypt(bcrypt::BcryptError),
}

impl fmt::Display for PasswordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PasswordError::TooLong(len) => write!(
                f,
                "password is {} bytes, limit is {}",
                len, MAX_PASSWORD_BYTES
            ),
            PasswordError::Bcrypt(e) => write!(f, "password hashing failed: {}", e),
        }
    }
}

impl std::error::Error for PasswordError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PasswordError::Bcrypt(e) => Some(e),
            PasswordError::TooLong(_) => None,
        }
    }
}

impl From<bcrypt::BcryptError> for PasswordError {
    fn from(e: bcrypt::BcryptError) -> Self {
        PasswordError::Bcrypt(e)
    }
}

/// bcrypt-backed password hasher. The salt is random per call and embedded in the output.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Refuses input bcrypt would truncate, so distinct passwords never share a hash.
    pub fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        if plaintext.len() > MAX_PASSWORD_BYTES {
            return Err(PasswordError::TooLong(plaintext.len()));
        }
        Ok(bcrypt::hash(plaintext, self.cost)?)
    }

    /// Fails only when `hash` is not a well-formed bcrypt string. Over-long input never
    /// matches since `hash` never accepted it.
    pub fn verify(&self, plaintext: &str, hash: &str) -> Result<bool, PasswordError> {
        if plaintext.len() > MAX_PASSWORD_BYTES {
            return Ok(false);
        }
        Ok(bcrypt::verify(plaintext, hash)?)
    }
}
