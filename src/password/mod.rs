use serde::{Deserialize, Serialize};

use crate::config::PasswordConfig;
use crate::error::{AppError, AppResult};

/// Password hashing algorithm types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PasswordAlgorithm {
    /// Argon2id algorithm (OWASP recommended for new passwords)
    #[default]
    Argon2id,
    /// bcrypt algorithm, kept for credentials imported from other stores
    Bcrypt,
}

impl std::fmt::Display for PasswordAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Argon2id => write!(f, "Argon2id"),
            Self::Bcrypt => write!(f, "bcrypt"),
        }
    }
}

/// Abstract trait for password hashing algorithms
pub trait PasswordHasher: Send + Sync {
    /// Hash a plaintext password
    fn hash_password(&self, password: &str) -> AppResult<String>;

    /// Verify a plaintext password against a hash
    fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool>;

    /// Check if a string is a hash created by this algorithm
    fn is_hash(&self, value: &str) -> bool;

    /// Get the algorithm identifier
    fn algorithm(&self) -> PasswordAlgorithm;
}

pub mod argon2_hasher;
pub mod bcrypt_hasher;

pub use argon2_hasher::Argon2idHasher;
pub use bcrypt_hasher::BcryptHasher;

const SPECIAL_CHARACTERS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?";

/// Strength rules applied to plaintext passwords before hashing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub max_length: usize,
    pub require_lowercase: bool,
    pub require_uppercase: bool,
    pub require_digit: bool,
    pub require_special: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 128,
            require_lowercase: true,
            require_uppercase: true,
            require_digit: true,
            require_special: true,
        }
    }
}

impl PasswordPolicy {
    pub fn validate(&self, password: &str) -> AppResult<()> {
        let length = password.chars().count();

        if length < self.min_length {
            return Err(AppError::BadRequest(format!(
                "Password must be at least {} characters long",
                self.min_length
            )));
        }

        // Upper bound keeps hashing cost bounded
        if length > self.max_length {
            return Err(AppError::BadRequest(format!(
                "Password must be no more than {} characters long",
                self.max_length
            )));
        }

        if self.require_lowercase && !password.chars().any(|c| c.is_lowercase()) {
            return Err(AppError::BadRequest(
                "Password must contain at least one lowercase letter".to_string(),
            ));
        }

        if self.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
            return Err(AppError::BadRequest(
                "Password must contain at least one uppercase letter".to_string(),
            ));
        }

        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(AppError::BadRequest(
                "Password must contain at least one digit".to_string(),
            ));
        }

        if self.require_special && !password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
            return Err(AppError::BadRequest(format!(
                "Password must contain at least one special character ({})",
                SPECIAL_CHARACTERS
            )));
        }

        Ok(())
    }
}

/// Password manager with support for multiple algorithms
pub struct PasswordManager {
    /// Current algorithm for new passwords
    current_algorithm: PasswordAlgorithm,
    hashers: Vec<Box<dyn PasswordHasher>>,
    policy: PasswordPolicy,
}

impl Default for PasswordManager {
    fn default() -> Self {
        Self::new(PasswordAlgorithm::default())
    }
}

impl PasswordManager {
    /// Create a new PasswordManager with specified default algorithm
    pub fn new(default_algorithm: PasswordAlgorithm) -> Self {
        let hashers: Vec<Box<dyn PasswordHasher>> = vec![
            Box::new(Argon2idHasher::new()),
            Box::new(BcryptHasher::new()),
        ];

        Self {
            current_algorithm: default_algorithm,
            hashers,
            policy: PasswordPolicy::default(),
        }
    }

    /// Build a manager from the `password` section of the configuration
    pub fn from_config(config: &PasswordConfig) -> AppResult<Self> {
        let hashers: Vec<Box<dyn PasswordHasher>> = vec![
            Box::new(Argon2idHasher::new()),
            Box::new(
                BcryptHasher::with_cost(config.bcrypt_cost)
                    .map_err(|e| AppError::Configuration(e.to_string()))?,
            ),
        ];

        let policy = PasswordPolicy {
            min_length: config.min_length,
            require_special: config.require_special,
            ..PasswordPolicy::default()
        };

        if policy.min_length == 0 || policy.min_length > policy.max_length {
            return Err(AppError::Configuration(format!(
                "password.min_length must be between 1 and {}",
                policy.max_length
            )));
        }

        Ok(Self {
            current_algorithm: config.algorithm,
            hashers,
            policy,
        })
    }

    pub fn with_policy(mut self, policy: PasswordPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Hash a plaintext password using the current algorithm
    pub fn hash_password(&self, password: &str) -> AppResult<String> {
        if password.is_empty() {
            return Err(AppError::BadRequest("Password cannot be empty".to_string()));
        }

        self.policy.validate(password)?;

        let hasher = self
            .hashers
            .iter()
            .find(|h| h.algorithm() == self.current_algorithm)
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "Hasher not found for algorithm: {}",
                    self.current_algorithm
                ))
            })?;

        hasher.hash_password(password)
    }

    /// Verify a plaintext password against any supported hash format
    pub fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool> {
        for hasher in &self.hashers {
            if hasher.is_hash(hash) {
                return hasher.verify_password(password, hash);
            }
        }

        Err(AppError::Internal("Unsupported hash format".to_string()))
    }

    /// Check if a string is a password hash (any supported format)
    pub fn is_hashed_password(&self, value: &str) -> bool {
        self.hashers.iter().any(|hasher| hasher.is_hash(value))
    }

    /// Detect the algorithm used for a given hash
    pub fn detect_algorithm(&self, hash: &str) -> Option<PasswordAlgorithm> {
        self.hashers
            .iter()
            .find(|hasher| hasher.is_hash(hash))
            .map(|hasher| hasher.algorithm())
    }

    pub fn current_algorithm(&self) -> PasswordAlgorithm {
        self.current_algorithm
    }

    pub fn policy(&self) -> &PasswordPolicy {
        &self.policy
    }
}
