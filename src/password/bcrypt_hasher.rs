use super::{PasswordAlgorithm, PasswordHasher};
use crate::error::{AppError, AppResult};
use bcrypt::{hash, verify, DEFAULT_COST};

/// bcrypt password hasher
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    /// bcrypt hasher with the crate default cost (12)
    pub fn new() -> Self {
        Self { cost: DEFAULT_COST }
    }

    /// Cost must be between 4 and 31
    pub fn with_cost(cost: u32) -> AppResult<Self> {
        if !(4..=31).contains(&cost) {
            return Err(AppError::BadRequest(
                "bcrypt cost must be between 4 and 31".to_string(),
            ));
        }

        Ok(Self { cost })
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordHasher for BcryptHasher {
    fn hash_password(&self, password: &str) -> AppResult<String> {
        hash(password, self.cost)
            .map_err(|e| AppError::Internal(format!("Failed to hash password with bcrypt: {}", e)))
    }

    fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool> {
        verify(password, hash)
            .map_err(|e| AppError::Internal(format!("Failed to verify bcrypt password: {}", e)))
    }

    fn is_hash(&self, value: &str) -> bool {
        // $2a$, $2b$, $2x$, $2y$: 60 characters with exactly three separators
        ["$2a$", "$2b$", "$2x$", "$2y$"]
            .iter()
            .any(|prefix| value.starts_with(prefix))
            && value.len() == 60
            && value.matches('$').count() == 3
    }

    fn algorithm(&self) -> PasswordAlgorithm {
        PasswordAlgorithm::Bcrypt
    }
}
