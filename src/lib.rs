pub mod auth;
pub mod backend;
pub mod config;
pub mod error;
pub mod extractors;
pub mod logging;
pub mod models;
pub mod password;
pub mod resource;
pub mod startup;
pub mod treasury;

// Re-export commonly used types for easier access
pub use backend::{DatabaseType, TreasuryBackend};
pub use error::{AppError, AppResult};
pub use models::{
    AuthorizationDecision, Credentials, Group, IdentityProvider, IdentityProviderKind,
    Organization, User,
};
pub use startup::{initialize_db, initialize_from_config, initialize_sqlite};
pub use treasury::{Treasury, TreasuryDb};
