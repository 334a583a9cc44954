// First, declare the modules folder itself
mod modules;

// Re-export everything from modules for easier access
pub use modules::{auth, config, store, utils};

// Re-export commonly used types
pub use modules::auth::flows::{AuthError, Authenticator, LoginPolicy};
pub use modules::auth::hasher::CredentialHasher;
pub use modules::config::settings::{Backend, Settings};
pub use modules::store::{CredentialRecord, CredentialStore, FileStore, SqliteStore, StoreError};
