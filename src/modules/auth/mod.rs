pub mod flows;
pub mod hasher;
pub mod password;
pub mod user_interface;

// Re-export the main types and functions
pub use flows::{AuthError, Authenticator, LoginPolicy};
pub use hasher::{CredentialHasher, HashError};
pub use password::{validate_password, validate_role, validate_username, ValidationError};
pub use user_interface::run_menu;
