use log::error;
use std::sync::OnceLock;
use thiserror::Error;

use super::hasher::{CredentialHasher, HashError};
use super::password::{validate_password, validate_role, validate_username, ValidationError};
use crate::modules::store::{CredentialRecord, CredentialStore, StoreError};
use crate::modules::utils::logging::log_auth_event;

/// How login failures are reported to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginPolicy {
    /// "Username not found." and "Invalid password." are reported separately
    Distinguish,
    /// Both failures share one message, and an unknown username still costs
    /// one hash verification
    Unified,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Passwords do not match.")]
    PasswordMismatch,
    #[error("Username already exists.")]
    AlreadyExists,
    #[error("Username not found.")]
    NotFound,
    #[error("Invalid password.")]
    InvalidCredential,
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("storage failure: {0}")]
    Storage(StoreError),
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::AlreadyExists => AuthError::AlreadyExists,
            StoreError::InvalidUsername(reason) => AuthError::Validation(reason),
            other => AuthError::Storage(other),
        }
    }
}

impl From<HashError> for AuthError {
    fn from(e: HashError) -> Self {
        match e {
            HashError::Validation(reason) => AuthError::Validation(reason),
            HashError::Backend(reason) => AuthError::Hash(reason),
        }
    }
}

impl AuthError {
    /// Text safe to show the user. Internal failures are reduced to a generic
    /// message; the detail goes to the log.
    pub fn public_message(&self, policy: LoginPolicy) -> String {
        match (self, policy) {
            (AuthError::NotFound | AuthError::InvalidCredential, LoginPolicy::Unified) => {
                "Invalid username or password.".to_string()
            }
            (AuthError::Hash(_) | AuthError::Storage(_), _) => {
                "The credential store is unavailable. Please try again later.".to_string()
            }
            _ => self.to_string(),
        }
    }
}

/// Registration and login over a store and a hasher
pub struct Authenticator<'a> {
    store: &'a dyn CredentialStore,
    hasher: CredentialHasher,
    policy: LoginPolicy,
    default_role: String,
    decoy_hash: OnceLock<Option<String>>,
}

impl<'a> Authenticator<'a> {
    pub fn new(store: &'a dyn CredentialStore, hasher: CredentialHasher) -> Self {
        Self {
            store,
            hasher,
            policy: LoginPolicy::Distinguish,
            default_role: crate::modules::store::DEFAULT_ROLE.to_string(),
            decoy_hash: OnceLock::new(),
        }
    }

    pub fn with_policy(mut self, policy: LoginPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_default_role(mut self, role: impl Into<String>) -> Self {
        self.default_role = role.into();
        self
    }

    pub fn policy(&self) -> LoginPolicy {
        self.policy
    }

    /// First registration step: the username is well formed and not taken
    pub fn check_username_available(&self, username: &str) -> Result<(), AuthError> {
        validate_username(username)?;
        if self.store.lookup(username)?.is_some() {
            return Err(AuthError::AlreadyExists);
        }
        Ok(())
    }

    /// Register a new credential. Nothing is written unless every step passes.
    pub fn register(
        &self,
        username: &str,
        password: &str,
        confirmation: &str,
        role: Option<&str>,
    ) -> Result<(), AuthError> {
        let result = self.try_register(username, password, confirmation, role);
        match &result {
            Ok(()) => log_auth_event("register", username, true, None),
            Err(e) => {
                if matches!(e, AuthError::Hash(_) | AuthError::Storage(_)) {
                    error!("Registration aborted: {}", e);
                }
                log_auth_event("register", username, false, Some(&e.to_string()));
            }
        }
        result
    }

    fn try_register(
        &self,
        username: &str,
        password: &str,
        confirmation: &str,
        role: Option<&str>,
    ) -> Result<(), AuthError> {
        self.check_username_available(username)?;
        validate_password(password)?;
        if password != confirmation {
            return Err(AuthError::PasswordMismatch);
        }

        let role = role.unwrap_or(self.default_role.as_str());
        validate_role(role)?;

        let password_hash = self.hasher.hash(password)?;
        // A concurrent registration can still win here; the store reports it
        self.store.insert(username, &password_hash, Some(role))?;
        Ok(())
    }

    /// Verify a login attempt. Passwords are not shape-checked here.
    pub fn login(&self, username: &str, password: &str) -> Result<CredentialRecord, AuthError> {
        let result = self.try_login(username, password);
        match &result {
            Ok(_) => log_auth_event("login", username, true, None),
            Err(AuthError::NotFound) => {
                log_auth_event("login", username, false, Some("unknown username"))
            }
            Err(AuthError::InvalidCredential) => {
                log_auth_event("login", username, false, Some("password mismatch"))
            }
            Err(e) => {
                error!("Login aborted: {}", e);
                log_auth_event("login", username, false, Some("storage failure"));
            }
        }
        result
    }

    fn try_login(&self, username: &str, password: &str) -> Result<CredentialRecord, AuthError> {
        let Some(record) = self.store.lookup(username)? else {
            if self.policy == LoginPolicy::Unified {
                self.spend_decoy_verification(password);
            }
            return Err(AuthError::NotFound);
        };

        if self.hasher.verify(password, &record.password_hash) {
            Ok(record)
        } else {
            Err(AuthError::InvalidCredential)
        }
    }

    // Keeps the unknown-username path as slow as a real verification
    fn spend_decoy_verification(&self, password: &str) {
        let decoy = self
            .decoy_hash
            .get_or_init(|| self.hasher.hash("decoy-Credential-0").ok());
        if let Some(decoy) = decoy {
            let _ = self.hasher.verify(password, decoy);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::auth::hasher::MIN_ROUNDS;
    use crate::modules::store::{FileStore, SqliteStore};
    use tempfile::TempDir;

    fn test_hasher() -> CredentialHasher {
        CredentialHasher::new(MIN_ROUNDS)
    }

    fn file_store() -> (TempDir, FileStore) {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::open(tmp.path().join("users.txt")).unwrap();
        (tmp, store)
    }

    #[test]
    fn test_register_then_login() {
        let (_tmp, store) = file_store();
        let auth = Authenticator::new(&store, test_hasher());

        auth.register("alice", "Wonder1and", "Wonder1and", None).unwrap();

        let record = auth.login("alice", "Wonder1and").unwrap();
        assert_eq!(record.username, "alice");
        assert_eq!(record.role, "user");
        assert_ne!(record.password_hash, "Wonder1and");
    }

    #[test]
    fn test_login_failures_are_distinguished_by_default() {
        let (_tmp, store) = file_store();
        let auth = Authenticator::new(&store, test_hasher());
        auth.register("alice", "Wonder1and", "Wonder1and", None).unwrap();

        let missing = auth.login("bob", "Wonder1and").unwrap_err();
        let wrong = auth.login("alice", "Wonder2and").unwrap_err();
        assert!(matches!(missing, AuthError::NotFound));
        assert!(matches!(wrong, AuthError::InvalidCredential));
        assert_eq!(missing.public_message(auth.policy()), "Username not found.");
        assert_eq!(wrong.public_message(auth.policy()), "Invalid password.");
    }

    #[test]
    fn test_unified_policy_hides_which_part_failed() {
        let (_tmp, store) = file_store();
        let auth = Authenticator::new(&store, test_hasher()).with_policy(LoginPolicy::Unified);
        auth.register("alice", "Wonder1and", "Wonder1and", None).unwrap();

        let missing = auth.login("bob", "Wonder1and").unwrap_err();
        let wrong = auth.login("alice", "Wonder2and").unwrap_err();
        assert_eq!(
            missing.public_message(LoginPolicy::Unified),
            wrong.public_message(LoginPolicy::Unified)
        );
    }

    #[test]
    fn test_register_rejections_write_nothing() {
        let (tmp, store) = file_store();
        let auth = Authenticator::new(&store, test_hasher());

        assert!(matches!(
            auth.register("ab", "Wonder1and", "Wonder1and", None),
            Err(AuthError::Validation(ValidationError::InvalidUsername))
        ));
        assert!(matches!(
            auth.register("alice", "alllower1", "alllower1", None),
            Err(AuthError::Validation(ValidationError::NoUppercase))
        ));
        assert!(matches!(
            auth.register("alice", "Wonder1and", "Wonder1anD", None),
            Err(AuthError::PasswordMismatch)
        ));
        assert!(matches!(
            auth.register("alice", "Wonder1and", "Wonder1and", Some("a,b")),
            Err(AuthError::Validation(ValidationError::InvalidRole))
        ));

        assert!(store.lookup("alice").unwrap().is_none());
        assert_eq!(std::fs::read(tmp.path().join("users.txt")).unwrap().len(), 0);
    }

    #[test]
    fn test_duplicate_registration_keeps_first() {
        let store = SqliteStore::open_in_memory().unwrap();
        let auth = Authenticator::new(&store, test_hasher());

        auth.register("alice", "Wonder1and", "Wonder1and", None).unwrap();
        let second = auth.register("alice", "Other1pass", "Other1pass", Some("admin"));
        assert!(matches!(second, Err(AuthError::AlreadyExists)));
        assert_eq!(
            second.unwrap_err().public_message(LoginPolicy::Distinguish),
            "Username already exists."
        );

        assert!(auth.login("alice", "Wonder1and").is_ok());
        assert!(auth.login("alice", "Other1pass").is_err());
        assert_eq!(store.lookup("alice").unwrap().unwrap().role, "user");
    }

    // Lookups miss, so the username pre-check always passes
    struct LateConflictStore<'a>(&'a SqliteStore);

    impl CredentialStore for LateConflictStore<'_> {
        fn insert(
            &self,
            username: &str,
            password_hash: &str,
            role: Option<&str>,
        ) -> Result<(), StoreError> {
            self.0.insert(username, password_hash, role)
        }

        fn lookup(&self, _username: &str) -> Result<Option<CredentialRecord>, StoreError> {
            Ok(None)
        }
    }

    #[test]
    fn test_conflict_at_insert_reported_like_precheck() {
        let inner = SqliteStore::open_in_memory().unwrap();
        inner.insert("alice", "$pbkdf2-sha256$i=1000,l=32$c2FsdA$ZGlnZXN0", None).unwrap();
        let store = LateConflictStore(&inner);
        let auth = Authenticator::new(&store, test_hasher());

        assert!(auth.check_username_available("alice").is_ok());
        let err = auth.register("alice", "Wonder1and", "Wonder1and", None).unwrap_err();
        assert!(matches!(err, AuthError::AlreadyExists));
        assert_eq!(err.public_message(LoginPolicy::Distinguish), "Username already exists.");
        assert_eq!(
            inner.lookup("alice").unwrap().unwrap().password_hash,
            "$pbkdf2-sha256$i=1000,l=32$c2FsdA$ZGlnZXN0"
        );
    }

    #[test]
    fn test_explicit_and_default_roles() {
        let store = SqliteStore::open_in_memory().unwrap();
        let auth = Authenticator::new(&store, test_hasher()).with_default_role("member");

        auth.register("alice", "Wonder1and", "Wonder1and", None).unwrap();
        auth.register("carol", "Wonder1and", "Wonder1and", Some("admin")).unwrap();

        assert_eq!(auth.login("alice", "Wonder1and").unwrap().role, "member");
        assert_eq!(auth.login("carol", "Wonder1and").unwrap().role, "admin");
    }

    #[test]
    fn test_corrupt_stored_hash_is_a_mismatch() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert("legacy", "not-a-valid-hash", None).unwrap();
        let auth = Authenticator::new(&store, test_hasher());

        assert!(matches!(
            auth.login("legacy", "whatever"),
            Err(AuthError::InvalidCredential)
        ));
    }

    #[test]
    fn test_storage_details_stay_out_of_public_message() {
        let err = AuthError::from(StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "/var/lib/credstore/users.txt: disk full",
        )));
        let message = err.public_message(LoginPolicy::Distinguish);
        assert!(!message.contains("disk full"));
        assert!(!message.contains("/var/lib"));
    }
}
