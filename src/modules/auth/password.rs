use std::io;
use thiserror::Error;

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 20;
pub const PASSWORD_MIN_LEN: usize = 6;
pub const PASSWORD_MAX_LEN: usize = 50;
pub const ROLE_MAX_LEN: usize = 32;

/// Rule violations for usernames, passwords and roles.
///
/// The `Display` text is shown to the user as-is, so it only ever names the
/// rule that failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Username cannot be empty.")]
    EmptyUsername,
    #[error("Username must be 3-20 characters, letters and digits only.")]
    InvalidUsername,
    #[error("Password cannot be empty.")]
    EmptyPassword,
    #[error("Password must be 6-50 characters.")]
    PasswordLength,
    #[error("Password must include at least one uppercase letter.")]
    NoUppercase,
    #[error("Password must include at least one lowercase letter.")]
    NoLowercase,
    #[error("Password must include at least one digit.")]
    NoNumber,
    #[error("Role must be 1-32 characters without commas, '$' or control characters.")]
    InvalidRole,
}

/// Function to validate the shape of a username
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.trim().is_empty() {
        return Err(ValidationError::EmptyUsername);
    }
    let length = username.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&length) {
        return Err(ValidationError::InvalidUsername);
    }
    // ASCII alphanumerics only; this is also what keeps ',' out of the line format
    if !username.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::InvalidUsername);
    }
    Ok(())
}

/// Function to validate password strength at registration
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::EmptyPassword);
    }
    let length = password.chars().count();
    if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&length) {
        return Err(ValidationError::PasswordLength);
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(ValidationError::NoUppercase);
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(ValidationError::NoLowercase);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(ValidationError::NoNumber);
    }
    Ok(())
}

/// Function to validate a role label before it is written into a record
pub fn validate_role(role: &str) -> Result<(), ValidationError> {
    let length = role.chars().count();
    if length == 0 || length > ROLE_MAX_LEN {
        return Err(ValidationError::InvalidRole);
    }
    if role.chars().any(|c| c == ',' || c == '$' || c.is_control()) {
        return Err(ValidationError::InvalidRole);
    }
    Ok(())
}

/// Helper function to read a password with masked input
pub fn read_password() -> io::Result<String> {
    rpassword::read_password()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_validation() {
        assert!(validate_username("abc").is_ok());
        assert!(validate_username("User2024").is_ok());
        assert!(validate_username(&"a".repeat(20)).is_ok());

        assert_eq!(validate_username(""), Err(ValidationError::EmptyUsername));
        assert_eq!(validate_username("   "), Err(ValidationError::EmptyUsername));
        assert_eq!(validate_username("ab"), Err(ValidationError::InvalidUsername));
        assert_eq!(
            validate_username(&"a".repeat(21)),
            Err(ValidationError::InvalidUsername)
        );
        assert_eq!(validate_username("bob,smith"), Err(ValidationError::InvalidUsername));
        assert_eq!(validate_username("bob_smith"), Err(ValidationError::InvalidUsername));
        assert_eq!(validate_username("jos\u{e9}"), Err(ValidationError::InvalidUsername));
    }

    #[test]
    fn test_password_validation() {
        // Test valid password
        assert!(validate_password("Alllower1").is_ok());
        assert!(validate_password("Abcde1").is_ok());

        // Test empty
        assert!(matches!(
            validate_password(""),
            Err(ValidationError::EmptyPassword)
        ));

        // Test length bounds
        assert!(matches!(
            validate_password("Ab1"),
            Err(ValidationError::PasswordLength)
        ));
        let long_password = format!("Ab1{}", "x".repeat(48));
        assert!(matches!(
            validate_password(&long_password),
            Err(ValidationError::PasswordLength)
        ));

        // Test missing uppercase
        assert!(matches!(
            validate_password("alllower1"),
            Err(ValidationError::NoUppercase)
        ));

        // Test missing lowercase
        assert!(matches!(
            validate_password("ALLUPPER1"),
            Err(ValidationError::NoLowercase)
        ));

        // Test missing number
        assert!(matches!(
            validate_password("NoDigitsHere"),
            Err(ValidationError::NoNumber)
        ));
    }

    #[test]
    fn test_role_validation() {
        assert!(validate_role("user").is_ok());
        assert!(validate_role("site admin").is_ok());

        assert_eq!(validate_role(""), Err(ValidationError::InvalidRole));
        assert_eq!(validate_role("a,b"), Err(ValidationError::InvalidRole));
        assert_eq!(validate_role("$root"), Err(ValidationError::InvalidRole));
        assert_eq!(validate_role("line\nbreak"), Err(ValidationError::InvalidRole));
        assert_eq!(validate_role(&"r".repeat(33)), Err(ValidationError::InvalidRole));
    }

    #[test]
    fn test_reasons_are_user_facing() {
        assert_eq!(
            ValidationError::NoUppercase.to_string(),
            "Password must include at least one uppercase letter."
        );
        assert_eq!(
            ValidationError::InvalidUsername.to_string(),
            "Username must be 3-20 characters, letters and digits only."
        );
    }
}
