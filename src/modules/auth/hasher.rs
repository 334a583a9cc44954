use log::{debug, info};
use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::{Params, Pbkdf2};
use rand::Rng;
use std::time::{Duration, Instant};
use thiserror::Error;

use super::password::ValidationError;

/// PHC identifier of the only algorithm this hasher produces and accepts.
pub const ALGORITHM_IDENT: &str = "pbkdf2-sha256";
pub const SALT_LEN: usize = 16;
pub const OUTPUT_LEN: usize = 32;

/// Lowest cost accepted from configuration.
pub const MIN_ROUNDS: u32 = 1_000;
/// Ceiling for both configuration and stored hashes. A stored hash claiming
/// more rounds than this does not verify.
pub const MAX_ROUNDS: u32 = 50_000_000;

const CALIBRATION_PROBE_ROUNDS: u32 = 20_000;

#[derive(Debug, Error)]
pub enum HashError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("password hashing failed: {0}")]
    Backend(String),
}

/// Salted PBKDF2-HMAC-SHA256 hasher producing self-describing PHC strings.
///
/// The cost is carried inside every hash (`i=<rounds>`), so raising
/// `rounds` later never invalidates hashes made with an older cost.
#[derive(Debug, Clone, Copy)]
pub struct CredentialHasher {
    rounds: u32,
}

impl CredentialHasher {
    /// Create a hasher with a fixed cost, clamped to the supported range
    pub fn new(rounds: u32) -> Self {
        Self {
            rounds: rounds.clamp(MIN_ROUNDS, MAX_ROUNDS),
        }
    }

    /// Create a hasher whose cost is measured on this machine
    pub fn calibrated(target: Duration) -> Self {
        let rounds = calibrate(target);
        info!(
            "Hash cost calibrated: rounds={}, target_ms={}",
            rounds,
            target.as_millis()
        );
        Self::new(rounds)
    }

    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    /// Hash a plaintext password with a fresh random salt
    pub fn hash(&self, plaintext: &str) -> Result<String, HashError> {
        if plaintext.is_empty() {
            return Err(ValidationError::EmptyPassword.into());
        }
        derive_phc(plaintext, self.rounds)
    }

    /// Check a plaintext candidate against a stored hash string.
    ///
    /// Anything that cannot be read as a hash this hasher could have produced
    /// is a non-match rather than an error.
    pub fn verify(&self, plaintext: &str, hash_string: &str) -> bool {
        let parsed = match PasswordHash::new(hash_string) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!("Stored hash rejected: {}", e);
                return false;
            }
        };

        if parsed.algorithm.as_str() != ALGORITHM_IDENT {
            debug!("Stored hash rejected: algorithm {}", parsed.algorithm);
            return false;
        }
        match parsed.params.get_decimal("i") {
            Some(rounds) if (1..=MAX_ROUNDS).contains(&rounds) => {}
            _ => {
                debug!("Stored hash rejected: missing or out-of-range rounds");
                return false;
            }
        }

        // The digest comparison inside the verifier is constant-time
        Pbkdf2
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    }
}

/// Read the cost a stored hash was created with
pub fn rounds_of(hash_string: &str) -> Option<u32> {
    let parsed = PasswordHash::new(hash_string).ok()?;
    if parsed.algorithm.as_str() != ALGORITHM_IDENT {
        return None;
    }
    parsed.params.get_decimal("i")
}

/// Measure one probe hash and scale the round count so a single hash takes
/// roughly `target` on this machine
pub fn calibrate(target: Duration) -> u32 {
    let started = Instant::now();
    let _ = derive_phc("calibration-probe", CALIBRATION_PROBE_ROUNDS);
    let elapsed = started.elapsed().as_nanos().max(1);

    let scaled = u128::from(CALIBRATION_PROBE_ROUNDS) * target.as_nanos() / elapsed;
    let rounds = u32::try_from(scaled).unwrap_or(MAX_ROUNDS);
    debug!(
        "Calibration probe: rounds={}, elapsed_ns={}, scaled={}",
        CALIBRATION_PROBE_ROUNDS, elapsed, rounds
    );
    rounds.clamp(MIN_ROUNDS, MAX_ROUNDS)
}

/// Function to generate a random salt for PBKDF2
fn generate_random_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill(&mut salt[..]);
    salt
}

fn derive_phc(plaintext: &str, rounds: u32) -> Result<String, HashError> {
    let salt = SaltString::encode_b64(&generate_random_salt())
        .map_err(|e| HashError::Backend(e.to_string()))?;
    let params = Params {
        rounds,
        output_length: OUTPUT_LEN,
    };
    let hash = Pbkdf2
        .hash_password_customized(plaintext.as_bytes(), None, None, params, &salt)
        .map_err(|e| HashError::Backend(e.to_string()))?;
    Ok(hash.to_string())
}
