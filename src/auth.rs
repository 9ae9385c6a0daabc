use anyhow::Result;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use sha2::{Digest, Sha256};
use std::time::{Duration, Instant};

/// Credential shipped with a fresh configuration
pub const DEFAULT_PASSWORD: &str = "admin123";

/// Shortest password accepted by a password change
pub const MIN_PASSWORD_LEN: usize = 6;

/// Admin password hashing
pub struct AdminAuth;

impl AdminAuth {
    /// Hash a password using Argon2id
    pub fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
            .to_string();

        Ok(password_hash)
    }

    /// Verify a password against a stored hash
    ///
    /// Accepts Argon2 PHC strings and the unsalted SHA-256 hex digests
    /// written by earlier releases.
    pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
        if Self::is_legacy_hash(hash) {
            let digest = legacy_sha256(password);
            return Ok(digest.eq_ignore_ascii_case(hash.trim()));
        }

        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| anyhow::anyhow!("Failed to parse password hash: {}", e))?;

        let argon2 = Argon2::default();

        Ok(argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Whether the stored hash is a bare SHA-256 hex digest
    pub fn is_legacy_hash(hash: &str) -> bool {
        let hash = hash.trim();
        hash.len() == 64 && hash.chars().all(|c| c.is_ascii_hexdigit())
    }

    /// Check the rules for a new password
    pub fn validate_new_password(new_password: &str, confirm: &str) -> Result<()> {
        if new_password != confirm {
            anyhow::bail!("New passwords do not match");
        }
        if new_password.chars().count() < MIN_PASSWORD_LEN {
            anyhow::bail!(
                "Password must be at least {} characters long",
                MIN_PASSWORD_LEN
            );
        }
        Ok(())
    }
}

fn legacy_sha256(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Lockout tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    /// Consecutive failures that trigger a lockout
    pub max_attempts: u32,
    /// How long every attempt is refused once locked out
    pub lockout: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            lockout: Duration::from_secs(30),
        }
    }
}

/// Failed-login bookkeeping
///
/// Held in memory only, so restarting the program clears a lockout. That is
/// an easy way around the lockout for anyone able to restart the process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginAttemptState {
    pub failed_count: u32,
    pub lockout_until: Option<Instant>,
}

impl LoginAttemptState {
    /// Remaining lockout at `now`, if any
    pub fn lockout_remaining(&self, now: Instant) -> Option<Duration> {
        let until = self.lockout_until?;
        (now < until).then(|| until - now)
    }
}

/// Result of a password submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Password accepted
    Granted,
    /// Wrong password, more attempts left before lockout
    Denied { remaining_attempts: u32 },
    /// Attempt refused because of a lockout (possibly triggered by this attempt)
    LockedOut { retry_after: Duration },
    /// Nothing was entered; not counted
    Empty,
}

impl AuthOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, AuthOutcome::Granted)
    }

    /// Message suitable for showing to the user
    pub fn message(&self) -> String {
        match self {
            AuthOutcome::Granted => "Login successful".to_string(),
            AuthOutcome::Denied { remaining_attempts } => format!(
                "Invalid password. {} attempt{} remaining.",
                remaining_attempts,
                if *remaining_attempts == 1 { "" } else { "s" }
            ),
            AuthOutcome::LockedOut { retry_after } => format!(
                "Too many failed attempts. Try again in {}s",
                retry_after.as_secs().max(1)
            ),
            AuthOutcome::Empty => "Please enter a password".to_string(),
        }
    }
}

/// Password gate with a lockout after repeated failures
#[derive(Debug)]
pub struct AuthGate {
    policy: LockoutPolicy,
    state: LoginAttemptState,
}

impl Default for AuthGate {
    fn default() -> Self {
        Self::new(LockoutPolicy::default())
    }
}

impl AuthGate {
    pub fn new(policy: LockoutPolicy) -> Self {
        Self {
            policy,
            state: LoginAttemptState::default(),
        }
    }

    /// Submit a password against the stored hash
    pub fn submit(&mut self, password: &str, stored_hash: &str) -> Result<AuthOutcome> {
        self.submit_at(password, stored_hash, Instant::now())
    }

    /// Submit a password at an explicit instant
    pub fn submit_at(&mut self, password: &str, stored_hash: &str, now: Instant) -> Result<AuthOutcome> {
        if let Some(retry_after) = self.state.lockout_remaining(now) {
            tracing::debug!("Login attempt refused during lockout");
            return Ok(AuthOutcome::LockedOut { retry_after });
        }

        if self.state.lockout_until.is_some() {
            // Lockout expired
            self.state = LoginAttemptState::default();
        }

        if password.is_empty() {
            return Ok(AuthOutcome::Empty);
        }

        if AdminAuth::verify_password(password, stored_hash)? {
            self.state.failed_count = 0;
            return Ok(AuthOutcome::Granted);
        }

        self.state.failed_count += 1;
        tracing::warn!(
            "Failed login attempt ({}/{})",
            self.state.failed_count,
            self.policy.max_attempts
        );

        if self.state.failed_count >= self.policy.max_attempts {
            self.state.lockout_until = Some(now + self.policy.lockout);
            tracing::warn!("Login locked for {} seconds", self.policy.lockout.as_secs());
            return Ok(AuthOutcome::LockedOut {
                retry_after: self.policy.lockout,
            });
        }

        Ok(AuthOutcome::Denied {
            remaining_attempts: self.policy.max_attempts - self.state.failed_count,
        })
    }
}
