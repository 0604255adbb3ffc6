//! User directory for the login endpoint.
//!
//! The directory resolves a user id and password to a [`Principal`]. It is
//! the seam where a real account store plugs in; the shipped
//! [`InMemoryDirectory`] is seeded once from configuration and is read-only
//! afterwards.
//!
//! # Entry Format
//!
//! `EVENTHUB_USERS` holds `id:ROLE:phc` entries separated by semicolons,
//! where `phc` is an argon2 hash in PHC string format. PHC strings contain
//! commas, hence the semicolon:
//!
//! ```text
//! alice:ORGANIZER:$argon2id$v=19$m=19456,t=2,p=1$c2FsdHNhbHRzYWx0$x2dJ...;bob:ATTENDEE:$argon2id$...
//! ```
//!
//! [`hash_password`] produces a suitable string.

use std::collections::HashMap;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use thiserror::Error;
use tracing::{debug, trace};

use crate::auth::{Principal, Role};

/// Separator between entries in `EVENTHUB_USERS`.
pub const ENTRY_SEPARATOR: char = ';';

/// Errors from directory lookups and seeding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// Unknown user or wrong password. The two are not distinguished.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// A seed entry could not be parsed or hashed.
    #[error("invalid directory entry: {0}")]
    InvalidEntry(String),
}

/// Resolves login credentials to a principal.
pub trait UserDirectory: Send + Sync {
    /// Checks `password` for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::InvalidCredentials`] if the user is unknown
    /// or the password does not match.
    fn authenticate(&self, user_id: &str, password: &str) -> Result<Principal, DirectoryError>;
}

#[derive(Clone)]
struct UserRecord {
    role: Role,
    /// Argon2 PHC string, validated on insert.
    password_hash: String,
}

/// Directory backed by a fixed in-memory map.
#[derive(Clone)]
pub struct InMemoryDirectory {
    users: HashMap<String, UserRecord>,
    hasher: Argon2<'static>,
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::with_hasher(Argon2::default())
    }
}

impl InMemoryDirectory {
    /// Creates an empty directory hashing with the default argon2 parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty directory whose [`with_user`](Self::with_user) hashes
    /// with `hasher`. Stored hashes always verify with their own parameters.
    pub fn with_hasher(hasher: Argon2<'static>) -> Self {
        Self {
            users: HashMap::new(),
            hasher,
        }
    }

    /// Adds a user with a plaintext password, hashed with a fresh salt.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::InvalidEntry`] if the id is already present
    /// or hashing fails.
    pub fn with_user(
        mut self,
        id: impl Into<String>,
        role: Role,
        password: &str,
    ) -> Result<Self, DirectoryError> {
        let id = id.into();
        let password_hash = hash_with(&self.hasher, password)
            .map_err(|err| DirectoryError::InvalidEntry(format!("user '{id}': {err}")))?;
        self.insert(id, role, password_hash)?;
        Ok(self)
    }

    /// Parses `id:ROLE:phc` entries separated by [`ENTRY_SEPARATOR`].
    ///
    /// Blank entries are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::InvalidEntry`] for an entry with an empty
    /// or repeated id, an unknown role, or a hash that is not an argon2 PHC
    /// string.
    ///
    /// # Example
    ///
    /// ```rust
    /// use eventhub_server::directory::{hash_password, InMemoryDirectory, UserDirectory};
    ///
    /// let entries = format!("alice:ORGANIZER:{}", hash_password("hunter2").unwrap());
    /// let directory = InMemoryDirectory::from_entries(&entries).unwrap();
    ///
    /// assert!(directory.authenticate("alice", "hunter2").is_ok());
    /// assert!(directory.authenticate("alice", "wrong").is_err());
    /// ```
    pub fn from_entries(entries: &str) -> Result<Self, DirectoryError> {
        let mut directory = Self::new();

        for entry in entries.split(ENTRY_SEPARATOR) {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }

            let mut parts = entry.splitn(3, ':');
            let (id, role, phc) = match (parts.next(), parts.next(), parts.next()) {
                (Some(id), Some(role), Some(phc)) => (id.trim(), role.trim(), phc.trim()),
                _ => {
                    return Err(DirectoryError::InvalidEntry(format!(
                        "expected 'id:ROLE:phc', got '{entry}'"
                    )))
                }
            };

            let role: Role = role
                .parse()
                .map_err(|err| DirectoryError::InvalidEntry(format!("user '{id}': {err}")))?;

            let parsed = PasswordHash::new(phc).map_err(|err| {
                DirectoryError::InvalidEntry(format!("user '{id}': invalid password hash: {err}"))
            })?;
            if !parsed.algorithm.as_str().starts_with("argon2") {
                return Err(DirectoryError::InvalidEntry(format!(
                    "user '{id}': password hash must be argon2, got '{}'",
                    parsed.algorithm
                )));
            }

            directory.insert(id.to_string(), role, phc.to_string())?;
        }

        debug!(user_count = directory.users.len(), "Loaded user directory");
        Ok(directory)
    }

    /// Number of users.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Returns `true` if the directory has no users.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    fn insert(
        &mut self,
        id: String,
        role: Role,
        password_hash: String,
    ) -> Result<(), DirectoryError> {
        if id.is_empty() {
            return Err(DirectoryError::InvalidEntry(
                "user id cannot be empty".to_string(),
            ));
        }
        if self.users.contains_key(&id) {
            return Err(DirectoryError::InvalidEntry(format!(
                "user '{id}': duplicate user id"
            )));
        }

        self.users.insert(id, UserRecord { role, password_hash });
        Ok(())
    }

    fn verify(&self, record: &UserRecord, password: &str) -> bool {
        PasswordHash::new(&record.password_hash)
            .map(|parsed| {
                self.hasher
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok()
            })
            .unwrap_or(false)
    }
}

impl UserDirectory for InMemoryDirectory {
    fn authenticate(&self, user_id: &str, password: &str) -> Result<Principal, DirectoryError> {
        let known = self.users.get(user_id);

        // Unknown ids are verified against some other user's hash so both
        // paths run one full argon2 verification.
        let Some(record) = known.or_else(|| self.users.values().next()) else {
            trace!(user = %user_id, "Unknown user");
            return Err(DirectoryError::InvalidCredentials);
        };
        let matches = self.verify(record, password);

        match known {
            Some(record) if matches => Ok(Principal::new(user_id, record.role)),
            Some(_) => {
                trace!(user = %user_id, "Password mismatch");
                Err(DirectoryError::InvalidCredentials)
            }
            None => {
                trace!(user = %user_id, "Unknown user");
                Err(DirectoryError::InvalidCredentials)
            }
        }
    }
}

impl std::fmt::Debug for InMemoryDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryDirectory")
            .field("user_count", &self.users.len())
            .finish()
    }
}

/// Hashes `password` into an argon2id PHC string with a random salt, using
/// the default parameters.
///
/// # Errors
///
/// Returns [`DirectoryError::InvalidEntry`] if hashing fails.
pub fn hash_password(password: &str) -> Result<String, DirectoryError> {
    hash_with(&Argon2::default(), password)
        .map_err(|err| DirectoryError::InvalidEntry(err.to_string()))
}

fn hash_with(hasher: &Argon2<'_>, password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(hasher.hash_password(password.as_bytes(), &salt)?.to_string())
}
