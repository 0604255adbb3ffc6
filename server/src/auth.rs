//! Bearer token authentication.
//!
//! This module issues and verifies the signed, time-limited credentials that
//! gate every request to the EventHub API. A credential binds a principal
//! identifier to a [`Role`] and carries its own issue and expiry times, so
//! verification needs nothing beyond the current signing key and a clock.
//!
//! # Token Format
//!
//! Credentials are HS256 JWTs encoded and signed with `jsonwebtoken`:
//!
//! ```text
//! base64url(header) "." base64url(claims) "." base64url(hmac_sha256(header "." claims))
//! ```
//!
//! The header is always `{"typ":"JWT","alg":"HS256"}`. The claims hold
//! `sub`, `role`, `iat`, `exp` (Unix seconds) and a random `jti`.
//!
//! The library's own expiry check is disabled. It reads the wall clock and
//! still accepts a token at `now == exp`, so expiry is checked here against
//! the authenticator's [`Clock`].
//!
//! # Acceptance Rule
//!
//! A credential is accepted if and only if its signature verifies against the
//! current signing key and the current time is strictly before `exp`. There is
//! no revocation list; rotating the key invalidates every outstanding
//! credential.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use eventhub_server::auth::{authorize, Authenticator, Role, SigningKey};
//!
//! let key = SigningKey::new("an-example-secret-that-is-long-enough").unwrap();
//! let authenticator = Authenticator::new(key, Duration::from_secs(3600));
//!
//! let credential = authenticator.issue("u1", Role::Caregiver).unwrap();
//! let principal = authenticator.verify(credential.as_str()).unwrap();
//!
//! assert_eq!(principal.id, "u1");
//! assert!(authorize(&principal, &[Role::Caregiver, Role::Admin]));
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, trace};
use uuid::Uuid;

/// Minimum signing secret length in bytes (256 bits).
pub const MIN_SECRET_LENGTH: usize = 32;

/// Signature algorithm of every credential.
const ALGORITHM: Algorithm = Algorithm::HS256;

/// Number of hex characters of the key digest used as a key identifier.
const KEY_ID_LENGTH: usize = 8;

// ============================================================================
// Errors
// ============================================================================

/// Reasons a credential can be rejected.
///
/// Every variant is an expected outcome of untrusted input. Callers map all
/// of them to the same "unauthenticated" response; the distinction exists for
/// diagnostics only.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The signature segment did not verify against the current key.
    ///
    /// Covers tampered claims, credentials signed with a rotated key, and
    /// signature segments that are not valid base64url.
    #[error("invalid signature")]
    BadSignature,

    /// The signature is valid but the credential is past its expiry.
    #[error("credential expired")]
    Expired,

    /// The credential could not be decoded.
    #[error("malformed credential: {0}")]
    Malformed(String),

    /// The credential could not be encoded while issuing.
    #[error("failed to issue credential: {0}")]
    Internal(String),
}

impl AuthError {
    /// Creates an error for a credential that could not be decoded.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed(reason.into())
    }

    /// Returns `true` if the signature did not verify.
    pub fn is_signature_error(&self) -> bool {
        matches!(self, Self::BadSignature)
    }

    /// Returns `true` if the credential expired.
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::Expired)
    }

    /// Returns `true` if the credential could not be decoded.
    pub fn is_format_error(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }

    /// Stable machine-readable code for logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadSignature => "bad_signature",
            Self::Expired => "expired",
            Self::Malformed(_) => "malformed",
            Self::Internal(_) => "internal",
        }
    }
}

/// Errors raised when constructing a [`SigningKey`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// The secret is shorter than [`MIN_SECRET_LENGTH`].
    #[error("signing secret too short: got {actual} bytes, need at least {minimum}")]
    TooShort {
        /// Length of the rejected secret.
        actual: usize,
        /// Required minimum length.
        minimum: usize,
    },
}

/// Error returned when parsing an unknown role name.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown role: {0}")]
pub struct ParseRoleError(pub String);

// ============================================================================
// Principal and Role
// ============================================================================

/// The closed set of roles a principal can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Full administrative access.
    Admin,
    /// Creates and manages events.
    Organizer,
    /// Manages attendance on behalf of attendees.
    Caregiver,
    /// Attends events.
    Attendee,
}

impl Role {
    /// Every role, in declaration order.
    pub const ALL: [Role; 4] = [Role::Admin, Role::Organizer, Role::Caregiver, Role::Attendee];

    /// Returns the wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Organizer => "ORGANIZER",
            Self::Caregiver => "CAREGIVER",
            Self::Attendee => "ATTENDEE",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseRoleError(s.to_string()))
    }
}

/// The authenticated identity extracted from a verified credential.
///
/// A principal lives for the duration of one request and is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Identifier of the authenticated user.
    pub id: String,

    /// Role granted to the user.
    pub role: Role,
}

impl Principal {
    /// Creates a principal.
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }
}

/// Returns `true` iff the principal's role is one of `required_roles`.
///
/// # Example
///
/// ```rust
/// use eventhub_server::auth::{authorize, Principal, Role};
///
/// let principal = Principal::new("u1", Role::Attendee);
/// assert!(authorize(&principal, &[Role::Attendee]));
/// assert!(!authorize(&principal, &[Role::Admin, Role::Organizer]));
/// assert!(!authorize(&principal, &[]));
/// ```
pub fn authorize(principal: &Principal, required_roles: &[Role]) -> bool {
    required_roles.contains(&principal.role)
}

// ============================================================================
// Credential
// ============================================================================

/// An issued credential: the encoded token plus its validity window.
///
/// The token string is treated as a secret and is redacted from `Debug`
/// output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl Credential {
    /// The encoded token, suitable for an `Authorization: Bearer` header.
    pub fn as_str(&self) -> &str {
        &self.token
    }

    /// Consumes the credential, returning the encoded token.
    pub fn into_token(self) -> String {
        self.token
    }

    /// When the credential was issued.
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// When the credential stops being accepted.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Lifetime of the credential in whole seconds.
    pub fn lifetime_secs(&self) -> u64 {
        (self.expires_at - self.issued_at).num_seconds().max(0) as u64
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    role: Role,
    iat: i64,
    exp: i64,
    jti: Uuid,
}

// ============================================================================
// Signing Key
// ============================================================================

/// A validated HMAC-SHA256 signing key.
///
/// The secret lives only inside the encoding and decoding keys. `Debug`
/// prints a short key identifier derived from a digest of the secret.
#[derive(Clone)]
pub struct SigningKey {
    encoding: EncodingKey,
    decoding: DecodingKey,
    key_id: String,
}

impl SigningKey {
    /// Creates a signing key from raw secret bytes.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::TooShort`] if the secret is shorter than
    /// [`MIN_SECRET_LENGTH`] bytes.
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, KeyError> {
        let secret = secret.as_ref();
        if secret.len() < MIN_SECRET_LENGTH {
            return Err(KeyError::TooShort {
                actual: secret.len(),
                minimum: MIN_SECRET_LENGTH,
            });
        }

        let digest = Sha256::digest(secret);
        let key_id = hex::encode(&digest[..KEY_ID_LENGTH / 2]);

        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            key_id,
        })
    }

    /// Short non-secret identifier for logs.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Clock
// ============================================================================

/// Source of the current time for issuing and verifying credentials.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use eventhub_server::auth::{Clock, ManualClock};
///
/// let clock = ManualClock::new(chrono::Utc::now());
/// let before = clock.now();
/// clock.advance(Duration::from_secs(60));
/// assert_eq!((clock.now() - before).num_seconds(), 60);
/// ```
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        if let Ok(delta) = chrono::Duration::from_std(by) {
            *now += delta;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ============================================================================
// Authenticator
// ============================================================================

/// Issues and verifies credentials.
///
/// The authenticator is constructed once at startup and shared behind an
/// `Arc`. `issue` and `verify` take `&self` and may run concurrently from any
/// number of tasks. The signing key sits behind an `Arc` so that each call
/// works on one immutable key even while [`rotate_key`](Self::rotate_key)
/// swaps in a new one.
pub struct Authenticator {
    key: RwLock<Arc<SigningKey>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    validation: Validation,
}

impl Authenticator {
    /// Creates an authenticator using the system clock.
    pub fn new(key: SigningKey, ttl: Duration) -> Self {
        Self::with_clock(key, ttl, Arc::new(SystemClock))
    }

    /// Creates an authenticator with a caller-supplied clock.
    pub fn with_clock(key: SigningKey, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        debug!(
            key_id = %key.key_id(),
            ttl_secs = ttl.as_secs(),
            "Creating authenticator"
        );
        Self {
            key: RwLock::new(Arc::new(key)),
            ttl,
            clock,
            validation: validation(),
        }
    }

    /// Configured credential time-to-live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Identifier of the key currently used for signing.
    pub fn key_id(&self) -> String {
        self.current_key().key_id().to_string()
    }

    /// Replaces the signing key.
    ///
    /// Credentials signed with the previous key are rejected with
    /// [`AuthError::BadSignature`] from this point on. Verifications already
    /// in flight finish against the key they started with.
    pub fn rotate_key(&self, key: SigningKey) {
        let new_key_id = key.key_id().to_string();
        let mut current = self.key.write().unwrap_or_else(PoisonError::into_inner);
        let old_key_id = current.key_id().to_string();
        *current = Arc::new(key);
        info!(
            old_key_id = %old_key_id,
            new_key_id = %new_key_id,
            "Signing key rotated"
        );
    }

    /// Issues a credential for `principal_id` with `role`.
    ///
    /// `issued_at` is the current time truncated to whole seconds and
    /// `expires_at` is `issued_at + ttl`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Internal`] if the claims cannot be encoded or the
    /// expiry overflows.
    pub fn issue(&self, principal_id: &str, role: Role) -> Result<Credential, AuthError> {
        let key = self.current_key();

        let iat = self.clock.now().timestamp();
        let ttl_secs = i64::try_from(self.ttl.as_secs())
            .map_err(|_| AuthError::Internal("ttl out of range".to_string()))?;
        let exp = iat
            .checked_add(ttl_secs)
            .ok_or_else(|| AuthError::Internal("expiry overflow".to_string()))?;

        let claims = Claims {
            sub: principal_id.to_string(),
            role,
            iat,
            exp,
            jti: Uuid::new_v4(),
        };

        let token = jsonwebtoken::encode(&Header::new(ALGORITHM), &claims, &key.encoding)
            .map_err(|err| AuthError::Internal(err.to_string()))?;

        let issued_at = timestamp(iat)?;
        let expires_at = timestamp(exp)?;

        info!(
            principal = %principal_id,
            role = %role,
            key_id = %key.key_id(),
            expires_at = %expires_at,
            "Credential issued"
        );

        Ok(Credential {
            token,
            issued_at,
            expires_at,
        })
    }

    /// Verifies a presented token and returns its principal.
    ///
    /// The claims are only decoded once the signature has verified.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Malformed`] if the token does not have three segments,
    ///   the header is not an HS256 header, or the claims cannot be decoded
    /// - [`AuthError::BadSignature`] if the signature does not verify
    /// - [`AuthError::Expired`] if the signature verifies but `now >= exp`
    pub fn verify(&self, token: &str) -> Result<Principal, AuthError> {
        let key = self.current_key();

        let claims = jsonwebtoken::decode::<Claims>(token, &key.decoding, &self.validation)
            .map_err(|err| match err.kind() {
                ErrorKind::InvalidSignature => {
                    trace!(key_id = %key.key_id(), "Signature mismatch");
                    AuthError::BadSignature
                }
                kind => AuthError::malformed(malformed_reason(kind)),
            })?
            .claims;

        let now = self.clock.now().timestamp();
        if now >= claims.exp {
            trace!(
                principal = %claims.sub,
                expired_secs_ago = now - claims.exp,
                "Credential expired"
            );
            return Err(AuthError::Expired);
        }

        Ok(Principal {
            id: claims.sub,
            role: claims.role,
        })
    }

    fn current_key(&self) -> Arc<SigningKey> {
        let guard = self.key.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }
}

impl fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authenticator")
            .field("key_id", &self.key_id())
            .field("ttl", &self.ttl)
            .field("clock", &self.clock)
            .finish()
    }
}

/// Signature and header checks only. Expiry is left to [`Authenticator::verify`].
fn validation() -> Validation {
    let mut validation = Validation::new(ALGORITHM);
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.leeway = 0;
    validation
}

fn malformed_reason(kind: &ErrorKind) -> String {
    match kind {
        ErrorKind::InvalidToken => "expected three segments".to_string(),
        ErrorKind::InvalidAlgorithm => "unsupported algorithm".to_string(),
        ErrorKind::Base64(_) => "invalid base64".to_string(),
        ErrorKind::Json(_) | ErrorKind::Utf8(_) => "invalid header or claims".to_string(),
        ErrorKind::MissingRequiredClaim(claim) => format!("missing claim '{claim}'"),
        _ => "undecodable credential".to_string(),
    }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, AuthError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| AuthError::Internal(format!("timestamp {secs} out of range")))
}
