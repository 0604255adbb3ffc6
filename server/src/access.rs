//! Per-request access checks.
//!
//! Handlers call [`check_access`] (or [`require_principal`]) as their first
//! step, passing the request headers, the shared [`Authenticator`], and the
//! route's [`AccessPolicy`]. The returned [`Principal`] is handed straight to
//! the domain call; nothing is stashed in request-local or thread-local state.
//!
//! # Header Format
//!
//! Credentials arrive as `Authorization: Bearer <token>`. The scheme is
//! matched case-insensitively. A missing header, a header with another
//! scheme, and a header with an empty token are all treated the same as a
//! credential that fails verification.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use axum::http::{header::AUTHORIZATION, HeaderMap, HeaderValue};
//! use eventhub_server::access::{check_access, AccessPolicy};
//! use eventhub_server::auth::{Authenticator, Role, SigningKey};
//!
//! let key = SigningKey::new("an-example-secret-that-is-long-enough").unwrap();
//! let authenticator = Authenticator::new(key, Duration::from_secs(60));
//! let credential = authenticator.issue("u1", Role::Organizer).unwrap();
//!
//! let mut headers = HeaderMap::new();
//! let value = format!("Bearer {}", credential.as_str());
//! headers.insert(AUTHORIZATION, HeaderValue::from_str(&value).unwrap());
//!
//! let policy = AccessPolicy::Roles(&[Role::Organizer]);
//! let principal = check_access(&headers, &authenticator, policy).unwrap();
//! assert_eq!(principal.unwrap().id, "u1");
//!
//! // Anonymous routes accept requests with no header at all.
//! let anonymous = check_access(&HeaderMap::new(), &authenticator, AccessPolicy::Anonymous);
//! assert_eq!(anonymous, Ok(None));
//! ```

use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use thiserror::Error;
use tracing::debug;

use crate::auth::{authorize, AuthError, Authenticator, Principal, Role};

/// Authorization scheme accepted in the `Authorization` header.
pub const BEARER_SCHEME: &str = "Bearer";

/// Reasons a request is denied.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// The route requires a credential and none was presented.
    #[error("missing credentials")]
    MissingCredentials,

    /// The `Authorization` header is present but not `Bearer <token>`.
    #[error("malformed authorization header")]
    MalformedHeader,

    /// The presented credential failed verification.
    #[error("credential rejected: {0}")]
    Rejected(#[from] AuthError),

    /// The principal is authenticated but lacks a required role.
    #[error("role {role} is not permitted")]
    Forbidden {
        /// Role held by the principal.
        role: Role,
    },
}

impl AccessError {
    /// Returns `true` if the request should be treated as unauthenticated.
    pub fn is_unauthenticated(&self) -> bool {
        !matches!(self, Self::Forbidden { .. })
    }

    /// HTTP status for this denial: 401 for anything unauthenticated, 403
    /// for an authenticated principal without the right role.
    pub fn status(&self) -> StatusCode {
        if self.is_unauthenticated() {
            StatusCode::UNAUTHORIZED
        } else {
            StatusCode::FORBIDDEN
        }
    }

    /// Diagnostic code for logs. Not exposed to clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingCredentials => "missing_credentials",
            Self::MalformedHeader => "malformed_header",
            Self::Rejected(err) => err.code(),
            Self::Forbidden { .. } => "forbidden",
        }
    }
}

/// What a route demands of the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPolicy {
    /// No credential needed, but a presented credential must verify.
    Anonymous,

    /// A valid credential with any role.
    Authenticated,

    /// A valid credential whose role is in the list.
    Roles(&'static [Role]),
}

/// Extracts the bearer token from the `Authorization` header.
///
/// Returns `Ok(None)` when the header is absent.
///
/// # Errors
///
/// Returns [`AccessError::MalformedHeader`] if the header is not valid
/// visible ASCII, uses a scheme other than `Bearer`, or carries an empty
/// token.
pub fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, AccessError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value.to_str().map_err(|_| AccessError::MalformedHeader)?;
    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or(AccessError::MalformedHeader)?;

    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
        return Err(AccessError::MalformedHeader);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AccessError::MalformedHeader);
    }

    Ok(Some(token))
}

/// Applies `policy` to a request.
///
/// Returns the verified principal, or `None` for an anonymous request on an
/// [`AccessPolicy::Anonymous`] route.
///
/// # Errors
///
/// - [`AccessError::MissingCredentials`] if the policy requires a credential
///   and the header is absent
/// - [`AccessError::MalformedHeader`] if the header cannot be parsed
/// - [`AccessError::Rejected`] if verification fails
/// - [`AccessError::Forbidden`] if the principal's role is not permitted
pub fn check_access(
    headers: &HeaderMap,
    authenticator: &Authenticator,
    policy: AccessPolicy,
) -> Result<Option<Principal>, AccessError> {
    let result = evaluate(headers, authenticator, policy);
    if let Err(ref err) = result {
        debug!(code = err.code(), policy = ?policy, "Access denied");
    }
    result
}

/// Like [`check_access`] but always yields a principal.
///
/// An anonymous request is reported as [`AccessError::MissingCredentials`]
/// even on an [`AccessPolicy::Anonymous`] route.
pub fn require_principal(
    headers: &HeaderMap,
    authenticator: &Authenticator,
    policy: AccessPolicy,
) -> Result<Principal, AccessError> {
    check_access(headers, authenticator, policy)?.ok_or(AccessError::MissingCredentials)
}

fn evaluate(
    headers: &HeaderMap,
    authenticator: &Authenticator,
    policy: AccessPolicy,
) -> Result<Option<Principal>, AccessError> {
    let token = match bearer_token(headers)? {
        Some(token) => token,
        None if policy == AccessPolicy::Anonymous => return Ok(None),
        None => return Err(AccessError::MissingCredentials),
    };

    let principal = authenticator.verify(token)?;

    if let AccessPolicy::Roles(required) = policy {
        if !authorize(&principal, required) {
            return Err(AccessError::Forbidden {
                role: principal.role,
            });
        }
    }

    Ok(Some(principal))
}
