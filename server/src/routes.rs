//! HTTP route handlers for the EventHub server.
//!
//! This module provides the HTTP API endpoints:
//!
//! - `POST /auth/login` - Exchange a user id and password for a bearer credential
//! - `GET /auth/me` - Describe the authenticated principal
//! - `GET /events` - List events
//! - `POST /events` - Create an event (admins and organizers)
//! - `POST /events/{id}/rsvp` - Respond to an event
//! - `GET /events/{id}/rsvps` - List responses (admins, organizers and caregivers)
//! - `GET /health` - Health check endpoint
//!
//! # Access Checks
//!
//! Every protected handler starts with a call to
//! [`check_access`]/[`require_principal`] carrying the route's
//! [`AccessPolicy`]. The principal it returns is passed directly to the
//! board, so there is no hidden per-request identity.
//!
//! # Example
//!
//! ```rust,no_run
//! use eventhub_server::config::Config;
//! use eventhub_server::routes::{create_router, AppState};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::from_env().expect("failed to load config");
//!     let app = create_router(AppState::new(config));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//! ```

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::access::{check_access, require_principal, AccessPolicy, BEARER_SCHEME};
use crate::auth::{Authenticator, Principal, Role};
use crate::board::{Event, EventBoard, NewEvent, Rsvp, RsvpStatus};
use crate::config::Config;
use crate::directory::UserDirectory;
use crate::error::{Result, ServerError};
use crate::throttle::{LoginThrottle, ThrottleDecision};

// ============================================================================
// Constants
// ============================================================================

/// Maximum request body size (64 KB).
const MAX_BODY_SIZE: usize = 64 * 1024;

/// Roles allowed to create events.
const EVENT_MANAGERS: &[Role] = &[Role::Admin, Role::Organizer];

/// Roles allowed to read the RSVP list of an event.
const RSVP_VIEWERS: &[Role] = &[Role::Admin, Role::Organizer, Role::Caregiver];

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for all route handlers.
#[derive(Clone)]
pub struct AppState {
    /// Issues and verifies bearer credentials.
    pub authenticator: Arc<Authenticator>,

    /// Resolves login credentials.
    pub directory: Arc<dyn UserDirectory>,

    /// Per-user login throttle.
    pub throttle: LoginThrottle,

    /// Event and RSVP store.
    pub board: EventBoard,

    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Creates application state from the loaded configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::with_components(
            Authenticator::new(config.signing_key, config.token_ttl),
            Arc::new(config.directory),
            LoginThrottle::new(config.login_rate, config.login_burst),
        )
    }

    /// Creates application state from pre-built components and an empty board.
    #[must_use]
    pub fn with_components(
        authenticator: Authenticator,
        directory: Arc<dyn UserDirectory>,
        throttle: LoginThrottle,
    ) -> Self {
        Self {
            authenticator: Arc::new(authenticator),
            directory,
            throttle,
            board: EventBoard::new(),
            start_time: Instant::now(),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("authenticator", &self.authenticator)
            .field("directory", &"<UserDirectory>")
            .field("throttle", &self.throttle)
            .field("start_time", &self.start_time)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Router
// ============================================================================

/// Creates the application router with all routes configured.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/auth/login", post(post_login))
        .route("/auth/me", get(get_me))
        .route("/events", get(get_events).post(post_events))
        .route("/events/{id}/rsvp", post(post_rsvp))
        .route("/events/{id}/rsvps", get(get_rsvps))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .route("/health", get(get_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|err| {
        debug!(error = %err, "Failed to parse request body");
        ServerError::validation(format!("invalid request body: {err}"))
    })
}

// ============================================================================
// POST /auth/login
// ============================================================================

/// Request body for login.
#[derive(Deserialize)]
struct LoginRequest {
    user_id: String,
    password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("user_id", &self.user_id)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Response body for a successful login.
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    /// The bearer credential.
    pub access_token: String,

    /// Always `"Bearer"`.
    pub token_type: String,

    /// Seconds until the credential expires.
    pub expires_in: u64,
}

/// POST /auth/login - Issue a credential.
///
/// # Responses
///
/// - `200 OK` - [`LoginResponse`]
/// - `400 Bad Request` - Malformed body
/// - `401 Unauthorized` - Unknown user or wrong password
/// - `429 Too Many Requests` - Too many attempts for this user id
async fn post_login(State(state): State<AppState>, body: Bytes) -> Result<Json<LoginResponse>> {
    // serde messages can quote field values, so the password must not reach them.
    let request: LoginRequest = serde_json::from_slice(&body)
        .map_err(|_| ServerError::validation("expected {\"user_id\", \"password\"}"))?;

    if request.user_id.trim().is_empty() {
        return Err(ServerError::validation("user_id cannot be empty"));
    }

    if let ThrottleDecision::Limited { retry_after_secs } =
        state.throttle.check(&request.user_id).await
    {
        warn!(
            user = %request.user_id,
            retry_after = retry_after_secs,
            "Login throttled"
        );
        return Err(ServerError::RateLimit {
            retry_after: retry_after_secs,
        });
    }

    let principal = state
        .directory
        .authenticate(&request.user_id, &request.password)
        .inspect_err(|_| debug!(user = %request.user_id, "Login rejected"))?;

    let credential = state
        .authenticator
        .issue(&principal.id, principal.role)
        .map_err(|err| ServerError::internal(err.to_string()))?;

    Ok(Json(LoginResponse {
        expires_in: credential.lifetime_secs(),
        access_token: credential.into_token(),
        token_type: BEARER_SCHEME.to_string(),
    }))
}

// ============================================================================
// GET /auth/me
// ============================================================================

/// GET /auth/me - Return the principal behind the presented credential.
async fn get_me(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<Principal>> {
    let principal = require_principal(&headers, &state.authenticator, AccessPolicy::Authenticated)?;
    Ok(Json(principal))
}

// ============================================================================
// Events
// ============================================================================

/// GET /events - List all events ordered by start time.
///
/// No credential is needed, but one that is presented must verify.
async fn get_events(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<Vec<Event>>> {
    check_access(&headers, &state.authenticator, AccessPolicy::Anonymous)?;
    Ok(Json(state.board.list_events().await))
}

/// POST /events - Create an event organised by the caller.
///
/// # Responses
///
/// - `201 Created` - The new [`Event`]
/// - `400 Bad Request` - Invalid body or title
/// - `401 Unauthorized` / `403 Forbidden` - Access denied
async fn post_events(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let principal = require_principal(
        &headers,
        &state.authenticator,
        AccessPolicy::Roles(EVENT_MANAGERS),
    )?;
    let request: NewEvent = parse_json(&body)?;

    let event = state.board.create_event(&principal, request).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

// ============================================================================
// RSVPs
// ============================================================================

/// Request body for an RSVP.
#[derive(Debug, Deserialize)]
struct RsvpRequest {
    status: RsvpStatus,
}

/// Unparseable ids cannot name an event, so they are reported as missing.
fn parse_event_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ServerError::not_found(format!("event not found: {raw}")))
}

/// POST /events/{id}/rsvp - Record the caller's response to an event.
async fn post_rsvp(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Rsvp>> {
    let principal = require_principal(&headers, &state.authenticator, AccessPolicy::Authenticated)?;
    let event_id = parse_event_id(&id)?;
    let request: RsvpRequest = parse_json(&body)?;

    let rsvp = state.board.rsvp(&principal, event_id, request.status).await?;
    Ok(Json(rsvp))
}

/// GET /events/{id}/rsvps - List responses to an event.
async fn get_rsvps(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Vec<Rsvp>>> {
    require_principal(
        &headers,
        &state.authenticator,
        AccessPolicy::Roles(RSVP_VIEWERS),
    )?;
    let event_id = parse_event_id(&id)?;

    Ok(Json(state.board.rsvps_for(event_id).await?))
}

// ============================================================================
// GET /health - Health Check
// ============================================================================

/// Response body for health check endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Server status (always "ok" if responding).
    pub status: String,

    /// Server uptime in seconds.
    pub uptime_seconds: u64,
}

/// GET /health - Health check endpoint. No authentication required.
async fn get_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
    use axum::http::Request;
    use argon2::{Algorithm, Argon2, Params, Version};
    use axum::response::Response;
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    use crate::auth::{ManualClock, SigningKey};
    use crate::directory::InMemoryDirectory;

    const TEST_SECRET: &str = "routes-test-secret-0123456789abcdef";

    fn test_directory() -> InMemoryDirectory {
        let params = Params::new(Params::MIN_M_COST, Params::MIN_T_COST, 1, None).unwrap();
        InMemoryDirectory::with_hasher(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
            .with_user("admin", Role::Admin, "admin-pw")
            .and_then(|d| d.with_user("org", Role::Organizer, "org-pw"))
            .and_then(|d| d.with_user("care", Role::Caregiver, "care-pw"))
            .and_then(|d| d.with_user("guest", Role::Attendee, "guest-pw"))
            .unwrap()
    }

    fn test_state_with(clock: Arc<ManualClock>, throttle: LoginThrottle) -> AppState {
        let key = SigningKey::new(TEST_SECRET).unwrap();
        AppState::with_components(
            Authenticator::with_clock(key, Duration::from_secs(3600), clock),
            Arc::new(test_directory()),
            throttle,
        )
    }

    fn test_state() -> AppState {
        test_state_with(
            Arc::new(ManualClock::new(Utc::now())),
            LoginThrottle::new(1.0, 100),
        )
    }

    fn token_for(state: &AppState, id: &str, role: Role) -> String {
        state.authenticator.issue(id, role).unwrap().into_token()
    }

    fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, request: Request<Body>) -> Response {
        app.clone().oneshot(request).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn login_body(user_id: &str, password: &str) -> Option<Value> {
        Some(json!({ "user_id": user_id, "password": password }))
    }

    fn event_body(title: &str) -> Option<Value> {
        Some(json!({ "title": title, "starts_at": "2030-05-01T18:00:00Z" }))
    }

    async fn create_event(app: &Router, token: &str) -> String {
        let response = send(app, request("POST", "/events", Some(token), event_body("Picnic"))).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        json_body(response).await["id"].as_str().unwrap().to_string()
    }

    // ========================================================================
    // Health endpoint tests
    // ========================================================================

    #[tokio::test]
    async fn health_returns_ok_status() {
        let app = create_router(test_state());

        let response = send(&app, request("GET", "/health", None, None)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let health: HealthResponse = serde_json::from_value(json_body(response).await).unwrap();
        assert_eq!(health.status, "ok");
    }

    // ========================================================================
    // Login tests
    // ========================================================================

    #[tokio::test]
    async fn login_issues_verifiable_credential() {
        let state = test_state();
        let app = create_router(state.clone());

        let response = send(&app, request("POST", "/auth/login", None, login_body("org", "org-pw"))).await;
        assert_eq!(response.status(), StatusCode::OK);

        let login: LoginResponse = serde_json::from_value(json_body(response).await).unwrap();
        assert_eq!(login.token_type, "Bearer");
        assert_eq!(login.expires_in, 3600);

        let principal = state.authenticator.verify(&login.access_token).unwrap();
        assert_eq!(principal, Principal::new("org", Role::Organizer));
    }

    #[tokio::test]
    async fn login_wrong_password_and_unknown_user_look_the_same() {
        let app = create_router(test_state());

        let wrong = send(&app, request("POST", "/auth/login", None, login_body("org", "nope"))).await;
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
        let wrong = json_body(wrong).await;

        let unknown = send(&app, request("POST", "/auth/login", None, login_body("who", "nope"))).await;
        assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);

        assert_eq!(wrong, json_body(unknown).await);
        assert_eq!(wrong["code"], "unauthorized");
    }

    #[tokio::test]
    async fn login_rejects_malformed_body() {
        let app = create_router(test_state());

        let response = send(
            &app,
            request("POST", "/auth/login", None, Some(json!({ "user_id": "org" }))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["code"], "validation_error");
    }

    #[tokio::test]
    async fn login_rejects_empty_user_id() {
        let app = create_router(test_state());

        let response = send(&app, request("POST", "/auth/login", None, login_body("  ", "x"))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn login_is_throttled_per_user() {
        let state = test_state_with(
            Arc::new(ManualClock::new(Utc::now())),
            LoginThrottle::new(0.01, 2),
        );
        let app = create_router(state);

        for _ in 0..2 {
            let response = send(&app, request("POST", "/auth/login", None, login_body("org", "bad"))).await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }

        // Correct password, but the bucket is empty.
        let response = send(&app, request("POST", "/auth/login", None, login_body("org", "org-pw"))).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(RETRY_AFTER));
        assert_eq!(json_body(response).await["code"], "rate_limited");

        let other = send(&app, request("POST", "/auth/login", None, login_body("care", "care-pw"))).await;
        assert_eq!(other.status(), StatusCode::OK);
    }

    // ========================================================================
    // /auth/me tests
    // ========================================================================

    #[tokio::test]
    async fn me_requires_credential() {
        let app = create_router(test_state());

        let response = send(&app, request("GET", "/auth/me", None, None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn me_returns_principal() {
        let state = test_state();
        let token = token_for(&state, "u1", Role::Caregiver);
        let app = create_router(state);

        let response = send(&app, request("GET", "/auth/me", Some(&token), None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({ "id": "u1", "role": "CAREGIVER" })
        );
    }

    #[tokio::test]
    async fn me_rejects_expired_credential() {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()));
        let state = test_state_with(Arc::clone(&clock), LoginThrottle::default());
        let token = token_for(&state, "u1", Role::Caregiver);
        let app = create_router(state);

        assert_eq!(
            send(&app, request("GET", "/auth/me", Some(&token), None)).await.status(),
            StatusCode::OK
        );

        clock.advance(Duration::from_secs(3601));

        let response = send(&app, request("GET", "/auth/me", Some(&token), None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["code"], "unauthorized");
    }

    #[tokio::test]
    async fn rotated_key_invalidates_old_credentials() {
        let state = test_state();
        let token = token_for(&state, "u1", Role::Admin);
        state
            .authenticator
            .rotate_key(SigningKey::new("a-brand-new-secret-0123456789abcdef").unwrap());
        let app = create_router(state.clone());

        let response = send(&app, request("GET", "/auth/me", Some(&token), None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let fresh = token_for(&state, "u1", Role::Admin);
        let response = send(&app, request("GET", "/auth/me", Some(&fresh), None)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    // ========================================================================
    // Event tests
    // ========================================================================

    #[tokio::test]
    async fn list_events_is_anonymous() {
        let app = create_router(test_state());

        let response = send(&app, request("GET", "/events", None, None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!([]));
    }

    #[tokio::test]
    async fn list_events_rejects_invalid_presented_token() {
        let app = create_router(test_state());

        let response = send(&app, request("GET", "/events", Some("not.a.token"), None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn create_event_requires_manager_role() {
        let state = test_state();
        let attendee = token_for(&state, "guest", Role::Attendee);
        let caregiver = token_for(&state, "care", Role::Caregiver);
        let app = create_router(state);

        let response = send(&app, request("POST", "/events", None, event_body("Picnic"))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        for token in [attendee, caregiver] {
            let response = send(&app, request("POST", "/events", Some(&token), event_body("Picnic"))).await;
            assert_eq!(response.status(), StatusCode::FORBIDDEN);
            assert_eq!(json_body(response).await["code"], "forbidden");
        }
    }

    #[tokio::test]
    async fn create_event_as_organizer() {
        let state = test_state();
        let token = token_for(&state, "org", Role::Organizer);
        let app = create_router(state);

        let response = send(&app, request("POST", "/events", Some(&token), event_body("Picnic"))).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let event = json_body(response).await;
        assert_eq!(event["title"], "Picnic");
        assert_eq!(event["organizer_id"], "org");

        let listed = json_body(send(&app, request("GET", "/events", None, None)).await).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_event_rejects_blank_title() {
        let state = test_state();
        let token = token_for(&state, "admin", Role::Admin);
        let app = create_router(state);

        let response = send(&app, request("POST", "/events", Some(&token), event_body("  "))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            json!({ "error": "title cannot be empty", "code": "validation_error" })
        );
    }

    #[tokio::test]
    async fn create_event_checks_access_before_body() {
        let state = test_state();
        let token = token_for(&state, "guest", Role::Attendee);
        let app = create_router(state);

        let response = send(&app, request("POST", "/events", Some(&token), Some(json!("garbage")))).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    // ========================================================================
    // RSVP tests
    // ========================================================================

    #[tokio::test]
    async fn rsvp_to_unknown_event_is_not_found() {
        let state = test_state();
        let token = token_for(&state, "guest", Role::Attendee);
        let app = create_router(state);
        let body = Some(json!({ "status": "going" }));

        let uri = format!("/events/{}/rsvp", Uuid::new_v4());
        let response = send(&app, request("POST", &uri, Some(&token), body.clone())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(&app, request("POST", "/events/not-a-uuid/rsvp", Some(&token), body)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn rsvp_requires_credential() {
        let app = create_router(test_state());
        let uri = format!("/events/{}/rsvp", Uuid::new_v4());

        let response = send(&app, request("POST", &uri, None, Some(json!({ "status": "going" })))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn rsvp_flow_and_visibility() {
        let state = test_state();
        let organizer = token_for(&state, "org", Role::Organizer);
        let attendee = token_for(&state, "guest", Role::Attendee);
        let caregiver = token_for(&state, "care", Role::Caregiver);
        let app = create_router(state);

        let event_id = create_event(&app, &organizer).await;
        let rsvp_uri = format!("/events/{event_id}/rsvp");
        let list_uri = format!("/events/{event_id}/rsvps");

        let response = send(
            &app,
            request("POST", &rsvp_uri, Some(&attendee), Some(json!({ "status": "maybe" }))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let rsvp = json_body(response).await;
        assert_eq!(rsvp["principal_id"], "guest");
        assert_eq!(rsvp["status"], "maybe");

        let response = send(&app, request("GET", &list_uri, Some(&attendee), None)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = send(&app, request("GET", &list_uri, Some(&caregiver), None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let rsvps = json_body(response).await;
        assert_eq!(rsvps.as_array().unwrap().len(), 1);
        assert_eq!(rsvps[0]["status"], "maybe");
    }

    #[tokio::test]
    async fn rsvp_rejects_unknown_status() {
        let state = test_state();
        let organizer = token_for(&state, "org", Role::Organizer);
        let app = create_router(state);

        let event_id = create_event(&app, &organizer).await;
        let uri = format!("/events/{event_id}/rsvp");

        let response = send(
            &app,
            request("POST", &uri, Some(&organizer), Some(json!({ "status": "perhaps" }))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    // ========================================================================
    // State tests
    // ========================================================================

    #[test]
    fn app_state_debug_hides_secrets() {
        let state = test_state();
        let debug_str = format!("{state:?}");

        assert!(debug_str.contains("AppState"));
        assert!(debug_str.contains("key_id"));
        assert!(!debug_str.contains(TEST_SECRET));
    }

    #[test]
    fn login_request_debug_redacts_password() {
        let request: LoginRequest =
            serde_json::from_str(r#"{"user_id":"org","password":"hunter2"}"#).unwrap();
        let debug_str = format!("{request:?}");

        assert!(debug_str.contains("org"));
        assert!(!debug_str.contains("hunter2"));
    }
}
