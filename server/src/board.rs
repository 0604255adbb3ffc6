//! In-memory event board.
//!
//! Holds events and their RSVPs for the HTTP layer. Every mutating call takes
//! the acting [`Principal`] explicitly; the board does no access checks of its
//! own, which is the caller's job (see [`crate::access`]).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::Principal;

/// Maximum event title length in characters.
pub const MAX_TITLE_LENGTH: usize = 200;

/// Errors returned by board operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BoardError {
    /// No event with the given id.
    #[error("event not found: {0}")]
    NotFound(Uuid),

    /// The request failed validation.
    #[error("{0}")]
    Validation(String),
}

/// A scheduled event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub organizer_id: String,
    pub created_at: DateTime<Utc>,
}

/// Request body for creating an event.
#[derive(Debug, Clone, Deserialize)]
pub struct NewEvent {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
}

/// Attendance response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RsvpStatus {
    Going,
    Maybe,
    Declined,
}

/// One principal's response to one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rsvp {
    pub event_id: Uuid,
    pub principal_id: String,
    pub status: RsvpStatus,
    pub responded_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct BoardInner {
    events: Vec<Event>,
    rsvps: HashMap<Uuid, HashMap<String, Rsvp>>,
}

/// Shared event store. Cheap to clone; clones share state.
#[derive(Debug, Clone, Default)]
pub struct EventBoard {
    inner: Arc<RwLock<BoardInner>>,
}

impl EventBoard {
    /// Creates an empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// All events ordered by start time.
    pub async fn list_events(&self) -> Vec<Event> {
        let inner = self.inner.read().await;
        let mut events = inner.events.clone();
        events.sort_by(|a, b| a.starts_at.cmp(&b.starts_at).then(a.id.cmp(&b.id)));
        events
    }

    /// Creates an event organised by `principal`.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::Validation`] if the title is blank or longer than
    /// [`MAX_TITLE_LENGTH`] characters.
    pub async fn create_event(
        &self,
        principal: &Principal,
        request: NewEvent,
    ) -> Result<Event, BoardError> {
        let title = request.title.trim();
        if title.is_empty() {
            return Err(BoardError::Validation("title cannot be empty".to_string()));
        }
        if title.chars().count() > MAX_TITLE_LENGTH {
            return Err(BoardError::Validation(format!(
                "title cannot exceed {MAX_TITLE_LENGTH} characters"
            )));
        }

        let event = Event {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: request.description,
            location: request.location,
            starts_at: request.starts_at,
            organizer_id: principal.id.clone(),
            created_at: Utc::now(),
        };

        self.inner.write().await.events.push(event.clone());

        info!(
            event_id = %event.id,
            organizer = %principal.id,
            "Event created"
        );
        Ok(event)
    }

    /// Records `principal`'s response to an event, replacing any earlier one.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::NotFound`] if the event does not exist.
    pub async fn rsvp(
        &self,
        principal: &Principal,
        event_id: Uuid,
        status: RsvpStatus,
    ) -> Result<Rsvp, BoardError> {
        let mut inner = self.inner.write().await;
        if !inner.events.iter().any(|event| event.id == event_id) {
            return Err(BoardError::NotFound(event_id));
        }

        let rsvp = Rsvp {
            event_id,
            principal_id: principal.id.clone(),
            status,
            responded_at: Utc::now(),
        };

        let replaced = inner
            .rsvps
            .entry(event_id)
            .or_default()
            .insert(principal.id.clone(), rsvp.clone())
            .is_some();

        debug!(
            event_id = %event_id,
            principal = %principal.id,
            status = ?status,
            replaced,
            "RSVP recorded"
        );
        Ok(rsvp)
    }

    /// Responses for an event, ordered by principal id.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::NotFound`] if the event does not exist.
    pub async fn rsvps_for(&self, event_id: Uuid) -> Result<Vec<Rsvp>, BoardError> {
        let inner = self.inner.read().await;
        if !inner.events.iter().any(|event| event.id == event_id) {
            return Err(BoardError::NotFound(event_id));
        }

        let mut rsvps: Vec<Rsvp> = inner
            .rsvps
            .get(&event_id)
            .map(|by_principal| by_principal.values().cloned().collect())
            .unwrap_or_default();
        rsvps.sort_by(|a, b| a.principal_id.cmp(&b.principal_id));
        Ok(rsvps)
    }
}
