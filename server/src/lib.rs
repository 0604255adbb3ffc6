//! EventHub Server - event management API.
//!
//! This crate provides the EventHub HTTP server, responsible for:
//! - Issuing signed, time-limited bearer credentials at login
//! - Verifying credentials and enforcing per-route role policies
//! - Storing events and RSVPs in memory
//!
//! # Architecture
//!
//! A single [`auth::Authenticator`] is built at startup and shared through
//! [`routes::AppState`]. Each handler calls [`access::check_access`] with its
//! route policy and passes the resulting principal to [`board::EventBoard`].

pub mod access;
pub mod auth;
pub mod board;
pub mod config;
pub mod directory;
pub mod error;
pub mod routes;
pub mod throttle;
