//! Server side of the user service.
//!
//! - [`config`] - CLI/environment configuration.
//! - [`domain`] - the user registry the coordinators call into.
//! - [`service`] - the tonic `UserService` implementation.
//! - [`streaming`] - per-call coordinators for the streaming shapes.
//! - [`telemetry`] - logging and optional metrics export.

pub mod config;
pub mod domain;
pub mod service;
pub mod streaming;
pub mod telemetry;
