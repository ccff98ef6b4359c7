//! gRPC service implementation.
//!
//! This module wires the generated `UserService` trait to the domain registry
//! and the per-call streaming coordinators. It also owns the shutdown state
//! shared by every clone of the service.
//!
//! ## Structure
//!
//! - [`handler`] - gRPC service entry point (`UserRpcService`).

pub mod handler;
