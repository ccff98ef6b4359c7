//! Per-call coordinators for the streaming RPCs.
//!
//! - [`coordinator`] - server streaming (`GetUsers`) page feed.
//! - [`batch`] - client streaming (`BatchCreateUsers`) accumulator.
//! - [`sync`] - bidirectional (`SyncUsers`) request/response pairing.
//!
//! Inbound-driven calls implement [`usergate_core::call::CallObserver`] and
//! are run by [`usergate_core::call::drive`], so the reactions of one call
//! never overlap.

pub mod batch;
pub mod coordinator;
pub mod sync;
