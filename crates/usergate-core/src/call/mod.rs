//! Call coordination primitives shared by the server and the gateway.
//!
//! - [`channel`] - per-call outbound queues and the inbound reaction loop.
//! - [`signal`] - the one-shot completion signal a caller waits on.

pub mod channel;
pub mod signal;

pub use channel::{CallObserver, CallSender, CallStream, Terminal, call_channel, drive};
pub use signal::{CallOutcome, CompletionSignal};
