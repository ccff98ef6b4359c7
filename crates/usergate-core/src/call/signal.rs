//! One-shot terminal signal for client-initiated streaming calls.
//!
//! The reaction path of a call records what it has seen so far into the
//! signal's result slot and fires the signal on the call's terminal event. The
//! foreground path waits for that event with a bound. The signal is the only
//! state the two paths share.
//!
//! Firing is first-wins: whichever of [`CompletionSignal::complete`] or
//! [`CompletionSignal::fail`] runs first sets the terminal state, every later
//! attempt returns `false`, and the result slot stops accepting updates.

use crate::call::channel::Terminal;
use core::time::Duration;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::Notify;
use tonic::Status;

/// What the waiting side learned about a call.
#[derive(Debug)]
pub enum CallOutcome<T> {
    /// The call completed; `T` is the final recorded result.
    Completed(T),
    /// The call failed; `last` is whatever was recorded before the failure.
    Failed { status: Status, last: T },
    /// The bound elapsed first. The call's outcome is unknown, not failed.
    TimedOut { last: T },
}

impl<T> CallOutcome<T> {
    pub const fn is_completed(&self) -> bool {
        matches!(self, CallOutcome::Completed(_))
    }

    /// The recorded result, regardless of how the call ended.
    pub fn into_last(self) -> T {
        match self {
            CallOutcome::Completed(last)
            | CallOutcome::Failed { last, .. }
            | CallOutcome::TimedOut { last } => last,
        }
    }
}

struct State<T> {
    latest: T,
    terminal: Option<Terminal>,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    notify: Notify,
}

/// Single-fire completion signal with a last-known result slot.
///
/// Cloning yields another handle to the same signal. Only one handle should
/// wait on it: waiting takes the recorded result out of the slot.
pub struct CompletionSignal<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for CompletionSignal<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Default> Default for CompletionSignal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Default> CompletionSignal<T> {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    latest: T::default(),
                    terminal: None,
                }),
                notify: Notify::new(),
            }),
        }
    }

    /// Waits for the terminal event with no bound.
    pub async fn wait(&self) -> CallOutcome<T> {
        loop {
            // Register before checking so a fire in between is not missed.
            let notified = self.shared.notify.notified();
            if let Some(outcome) = self.take_outcome() {
                return outcome;
            }
            notified.await;
        }
    }

    /// Waits for the terminal event for at most `bound`.
    ///
    /// On expiry the last recorded result is returned as
    /// [`CallOutcome::TimedOut`].
    pub async fn wait_timeout(&self, bound: Duration) -> CallOutcome<T> {
        match tokio::time::timeout(bound, self.wait()).await {
            Ok(outcome) => outcome,
            Err(_) => {
                if let Some(outcome) = self.take_outcome() {
                    return outcome;
                }
                let mut state = self.shared.state.lock();
                CallOutcome::TimedOut {
                    last: core::mem::take(&mut state.latest),
                }
            }
        }
    }

    fn take_outcome(&self) -> Option<CallOutcome<T>> {
        let mut state = self.shared.state.lock();
        let terminal = state.terminal.clone()?;
        let last = core::mem::take(&mut state.latest);
        Some(match terminal {
            Terminal::Completed => CallOutcome::Completed(last),
            Terminal::Errored(status) => CallOutcome::Failed { status, last },
        })
    }
}

impl<T> CompletionSignal<T> {
    /// Updates the result slot. Returns `false` (and leaves the slot alone)
    /// once the signal has fired.
    pub fn record(&self, update: impl FnOnce(&mut T)) -> bool {
        let mut state = self.shared.state.lock();
        if state.terminal.is_some() {
            return false;
        }
        update(&mut state.latest);
        true
    }

    /// Fires the signal as completed. Returns `true` only for the first fire.
    pub fn complete(&self) -> bool {
        self.fire(Terminal::Completed)
    }

    /// Fires the signal as failed. Returns `true` only for the first fire.
    pub fn fail(&self, status: Status) -> bool {
        self.fire(Terminal::Errored(status))
    }

    pub fn is_fired(&self) -> bool {
        self.shared.state.lock().terminal.is_some()
    }

    fn fire(&self, terminal: Terminal) -> bool {
        {
            let mut state = self.shared.state.lock();
            if state.terminal.is_some() {
                return false;
            }
            state.terminal = Some(terminal);
        }
        self.shared.notify.notify_waiters();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use tonic::Code;

    #[tokio::test]
    async fn wait_returns_recorded_result_on_completion() {
        let signal = CompletionSignal::<Vec<u32>>::new();
        let reaction = signal.clone();

        let handle = tokio::spawn(async move {
            for i in 0..3 {
                reaction.record(|v| v.push(i));
                tokio::task::yield_now().await;
            }
            reaction.complete()
        });

        let outcome = signal.wait().await;
        assert!(handle.await.unwrap());
        assert!(matches!(outcome, CallOutcome::Completed(ref v) if v == &[0, 1, 2]));
    }

    #[tokio::test]
    async fn fire_before_wait_is_not_lost() {
        let signal = CompletionSignal::<Option<u32>>::new();
        signal.record(|v| *v = Some(7));
        assert!(signal.fail(Status::unavailable("down")));

        match signal.wait().await {
            CallOutcome::Failed { status, last } => {
                assert_eq!(status.code(), Code::Unavailable);
                assert_eq!(last, Some(7));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn only_first_terminal_event_counts() {
        let signal = CompletionSignal::<u32>::new();
        assert!(signal.complete());
        assert!(!signal.fail(Status::internal("late")));
        assert!(!signal.complete());
        assert!(!signal.record(|v| *v = 9));

        assert!(matches!(signal.wait().await, CallOutcome::Completed(0)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn racing_complete_and_fail_fire_exactly_once() {
        for _ in 0..50 {
            let signal = CompletionSignal::<u32>::new();
            let racers = (0..16).map(|i| {
                let signal = signal.clone();
                tokio::spawn(async move {
                    if i % 2 == 0 {
                        signal.complete()
                    } else {
                        signal.fail(Status::aborted("racing"))
                    }
                })
            });

            let fired = join_all(racers)
                .await
                .into_iter()
                .map(|r| r.unwrap())
                .filter(|won| *won)
                .count();

            assert_eq!(fired, 1);
            assert!(signal.is_fired());
        }
    }

    #[tokio::test]
    async fn timeout_returns_last_known_result() {
        let signal = CompletionSignal::<Vec<u32>>::new();
        signal.record(|v| v.push(1));

        let outcome = signal.wait_timeout(Duration::from_millis(50)).await;

        assert!(matches!(outcome, CallOutcome::TimedOut { ref last } if last == &[1]));
        assert!(!signal.is_fired());
    }

    #[tokio::test]
    async fn timeout_absent_result_is_default() {
        let signal = CompletionSignal::<Option<u32>>::new();
        let outcome = signal.wait_timeout(Duration::from_millis(20)).await;
        assert_eq!(outcome.into_last(), None);
    }
}
