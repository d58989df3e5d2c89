//! Concurrency-safe publish/close lifecycle shared by every publisher.

use tokio::sync::watch;

use crate::error::PublishError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct LifecycleState {
    closed: bool,
    in_flight: usize,
}

/// Open → Closing → Closed state machine for one publisher.
///
/// The closed flag and the in-flight count live in one watch channel value,
/// so admission and the close mark are ordered: a publish is either admitted
/// before the mark (and awaited by [`start_close`](Self::start_close)) or
/// rejected with [`PublishError::Closed`].
///
/// # Example
///
/// ```
/// use dest_registry::provider::PublishLifecycle;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let lifecycle = PublishLifecycle::new();
/// {
///     let _guard = lifecycle.start_publish().unwrap();
///     assert_eq!(lifecycle.in_flight(), 1);
/// }
/// lifecycle.start_close().await;
/// assert!(lifecycle.start_publish().is_err());
/// # }
/// ```
#[derive(Debug)]
pub struct PublishLifecycle {
    state: watch::Sender<LifecycleState>,
}

impl PublishLifecycle {
    /// Creates an open lifecycle with nothing in flight.
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(LifecycleState::default());
        Self { state }
    }

    /// Registers one in-flight operation.
    ///
    /// The returned guard finishes the operation when dropped, on every exit
    /// path including errors and cancellation.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Closed`] once closing has begun.
    pub fn start_publish(&self) -> Result<PublishGuard<'_>, PublishError> {
        let mut admitted = false;
        self.state.send_if_modified(|state| {
            if state.closed {
                return false;
            }
            state.in_flight += 1;
            admitted = true;
            true
        });

        if admitted {
            Ok(PublishGuard { lifecycle: self })
        } else {
            Err(PublishError::Closed)
        }
    }

    fn finish_publish(&self) {
        self.state.send_modify(|state| {
            state.in_flight = state.in_flight.saturating_sub(1);
        });
    }

    /// Refuses new operations, then waits for admitted ones to finish.
    ///
    /// Safe to call more than once and from any task.
    pub async fn start_close(&self) {
        self.state.send_modify(|state| state.closed = true);

        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close while waiting.
        let _ = rx.wait_for(|state| state.in_flight == 0).await;
    }

    /// Returns true once closing has begun.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }

    /// Returns the number of admitted, unfinished operations.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.state.borrow().in_flight
    }
}

impl Default for PublishLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// One admitted publish. Dropping it finishes the operation.
#[derive(Debug)]
#[must_use = "dropping the guard immediately finishes the publish"]
pub struct PublishGuard<'a> {
    lifecycle: &'a PublishLifecycle,
}

impl Drop for PublishGuard<'_> {
    fn drop(&mut self) {
        self.lifecycle.finish_publish();
    }
}
