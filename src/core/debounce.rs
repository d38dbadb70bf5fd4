//! Debounced search trigger
//!
//! Coalesces rapid input changes into a single delayed fire.
//!
//! ```text
//!            on_input                 delay elapsed
//! Idle ─────────────────▶ Pending ─────────────────▶ Fired
//!   ▲                      │   ▲                       │
//!   │        cancel        │   │ on_input (re-arm)     │ on_input
//!   └──────────────────────┘   └───────────────────────┘
//! ```
//!
//! Every `on_input` aborts the armed timer and starts a new one. A generation
//! counter guards the window between the timer waking and the value being
//! sent, so a superseded value is never delivered.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Default debounce interval
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Observable state of a [`Debouncer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    /// Nothing armed
    Idle,
    /// A timer is armed for the latest input
    Pending,
    /// The latest input has been delivered
    Fired,
}

struct Inner {
    generation: u64,
    state: DebounceState,
    timer: Option<JoinHandle<()>>,
    fired: u64,
}

/// Delays delivery of the latest input until inputs pause for `delay`
///
/// Fired values are delivered on the receiver returned by [`Debouncer::new`].
/// Must be used from within a tokio runtime.
///
/// # Example
/// ```rust,ignore
/// let (debouncer, mut fired) = Debouncer::new(Duration::from_millis(500));
/// debouncer.on_input("a".to_string());
/// debouncer.on_input("ab".to_string());
/// // ... 500ms later
/// assert_eq!(fired.recv().await.as_deref(), Some("ab"));
/// ```
pub struct Debouncer<T> {
    delay: Duration,
    tx: mpsc::UnboundedSender<T>,
    inner: Arc<Mutex<Inner>>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new(delay: Duration) -> (Self, mpsc::UnboundedReceiver<T>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let debouncer = Self {
            delay,
            tx,
            inner: Arc::new(Mutex::new(Inner {
                generation: 0,
                state: DebounceState::Idle,
                timer: None,
                fired: 0,
            })),
        };
        (debouncer, rx)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Record a new input, superseding any pending one
    pub fn on_input(&self, value: T) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.generation += 1;
        if let Some(timer) = inner.timer.take() {
            timer.abort();
        }
        inner.state = DebounceState::Pending;

        let generation = inner.generation;
        let delay = self.delay;
        let tx = self.tx.clone();
        let shared = Arc::clone(&self.inner);

        inner.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let mut inner = shared.lock().unwrap_or_else(PoisonError::into_inner);
            if inner.generation != generation {
                return;
            }
            inner.timer = None;
            inner.state = DebounceState::Fired;
            inner.fired += 1;
            tracing::trace!(generation, "Debounced input fired");
            if tx.send(value).is_err() {
                tracing::debug!("Debounce receiver dropped, input discarded");
            }
        }));
    }

    /// Drop any pending input without firing it
    pub fn cancel(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.generation += 1;
        if let Some(timer) = inner.timer.take() {
            timer.abort();
        }
        inner.state = DebounceState::Idle;
    }

    pub fn state(&self) -> DebounceState {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .state
    }

    /// Number of inputs delivered so far
    pub fn fired_count(&self) -> u64 {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .fired
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(timer) = inner.timer.take() {
            timer.abort();
        }
    }
}
