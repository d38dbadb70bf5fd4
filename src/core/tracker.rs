//! Request tickets for last-issued-wins result handling
//!
//! Every request is issued a [`Ticket`] carrying a monotonically increasing
//! sequence number and the parameters it was issued for. When its response
//! arrives the ticket is checked against the tracker: only the most recently
//! issued ticket is current, whatever order responses resolve in.

use std::sync::atomic::{AtomicU64, Ordering};

/// Proof of issuance for one request
#[derive(Debug, Clone, PartialEq)]
pub struct Ticket<P> {
    seq: u64,
    params: P,
}

impl<P> Ticket<P> {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Parameters the request was issued with
    pub fn params(&self) -> &P {
        &self.params
    }

    pub fn into_params(self) -> P {
        self.params
    }
}

/// Issues tickets and tells current ones from superseded ones
#[derive(Debug, Default)]
pub struct RequestTracker {
    latest: AtomicU64,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a ticket, superseding every earlier one
    pub fn issue<P>(&self, params: P) -> Ticket<P> {
        let seq = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        Ticket { seq, params }
    }

    /// Supersede all outstanding tickets without issuing a request
    pub fn invalidate(&self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
    }

    /// Whether `ticket` is still the latest issued
    pub fn is_current<P>(&self, ticket: &Ticket<P>) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.seq
    }

    pub fn latest_seq(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }
}
