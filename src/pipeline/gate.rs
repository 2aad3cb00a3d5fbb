//! Counting admission gates.

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct Counts {
    admitted: usize,
    reserved: usize,
}

/// A counter that blocks producers while it is at or above its limit.
///
/// `admitted` tracks units handed to workers. `reserved` tracks producer-side
/// holdings (e.g. a file buffer being encoded) that count against the limit
/// when reserving more, but never block admission of units, so a producer
/// holding a large reservation cannot wedge itself.
#[derive(Debug)]
pub(crate) struct AdmissionGate {
    counts: Mutex<Counts>,
    changed: Condvar,
    limit: usize,
}

impl AdmissionGate {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            counts: Mutex::new(Counts::default()),
            changed: Condvar::new(),
            limit,
        }
    }

    pub(crate) fn unbounded() -> Self {
        Self::new(usize::MAX)
    }

    /// Wait until admitted units are below the limit, then add `amount`.
    ///
    /// The check and the increment happen under one lock, but the amount is
    /// not part of the check: one unit may push the total past the limit.
    pub(crate) fn admit(&self, amount: usize) {
        let mut counts = self.counts.lock();
        self.changed
            .wait_while(&mut counts, |counts| counts.admitted >= self.limit);
        counts.admitted += amount;
    }

    pub(crate) fn release(&self, amount: usize) {
        let mut counts = self.counts.lock();
        counts.admitted = counts.admitted.saturating_sub(amount);
        self.changed.notify_all();
    }

    /// Wait until admitted plus reserved amounts are below the limit, then
    /// reserve `amount`.
    pub(crate) fn reserve(&self, amount: usize) {
        let mut counts = self.counts.lock();
        self.changed.wait_while(&mut counts, |counts| {
            counts.admitted.saturating_add(counts.reserved) >= self.limit
        });
        counts.reserved += amount;
    }

    pub(crate) fn unreserve(&self, amount: usize) {
        let mut counts = self.counts.lock();
        counts.reserved = counts.reserved.saturating_sub(amount);
        self.changed.notify_all();
    }

    /// Block until no units are admitted.
    pub(crate) fn wait_idle(&self) {
        let mut counts = self.counts.lock();
        self.changed
            .wait_while(&mut counts, |counts| counts.admitted > 0);
    }

    pub(crate) fn admitted(&self) -> usize {
        self.counts.lock().admitted
    }

    #[cfg(test)]
    pub(crate) fn reserved(&self) -> usize {
        self.counts.lock().reserved
    }

    pub(crate) fn limit(&self) -> usize {
        self.limit
    }
}
