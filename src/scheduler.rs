//! Tick-driven delayed work.
//!
//! The match never reads a clock. Anything that should happen "later" is
//! parked here with a delay in seconds and comes back out of
//! [`Scheduler::advance`] once enough simulated time has passed.
//!
//! ```
//! use duel_2048::scheduler::Scheduler;
//!
//! let mut s = Scheduler::new();
//! let a = s.schedule(0.5, "a");
//! s.schedule(0.2, "b");
//! assert!(s.advance(0.1).is_empty());
//! assert_eq!(s.advance(0.1), vec!["b"]);
//! assert_eq!(s.cancel(a), Some("a"));
//! assert!(s.is_empty());
//! ```

use tracing::trace;

/// Handle returned by [`Scheduler::schedule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Debug, Clone)]
struct Entry<T> {
    id: TimerId,
    remaining: f32,
    payload: T,
}

#[derive(Debug, Clone)]
pub struct Scheduler<T> {
    entries: Vec<Entry<T>>,
    next_id: u64,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Scheduler { entries: Vec::new(), next_id: 0 }
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Park `payload` for `delay` seconds. Negative delays count as zero.
    pub fn schedule(&mut self, delay: f32, payload: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        let remaining = delay.max(0.0);
        trace!(id = id.0, remaining, "schedule");
        self.entries.push(Entry { id, remaining, payload });
        id
    }

    /// Drop a pending entry, handing its payload back.
    pub fn cancel(&mut self, id: TimerId) -> Option<T> {
        let pos = self.entries.iter().position(|e| e.id == id)?;
        trace!(id = id.0, "cancel");
        Some(self.entries.remove(pos).payload)
    }

    pub fn cancel_all(&mut self) {
        if !self.entries.is_empty() {
            trace!(count = self.entries.len(), "cancel all");
        }
        self.entries.clear();
    }

    /// Seconds until the earliest entry is due.
    pub fn next_due(&self) -> Option<f32> {
        self.entries.iter().map(|e| e.remaining).reduce(f32::min)
    }

    /// Advance by `dt` seconds and return every payload that came due,
    /// earliest first. Entries due at the same moment keep schedule order.
    pub fn advance(&mut self, dt: f32) -> Vec<T> {
        if self.entries.is_empty() {
            return Vec::new();
        }
        for entry in &mut self.entries {
            entry.remaining -= dt;
        }
        let (mut due, pending): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.entries).into_iter().partition(|e| e.remaining <= 0.0);
        self.entries = pending;
        due.sort_by(|a, b| a.remaining.total_cmp(&b.remaining).then(a.id.cmp(&b.id)));
        if !due.is_empty() {
            trace!(count = due.len(), "due");
        }
        due.into_iter().map(|e| e.payload).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_in_due_order() {
        let mut s = Scheduler::new();
        s.schedule(0.3, 3);
        s.schedule(0.1, 1);
        s.schedule(0.2, 2);
        assert_eq!(s.len(), 3);
        assert_eq!(s.advance(0.5), vec![1, 2, 3]);
        assert!(s.is_empty());
    }

    #[test]
    fn ties_keep_schedule_order() {
        let mut s = Scheduler::new();
        s.schedule(0.25, 'x');
        s.schedule(0.25, 'y');
        s.schedule(0.0, 'z');
        assert_eq!(s.advance(0.0), vec!['z']);
        assert_eq!(s.advance(0.25), vec!['x', 'y']);
    }

    #[test]
    fn cancel_and_cancel_all() {
        let mut s = Scheduler::new();
        let a = s.schedule(1.0, "a");
        let b = s.schedule(2.0, "b");
        assert_eq!(s.next_due(), Some(1.0));
        assert_eq!(s.cancel(a), Some("a"));
        assert_eq!(s.cancel(a), None);
        assert_eq!(s.next_due(), Some(2.0));
        s.cancel_all();
        assert_eq!(s.cancel(b), None);
        assert!(s.advance(10.0).is_empty());
        assert_eq!(s.next_due(), None);
    }

    #[test]
    fn accumulates_small_steps() {
        let mut s = Scheduler::new();
        s.schedule(0.05, ());
        let mut fired = 0;
        for _ in 0..4 {
            fired += s.advance(1.0 / 60.0).len();
        }
        assert_eq!(fired, 1);
    }
}
