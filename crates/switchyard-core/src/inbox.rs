//! Ordered store of pending messages
//!
//! Messages are kept in a `BTreeMap` under an explicit `QueueKey`. Immediate
//! messages (due-now at receipt) sort by arrival and precede every delayed
//! message; delayed messages sort by due-time, ties broken by arrival.
//!
//! Two cursors are maintained across every mutation:
//! - `first_delayed`: the earliest delayed key
//! - `first_unblocked`: the earliest key, in queue order, that every
//!   registered filter accepts

use core::ops::Bound;
use std::collections::BTreeMap;

use tracing::trace;

use crate::filter::FilterSet;
use crate::message::Message;
use crate::types::Timestamp;

// ----------------------------------------------------------------------------
// Queue Keys
// ----------------------------------------------------------------------------

/// Position of a message in the inbox
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum QueueKey {
    Immediate { seq: u64 },
    Delayed { due: Timestamp, seq: u64 },
}

impl QueueKey {
    pub fn is_delayed(&self) -> bool {
        matches!(self, QueueKey::Delayed { .. })
    }

    pub fn seq(&self) -> u64 {
        match self {
            QueueKey::Immediate { seq } | QueueKey::Delayed { seq, .. } => *seq,
        }
    }

    /// Smallest possible delayed key
    fn delayed_floor() -> Self {
        QueueKey::Delayed {
            due: Timestamp::new(f64::NEG_INFINITY),
            seq: 0,
        }
    }
}

/// Result of inserting a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertOutcome {
    pub key: QueueKey,
    /// The first-unblocked cursor now points at an earlier message than before
    pub unblocked_moved_earlier: bool,
}

// ----------------------------------------------------------------------------
// Inbox
// ----------------------------------------------------------------------------

/// Pending messages of one manager
#[derive(Debug, Default)]
pub struct Inbox {
    queue: BTreeMap<QueueKey, Message>,
    next_seq: u64,
    first_delayed: Option<QueueKey>,
    first_unblocked: Option<QueueKey>,
}

impl Inbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn first_delayed(&self) -> Option<QueueKey> {
        self.first_delayed
    }

    pub fn first_unblocked(&self) -> Option<QueueKey> {
        self.first_unblocked
    }

    /// Message at the first-unblocked cursor
    pub fn peek_unblocked(&self) -> Option<&Message> {
        self.first_unblocked.and_then(|key| self.queue.get(&key))
    }

    /// Messages in queue order
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.queue.values()
    }

    /// Insert a message, stamping a due-now message with `now`
    pub fn insert(&mut self, mut message: Message, now: Timestamp, filters: &FilterSet) -> InsertOutcome {
        let seq = self.next_seq;
        self.next_seq += 1;

        let key = if message.due.is_zero() {
            message.due = now;
            QueueKey::Immediate { seq }
        } else {
            QueueKey::Delayed {
                due: message.due,
                seq,
            }
        };

        if key.is_delayed() && self.first_delayed.map_or(true, |first| key < first) {
            self.first_delayed = Some(key);
        }

        let unblocked_moved_earlier = filters.accepts(&message)
            && self.first_unblocked.map_or(true, |first| key < first);
        if unblocked_moved_earlier {
            self.first_unblocked = Some(key);
        }

        self.queue.insert(key, message);
        self.debug_check(filters);

        InsertOutcome {
            key,
            unblocked_moved_earlier,
        }
    }

    /// Milliseconds until the first unblocked message is due
    ///
    /// `None` when nothing deliverable is pending.
    pub fn next_delay(&self, now: Timestamp) -> Option<f64> {
        self.peek_unblocked().map(|message| message.delay(now))
    }

    /// Remove and return the earliest deliverable message that is due
    ///
    /// `skip` excludes additional messages (for instance those addressed to a
    /// component that is already running) without touching the cursors.
    pub fn pop_ready<S>(&mut self, now: Timestamp, filters: &FilterSet, skip: S) -> Option<Message>
    where
        S: Fn(&Message) -> bool,
    {
        let start = self.first_unblocked?;
        // Delayed keys sort by due-time, so the first candidate that is not
        // yet due ends the search.
        let key = self
            .queue
            .range(start..)
            .filter(|(_, message)| filters.accepts(message) && !skip(message))
            .take_while(|(key, message)| !key.is_delayed() || message.is_due(now))
            .map(|(key, _)| *key)
            .next()?;

        self.take(key, filters)
    }

    /// Recompute both cursors from scratch
    pub fn refresh(&mut self, filters: &FilterSet) {
        self.first_delayed = self.scan_delayed();
        self.first_unblocked = self.scan_unblocked(None, filters);
        trace!(
            pending = self.queue.len(),
            first_unblocked = ?self.first_unblocked,
            "inbox cursors recomputed"
        );
        self.debug_check(filters);
    }

    /// Point first-unblocked at the head of the queue
    ///
    /// Only valid when no filters are registered.
    pub fn reset_unblocked_to_head(&mut self) {
        self.first_unblocked = self.queue.keys().next().copied();
    }

    /// Remove every message matching `predicate`; returns how many were removed
    pub fn remove_matching<P>(&mut self, filters: &FilterSet, predicate: P) -> usize
    where
        P: Fn(&Message) -> bool,
    {
        let doomed: Vec<QueueKey> = self
            .queue
            .iter()
            .filter(|(_, message)| predicate(message))
            .map(|(key, _)| *key)
            .collect();

        for key in &doomed {
            self.queue.remove(key);
        }
        if !doomed.is_empty() {
            self.repair_after_removal(&doomed, filters);
        }
        doomed.len()
    }

    /// Remove and return the first message, in queue order, matching `predicate`
    pub fn remove_first<P>(&mut self, filters: &FilterSet, predicate: P) -> Option<Message>
    where
        P: Fn(&Message) -> bool,
    {
        let key = self
            .queue
            .iter()
            .find(|(_, message)| predicate(message))
            .map(|(key, _)| *key)?;
        self.take(key, filters)
    }

    fn take(&mut self, key: QueueKey, filters: &FilterSet) -> Option<Message> {
        let message = self.queue.remove(&key)?;
        self.repair_after_removal(&[key], filters);
        Some(message)
    }

    fn repair_after_removal(&mut self, removed: &[QueueKey], filters: &FilterSet) {
        if let Some(first) = self.first_delayed {
            if removed.contains(&first) {
                self.first_delayed = self
                    .queue
                    .range((Bound::Excluded(first), Bound::Unbounded))
                    .next()
                    .map(|(key, _)| *key);
            }
        }
        if let Some(first) = self.first_unblocked {
            if removed.contains(&first) {
                self.first_unblocked = self.scan_unblocked(Some(first), filters);
                trace!(from = ?first, to = ?self.first_unblocked, "first-unblocked cursor repaired");
            }
        }
        self.debug_check(filters);
    }

    fn scan_delayed(&self) -> Option<QueueKey> {
        self.queue
            .range(QueueKey::delayed_floor()..)
            .next()
            .map(|(key, _)| *key)
    }

    fn scan_unblocked(&self, after: Option<QueueKey>, filters: &FilterSet) -> Option<QueueKey> {
        let lower = match after {
            Some(key) => Bound::Excluded(key),
            None => Bound::Unbounded,
        };
        self.queue
            .range((lower, Bound::Unbounded))
            .find(|(_, message)| filters.accepts(message))
            .map(|(key, _)| *key)
    }

    /// Assert both cursor invariants (debug builds only)
    pub fn check_invariants(&self, filters: &FilterSet) {
        debug_assert_eq!(
            self.first_delayed,
            self.scan_delayed(),
            "first-delayed cursor out of date"
        );
        debug_assert_eq!(
            self.first_unblocked,
            self.scan_unblocked(None, filters),
            "first-unblocked cursor out of date"
        );
    }

    fn debug_check(&self, filters: &FilterSet) {
        if cfg!(debug_assertions) {
            self.check_invariants(filters);
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::message::MessageBody;

    fn msg(tag: u32, due: f64) -> Message {
        Message::delayed(
            Address::ROOT,
            Address::component(0, 1),
            Timestamp::new(due),
            MessageBody::opaque(tag, vec![]),
        )
    }

    fn tag(message: &Message) -> u32 {
        match message.body {
            MessageBody::Opaque { kind, .. } => kind,
            _ => u32::MAX,
        }
    }

    #[test]
    fn test_immediate_precede_delayed() {
        let filters = FilterSet::new();
        let mut inbox = Inbox::new();
        let now = Timestamp::new(10.0);

        inbox.insert(msg(1, 30.0), now, &filters);
        inbox.insert(msg(2, 0.0), now, &filters);
        inbox.insert(msg(3, 20.0), now, &filters);
        inbox.insert(msg(4, 0.0), now, &filters);

        let order: Vec<u32> = inbox.iter().map(tag).collect();
        assert_eq!(order, vec![2, 4, 3, 1]);
        assert_eq!(inbox.first_delayed().map(|k| k.seq()), Some(2));
    }

    #[test]
    fn test_insert_stamps_due_now() {
        let filters = FilterSet::new();
        let mut inbox = Inbox::new();
        inbox.insert(msg(1, 0.0), Timestamp::new(55.0), &filters);
        assert_eq!(inbox.peek_unblocked().unwrap().due, Timestamp::new(55.0));
    }

    #[test]
    fn test_pop_ready_respects_due_time() {
        let filters = FilterSet::new();
        let mut inbox = Inbox::new();
        inbox.insert(msg(1, 50.0), Timestamp::new(10.0), &filters);

        assert!(inbox.pop_ready(Timestamp::new(20.0), &filters, |_| false).is_none());
        assert_eq!(inbox.next_delay(Timestamp::new(20.0)), Some(30.0));

        let popped = inbox.pop_ready(Timestamp::new(50.0), &filters, |_| false).unwrap();
        assert_eq!(tag(&popped), 1);
        assert!(inbox.is_empty());
        assert_eq!(inbox.first_delayed(), None);
        assert_eq!(inbox.next_delay(Timestamp::new(50.0)), None);
    }

    #[test]
    fn test_blocked_messages_stay_queued() {
        let mut filters = FilterSet::new();
        filters.add(Box::new(|m: &Message| tag(m) != 1));

        let mut inbox = Inbox::new();
        let now = Timestamp::new(5.0);
        inbox.insert(msg(1, 0.0), now, &filters);
        let outcome = inbox.insert(msg(2, 0.0), now, &filters);
        assert!(outcome.unblocked_moved_earlier);

        let popped = inbox.pop_ready(now, &filters, |_| false).unwrap();
        assert_eq!(tag(&popped), 2);
        assert!(inbox.pop_ready(now, &filters, |_| false).is_none());
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox.first_unblocked(), None);
    }

    #[test]
    fn test_skip_does_not_reorder_others() {
        let filters = FilterSet::new();
        let mut inbox = Inbox::new();
        let now = Timestamp::new(1.0);
        inbox.insert(msg(1, 0.0), now, &filters);
        inbox.insert(msg(2, 0.0), now, &filters);

        let popped = inbox.pop_ready(now, &filters, |m| tag(m) == 1).unwrap();
        assert_eq!(tag(&popped), 2);
        assert_eq!(inbox.peek_unblocked().map(tag), Some(1));
    }

    #[test]
    fn test_remove_repairs_cursors() {
        let filters = FilterSet::new();
        let mut inbox = Inbox::new();
        let now = Timestamp::new(1.0);
        inbox.insert(msg(1, 0.0), now, &filters);
        inbox.insert(msg(2, 40.0), now, &filters);
        inbox.insert(msg(3, 60.0), now, &filters);

        assert_eq!(inbox.remove_matching(&filters, |m| tag(m) != 3), 2);
        assert_eq!(inbox.first_delayed().map(|k| k.seq()), Some(2));
        assert_eq!(inbox.peek_unblocked().map(tag), Some(3));

        let removed = inbox.remove_first(&filters, |m| tag(m) == 3).unwrap();
        assert_eq!(tag(&removed), 3);
        assert!(inbox.first_delayed().is_none());
        assert!(inbox.first_unblocked().is_none());
        assert!(inbox.remove_first(&filters, |_| true).is_none());
    }

    #[test]
    fn test_refresh_after_filter_change() {
        let mut filters = FilterSet::new();
        let mut inbox = Inbox::new();
        let now = Timestamp::new(1.0);
        inbox.insert(msg(1, 0.0), now, &filters);
        inbox.insert(msg(2, 0.0), now, &filters);

        let id = filters.add(Box::new(|m: &Message| tag(m) == 2));
        inbox.refresh(&filters);
        assert_eq!(inbox.peek_unblocked().map(tag), Some(2));

        filters.remove(id);
        inbox.reset_unblocked_to_head();
        assert_eq!(inbox.peek_unblocked().map(tag), Some(1));
    }
}
