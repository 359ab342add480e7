//! Message filters
//!
//! A filter can hold back messages without removing them from the inbox. A
//! message is deliverable only when every registered filter accepts it.

use core::fmt;
use hashbrown::HashMap;
use std::collections::BTreeSet;

use crate::address::Address;
use crate::message::{Message, MessageKind};

// ----------------------------------------------------------------------------
// Filter Trait
// ----------------------------------------------------------------------------

/// Predicate deciding whether a message may be delivered now
pub trait MessageFilter {
    fn accepts(&self, message: &Message) -> bool;
}

impl<F> MessageFilter for F
where
    F: Fn(&Message) -> bool,
{
    fn accepts(&self, message: &Message) -> bool {
        self(message)
    }
}

// ----------------------------------------------------------------------------
// Built-in Filters
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Only,
    Except,
}

/// Filter on the destination address
///
/// Entries match hierarchically: a component address also matches its
/// channels and a manager address matches everything it hosts.
#[derive(Debug, Clone)]
pub struct AddressFilter {
    mode: Mode,
    addresses: BTreeSet<Address>,
}

impl AddressFilter {
    /// Deliver only messages addressed under one of `addresses`
    pub fn only(addresses: impl IntoIterator<Item = Address>) -> Self {
        Self {
            mode: Mode::Only,
            addresses: addresses.into_iter().collect(),
        }
    }

    /// Deliver everything except messages addressed under `addresses`
    pub fn except(addresses: impl IntoIterator<Item = Address>) -> Self {
        Self {
            mode: Mode::Except,
            addresses: addresses.into_iter().collect(),
        }
    }

    fn matches(&self, address: &Address) -> bool {
        self.addresses.iter().any(|entry| entry.covers(address))
    }
}

impl MessageFilter for AddressFilter {
    fn accepts(&self, message: &Message) -> bool {
        let matched = self.matches(&message.dst);
        match self.mode {
            Mode::Only => matched,
            Mode::Except => !matched,
        }
    }
}

/// Filter holding back selected message kinds
#[derive(Debug, Clone)]
pub struct KindFilter {
    blocked: BTreeSet<MessageKind>,
}

impl KindFilter {
    pub fn block(kinds: impl IntoIterator<Item = MessageKind>) -> Self {
        Self {
            blocked: kinds.into_iter().collect(),
        }
    }
}

impl MessageFilter for KindFilter {
    fn accepts(&self, message: &Message) -> bool {
        !self.blocked.contains(&message.kind())
    }
}

// ----------------------------------------------------------------------------
// Filter Set
// ----------------------------------------------------------------------------

/// Handle identifying a registered filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FilterId(u64);

impl FilterId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for FilterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "filter-{}", self.0)
    }
}

/// Registered filters; their verdicts are ANDed
#[derive(Default)]
pub struct FilterSet {
    filters: HashMap<FilterId, Box<dyn MessageFilter>>,
    next_id: u64,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a filter and return its handle
    pub fn add(&mut self, filter: Box<dyn MessageFilter>) -> FilterId {
        let id = FilterId(self.next_id);
        self.next_id += 1;
        self.filters.insert(id, filter);
        id
    }

    /// Unregister a filter; false if it was not registered
    pub fn remove(&mut self, id: FilterId) -> bool {
        self.filters.remove(&id).is_some()
    }

    pub fn contains(&self, id: FilterId) -> bool {
        self.filters.contains_key(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// True when every filter accepts the message (vacuously true when empty)
    pub fn accepts(&self, message: &Message) -> bool {
        self.filters.values().all(|filter| filter.accepts(message))
    }
}

impl fmt::Debug for FilterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.filters.keys().copied().collect();
        ids.sort();
        f.debug_struct("FilterSet").field("filters", &ids).finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
