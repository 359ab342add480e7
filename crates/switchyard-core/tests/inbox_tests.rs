//! Integration tests for the inbox driven by a mock clock


use switchyard_core::{
    Address, AddressFilter, FilterSet, Inbox, KindFilter, MessageKind, QueueKey, TimeSource,
};
use test_utils::{tag_of, tagged, MockTimeSource};

const TARGET: Address = Address::component(0, 1);
const OTHER: Address = Address::component(0, 2);

#[test]
fn test_delayed_message_becomes_ready() {
    let clock = MockTimeSource::new_at(1_000);
    let filters = FilterSet::new();
    let mut inbox = Inbox::new();

    inbox.insert(tagged(TARGET, 7, 1_250.0), clock.now(), &filters);
    assert_eq!(inbox.next_delay(clock.now()), Some(250.0));
    assert!(inbox.pop_ready(clock.now(), &filters, |_| false).is_none());

    clock.advance(200);
    assert_eq!(inbox.next_delay(clock.now()), Some(50.0));

    clock.advance(100);
    assert_eq!(inbox.next_delay(clock.now()), Some(0.0));
    let message = inbox.pop_ready(clock.now(), &filters, |_| false).unwrap();
    assert_eq!(tag_of(&message), 7);
}

#[test]
fn test_immediate_message_overtakes_pending_delay() {
    let clock = MockTimeSource::new_at(10);
    let filters = FilterSet::new();
    let mut inbox = Inbox::new();

    let first = inbox.insert(tagged(TARGET, 1, 500.0), clock.now(), &filters);
    assert!(first.unblocked_moved_earlier);

    let second = inbox.insert(tagged(TARGET, 2, 0.0), clock.now(), &filters);
    assert!(second.unblocked_moved_earlier);

    let third = inbox.insert(tagged(TARGET, 3, 900.0), clock.now(), &filters);
    assert!(!third.unblocked_moved_earlier);

    assert_eq!(inbox.next_delay(clock.now()), Some(0.0));
    let message = inbox.pop_ready(clock.now(), &filters, |_| false).unwrap();
    assert_eq!(tag_of(&message), 2);
}

#[test]
fn test_negative_zero_due_is_due_now() {
    let clock = MockTimeSource::new_at(40);
    let filters = FilterSet::new();
    let mut inbox = Inbox::new();

    inbox.insert(tagged(TARGET, 1, 45.0), clock.now(), &filters);
    let outcome = inbox.insert(tagged(TARGET, 2, -0.0), clock.now(), &filters);
    assert!(matches!(outcome.key, QueueKey::Immediate { .. }));
    assert!(outcome.unblocked_moved_earlier);

    let message = inbox.pop_ready(clock.now(), &filters, |_| false).unwrap();
    assert_eq!(tag_of(&message), 2);
    assert_eq!(message.due, clock.now());
    assert_eq!(inbox.next_delay(clock.now()), Some(5.0));
}

#[test]
fn test_filters_hold_back_without_dropping() {
    let clock = MockTimeSource::new();
    let mut filters = FilterSet::new();
    let mut inbox = Inbox::new();

    inbox.insert(tagged(OTHER, 1, 0.0), clock.now(), &filters);
    inbox.insert(tagged(TARGET, 2, 0.0), clock.now(), &filters);

    let only_target = filters.add(Box::new(AddressFilter::only([TARGET])));
    inbox.refresh(&filters);

    let message = inbox.pop_ready(clock.now(), &filters, |_| false).unwrap();
    assert_eq!(tag_of(&message), 2);
    assert!(inbox.pop_ready(clock.now(), &filters, |_| false).is_none());
    assert_eq!(inbox.next_delay(clock.now()), None);
    assert_eq!(inbox.len(), 1);

    filters.remove(only_target);
    inbox.reset_unblocked_to_head();
    let message = inbox.pop_ready(clock.now(), &filters, |_| false).unwrap();
    assert_eq!(tag_of(&message), 1);
}

#[test]
fn test_kind_filter_and_purge() {
    let clock = MockTimeSource::new();
    let mut filters = FilterSet::new();
    let mut inbox = Inbox::new();

    for tag in 0..6 {
        inbox.insert(tagged(TARGET, tag, 0.0), clock.now(), &filters);
    }

    filters.add(Box::new(KindFilter::block([MessageKind::Opaque(0), MessageKind::Opaque(1)])));
    inbox.refresh(&filters);
    assert_eq!(inbox.peek_unblocked().map(tag_of), Some(2));

    let removed = inbox.remove_matching(&filters, |m| tag_of(m) % 2 == 0);
    assert_eq!(removed, 3);
    assert_eq!(inbox.peek_unblocked().map(tag_of), Some(3));

    let first_odd = inbox.remove_first(&filters, |m| tag_of(m) % 2 == 1).unwrap();
    assert_eq!(tag_of(&first_odd), 1);
    assert_eq!(inbox.len(), 2);
    inbox.check_invariants(&filters);
}
