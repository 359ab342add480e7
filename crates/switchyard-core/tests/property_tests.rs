//! Property-based tests for addressing, delays, the codec and inbox ordering


use std::time::Duration;

use proptest::num::f64 as float;
use proptest::prelude::*;
use switchyard_core::{
    codec, millis_to_duration, Address, ComponentType, ErrorKind, FilterSet, Inbox, Message,
    MessageBody, StatusCode, Timestamp,
};
use test_utils::{tag_of, tagged};

fn arb_address() -> impl Strategy<Value = Address> {
    (-3i32..50, -3i32..50, -3i32..50).prop_map(|(m, c, ch)| Address::new(m, c, ch))
}

fn arb_valid_address() -> impl Strategy<Value = Address> {
    (0i32..1_000, 0i32..1_000, 0i32..1_000).prop_map(|(m, c, ch)| Address::new(m, c, ch))
}

fn arb_component_type() -> impl Strategy<Value = ComponentType> {
    prop_oneof![
        Just(ComponentType::Singleton),
        Just(ComponentType::Test),
        Just(ComponentType::Plugin),
        any::<u32>().prop_map(ComponentType::Custom),
    ]
}

fn arb_error_kind() -> impl Strategy<Value = ErrorKind> {
    prop_oneof![
        Just(ErrorKind::OutOfMemory),
        Just(ErrorKind::NullPointer),
        Just(ErrorKind::InvalidAddress),
        Just(ErrorKind::NoSuchResource),
        Just(ErrorKind::Generic),
    ]
}

/// Every finite f64, signed zeros and extreme magnitudes included
fn arb_finite_millis() -> impl Strategy<Value = f64> {
    float::NORMAL | float::SUBNORMAL | float::ZERO
}

fn arb_body() -> impl Strategy<Value = MessageBody> {
    prop_oneof![
        Just(MessageBody::Connected),
        Just(MessageBody::Disconnected),
        Just(MessageBody::ConnectionPending),
        arb_component_type().prop_map(|component_type| MessageBody::CreateComponent { component_type }),
        Just(MessageBody::Status { code: StatusCode::Ok }),
        arb_error_kind().prop_map(|kind| MessageBody::Status { code: kind.into() }),
        (any::<u32>(), prop::collection::vec(any::<u8>(), 0..64))
            .prop_map(|(kind, payload)| MessageBody::Opaque { kind, payload }),
    ]
}

proptest! {
    /// Property: a valid address has exactly one classification, an invalid one has none
    #[test]
    fn address_classification_is_exclusive(address in arb_address()) {
        let hits = [
            address.is_channel(),
            address.is_component(),
            address.is_component_manager(),
        ]
        .iter()
        .filter(|hit| **hit)
        .count();

        if address.is_valid() {
            prop_assert_eq!(hits, 1);
        } else {
            prop_assert_eq!(hits, 0);
        }
    }

    /// Property: the text form parses back to the same address
    #[test]
    fn address_text_round_trip(address in arb_address()) {
        let parsed: Address = address.to_string().parse().unwrap();
        prop_assert_eq!(parsed, address);
    }

    /// Property: delay is never negative and never grows as time passes
    #[test]
    fn delay_non_increasing(
        due in arb_finite_millis(),
        a in arb_finite_millis(),
        b in arb_finite_millis(),
    ) {
        let message = tagged(Address::component(0, 1), 1, due);
        let (earlier, later) = if a <= b { (a, b) } else { (b, a) };

        let d_early = message.delay(Timestamp::new(earlier));
        let d_late = message.delay(Timestamp::new(later));
        prop_assert!(d_early >= 0.0);
        prop_assert!(d_late >= 0.0);
        prop_assert!(d_late <= d_early);
    }

    /// Property: converting any millisecond count to a `Duration` never panics
    /// and saturates at the ends
    #[test]
    fn millis_to_duration_saturates(millis in float::ANY) {
        let duration = millis_to_duration(millis);
        if millis.is_nan() || millis <= 0.0 {
            prop_assert_eq!(duration, Duration::ZERO);
        } else if millis >= 1e30 {
            prop_assert_eq!(duration, Duration::MAX);
        } else {
            prop_assert!(duration > Duration::ZERO || millis < 1e-5);
        }
    }

    /// Property: every message kind survives the frame codec
    #[test]
    fn codec_preserves_messages(
        src in arb_valid_address(),
        dst in arb_valid_address(),
        due in arb_finite_millis(),
        body in arb_body(),
    ) {
        let message = Message::delayed(src, dst, Timestamp::new(due), body);
        let frame = codec::encode(&message).unwrap();
        let decoded = codec::decode(&frame).unwrap();

        prop_assert_eq!(decoded.kind(), message.kind());
        prop_assert_eq!(decoded.src, message.src);
        prop_assert_eq!(decoded.dst, message.dst);
        prop_assert_eq!(decoded.due, message.due);
        prop_assert_eq!(decoded, message);
    }

    /// Property: a frame whose due-time can never come is refused
    #[test]
    fn codec_rejects_non_finite_due(
        src in arb_valid_address(),
        dst in arb_valid_address(),
        due in float::INFINITE | float::QUIET_NAN,
    ) {
        let message = Message::delayed(src, dst, Timestamp::new(due), MessageBody::Connected);
        let frame = codec::encode(&message).unwrap();
        let err = codec::decode(&frame).unwrap_err();
        prop_assert_eq!(err.kind(), ErrorKind::Generic);
    }

    /// Property: the inbox yields immediate messages in arrival order, then
    /// delayed messages by due-time with ties in arrival order
    #[test]
    fn inbox_drains_in_queue_order(dues in prop::collection::vec(prop_oneof![Just(0u32), 1u32..20], 1..40)) {
        let filters = FilterSet::new();
        let mut inbox = Inbox::new();
        let now = Timestamp::new(100.0);

        for (tag, due) in dues.iter().enumerate() {
            // Delayed dues land in the future relative to `now`
            let due = if *due == 0 { 0.0 } else { 100.0 + *due as f64 };
            inbox.insert(tagged(Address::component(0, 1), tag as u32, due), now, &filters);
        }

        let mut expected: Vec<(u32, u32)> = dues
            .iter()
            .enumerate()
            .map(|(tag, due)| (*due, tag as u32))
            .collect();
        expected.sort();
        let expected: Vec<u32> = expected.into_iter().map(|(_, tag)| tag).collect();

        let mut drained = Vec::new();
        let end = Timestamp::new(1_000.0);
        while let Some(message) = inbox.pop_ready(end, &filters, |_| false) {
            drained.push(tag_of(&message));
        }

        prop_assert_eq!(drained, expected);
        prop_assert!(inbox.is_empty());
    }
}
