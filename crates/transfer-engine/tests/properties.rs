//! Property tests for the transfer coordinator over random event sequences.

use std::collections::HashMap;

use holdline_transfer_engine::{CallId, CallState, Coordinator, QueueError, TransferOutcome};
use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;

#[derive(Debug, Clone)]
enum Event {
    Arrive(u8),
    Transfer(u8),
    Report(u8, TransferOutcome),
    Abandon(u8),
    Clear,
}

fn arb_outcome() -> impl Strategy<Value = TransferOutcome> {
    prop_oneof![
        Just(TransferOutcome::Connected),
        Just(TransferOutcome::Failed),
        Just(TransferOutcome::NoAnswer),
        Just(TransferOutcome::Busy),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    // A small id space so events collide often
    let call = 0u8..5;
    prop_oneof![
        4 => call.clone().prop_map(Event::Arrive),
        4 => call.clone().prop_map(Event::Transfer),
        4 => (call.clone(), arb_outcome()).prop_map(|(c, o)| Event::Report(c, o)),
        1 => call.prop_map(Event::Abandon),
        1 => Just(Event::Clear),
    ]
}

fn call_id(n: u8) -> CallId {
    CallId::new(format!("CA{}", n))
}

/// Apply one event, returning the error if it was refused.
fn apply(c: &mut Coordinator, event: &Event) -> Result<(), QueueError> {
    match event {
        Event::Arrive(n) => c.admit(call_id(*n), "+15551230000".to_string()).map(|_| ()),
        Event::Transfer(n) => c.begin_transfer(&call_id(*n), "+15559999999".to_string()).map(|_| ()),
        Event::Report(n, outcome) => c.report_outcome(&call_id(*n), *outcome).map(|_| ()),
        Event::Abandon(n) => c.abandon(&call_id(*n)).map(|_| ()),
        Event::Clear => {
            c.clear_all();
            Ok(())
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_queue_membership_matches_state(
        max_attempts in 1u32..=3,
        events in prop::collection::vec(arb_event(), 0..64),
    ) {
        let mut c = Coordinator::new(max_attempts);
        for event in &events {
            let _ = apply(&mut c, event);
            prop_assert!(c.check_invariants().is_ok(), "after {:?}: {:?}", event, c.check_invariants());

            let status = c.snapshot();
            prop_assert_eq!(status.queue_length, status.queued_calls.len());
            prop_assert!(status.queued_calls.iter().all(|r| r.state == CallState::Queued));
            prop_assert!(status.active_calls.iter().all(|r| r.state == CallState::Transferring));
            prop_assert_eq!(c.len(), status.queued_calls.len() + status.active_calls.len());
        }
    }

    #[test]
    fn prop_call_ids_unique(events in prop::collection::vec(arb_event(), 0..64)) {
        let mut c = Coordinator::new(2);
        for event in &events {
            if let Event::Arrive(n) = event {
                let existed = c.get(&call_id(*n)).is_ok();
                let before = c.snapshot();
                let result = apply(&mut c, event);
                if existed {
                    prop_assert!(matches!(result, Err(QueueError::DuplicateCall(_))));
                    prop_assert_eq!(before, c.snapshot());
                } else {
                    prop_assert!(result.is_ok());
                }
            } else {
                let _ = apply(&mut c, event);
            }

            let status = c.snapshot();
            let mut ids: Vec<_> = status
                .queued_calls
                .iter()
                .chain(status.active_calls.iter())
                .map(|r| r.call_id.clone())
                .collect();
            let total = ids.len();
            ids.sort();
            ids.dedup();
            prop_assert_eq!(ids.len(), total);
        }
    }

    #[test]
    fn prop_attempts_never_decrease(
        max_attempts in 1u32..=3,
        events in prop::collection::vec(arb_event(), 0..64),
    ) {
        let mut c = Coordinator::new(max_attempts);
        let mut seen: HashMap<CallId, u32> = HashMap::new();
        for event in &events {
            let _ = apply(&mut c, event);

            // A call id admitted again after eviction is a new call
            seen.retain(|id, _| c.get(id).is_ok());
            let status = c.snapshot();
            for record in status.queued_calls.iter().chain(status.active_calls.iter()) {
                let previous = seen.insert(record.call_id.clone(), record.attempts).unwrap_or(0);
                prop_assert!(record.attempts >= previous);
                prop_assert!(record.attempts <= max_attempts);
            }
        }
    }

    #[test]
    fn prop_refused_events_mutate_nothing(
        max_attempts in 1u32..=3,
        events in prop::collection::vec(arb_event(), 0..64),
    ) {
        let mut c = Coordinator::new(max_attempts);
        for event in &events {
            let before = c.snapshot();
            if let Err(e) = apply(&mut c, event) {
                prop_assert!(e.is_expected(), "unexpected fault {:?}", e);
                prop_assert_eq!(before, c.snapshot());
            }
        }
    }

    #[test]
    fn prop_status_for_call_not_in_flight_is_not_found(
        events in prop::collection::vec(arb_event(), 0..32),
        target in 0u8..5,
        outcome in arb_outcome(),
    ) {
        let mut c = Coordinator::new(2);
        for event in &events {
            let _ = apply(&mut c, event);
        }

        let in_flight = c.get(&call_id(target)).map(|r| r.state == CallState::Transferring).unwrap_or(false);
        prop_assume!(!in_flight);

        let before = c.snapshot();
        let result = c.report_outcome(&call_id(target), outcome);
        prop_assert!(matches!(result, Err(QueueError::CallNotFound(_))));
        prop_assert_eq!(before, c.snapshot());
    }

    #[test]
    fn prop_clear_all_is_idempotent(events in prop::collection::vec(arb_event(), 0..32)) {
        let mut c = Coordinator::new(2);
        for event in &events {
            let _ = apply(&mut c, event);
        }
        let live = c.len();

        prop_assert_eq!(c.clear_all().len(), live);
        prop_assert!(c.clear_all().is_empty());
        prop_assert!(c.is_empty());
        prop_assert_eq!(c.queue_len(), 0);
    }
}
