//! Property-based tests for the request state machine
//!
//! Random sequences of actions from random actors are applied to a pending
//! request. Whatever the sequence, the claimant fields must agree with the
//! status, and once a terminal status is reached nothing moves again.

use blood_request::{
    error::TransitionError,
    lifecycle::{Action, Authority},
    request::{NewRequest, Request, RequestStatus},
    types::{BloodGroup, TimeStamp},
};
use proptest::prelude::*;

const ACTORS: [&str; 4] = ["requester", "donor_a", "donor_b", "coordinator"];

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        Just(Action::Claim),
        Just(Action::Complete),
        Just(Action::Release),
        Just(Action::Cancel),
        Just(Action::Reject),
    ]
}

fn status_strategy() -> impl Strategy<Value = RequestStatus> {
    prop::sample::select(RequestStatus::ALL.to_vec())
}

/// (action, actor index) pairs, 1 to 12 steps
fn step_sequence_strategy() -> impl Strategy<Value = Vec<(Action, usize)>> {
    prop::collection::vec((action_strategy(), 0..ACTORS.len()), 1..=12)
}

fn pending() -> Request {
    let draft = NewRequest::new()
        .set_blood_group(BloodGroup::OPositive)
        .set_blood_unit(1)
        .set_location("Dhaka", "Savar");
    Request::open("req_1".into(), "BR-1".into(), "requester", draft, TimeStamp::now())
        .expect("valid draft")
}

fn authority_of(request: &Request, actor: &str) -> Authority {
    Authority {
        is_requester: request.requester_id() == actor,
        is_claimant: request.claimant_id() == Some(actor),
        is_coordinator: actor == "coordinator",
    }
}

proptest! {
    #[test]
    fn terminal_status_refuses_everything(status in status_strategy(), action in action_strategy()) {
        let result = status.transition(action);
        if status.is_terminal() {
            prop_assert_eq!(result, Err(TransitionError::Terminal { from: status, action }));
        } else if let Ok(to) = result {
            prop_assert_ne!(to, status);
        }
    }

    #[test]
    fn claimant_fields_follow_status(steps in step_sequence_strategy()) {
        let mut request = pending();
        let mut frozen: Option<Request> = None;

        for (action, actor) in steps {
            let actor = ACTORS[actor];
            let authority = authority_of(&request, actor);
            let before = request.clone();

            match request.apply(action, actor, authority, TimeStamp::now()) {
                Ok(to) => {
                    prop_assert_eq!(request.status(), to);
                    prop_assert_eq!(request.version(), before.version() + 1);
                    prop_assert_eq!(request.history().len(), before.history().len() + 1);
                }
                Err(_) => {
                    prop_assert_eq!(&request, &before);
                }
            }

            match request.status() {
                RequestStatus::Processing => {
                    prop_assert!(request.claimant_id().is_some());
                }
                _ => {
                    prop_assert!(request.claimant_id().is_none());
                }
            }
            prop_assert_eq!(
                request.fulfilled_by_id().is_some(),
                request.status() == RequestStatus::Fulfilled
            );

            if let Some(frozen) = &frozen {
                prop_assert_eq!(&request, frozen);
            } else if request.status().is_terminal() {
                frozen = Some(request.clone());
            }
        }
    }

    #[test]
    fn only_the_claimant_completes(actor in 0..ACTORS.len()) {
        let mut request = pending();
        let claim = authority_of(&request, "donor_a");
        request.apply(Action::Claim, "donor_a", claim, TimeStamp::now()).expect("pending is claimable");

        let actor = ACTORS[actor];
        let result = request.apply(Action::Complete, actor, authority_of(&request, actor), TimeStamp::now());
        prop_assert_eq!(result.is_ok(), actor == "donor_a");
    }
}
