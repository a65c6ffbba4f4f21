//! Property-based tests for eligibility and visibility
//!
//! These cover the matching invariants that must hold for any pool of
//! requests: no self donation, no claims during cooldown, the upazila to
//! district cascade and newest-first ordering. Persistence is left to the
//! scenario tests.

use blood_request::{
    eligibility::is_eligible,
    error::Ineligibility,
    request::{NewRequest, Request, RequestStatus},
    role::Role,
    types::{BloodGroup, TimeStamp},
    user::User,
    visibility::{View, Viewer, cascade, visible_requests},
};
use chrono::Duration;
use proptest::prelude::*;

const DISTRICTS: [&str; 2] = ["Dhaka", "Gazipur"];
const UPAZILAS: [&str; 3] = ["Savar", "Dhamrai", "Keraniganj"];

fn blood_group_strategy() -> impl Strategy<Value = BloodGroup> {
    prop::sample::select(BloodGroup::ALL.to_vec())
}

fn base_time() -> TimeStamp {
    TimeStamp::new_with(2025, 6, 1, 0, 0, 0).expect("valid date")
}

/// A request somewhere in the two districts, possibly claimed and possibly
/// authored by the viewer.
fn request_strategy() -> impl Strategy<Value = Request> {
    (
        0..10_000u32,
        blood_group_strategy(),
        0..DISTRICTS.len(),
        0..UPAZILAS.len(),
        any::<bool>(),
        any::<bool>(),
        0..600i64,
    )
        .prop_map(|(n, group, district, upazila, claimed, by_viewer, age)| {
            let requester = if by_viewer { "viewer" } else { "someone" };
            let created = base_time().minus(Duration::minutes(age)).expect("in range");
            let draft = NewRequest::new()
                .set_blood_group(group)
                .set_blood_unit(1)
                .set_location(DISTRICTS[district], UPAZILAS[upazila]);
            let mut request =
                Request::open(format!("req_{n}"), format!("BR-{n}"), requester, draft, created)
                    .expect("valid draft");
            if claimed {
                request
                    .apply(
                        blood_request::lifecycle::Action::Claim,
                        "other_donor",
                        Default::default(),
                        created,
                    )
                    .expect("pending is claimable");
            }
            request
        })
}

fn pool_strategy() -> impl Strategy<Value = Vec<Request>> {
    prop::collection::vec(request_strategy(), 0..20)
}

fn viewer_profile(role: Role, group: BloodGroup) -> User {
    User::new("viewer", "Viewer", role, group, "Dhaka", "Savar")
}

proptest! {
    #[test]
    fn nobody_donates_to_themselves(group in blood_group_strategy(), request in request_strategy()) {
        let requester = viewer_profile(Role::User, group);
        if request.requester_id() == requester.id() {
            prop_assert!(is_eligible(&requester, &request, base_time(), 3).is_err());
        }
    }

    #[test]
    fn cooldown_blocks_until_the_next_eligible_date(
        request in request_strategy(),
        days_ago in 0..120i64,
    ) {
        let now = base_time();
        let last = now.minus(Duration::days(days_ago)).expect("in range");
        let donor = User::new("donor", "Donor", Role::User, request.blood_group(), "Dhaka", "Savar")
            .with_last_donation(last);
        let next = donor.next_eligible_date(3).expect("donated before");

        let result = is_eligible(&donor, &request, now, 3);
        if next > now {
            prop_assert_eq!(result, Err(Ineligibility::CooldownActive));
        } else if request.status() == RequestStatus::Pending {
            prop_assert_eq!(result, Ok(()));
        }
    }

    #[test]
    fn cascade_prefers_pending_upazila_requests(pool in pool_strategy()) {
        let me = viewer_profile(Role::Moderator, BloodGroup::OPositive);
        let local_pending = pool.iter().any(|r| {
            r.district() == me.district()
                && r.upazila() == me.upazila()
                && r.status() == RequestStatus::Pending
        });

        let narrowed = cascade(&me, pool.clone());
        for request in &narrowed {
            prop_assert_eq!(request.district(), me.district());
            if local_pending {
                prop_assert_eq!(request.upazila(), me.upazila());
            }
        }
        if !local_pending {
            let district_local = pool.iter().filter(|r| r.district() == me.district()).count();
            prop_assert_eq!(narrowed.len(), district_local);
        }
    }

    #[test]
    fn feeds_are_newest_first_and_exclude_own_requests(
        pool in pool_strategy(),
        role in prop::sample::select(Role::ALL.to_vec()),
        group in blood_group_strategy(),
    ) {
        let viewer = Viewer::new(viewer_profile(role, group))
            .with_division_districts(DISTRICTS.iter().map(|d| d.to_string()).collect());

        let feed = visible_requests(&viewer, pool.clone(), View::Feed, base_time(), 3);
        prop_assert!(feed.iter().all(|r| r.requester_id() != "viewer"));
        prop_assert!(feed.windows(2).all(|w| w[0].created_at() >= w[1].created_at()));

        let mine = visible_requests(&viewer, pool.clone(), View::Mine, base_time(), 3);
        let authored = pool.iter().filter(|r| r.requester_id() == "viewer").count();
        prop_assert_eq!(mine.len(), authored);
    }
}
