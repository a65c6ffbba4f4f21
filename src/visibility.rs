//! Which requests a viewer gets to see.
//!
//! Everything here is pure: the service loads the pool and the viewer's
//! profile, this module only filters and orders.
use super::eligibility::is_eligible;
use super::request::{Request, RequestStatus};
use super::role::Scope;
use super::types::TimeStamp;
use super::user::User;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum View {
    /// Donation opportunities for donors, managed requests for coordinators.
    #[default]
    Feed,
    /// Requests the viewer authored, whatever their status.
    Mine,
    /// Requests the viewer currently claims or has fulfilled.
    Donations,
}

#[derive(Debug, Clone)]
pub struct Viewer {
    pub profile: User,
    /// District names under the viewer's division; only read for
    /// division-scoped roles.
    pub division_districts: Vec<String>,
}

impl Viewer {
    pub fn new(profile: User) -> Self {
        Self {
            profile,
            division_districts: vec![],
        }
    }
    pub fn with_division_districts(mut self, districts: Vec<String>) -> Self {
        self.division_districts = districts;
        self
    }
    pub fn scope(&self) -> Scope {
        self.profile.role().scope()
    }
}

fn same_place(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Narrows `candidates` to the viewer's upazila when anything there is still
/// pending, otherwise widens to the viewer's district.
pub fn cascade(profile: &User, candidates: Vec<Request>) -> Vec<Request> {
    let district_local: Vec<Request> = candidates
        .into_iter()
        .filter(|r| same_place(r.district(), profile.district()))
        .collect();

    let upazila_pending = district_local.iter().any(|r| {
        same_place(r.upazila(), profile.upazila()) && r.status() == RequestStatus::Pending
    });
    if upazila_pending {
        district_local
            .into_iter()
            .filter(|r| same_place(r.upazila(), profile.upazila()))
            .collect()
    } else {
        district_local
    }
}

fn feed(viewer: &Viewer, pool: Vec<Request>, now: TimeStamp, cooldown_months: u32) -> Vec<Request> {
    let me = &viewer.profile;
    let others = pool.into_iter().filter(|r| r.requester_id() != me.id());

    match viewer.scope() {
        Scope::Own => {
            let claimable = others
                .filter(|r| is_eligible(me, r, now, cooldown_months).is_ok())
                .collect();
            cascade(me, claimable)
        }
        Scope::Team => cascade(me, others.filter(|r| r.status().is_active()).collect()),
        Scope::District => others
            .filter(|r| r.status().is_active() && same_place(r.district(), me.district()))
            .collect(),
        Scope::Division => others
            .filter(|r| {
                r.status().is_active()
                    && viewer
                        .division_districts
                        .iter()
                        .any(|d| same_place(d, r.district()))
            })
            .collect(),
        Scope::Global => others.collect(),
    }
}

/// Requests `viewer` may see through `view`, newest first.
pub fn visible_requests(
    viewer: &Viewer,
    pool: Vec<Request>,
    view: View,
    now: TimeStamp,
    cooldown_months: u32,
) -> Vec<Request> {
    let me = viewer.profile.id();
    let mut visible: Vec<Request> = match view {
        View::Feed => feed(viewer, pool, now, cooldown_months),
        View::Mine => pool.into_iter().filter(|r| r.requester_id() == me).collect(),
        View::Donations => pool
            .into_iter()
            .filter(|r| r.claimant_id() == Some(me) || r.fulfilled_by_id() == Some(me))
            .collect(),
    };
    // stable, so equal timestamps keep pool order
    visible.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
    visible
}
