//! Atomic claim and settlement.
//!
//! Each operation re-reads the request and the affected users inside one
//! sled transaction, so two donors racing for the same request cannot both
//! win and a request's claimant always agrees with that donor's
//! `active_claim_id`.
use super::eligibility::is_eligible;
use super::error::{ClaimError, Ineligibility, LifecycleError};
use super::lifecycle::{Action, Authority};
use super::request::{Request, RequestStatus};
use super::store::{Store, UnitOfWork};
use super::types::TimeStamp;
use super::user::User;
use sled::transaction::{ConflictableTransactionResult, abort};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claimed {
    pub request: Request,
    pub donor: User,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settled {
    pub request: Request,
    /// The donor whose claim was settled, as written back.
    pub claimant: Option<User>,
}

#[derive(Clone)]
pub struct ClaimCoordinator {
    store: Store,
    cooldown_months: u32,
}

impl ClaimCoordinator {
    pub fn new(store: Store, cooldown_months: u32) -> Self {
        Self {
            store,
            cooldown_months,
        }
    }

    pub fn claim(&self, donor_id: &str, request_id: &str, now: TimeStamp) -> Result<Claimed, ClaimError> {
        self.store.transact(|uow: &UnitOfWork<'_, ClaimError>| {
            let Some(mut request) = uow.request(request_id)? else {
                return abort(ClaimError::RequestNotFound(request_id.to_string()));
            };
            let Some(mut donor) = uow.user(donor_id)? else {
                return abort(ClaimError::UserNotFound(donor_id.to_string()));
            };

            if donor.id() == request.requester_id() {
                return abort(ClaimError::NotEligible(Ineligibility::CannotDonateToSelf));
            }
            match request.status() {
                RequestStatus::Pending => {}
                RequestStatus::Processing | RequestStatus::Fulfilled => {
                    return abort(ClaimError::AlreadyClaimed);
                }
                RequestStatus::Cancelled | RequestStatus::Rejected => {
                    return abort(ClaimError::NotEligible(Ineligibility::RequestNotClaimable));
                }
            }
            if let Err(reason) = is_eligible(&donor, &request, now, self.cooldown_months) {
                return abort(ClaimError::NotEligible(reason));
            }

            if request
                .apply(Action::Claim, donor_id, Authority::default(), now)
                .is_err()
            {
                return abort(ClaimError::AlreadyClaimed);
            }
            donor.active_claim_id = Some(request.id.clone());

            uow.put_request(&request)?;
            uow.put_user(&donor)?;
            Ok(Claimed { request, donor })
        })
    }

    /// Runs a complete, release, cancel or reject on behalf of `actor_id`.
    ///
    /// `is_coordinator` says whether the actor's coordinator scope covers the
    /// request; requester and claimant authority is read from the stored
    /// request inside the transaction.
    pub fn settle(
        &self,
        action: Action,
        actor_id: &str,
        request_id: &str,
        is_coordinator: bool,
        now: TimeStamp,
    ) -> Result<Settled, LifecycleError> {
        self.store.transact(|uow: &UnitOfWork<'_, LifecycleError>| {
            let Some(mut request) = uow.request(request_id)? else {
                return abort(LifecycleError::RequestNotFound(request_id.to_string()));
            };
            if uow.user(actor_id)?.is_none() {
                return abort(LifecycleError::UserNotFound(actor_id.to_string()));
            }

            let authority = Authority {
                is_requester: request.requester_id() == actor_id,
                is_claimant: request.claimant_id() == Some(actor_id),
                is_coordinator,
            };
            let claimant_id = request.claimant_id.clone();
            if let Err(err) = request.apply(action, actor_id, authority, now) {
                return abort(LifecycleError::InvalidTransition(err));
            }

            let claimant = match claimant_id {
                Some(id) => release_donor(uow, &id, &request.id, action, now)?,
                None => None,
            };
            uow.put_request(&request)?;
            Ok(Settled { request, claimant })
        })
    }
}

// Clears the donor's active claim when it still points at this request. A
// completed claim also counts as a donation.
fn release_donor(
    uow: &UnitOfWork<'_, LifecycleError>,
    donor_id: &str,
    request_id: &str,
    action: Action,
    now: TimeStamp,
) -> ConflictableTransactionResult<Option<User>, LifecycleError> {
    let Some(mut donor) = uow.user(donor_id)? else {
        return Ok(None);
    };
    if donor.active_claim_id() == Some(request_id) {
        donor.active_claim_id = None;
    }
    if action == Action::Complete {
        donor.record_donation(now);
    }
    uow.put_user(&donor)?;
    Ok(Some(donor))
}
