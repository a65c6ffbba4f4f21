//! Donor eligibility, evaluated in a fixed order where the first failure wins.
use super::error::Ineligibility;
use super::request::{Request, RequestStatus};
use super::types::TimeStamp;
use super::user::User;

/// Checks that only depend on the donor: no active claim and cooldown over.
pub fn check_donor(donor: &User, now: TimeStamp, cooldown_months: u32) -> Result<(), Ineligibility> {
    if donor.active_claim_id().is_some() {
        return Err(Ineligibility::AlreadyProcessingAnother);
    }
    match donor.next_eligible_date(cooldown_months) {
        Some(next) if next > now => Err(Ineligibility::CooldownActive),
        _ => Ok(()),
    }
}

pub fn is_eligible(
    donor: &User,
    request: &Request,
    now: TimeStamp,
    cooldown_months: u32,
) -> Result<(), Ineligibility> {
    if donor.blood_group() != request.blood_group() {
        return Err(Ineligibility::BloodGroupMismatch);
    }
    check_donor(donor, now, cooldown_months)?;
    if donor.id() == request.requester_id() {
        return Err(Ineligibility::CannotDonateToSelf);
    }
    if request.status() != RequestStatus::Pending {
        return Err(Ineligibility::RequestNotClaimable);
    }
    Ok(())
}
