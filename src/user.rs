//! Donor-relevant projection of a user record
use super::role::Role;
use super::types::{BloodGroup, TimeStamp};
use chrono::{DateTime, Utc};

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct User {
    #[n(0)]
    pub(crate) id: String,
    #[n(1)]
    pub(crate) name: String,
    #[n(2)]
    pub(crate) role: Role,
    #[n(3)]
    pub(crate) blood_group: BloodGroup,
    #[n(4)]
    pub(crate) district: String,
    #[n(5)]
    pub(crate) upazila: String,
    #[n(6)]
    pub(crate) last_donation: Option<TimeStamp>,
    #[n(7)]
    pub(crate) active_claim_id: Option<String>, // the one request this user is processing
    #[n(8)]
    pub(crate) donation_count: u32,
}

impl User {
    pub fn new(
        id: &str,
        name: &str,
        role: Role,
        blood_group: BloodGroup,
        district: &str,
        upazila: &str,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            role,
            blood_group,
            district: district.to_string(),
            upazila: upazila.to_string(),
            last_donation: None,
            active_claim_id: None,
            donation_count: 0,
        }
    }
    pub fn with_last_donation(mut self, at: TimeStamp) -> Self {
        self.last_donation = Some(at);
        self
    }
    /// Used when projecting a record whose claim is held elsewhere, e.g. an
    /// imported profile.
    pub fn with_active_claim(mut self, request_id: &str) -> Self {
        self.active_claim_id = Some(request_id.to_string());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn role(&self) -> Role {
        self.role
    }
    pub fn blood_group(&self) -> BloodGroup {
        self.blood_group
    }
    pub fn district(&self) -> &str {
        &self.district
    }
    pub fn upazila(&self) -> &str {
        &self.upazila
    }
    pub fn last_donation(&self) -> Option<TimeStamp> {
        self.last_donation
    }
    pub fn active_claim_id(&self) -> Option<&str> {
        self.active_claim_id.as_deref()
    }
    pub fn donation_count(&self) -> u32 {
        self.donation_count
    }

    /// `last_donation + cooldown`, or `None` for someone who never donated.
    pub fn next_eligible_date(&self, cooldown_months: u32) -> Option<TimeStamp> {
        self.last_donation.map(|last| {
            last.plus_months(cooldown_months)
                .unwrap_or_else(|| DateTime::<Utc>::MAX_UTC.into())
        })
    }

    pub(crate) fn record_donation(&mut self, at: TimeStamp) {
        self.last_donation = Some(at);
        self.donation_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_eligible_date_adds_the_cooldown() {
        let donor = User::new("u1", "Rahim", Role::User, BloodGroup::APositive, "Dhaka", "Savar")
            .with_last_donation(TimeStamp::new_with(2024, 1, 31, 8, 0, 0).unwrap());

        assert_eq!(
            donor.next_eligible_date(3),
            TimeStamp::new_with(2024, 4, 30, 8, 0, 0)
        );
        assert_eq!(
            User::new("u2", "Karim", Role::User, BloodGroup::APositive, "Dhaka", "Savar")
                .next_eligible_date(3),
            None
        );
    }
}
