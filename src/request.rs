//! Blood request records and the draft used to open them
use super::error::{ParseError, ValidationError};
use super::lifecycle::Action;
use super::types::{BloodGroup, TimeStamp};
use std::fmt;
use std::str::FromStr;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Processing,
    #[n(2)]
    Fulfilled,
    #[n(3)]
    Cancelled,
    #[n(4)]
    Rejected,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 5] = [
        RequestStatus::Pending,
        RequestStatus::Processing,
        RequestStatus::Fulfilled,
        RequestStatus::Cancelled,
        RequestStatus::Rejected,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestStatus::Fulfilled | RequestStatus::Cancelled | RequestStatus::Rejected
        )
    }

    /// Pending or processing: still needs attention from donors or coordinators.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    pub fn label(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Processing => "processing",
            RequestStatus::Fulfilled => "fulfilled",
            RequestStatus::Cancelled => "cancelled",
            RequestStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RequestStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        RequestStatus::ALL
            .into_iter()
            .find(|status| status.label() == wanted)
            .ok_or_else(|| ParseError::new("request status", s))
    }
}

/// One entry of a request's audit trail.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct TransitionRecord {
    #[n(0)]
    pub actor: String,
    #[n(1)]
    pub action: Action,
    #[n(2)]
    pub from: Option<RequestStatus>, // None for the opening record
    #[n(3)]
    pub to: RequestStatus,
    #[n(4)]
    pub at: TimeStamp,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestDetails {
    #[n(0)]
    pub patient_name: Option<String>,
    #[n(1)]
    pub hospital: Option<String>,
    #[n(2)]
    pub contact_number: Option<String>,
    #[n(3)]
    pub required_on: Option<TimeStamp>,
    #[n(4)]
    pub note: Option<String>,
}

// Draft of a request before it is opened. Locations are free text here and
// are resolved against the geo hierarchy when the request is created.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NewRequest {
    blood_group: Option<BloodGroup>,
    blood_unit: u32,
    district: Option<String>,
    upazila: Option<String>,
    details: RequestDetails,
}

struct Finalised {
    blood_group: BloodGroup,
    blood_unit: u32,
    district: String,
    upazila: String,
    details: RequestDetails,
}

impl NewRequest {
    /// Construct an empty draft
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_blood_group(mut self, blood_group: BloodGroup) -> Self {
        self.blood_group = Some(blood_group);
        self
    }
    pub fn set_blood_unit(mut self, units: u32) -> Self {
        self.blood_unit = units;
        self
    }
    pub fn set_location(mut self, district: &str, upazila: &str) -> Self {
        self.district = Some(district.trim().to_string());
        self.upazila = Some(upazila.trim().to_string());
        self
    }
    pub fn set_patient_name(mut self, name: &str) -> Self {
        self.details.patient_name = Some(name.to_string());
        self
    }
    pub fn set_hospital(mut self, hospital: &str) -> Self {
        self.details.hospital = Some(hospital.to_string());
        self
    }
    pub fn set_contact_number(mut self, number: &str) -> Self {
        self.details.contact_number = Some(number.trim().to_string());
        self
    }
    pub fn set_required_on(mut self, date: TimeStamp) -> Self {
        self.details.required_on = Some(date);
        self
    }
    pub fn set_note(mut self, note: &str) -> Self {
        self.details.note = Some(note.to_string());
        self
    }
    pub fn district(&self) -> Option<&str> {
        self.district.as_deref()
    }
    pub fn upazila(&self) -> Option<&str> {
        self.upazila.as_deref()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.clone().finalise().map(|_| ())
    }

    fn finalise(self) -> Result<Finalised, ValidationError> {
        let blood_group = self
            .blood_group
            .ok_or(ValidationError::MissingField("blood group"))?;
        if self.blood_unit == 0 {
            return Err(ValidationError::ZeroUnits);
        }
        let district = self
            .district
            .filter(|d| !d.is_empty())
            .ok_or(ValidationError::MissingField("district"))?;
        let upazila = self
            .upazila
            .filter(|u| !u.is_empty())
            .ok_or(ValidationError::MissingField("upazila"))?;
        if let Some(number) = &self.details.contact_number {
            if !is_phone_number(number) {
                return Err(ValidationError::InvalidContact(number.clone()));
            }
        }

        Ok(Finalised {
            blood_group,
            blood_unit: self.blood_unit,
            district,
            upazila,
            details: self.details,
        })
    }
}

// optional leading '+', then 10 to 15 digits; spaces and dashes are ignored
fn is_phone_number(number: &str) -> bool {
    let digits = number.strip_prefix('+').unwrap_or(number);
    let digits: Vec<char> = digits.chars().filter(|c| *c != ' ' && *c != '-').collect();
    (10..=15).contains(&digits.len()) && digits.iter().all(char::is_ascii_digit)
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Request {
    #[n(0)]
    pub(crate) id: String, // bech32 encoded uuid7
    #[n(1)]
    pub(crate) request_code: String, // human readable, e.g. BR-3F9A0C1D
    #[n(2)]
    pub(crate) blood_group: BloodGroup,
    #[n(3)]
    pub(crate) blood_unit: u32,
    #[n(4)]
    pub(crate) district: String,
    #[n(5)]
    pub(crate) upazila: String,
    #[n(6)]
    pub(crate) requester_id: String,
    #[n(7)]
    pub(crate) status: RequestStatus,
    #[n(8)]
    pub(crate) claimant_id: Option<String>,
    #[n(9)]
    pub(crate) fulfilled_by_id: Option<String>,
    #[n(10)]
    pub(crate) created_at: TimeStamp,
    #[n(11)]
    pub(crate) updated_at: TimeStamp,
    #[n(12)]
    pub(crate) version: u64,
    #[n(13)]
    pub(crate) details: RequestDetails,
    #[n(14)]
    pub(crate) history: Vec<TransitionRecord>,
}

impl Request {
    /// Opens a pending request from a draft.
    pub fn open(
        id: String,
        request_code: String,
        requester_id: &str,
        draft: NewRequest,
        now: TimeStamp,
    ) -> Result<Self, ValidationError> {
        let draft = draft.finalise()?;
        let opened = TransitionRecord {
            actor: requester_id.to_string(),
            action: Action::Open,
            from: None,
            to: RequestStatus::Pending,
            at: now,
        };

        Ok(Self {
            id,
            request_code,
            blood_group: draft.blood_group,
            blood_unit: draft.blood_unit,
            district: draft.district,
            upazila: draft.upazila,
            requester_id: requester_id.to_string(),
            status: RequestStatus::Pending,
            claimant_id: None,
            fulfilled_by_id: None,
            created_at: now,
            updated_at: now,
            version: 0,
            details: draft.details,
            history: vec![opened],
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn request_code(&self) -> &str {
        &self.request_code
    }
    pub fn blood_group(&self) -> BloodGroup {
        self.blood_group
    }
    pub fn blood_unit(&self) -> u32 {
        self.blood_unit
    }
    pub fn district(&self) -> &str {
        &self.district
    }
    pub fn upazila(&self) -> &str {
        &self.upazila
    }
    pub fn requester_id(&self) -> &str {
        &self.requester_id
    }
    pub fn status(&self) -> RequestStatus {
        self.status
    }
    pub fn claimant_id(&self) -> Option<&str> {
        self.claimant_id.as_deref()
    }
    pub fn fulfilled_by_id(&self) -> Option<&str> {
        self.fulfilled_by_id.as_deref()
    }
    pub fn created_at(&self) -> TimeStamp {
        self.created_at
    }
    pub fn updated_at(&self) -> TimeStamp {
        self.updated_at
    }
    pub fn version(&self) -> u64 {
        self.version
    }
    pub fn details(&self) -> &RequestDetails {
        &self.details
    }
    pub fn history(&self) -> &[TransitionRecord] {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> NewRequest {
        NewRequest::new()
            .set_blood_group(BloodGroup::BPositive)
            .set_blood_unit(2)
            .set_location(" Dhaka ", "Savar")
    }

    #[test]
    fn open_starts_pending_with_an_opening_record() {
        let now = TimeStamp::now();
        let request = Request::open("req_1".into(), "BR-0001".into(), "user_a", draft(), now).unwrap();

        assert_eq!(request.status(), RequestStatus::Pending);
        assert_eq!(request.district(), "Dhaka");
        assert_eq!(request.claimant_id(), None);
        assert_eq!(request.history().len(), 1);
        assert_eq!(request.history()[0].action, Action::Open);
    }

    #[test]
    fn draft_validation() {
        assert_eq!(
            NewRequest::new().set_blood_unit(1).validate(),
            Err(ValidationError::MissingField("blood group"))
        );
        assert_eq!(draft().set_blood_unit(0).validate(), Err(ValidationError::ZeroUnits));
        assert!(draft().set_contact_number("+880 1712-345678").validate().is_ok());
        assert!(matches!(
            draft().set_contact_number("call me").validate(),
            Err(ValidationError::InvalidContact(_))
        ));
    }

    #[test]
    fn request_cbor_roundtrip() {
        let request = Request::open(
            "req_1".into(),
            "BR-0001".into(),
            "user_a",
            draft().set_hospital("DMCH").set_required_on(TimeStamp::now()),
            TimeStamp::now(),
        )
        .unwrap();

        let encoded = minicbor::to_vec(&request).unwrap();
        let decoded: Request = minicbor::decode(&encoded).unwrap();

        assert_eq!(request, decoded);
    }
}
