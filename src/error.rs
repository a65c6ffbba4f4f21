//! Error taxonomy for the request lifecycle core
use crate::lifecycle::Action;
use crate::request::RequestStatus;

/// Raised while validating a [`crate::request::NewRequest`] draft.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("blood unit must be a positive number")]
    ZeroUnits,
    #[error("contact number {0:?} is not a valid phone number")]
    InvalidContact(String),
}

/// Reasons a donor may not claim a request, in evaluation order.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ineligibility {
    #[error("donor blood group does not match the request")]
    BloodGroupMismatch,
    #[error("donor is already processing another request")]
    AlreadyProcessingAnother,
    #[error("donor is still inside the donation cooldown window")]
    CooldownActive,
    #[error("a requester cannot donate to their own request")]
    CannotDonateToSelf,
    #[error("request is not open for claims")]
    RequestNotClaimable,
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("storage failure: {0}")]
    Storage(#[from] sled::Error),
    #[error("failed to encode record: {0}")]
    Encode(String),
    #[error("failed to decode record: {0}")]
    Decode(#[from] minicbor::decode::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum DirectoryError {
    #[error("user {0} not found")]
    UserNotFound(String),
    #[error("geo node {0} not found")]
    GeoNodeNotFound(String),
    #[error(transparent)]
    Infrastructure(#[from] StoreError),
}

#[derive(thiserror::Error, Debug)]
pub enum ClaimError {
    #[error("request was already claimed by another donor")]
    AlreadyClaimed,
    #[error("donor is not eligible: {0}")]
    NotEligible(#[from] Ineligibility),
    #[error("request {0} not found")]
    RequestNotFound(String),
    #[error("user {0} not found")]
    UserNotFound(String),
    #[error(transparent)]
    Infrastructure(#[from] StoreError),
}

/// Why a lifecycle event was refused.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("request is {from} and can no longer {action}")]
    Terminal { from: RequestStatus, action: Action },
    #[error("cannot {action} a request that is {from}")]
    NotAllowed { from: RequestStatus, action: Action },
    #[error("{actor} is not authorised to {action} this request")]
    Unauthorized { actor: String, action: Action },
}

#[derive(thiserror::Error, Debug)]
pub enum LifecycleError {
    #[error("invalid transition: {0}")]
    InvalidTransition(#[from] TransitionError),
    #[error("request {0} not found")]
    RequestNotFound(String),
    #[error("user {0} not found")]
    UserNotFound(String),
    #[error(transparent)]
    Infrastructure(#[from] StoreError),
}

#[derive(thiserror::Error, Debug)]
pub enum CreateError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("requester {0} not found")]
    RequesterNotFound(String),
    #[error("unknown location: {0}")]
    UnknownLocation(String),
    #[error("could not allocate a unique request code")]
    CodeExhausted,
    #[error(transparent)]
    Identifier(#[from] anyhow::Error),
    #[error(transparent)]
    Infrastructure(#[from] StoreError),
}

#[derive(thiserror::Error, Debug)]
pub enum QueryError {
    #[error("user {0} not found")]
    UserNotFound(String),
    #[error(transparent)]
    Infrastructure(#[from] StoreError),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("notification channel is closed")]
    Closed,
    #[error("delivery failed: {0}")]
    Delivery(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unrecognised {kind}: {value:?}")]
pub struct ParseError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
