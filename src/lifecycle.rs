//! Request status state machine.
//!
//! ```text
//! pending --claim--> processing --complete--> fulfilled
//!    ^                   |
//!    +------release------+
//! pending | processing --cancel--> cancelled
//! pending --reject--> rejected
//! ```
//!
//! Terminal states accept nothing. Who may trigger an event is decided by
//! [`Authority`]; eligibility for `claim` lives in [`crate::eligibility`].
use super::error::TransitionError;
use super::request::{Request, RequestStatus, TransitionRecord};
use super::types::TimeStamp;
use std::fmt;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    #[n(0)]
    Open,
    #[n(1)]
    Claim,
    #[n(2)]
    Complete,
    #[n(3)]
    Release,
    #[n(4)]
    Cancel,
    #[n(5)]
    Reject,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Open => "open",
            Action::Claim => "claim",
            Action::Complete => "complete",
            Action::Release => "release",
            Action::Cancel => "cancel",
            Action::Reject => "reject",
        })
    }
}

impl RequestStatus {
    /// The status reached by applying `action`, ignoring who asked.
    pub fn transition(self, action: Action) -> Result<RequestStatus, TransitionError> {
        use RequestStatus::*;

        if self.is_terminal() {
            return Err(TransitionError::Terminal { from: self, action });
        }
        match (self, action) {
            (Pending, Action::Claim) => Ok(Processing),
            (Processing, Action::Complete) => Ok(Fulfilled),
            (Processing, Action::Release) => Ok(Pending),
            (Pending | Processing, Action::Cancel) => Ok(Cancelled),
            (Pending, Action::Reject) => Ok(Rejected),
            (from, action) => Err(TransitionError::NotAllowed { from, action }),
        }
    }
}

/// How the acting user relates to the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Authority {
    pub is_requester: bool,
    pub is_claimant: bool,
    /// The actor's coordinator scope covers the request's location.
    pub is_coordinator: bool,
}

impl Authority {
    pub fn permits(&self, action: Action) -> bool {
        match action {
            Action::Open => self.is_requester,
            // guarded by eligibility instead
            Action::Claim => true,
            Action::Complete => self.is_claimant,
            Action::Release => self.is_claimant || self.is_coordinator,
            Action::Cancel => self.is_requester || self.is_coordinator,
            Action::Reject => self.is_coordinator,
        }
    }
}

impl Request {
    /// Applies `action` on behalf of `actor`, keeping the claimant and
    /// fulfilment fields consistent with the new status.
    ///
    /// The request is left untouched when the transition is refused.
    pub fn apply(
        &mut self,
        action: Action,
        actor: &str,
        authority: Authority,
        now: TimeStamp,
    ) -> Result<RequestStatus, TransitionError> {
        let to = self.status.transition(action)?;
        if !authority.permits(action) {
            return Err(TransitionError::Unauthorized {
                actor: actor.to_string(),
                action,
            });
        }

        match action {
            Action::Claim => self.claimant_id = Some(actor.to_string()),
            Action::Complete => self.fulfilled_by_id = self.claimant_id.take(),
            Action::Release | Action::Cancel => self.claimant_id = None,
            Action::Open | Action::Reject => {}
        }

        self.history.push(TransitionRecord {
            actor: actor.to_string(),
            action,
            from: Some(self.status),
            to,
            at: now,
        });
        self.status = to;
        self.updated_at = now;
        self.version += 1;

        Ok(to)
    }
}
