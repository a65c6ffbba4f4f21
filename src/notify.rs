//! Outbound notifications about request state changes.
//!
//! Delivery is best effort: the service logs a failed `emit` and moves on,
//! the state change it reports has already been committed.
use super::error::NotifyError;
use super::lifecycle::Action;
use super::request::{Request, RequestStatus};
use super::types::TimeStamp;
use std::sync::mpsc::{self, Receiver, Sender};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Created,
    Claimed,
    Completed,
    Released,
    Cancelled,
    Rejected,
}

impl From<Action> for EventKind {
    fn from(action: Action) -> Self {
        match action {
            Action::Open => EventKind::Created,
            Action::Claim => EventKind::Claimed,
            Action::Complete => EventKind::Completed,
            Action::Release => EventKind::Released,
            Action::Cancel => EventKind::Cancelled,
            Action::Reject => EventKind::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: EventKind,
    pub request_id: String,
    pub request_code: String,
    pub status: RequestStatus,
    pub actor_id: String,
    pub at: TimeStamp,
}

impl Notification {
    pub fn new(kind: EventKind, request: &Request, actor_id: &str) -> Self {
        Self {
            kind,
            request_id: request.id().to_string(),
            request_code: request.request_code().to_string(),
            status: request.status(),
            actor_id: actor_id.to_string(),
            at: request.updated_at(),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn emit(&self, event: &Notification, recipients: &[String]) -> Result<(), NotifyError>;
}

/// Writes every event to the log; the default when nothing else is wired up.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn emit(&self, event: &Notification, recipients: &[String]) -> Result<(), NotifyError> {
        info!(
            kind = ?event.kind,
            request = %event.request_code,
            status = %event.status,
            actor = %event.actor_id,
            recipients = recipients.len(),
            "request event"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub event: Notification,
    pub recipients: Vec<String>,
}

/// Hands events to another thread over an mpsc channel.
pub struct ChannelNotifier {
    sender: Sender<Delivery>,
}

impl ChannelNotifier {
    pub fn new(sender: Sender<Delivery>) -> Self {
        Self { sender }
    }

    pub fn channel() -> (Self, Receiver<Delivery>) {
        let (sender, receiver) = mpsc::channel();
        (Self::new(sender), receiver)
    }
}

impl Notifier for ChannelNotifier {
    fn emit(&self, event: &Notification, recipients: &[String]) -> Result<(), NotifyError> {
        let delivery = Delivery {
            event: event.clone(),
            recipients: recipients.to_vec(),
        };
        self.sender.send(delivery).map_err(|_| NotifyError::Closed)
    }
}
