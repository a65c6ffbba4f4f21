//! Blood request lifecycle with location-hierarchy matching.
//!
//! Requests are opened against the Division → District → Upazila hierarchy,
//! claimed exclusively by one eligible donor, and settled by the claimant,
//! the requester or a coordinator whose scope covers the request.

pub mod claim;
pub mod config;
pub mod eligibility;
pub mod error;
pub mod geo;
pub mod lifecycle;
pub mod notify;
pub mod query;
pub mod request;
pub mod role;
pub mod service;
pub mod store;
pub mod types;
pub mod user;
pub mod utils;
pub mod visibility;

pub use config::Config;
pub use service::RequestService;
