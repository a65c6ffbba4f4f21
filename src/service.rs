//! Service layer API for blood request operations
use super::claim::ClaimCoordinator;
use super::config::Config;
use super::error::{ClaimError, CreateError, DirectoryError, LifecycleError, QueryError, StoreError};
use super::geo::{Directory, NodeKind, ResolvedScope, SledDirectory};
use super::lifecycle::Action;
use super::notify::{EventKind, LogNotifier, Notification, Notifier};
use super::query::{ListFilter, Page, paginate};
use super::request::{NewRequest, Request, RequestStatus};
use super::role::Scope;
use super::store::Store;
use super::types::TimeStamp;
use super::utils::{new_request_code, new_uuid_to_bech32};
use super::visibility::{View, Viewer, visible_requests};
use chrono::Duration;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

const REQUEST_HRP: &str = "req";
const CODE_ATTEMPTS: usize = 5;

// A stale geo reference reads as "scope unknown", which every caller treats
// as a denial or an empty result.
fn known<T, E>(
    result: Result<T, DirectoryError>,
    user_missing: impl FnOnce(String) -> E,
) -> Result<Option<T>, E>
where
    E: From<StoreError>,
{
    match result {
        Ok(value) => Ok(Some(value)),
        Err(DirectoryError::GeoNodeNotFound(node)) => {
            debug!(%node, "stale geo reference");
            Ok(None)
        }
        Err(DirectoryError::UserNotFound(id)) => Err(user_missing(id)),
        Err(DirectoryError::Infrastructure(err)) => Err(err.into()),
    }
}

// location lookups only fail on a missing node or on the store itself
fn unknown_location(err: DirectoryError, location: String) -> CreateError {
    match err {
        DirectoryError::Infrastructure(err) => CreateError::Infrastructure(err),
        DirectoryError::GeoNodeNotFound(_) | DirectoryError::UserNotFound(_) => {
            CreateError::UnknownLocation(location)
        }
    }
}

pub struct RequestService {
    store: Store,
    directory: Arc<dyn Directory>,
    notifier: Arc<dyn Notifier>,
    claims: ClaimCoordinator,
    config: Config,
}

impl RequestService {
    /// Service over `instance` with default config, the sled-backed
    /// directory and log-only notifications.
    pub fn new(instance: Arc<sled::Db>) -> Result<Self, StoreError> {
        let store = Store::open(instance)?;
        let config = Config::default();

        Ok(Self {
            directory: Arc::new(SledDirectory::new(store.clone())),
            notifier: Arc::new(LogNotifier),
            claims: ClaimCoordinator::new(store.clone(), config.cooldown_months()),
            store,
            config,
        })
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.claims = ClaimCoordinator::new(self.store.clone(), config.cooldown_months());
        self.config = config;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_directory(mut self, directory: Arc<dyn Directory>) -> Self {
        self.directory = directory;
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Open a new pending request. District and upazila must name nodes of
    /// the geo hierarchy; the stored request carries their canonical names.
    #[instrument(skip_all, fields(requester = requester_id))]
    pub fn create_request(&self, requester_id: &str, draft: NewRequest) -> Result<Request, CreateError> {
        draft.validate()?;
        if self.store.get_user(requester_id)?.is_none() {
            return Err(CreateError::RequesterNotFound(requester_id.to_string()));
        }
        let draft = self.resolve_location(draft)?;
        let id = new_uuid_to_bech32(REQUEST_HRP)?;

        for _ in 0..CODE_ATTEMPTS {
            let code = new_request_code(
                self.config.request_code_prefix(),
                self.config.request_code_length(),
            );
            let request = Request::open(id.clone(), code, requester_id, draft.clone(), TimeStamp::now())?;
            if self.store.insert_request(&request)? {
                info!(request = %request.id(), code = %request.request_code(), "request opened");
                self.notify(EventKind::Created, &request, requester_id, None);
                return Ok(request);
            }
            debug!(code = %request.request_code(), "request code collision");
        }
        Err(CreateError::CodeExhausted)
    }

    fn resolve_location(&self, draft: NewRequest) -> Result<NewRequest, CreateError> {
        let district_name = draft.district().unwrap_or_default().to_string();
        let upazila_name = draft.upazila().unwrap_or_default().to_string();

        let district = self
            .directory
            .find_node(NodeKind::District, &district_name, None)
            .map_err(|err| unknown_location(err, district_name.clone()))?;
        let upazila = self
            .directory
            .find_node(NodeKind::Upazila, &upazila_name, Some(district.id.as_str()))
            .map_err(|err| unknown_location(err, format!("{upazila_name}, {district_name}")))?;

        Ok(draft.set_location(&district.name, &upazila.name))
    }

    /// Exclusive claim of a pending request by `donor_id`.
    #[instrument(skip_all, fields(donor = donor_id, request = request_id))]
    pub fn claim_request(&self, donor_id: &str, request_id: &str) -> Result<Request, ClaimError> {
        match self.claims.claim(donor_id, request_id, TimeStamp::now()) {
            Ok(claimed) => {
                info!(version = claimed.request.version(), "request claimed");
                self.notify(EventKind::Claimed, &claimed.request, donor_id, None);
                Ok(claimed.request)
            }
            Err(err) => {
                debug!(%err, "claim refused");
                Err(err)
            }
        }
    }

    #[instrument(skip_all, fields(actor = claimant_id, request = request_id))]
    pub fn complete_request(&self, claimant_id: &str, request_id: &str) -> Result<Request, LifecycleError> {
        self.transition(Action::Complete, claimant_id, request_id)
    }

    /// Hand a processing request back to the pool. Allowed for the claimant
    /// and for coordinators covering the request's location.
    #[instrument(skip_all, fields(actor = actor_id, request = request_id))]
    pub fn release_claim(&self, actor_id: &str, request_id: &str) -> Result<Request, LifecycleError> {
        self.transition(Action::Release, actor_id, request_id)
    }

    #[instrument(skip_all, fields(actor = actor_id, request = request_id))]
    pub fn cancel_request(&self, actor_id: &str, request_id: &str) -> Result<Request, LifecycleError> {
        self.transition(Action::Cancel, actor_id, request_id)
    }

    #[instrument(skip_all, fields(actor = coordinator_id, request = request_id))]
    pub fn reject_request(&self, coordinator_id: &str, request_id: &str) -> Result<Request, LifecycleError> {
        self.transition(Action::Reject, coordinator_id, request_id)
    }

    fn transition(&self, action: Action, actor_id: &str, request_id: &str) -> Result<Request, LifecycleError> {
        let request = self
            .store
            .get_request(request_id)?
            .ok_or_else(|| LifecycleError::RequestNotFound(request_id.to_string()))?;
        // location never changes, so coverage can be decided outside the transaction
        let is_coordinator = match action {
            Action::Release | Action::Cancel | Action::Reject => self.is_coordinator_for(actor_id, &request)?,
            _ => false,
        };

        let settled = self
            .claims
            .settle(action, actor_id, request_id, is_coordinator, TimeStamp::now())
            .inspect_err(|err| debug!(%err, %action, "transition refused"))?;

        info!(%action, status = %settled.request.status(), version = settled.request.version(), "request updated");
        self.notify(
            action.into(),
            &settled.request,
            actor_id,
            settled.claimant.as_ref().map(|donor| donor.id()),
        );
        Ok(settled.request)
    }

    fn is_coordinator_for(&self, actor_id: &str, request: &Request) -> Result<bool, LifecycleError> {
        let Some(scope) = known(self.directory.resolve_scope(actor_id), LifecycleError::UserNotFound)? else {
            return Ok(false);
        };
        self.covers(&scope, request, LifecycleError::UserNotFound)
    }

    fn covers<E: From<StoreError>>(
        &self,
        scope: &ResolvedScope,
        request: &Request,
        user_missing: impl FnOnce(String) -> E,
    ) -> Result<bool, E> {
        let request_division = match scope.scope() {
            Scope::Division => known(self.directory.division_of(request.district()), user_missing)?,
            _ => None,
        };
        Ok(scope.covers(request.district(), request.upazila(), request_division.as_deref()))
    }

    /// One page of the requests `viewer_id` may see through `filter.view`.
    #[instrument(skip_all, fields(viewer = viewer_id))]
    pub fn list_visible_requests(&self, viewer_id: &str, filter: &ListFilter) -> Result<Page<Request>, QueryError> {
        let profile = self
            .store
            .get_user(viewer_id)?
            .ok_or_else(|| QueryError::UserNotFound(viewer_id.to_string()))?;
        let mut viewer = Viewer::new(profile);

        if filter.view == View::Feed && viewer.scope() == Scope::Division {
            let division = known(self.directory.resolve_scope(viewer_id), QueryError::UserNotFound)?
                .and_then(|scope| scope.division);
            let districts = match division {
                Some(division) => known(self.directory.districts_in(&division), QueryError::UserNotFound)?
                    .unwrap_or_default(),
                None => {
                    debug!("division unresolved, feed is empty");
                    vec![]
                }
            };
            viewer = viewer.with_division_districts(districts);
        }

        let visible = visible_requests(
            &viewer,
            self.store.requests()?,
            filter.view,
            TimeStamp::now(),
            self.config.cooldown_months(),
        );
        Ok(paginate(visible, filter, &self.config))
    }

    pub fn get_request(&self, request_id: &str) -> Result<Option<Request>, StoreError> {
        self.store.get_request(request_id)
    }

    pub fn find_by_code(&self, code: &str) -> Result<Option<Request>, StoreError> {
        self.store.find_by_code(code)
    }

    /// Processing requests in the coordinator's scope that nobody touched for
    /// longer than the configured grace period, oldest first. Nothing is
    /// reverted; this only reports.
    #[instrument(skip_all, fields(coordinator = coordinator_id))]
    pub fn stale_claims(&self, coordinator_id: &str) -> Result<Vec<Request>, QueryError> {
        let Some(scope) = known(self.directory.resolve_scope(coordinator_id), QueryError::UserNotFound)? else {
            return Ok(vec![]);
        };
        let Some(cutoff) = TimeStamp::now().minus(Duration::days(self.config.stale_claim_days().into())) else {
            return Ok(vec![]);
        };

        let mut stale = Vec::new();
        for request in self.store.requests()? {
            if request.status() == RequestStatus::Processing
                && request.updated_at() <= cutoff
                && self.covers(&scope, &request, QueryError::UserNotFound)?
            {
                stale.push(request);
            }
        }
        stale.sort_by_key(|request| request.updated_at());
        Ok(stale)
    }

    fn notify(&self, kind: EventKind, request: &Request, actor_id: &str, settled_donor: Option<&str>) {
        let event = Notification::new(kind, request, actor_id);
        let recipients = self.recipients(request, settled_donor);
        if let Err(err) = self.notifier.emit(&event, &recipients) {
            warn!(%err, request = %request.id(), ?kind, "notification failed");
        }
    }

    // requester, claimant, then coordinators of the district, the upazila and
    // the moderator teams under it
    fn recipients(&self, request: &Request, settled_donor: Option<&str>) -> Vec<String> {
        let mut recipients = vec![request.requester_id().to_string()];
        recipients.extend(request.claimant_id().map(str::to_string));
        recipients.extend(settled_donor.map(str::to_string));
        match self.location_coordinators(request) {
            Ok(coordinators) => recipients.extend(coordinators),
            Err(err) => warn!(%err, request = %request.id(), "could not resolve coordinators"),
        }

        let mut seen = HashSet::new();
        recipients.retain(|id| seen.insert(id.clone()));
        recipients
    }

    fn location_coordinators(&self, request: &Request) -> Result<Vec<String>, DirectoryError> {
        let district = self
            .directory
            .find_node(NodeKind::District, request.district(), None)?;
        let upazila = self
            .directory
            .find_node(NodeKind::Upazila, request.upazila(), Some(district.id.as_str()))?;

        let mut nodes = vec![district, upazila.clone()];
        for team_id in &upazila.child_team_ids {
            match self.directory.node(team_id) {
                Ok(team) if team.kind == NodeKind::ModeratorTeam => nodes.push(team),
                Ok(_) | Err(DirectoryError::GeoNodeNotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(nodes
            .into_iter()
            .flat_map(|node| node.coordinators)
            .map(|slot| slot.user_id)
            .collect())
    }
}
