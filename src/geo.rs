//! Geo hierarchy: Division → District → Upazila, with moderator teams under
//! upazilas. Parent links are weak references; removing a node leaves its
//! children orphaned until they are reassigned.
use super::error::{DirectoryError, StoreError};
use super::role::{Role, Scope};
use super::store::{Store, decode_in_tx, encode_in_tx, unwrap_tx_error};
use super::user::User;
use sled::transaction::{ConflictableTransactionResult, TransactionalTree, abort};

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    #[n(0)]
    Division,
    #[n(1)]
    District,
    #[n(2)]
    Upazila,
    #[n(3)]
    ModeratorTeam,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorSlot {
    #[n(0)]
    pub role: Role,
    #[n(1)]
    pub user_id: String,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct GeoNode {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub kind: NodeKind,
    #[n(3)]
    pub parent: Option<String>, // weak, may point at a removed node
    #[n(4)]
    pub coordinators: Vec<CoordinatorSlot>,
    #[n(5)]
    pub child_team_ids: Vec<String>,
}

impl GeoNode {
    pub fn new(id: &str, name: &str, kind: NodeKind) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind,
            parent: None,
            coordinators: vec![],
            child_team_ids: vec![],
        }
    }
    pub fn under(mut self, parent_id: &str) -> Self {
        self.parent = Some(parent_id.to_string());
        self
    }
    pub fn with_coordinator(mut self, role: Role, user_id: &str) -> Self {
        self.coordinators.push(CoordinatorSlot {
            role,
            user_id: user_id.to_string(),
        });
        self
    }
}

/// Where a user sits in the hierarchy and what their role lets them reach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedScope {
    pub user_id: String,
    pub role: Role,
    /// `None` when the home district no longer hangs under a division.
    pub division: Option<String>,
    pub district: String,
    pub upazila: String,
}

impl ResolvedScope {
    pub fn scope(&self) -> Scope {
        self.role.scope()
    }

    /// Whether this user's coordinator scope covers a request located at
    /// `district`/`upazila`. `request_division` is only consulted for
    /// division-scoped roles.
    pub fn covers(&self, district: &str, upazila: &str, request_division: Option<&str>) -> bool {
        match self.scope() {
            Scope::Own => false,
            Scope::Team => {
                self.district.eq_ignore_ascii_case(district)
                    && self.upazila.eq_ignore_ascii_case(upazila)
            }
            Scope::District => self.district.eq_ignore_ascii_case(district),
            Scope::Division => match (self.division.as_deref(), request_division) {
                (Some(mine), Some(theirs)) => mine.eq_ignore_ascii_case(theirs),
                _ => false,
            },
            Scope::Global => true,
        }
    }
}

/// Read side of the identity/org directory.
pub trait Directory: Send + Sync {
    fn resolve_scope(&self, user_id: &str) -> Result<ResolvedScope, DirectoryError>;

    fn node(&self, node_id: &str) -> Result<GeoNode, DirectoryError>;

    /// Name lookup is case-insensitive. With `parent` set, only children of
    /// that node match.
    fn find_node(
        &self,
        kind: NodeKind,
        name: &str,
        parent: Option<&str>,
    ) -> Result<GeoNode, DirectoryError>;

    fn children_of(&self, node_id: &str) -> Result<Vec<String>, DirectoryError> {
        Ok(self.node(node_id)?.child_team_ids)
    }

    fn coordinators_of(&self, node_id: &str, role: Role) -> Result<Vec<String>, DirectoryError> {
        Ok(self
            .node(node_id)?
            .coordinators
            .into_iter()
            .filter(|slot| slot.role == role)
            .map(|slot| slot.user_id)
            .collect())
    }

    fn division_of(&self, district: &str) -> Result<String, DirectoryError> {
        let district = self.find_node(NodeKind::District, district, None)?;
        let parent = district
            .parent
            .ok_or(DirectoryError::GeoNodeNotFound(format!("parent of {}", district.id)))?;
        Ok(self.node(&parent)?.name)
    }

    /// District names under a division; stale child references are skipped.
    fn districts_in(&self, division: &str) -> Result<Vec<String>, DirectoryError> {
        let division = self.find_node(NodeKind::Division, division, None)?;
        let mut districts = Vec::new();
        for child in self.children_of(&division.id)? {
            match self.node(&child) {
                Ok(node) if node.kind == NodeKind::District => districts.push(node.name),
                Ok(_) | Err(DirectoryError::GeoNodeNotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(districts)
    }
}

/// Directory stored alongside requests in the same sled database.
#[derive(Clone)]
pub struct SledDirectory {
    store: Store,
}

fn unlink(
    tx: &TransactionalTree,
    parent_id: &str,
    child_id: &str,
) -> ConflictableTransactionResult<(), DirectoryError> {
    if let Some(bytes) = tx.get(parent_id.as_bytes())? {
        let mut parent: GeoNode = decode_in_tx(&bytes)?;
        parent.child_team_ids.retain(|id| id != child_id);
        tx.insert(parent_id.as_bytes(), encode_in_tx::<_, DirectoryError>(&parent)?)?;
    }
    Ok(())
}

// false when the parent does not exist
fn link(
    tx: &TransactionalTree,
    parent_id: &str,
    child_id: &str,
) -> ConflictableTransactionResult<bool, DirectoryError> {
    let Some(bytes) = tx.get(parent_id.as_bytes())? else {
        return Ok(false);
    };
    let mut parent: GeoNode = decode_in_tx(&bytes)?;
    if !parent.child_team_ids.iter().any(|id| id == child_id) {
        parent.child_team_ids.push(child_id.to_string());
        tx.insert(parent_id.as_bytes(), encode_in_tx::<_, DirectoryError>(&parent)?)?;
    }
    Ok(true)
}

impl SledDirectory {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn register_user(&self, user: &User) -> Result<(), StoreError> {
        self.store.put_user(user)
    }

    /// Inserts or replaces a node and links it under its parent. The stored
    /// child list of an existing node is kept; children attach themselves
    /// through their own parent link.
    pub fn upsert_node(&self, node: &GeoNode) -> Result<(), DirectoryError> {
        self.store
            .node_tree()
            .transaction(|tx| -> ConflictableTransactionResult<(), DirectoryError> {
                let mut node = node.clone();
                if let Some(bytes) = tx.get(node.id.as_bytes())? {
                    let existing: GeoNode = decode_in_tx(&bytes)?;
                    node.child_team_ids = existing.child_team_ids;
                    if let Some(old_parent) = existing.parent.filter(|p| Some(p) != node.parent.as_ref()) {
                        unlink(tx, &old_parent, &node.id)?;
                    }
                }
                if let Some(parent) = &node.parent {
                    link(tx, parent, &node.id)?;
                }
                tx.insert(node.id.as_bytes(), encode_in_tx::<_, DirectoryError>(&node)?)?;
                Ok(())
            })
            .map_err(unwrap_tx_error)
    }

    /// Removes a node without touching its children, which become orphans.
    pub fn remove_node(&self, node_id: &str) -> Result<GeoNode, DirectoryError> {
        self.store
            .node_tree()
            .transaction(|tx| -> ConflictableTransactionResult<GeoNode, DirectoryError> {
                let Some(bytes) = tx.remove(node_id.as_bytes())? else {
                    return abort(DirectoryError::GeoNodeNotFound(node_id.to_string()));
                };
                let node: GeoNode = decode_in_tx(&bytes)?;
                if let Some(parent) = &node.parent {
                    unlink(tx, parent, node_id)?;
                }
                Ok(node)
            })
            .map_err(unwrap_tx_error)
    }

    /// Moves a node under `new_parent_id`, detaching it from its old parent.
    pub fn reassign(&self, node_id: &str, new_parent_id: &str) -> Result<GeoNode, DirectoryError> {
        self.store
            .node_tree()
            .transaction(|tx| -> ConflictableTransactionResult<GeoNode, DirectoryError> {
                let Some(bytes) = tx.get(node_id.as_bytes())? else {
                    return abort(DirectoryError::GeoNodeNotFound(node_id.to_string()));
                };
                let mut node: GeoNode = decode_in_tx(&bytes)?;
                if !link(tx, new_parent_id, node_id)? {
                    return abort(DirectoryError::GeoNodeNotFound(new_parent_id.to_string()));
                }
                if let Some(old_parent) = node.parent.as_deref().filter(|p| *p != new_parent_id) {
                    unlink(tx, old_parent, node_id)?;
                }
                node.parent = Some(new_parent_id.to_string());
                tx.insert(node_id.as_bytes(), encode_in_tx::<_, DirectoryError>(&node)?)?;
                Ok(node)
            })
            .map_err(unwrap_tx_error)
    }

    /// Non-division nodes whose parent is missing.
    pub fn orphans(&self) -> Result<Vec<GeoNode>, StoreError> {
        let nodes = self.store.nodes()?;
        Ok(nodes
            .iter()
            .filter(|node| node.kind != NodeKind::Division)
            .filter(|node| match &node.parent {
                Some(parent) => !nodes.iter().any(|other| &other.id == parent),
                None => true,
            })
            .cloned()
            .collect())
    }
}

impl Directory for SledDirectory {
    fn resolve_scope(&self, user_id: &str) -> Result<ResolvedScope, DirectoryError> {
        let user = self
            .store
            .get_user(user_id)?
            .ok_or_else(|| DirectoryError::UserNotFound(user_id.to_string()))?;
        // a home district or upazila missing from the hierarchy leaves the
        // scope unknown
        let district = self.find_node(NodeKind::District, user.district(), None)?;
        let upazila = self.find_node(NodeKind::Upazila, user.upazila(), Some(district.id.as_str()))?;
        let division = match district.parent.as_deref().map(|parent| self.node(parent)) {
            Some(Ok(node)) => Some(node.name),
            None | Some(Err(DirectoryError::GeoNodeNotFound(_))) => None,
            Some(Err(err)) => return Err(err),
        };

        Ok(ResolvedScope {
            user_id: user.id,
            role: user.role,
            division,
            district: district.name,
            upazila: upazila.name,
        })
    }

    fn node(&self, node_id: &str) -> Result<GeoNode, DirectoryError> {
        self.store
            .get_node(node_id)?
            .ok_or_else(|| DirectoryError::GeoNodeNotFound(node_id.to_string()))
    }

    fn find_node(
        &self,
        kind: NodeKind,
        name: &str,
        parent: Option<&str>,
    ) -> Result<GeoNode, DirectoryError> {
        let name = name.trim();
        self.store
            .nodes()?
            .into_iter()
            .find(|node| {
                node.kind == kind
                    && node.name.eq_ignore_ascii_case(name)
                    && parent.is_none_or(|p| node.parent.as_deref() == Some(p))
            })
            .ok_or_else(|| DirectoryError::GeoNodeNotFound(format!("{kind:?} {name}")))
    }
}
