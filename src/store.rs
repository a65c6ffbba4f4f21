//! sled-backed persistence for requests, users and the geo hierarchy.
//!
//! Every record is CBOR encoded. Writes that touch a request and a user go
//! through [`Store::transact`], a sled transaction spanning both trees; sled
//! retries the closure on conflict, so it must stay free of side effects.
use super::error::StoreError;
use super::geo::GeoNode;
use super::request::Request;
use super::user::User;
use sled::Transactional;
use sled::transaction::{
    ConflictableTransactionResult, TransactionError, TransactionalTree, abort,
};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

const REQUESTS: &str = "requests";
const USERS: &str = "users";
const REQUEST_CODES: &str = "request_codes";
const GEO_NODES: &str = "geo_nodes";

pub(crate) fn encode<T: minicbor::Encode<()>>(value: &T) -> Result<Vec<u8>, StoreError> {
    minicbor::to_vec(value).map_err(|e| StoreError::Encode(e.to_string()))
}

pub(crate) fn decode<T: for<'b> minicbor::Decode<'b, ()>>(bytes: &[u8]) -> Result<T, StoreError> {
    Ok(minicbor::decode(bytes)?)
}

// decode inside a transaction, aborting it on corrupt records
pub(crate) fn decode_in_tx<T, E>(bytes: &[u8]) -> ConflictableTransactionResult<T, E>
where
    T: for<'b> minicbor::Decode<'b, ()>,
    E: From<StoreError>,
{
    decode(bytes).or_else(|err| abort(E::from(err)))
}

pub(crate) fn encode_in_tx<T, E>(value: &T) -> ConflictableTransactionResult<Vec<u8>, E>
where
    T: minicbor::Encode<()>,
    E: From<StoreError>,
{
    encode(value).or_else(|err| abort(E::from(err)))
}

pub(crate) fn unwrap_tx_error<E: From<StoreError>>(err: TransactionError<E>) -> E {
    match err {
        TransactionError::Abort(err) => err,
        TransactionError::Storage(err) => E::from(StoreError::from(err)),
    }
}

#[derive(Clone)]
pub struct Store {
    requests: sled::Tree,
    users: sled::Tree,
    codes: sled::Tree,
    nodes: sled::Tree,
}

/// Typed view over the request and user trees inside one transaction.
/// `E` is the abort error of the surrounding operation.
pub struct UnitOfWork<'a, E> {
    requests: &'a TransactionalTree,
    users: &'a TransactionalTree,
    _abort: PhantomData<fn() -> E>,
}

impl<E: From<StoreError>> UnitOfWork<'_, E> {
    pub fn request(&self, id: &str) -> ConflictableTransactionResult<Option<Request>, E> {
        match self.requests.get(id.as_bytes())? {
            Some(bytes) => decode_in_tx(&bytes).map(Some),
            None => Ok(None),
        }
    }
    pub fn put_request(&self, request: &Request) -> ConflictableTransactionResult<(), E> {
        let bytes = encode_in_tx(request)?;
        self.requests.insert(request.id.as_bytes(), bytes)?;
        Ok(())
    }
    pub fn user(&self, id: &str) -> ConflictableTransactionResult<Option<User>, E> {
        match self.users.get(id.as_bytes())? {
            Some(bytes) => decode_in_tx(&bytes).map(Some),
            None => Ok(None),
        }
    }
    pub fn put_user(&self, user: &User) -> ConflictableTransactionResult<(), E> {
        let bytes = encode_in_tx(user)?;
        self.users.insert(user.id.as_bytes(), bytes)?;
        Ok(())
    }
}

impl Store {
    pub fn open(instance: Arc<sled::Db>) -> Result<Self, StoreError> {
        let requests = instance.open_tree(REQUESTS)?;
        let users = instance.open_tree(USERS)?;
        let codes = instance.open_tree(REQUEST_CODES)?;
        let nodes = instance.open_tree(GEO_NODES)?;

        Ok(Self {
            requests,
            users,
            codes,
            nodes,
        })
    }

    /// Runs `f` atomically against the request and user trees.
    pub fn transact<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: Fn(&UnitOfWork<'_, E>) -> ConflictableTransactionResult<T, E>,
        E: From<StoreError>,
    {
        (&self.requests, &self.users)
            .transaction(|(requests, users)| {
                f(&UnitOfWork {
                    requests,
                    users,
                    _abort: PhantomData,
                })
            })
            .map_err(unwrap_tx_error)
    }

    /// Inserts a freshly opened request together with its code index entry.
    /// Returns `false` without writing anything when the code is taken.
    pub fn insert_request(&self, request: &Request) -> Result<bool, StoreError> {
        let encoded = encode(request)?;
        let code = request.request_code.as_bytes();
        let id = request.id.as_bytes();

        (&self.requests, &self.codes)
            .transaction(
                |(requests, codes)| -> ConflictableTransactionResult<bool, StoreError> {
                    if codes.get(code)?.is_some() {
                        return Ok(false);
                    }
                    codes.insert(code, id)?;
                    requests.insert(id, encoded.as_slice())?;
                    Ok(true)
                },
            )
            .map_err(unwrap_tx_error)
    }

    pub fn get_request(&self, id: &str) -> Result<Option<Request>, StoreError> {
        self.requests
            .get(id.as_bytes())?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    pub fn find_by_code(&self, code: &str) -> Result<Option<Request>, StoreError> {
        let code = code.trim().to_ascii_uppercase();
        match self.codes.get(code.as_bytes())? {
            Some(id) => self.get_request(&String::from_utf8_lossy(&id)),
            None => Ok(None),
        }
    }

    /// Every stored request, in key order.
    pub fn requests(&self) -> Result<Vec<Request>, StoreError> {
        let requests = self
            .requests
            .iter()
            .values()
            .map(|bytes| decode(&bytes?))
            .collect::<Result<Vec<Request>, StoreError>>()?;
        debug!(count = requests.len(), "loaded request pool");
        Ok(requests)
    }

    pub fn get_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        self.users
            .get(id.as_bytes())?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    pub fn put_user(&self, user: &User) -> Result<(), StoreError> {
        self.users.insert(user.id.as_bytes(), encode(user)?)?;
        Ok(())
    }

    pub fn users(&self) -> Result<Vec<User>, StoreError> {
        self.users
            .iter()
            .values()
            .map(|bytes| decode(&bytes?))
            .collect()
    }

    pub fn get_node(&self, id: &str) -> Result<Option<GeoNode>, StoreError> {
        self.nodes
            .get(id.as_bytes())?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    pub fn nodes(&self) -> Result<Vec<GeoNode>, StoreError> {
        self.nodes
            .iter()
            .values()
            .map(|bytes| decode(&bytes?))
            .collect()
    }

    pub(crate) fn node_tree(&self) -> &sled::Tree {
        &self.nodes
    }
}
