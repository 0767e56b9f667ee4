// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! The keyed table store the engine runs against.
//!
//! Flow state and the backend registry live in tables owned by a
//! store that outlives any single invocation of the engine and is
//! shared with control-plane processes through a path namespace. The
//! engine consumes the store through [`TableStore`]; handles are
//! opaque and every operation is a single, per-key atomic call. There
//! are no transactions, and in particular nothing spanning two
//! tables.
//!
//! [`MemStore`](mem::MemStore) provides the in-process
//! implementation; the engine itself never assumes anything beyond
//! this trait.

pub mod mem;

pub use mem::MemStore;

use core::marker::PhantomData;
use core::mem::size_of;
use thiserror::Error;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;

/// Longest allowed table name, in bytes.
pub const TABLE_NAME_MAX: usize = 16;

/// An opaque reference to a table within a store.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct TableHandle(pub(crate) u32);

/// The shape of a table: fixed-size keys and values, bounded entry
/// count.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TableSpec {
    pub name: String,
    pub key_size: u32,
    pub value_size: u32,
    pub max_entries: u32,
}

impl TableSpec {
    pub fn new(
        name: &str,
        key_size: u32,
        value_size: u32,
        max_entries: u32,
    ) -> Self {
        Self { name: name.to_string(), key_size, value_size, max_entries }
    }

    /// A spec sized for the `repr(C)` forms of `K` and `V`.
    pub fn of<K: Sized, V: Sized>(name: &str, max_entries: u32) -> Self {
        Self::new(
            name,
            size_of::<K>() as u32,
            size_of::<V>() as u32,
            max_entries,
        )
    }
}

#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum StoreError {
    #[error("table name too long: {0}")]
    NameTooLong(String),

    #[error("invalid argument: {0}")]
    Invalid(String),

    #[error("permission denied")]
    PermissionDenied,

    #[error("out of memory")]
    OutOfMemory,

    #[error("table full: limit of {0} entries")]
    TooLarge(u32),

    #[error("no entry for key")]
    NotFound,

    #[error("nothing published at {0}")]
    PathNotFound(String),

    #[error("path already taken: {0}")]
    PathBusy(String),
}

/// How an update treats an existing entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UpdateMode {
    /// Create the entry or overwrite it; last writer wins.
    CreateOrUpdate,

    /// Create the entry only if the key is absent.
    CreateOnly,

    /// Overwrite only; fail if the key is absent.
    UpdateOnly,
}

/// A persistent keyed table store.
///
/// Keys and values are opaque byte strings of the sizes fixed at
/// table creation. A lookup miss is `Ok(None)`, kept distinct from
/// store failures.
pub trait TableStore {
    fn create(&self, spec: &TableSpec) -> Result<TableHandle, StoreError>;

    fn lookup(
        &self,
        handle: TableHandle,
        key: &[u8],
    ) -> Result<Option<Vec<u8>>, StoreError>;

    fn update(
        &self,
        handle: TableHandle,
        key: &[u8],
        value: &[u8],
        mode: UpdateMode,
    ) -> Result<(), StoreError>;

    fn delete(&self, handle: TableHandle, key: &[u8])
    -> Result<(), StoreError>;

    /// Return the key following `key`, or the first key when `key`
    /// is `None`. Repeated calls enumerate the whole table; `None`
    /// marks the end.
    fn next_key(
        &self,
        handle: TableHandle,
        key: Option<&[u8]>,
    ) -> Result<Option<Vec<u8>>, StoreError>;

    /// Obtain a handle to a table another process published.
    fn open_by_path(&self, path: &str) -> Result<TableHandle, StoreError>;

    /// Make a table reachable by path for other processes.
    fn publish_by_path(
        &self,
        handle: TableHandle,
        path: &str,
    ) -> Result<(), StoreError>;
}

/// A typed CRUD wrapper over one table.
///
/// `K` and `V` pass through as their `repr(C)` bytes; nothing clever
/// happens here, the point is to keep raw byte strings out of the
/// engine.
pub struct TypedTable<S: TableStore, K, V> {
    store: S,
    handle: TableHandle,
    _marker: PhantomData<(K, V)>,
}

impl<S, K, V> TypedTable<S, K, V>
where
    S: TableStore + Clone,
    K: IntoBytes + FromBytes + Immutable + Copy,
    V: IntoBytes + FromBytes + Immutable + Sized,
{
    /// Open the table published at `path`, or create it from `spec`
    /// and publish it there for whoever comes next.
    pub fn open_or_create(
        store: &S,
        spec: TableSpec,
        path: &str,
    ) -> Result<Self, StoreError> {
        let handle = match store.open_by_path(path) {
            Ok(handle) => handle,
            Err(StoreError::PathNotFound(_)) => {
                let handle = store.create(&spec)?;
                store.publish_by_path(handle, path)?;
                handle
            }
            Err(e) => return Err(e),
        };

        Ok(Self { store: store.clone(), handle, _marker: PhantomData })
    }

    pub fn handle(&self) -> TableHandle {
        self.handle
    }

    pub fn lookup(&self, key: &K) -> Result<Option<V>, StoreError> {
        match self.store.lookup(self.handle, key.as_bytes())? {
            Some(bytes) => V::read_from_bytes(&bytes)
                .map(Some)
                .map_err(|_| StoreError::Invalid("value size".to_string())),
            None => Ok(None),
        }
    }

    pub fn update(
        &self,
        key: &K,
        value: &V,
        mode: UpdateMode,
    ) -> Result<(), StoreError> {
        self.store.update(self.handle, key.as_bytes(), value.as_bytes(), mode)
    }

    pub fn delete(&self, key: &K) -> Result<(), StoreError> {
        self.store.delete(self.handle, key.as_bytes())
    }

    pub fn next_key(&self, key: Option<&K>) -> Result<Option<K>, StoreError> {
        let bytes = match key {
            Some(k) => self.store.next_key(self.handle, Some(k.as_bytes()))?,
            None => self.store.next_key(self.handle, None)?,
        };

        match bytes {
            Some(b) => K::read_from_bytes(&b)
                .map(Some)
                .map_err(|_| StoreError::Invalid("key size".to_string())),
            None => Ok(None),
        }
    }

    /// Enumerate the whole table.
    ///
    /// Entries deleted between the key walk and the lookup are simply
    /// skipped; a dump is a point-in-time-ish view, not a snapshot.
    pub fn dump(&self) -> Result<Vec<(K, V)>, StoreError> {
        let mut entries = Vec::new();
        let mut cursor: Option<K> = None;

        while let Some(key) = self.next_key(cursor.as_ref())? {
            if let Some(value) = self.lookup(&key)? {
                entries.push((key, value));
            }
            cursor = Some(key);
        }

        Ok(entries)
    }
}
