// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Session state and backend selection.
//!
//! A redirected flow is one bidirectional session recorded under two
//! index views: the forward (DNAT) table keyed by the tuple as the
//! client sent it, and the reverse (SNAT) table keyed by the tuple as
//! the backend's replies arrive. The reverse entry is always the
//! exact algebraic inverse of the forward one:
//!
//! ```text
//! dnat[client -> frontend]        = natAddr -> backend
//! snat[backend -> natAddr]        = frontend -> client
//! ```
//!
//! The store offers no cross-table transaction, so the pair becomes
//! visible one entry at a time. Invocations racing on the same first
//! packet write identical entries (selection is deterministic), which
//! makes the window harmless; it is documented here rather than
//! papered over with a lock the execution model does not have.

use crate::store::StoreError;
use crate::store::TableSpec;
use crate::store::TableStore;
use crate::store::TypedTable;
use crate::store::UpdateMode;
use natlb_api::BACKEND_TABLE_MAX_ENTRIES;
use natlb_api::BACKEND_TABLE_NAME;
use natlb_api::BACKEND_TABLE_PATH;
use natlb_api::Backend;
use natlb_api::BackendEntry;
use natlb_api::DNAT_TABLE_NAME;
use natlb_api::DNAT_TABLE_PATH;
use natlb_api::DumpBackendsResp;
use natlb_api::DumpSessionsResp;
use natlb_api::FLOW_TABLE_MAX_ENTRIES;
use natlb_api::FlowKey;
use natlb_api::SNAT_TABLE_NAME;
use natlb_api::SNAT_TABLE_PATH;
use natlb_api::SessionEntry;

/// The paired forward/reverse flow tables.
pub struct SessionMap<S: TableStore> {
    dnat: TypedTable<S, FlowKey, FlowKey>,
    snat: TypedTable<S, FlowKey, FlowKey>,
}

impl<S: TableStore + Clone> SessionMap<S> {
    /// Open the session tables in `store`, creating and publishing
    /// them if no one has yet.
    pub fn attach(store: &S) -> Result<Self, StoreError> {
        let dnat = TypedTable::open_or_create(
            store,
            TableSpec::of::<FlowKey, FlowKey>(
                DNAT_TABLE_NAME,
                FLOW_TABLE_MAX_ENTRIES,
            ),
            DNAT_TABLE_PATH,
        )?;
        let snat = TypedTable::open_or_create(
            store,
            TableSpec::of::<FlowKey, FlowKey>(
                SNAT_TABLE_NAME,
                FLOW_TABLE_MAX_ENTRIES,
            ),
            SNAT_TABLE_PATH,
        )?;

        Ok(Self { dnat, snat })
    }

    /// Look up the rewrite recorded for a client-to-frontend tuple.
    pub fn lookup_forward(
        &self,
        flow: &FlowKey,
    ) -> Result<Option<FlowKey>, StoreError> {
        self.dnat.lookup(flow)
    }

    /// Look up the restore recorded for a backend-to-NAT tuple.
    pub fn lookup_reverse(
        &self,
        flow: &FlowKey,
    ) -> Result<Option<FlowKey>, StoreError> {
        self.snat.lookup(flow)
    }

    /// Record a session: `orig` as observed from the client, and the
    /// tuple it is rewritten to.
    ///
    /// Both entries are created together and the reverse entry is
    /// derived, never passed in, so the inverse relationship can't
    /// drift. Calling this twice for the same flow is a benign
    /// overwrite.
    pub fn insert_pair(
        &self,
        orig: FlowKey,
        rewritten: FlowKey,
    ) -> Result<(), StoreError> {
        self.dnat.update(&orig, &rewritten, UpdateMode::CreateOrUpdate)?;
        // A reader can observe the forward entry before this lands;
        // see the module comment.
        self.snat.update(
            &rewritten.mirror(),
            &orig.mirror(),
            UpdateMode::CreateOrUpdate,
        )
    }

    /// Remove a session by its forward tuple, both entries.
    pub fn delete_pair(&self, orig: &FlowKey) -> Result<(), StoreError> {
        let Some(rewritten) = self.dnat.lookup(orig)? else {
            return Err(StoreError::NotFound);
        };

        self.dnat.delete(orig)?;
        self.snat.delete(&rewritten.mirror())
    }

    /// Walk the forward table.
    pub fn dump(&self) -> Result<DumpSessionsResp, StoreError> {
        let entries = self
            .dnat
            .dump()?
            .into_iter()
            .map(|(orig, rewritten)| SessionEntry { orig, rewritten })
            .collect();
        Ok(DumpSessionsResp { entries })
    }
}

/// The configured backends, keyed by registry slot.
///
/// Populated by the control plane through the published table; the
/// packet path only ever reads it.
pub struct BackendRegistry<S: TableStore> {
    slots: TypedTable<S, u32, Backend>,
}

impl<S: TableStore + Clone> BackendRegistry<S> {
    pub fn attach(store: &S) -> Result<Self, StoreError> {
        let slots = TypedTable::open_or_create(
            store,
            TableSpec::of::<u32, Backend>(
                BACKEND_TABLE_NAME,
                BACKEND_TABLE_MAX_ENTRIES,
            ),
            BACKEND_TABLE_PATH,
        )?;

        Ok(Self { slots })
    }

    /// Pick a backend for a new flow.
    ///
    /// Policy today is the configured slot, full stop. `hint` is a
    /// stable hash of the flow so a spread policy can slot in behind
    /// this signature; no such policy exists yet and the hint is
    /// ignored.
    pub fn select(
        &self,
        slot: u32,
        hint: u32,
    ) -> Result<Option<Backend>, StoreError> {
        let _ = hint;
        self.slots.lookup(&slot)
    }

    /// Set a registry slot. Control-plane side; the packet path never
    /// writes.
    pub fn set(&self, slot: u32, backend: Backend) -> Result<(), StoreError> {
        self.slots.update(&slot, &backend, UpdateMode::CreateOrUpdate)
    }

    /// Clear a registry slot.
    pub fn clear(&self, slot: u32) -> Result<(), StoreError> {
        self.slots.delete(&slot)
    }

    /// Walk the registry.
    pub fn dump(&self) -> Result<DumpBackendsResp, StoreError> {
        let backends = self
            .slots
            .dump()?
            .into_iter()
            .map(|(slot, backend)| BackendEntry { slot, backend })
            .collect();
        Ok(DumpBackendsResp { backends })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::MemStore;
    use natlb_api::DEFAULT_BACKEND_SLOT;
    use natlb_api::Endpoint;

    fn client_to_frontend() -> FlowKey {
        FlowKey::new(
            Endpoint::new("10.0.0.5".parse().unwrap(), 51000),
            Endpoint::new("203.0.113.9".parse().unwrap(), 8000),
        )
    }

    fn nat_to_backend() -> FlowKey {
        FlowKey::new(
            Endpoint::new("172.17.0.1".parse().unwrap(), 51000),
            Endpoint::new("198.51.100.7".parse().unwrap(), 9000),
        )
    }

    #[test]
    fn pair_is_exact_inverse() {
        let store = MemStore::new();
        let sessions = SessionMap::attach(&store).unwrap();
        let orig = client_to_frontend();
        let rewritten = nat_to_backend();

        sessions.insert_pair(orig, rewritten).unwrap();

        assert_eq!(sessions.lookup_forward(&orig).unwrap(), Some(rewritten));

        // The reverse key is the mirror of the forward value, mapped
        // to the mirror of the forward key.
        let reply = rewritten.mirror();
        assert_eq!(sessions.lookup_reverse(&reply).unwrap(), Some(orig.mirror()));

        // No implicit reversal: the reply tuple is not a forward key.
        assert_eq!(sessions.lookup_forward(&reply).unwrap(), None);
    }

    #[test]
    fn insert_pair_is_idempotent() {
        let store = MemStore::new();
        let sessions = SessionMap::attach(&store).unwrap();
        let orig = client_to_frontend();
        let rewritten = nat_to_backend();

        sessions.insert_pair(orig, rewritten).unwrap();
        sessions.insert_pair(orig, rewritten).unwrap();

        assert_eq!(sessions.dump().unwrap().entries.len(), 1);
    }

    #[test]
    fn delete_removes_both_views() {
        let store = MemStore::new();
        let sessions = SessionMap::attach(&store).unwrap();
        let orig = client_to_frontend();
        let rewritten = nat_to_backend();

        sessions.insert_pair(orig, rewritten).unwrap();
        sessions.delete_pair(&orig).unwrap();

        assert_eq!(sessions.lookup_forward(&orig).unwrap(), None);
        assert_eq!(
            sessions.lookup_reverse(&rewritten.mirror()).unwrap(),
            None
        );
        assert_eq!(
            sessions.delete_pair(&orig).unwrap_err(),
            StoreError::NotFound
        );
    }

    #[test]
    fn two_attachments_share_state() {
        let store = MemStore::new();
        let first = SessionMap::attach(&store).unwrap();
        let second = SessionMap::attach(&store).unwrap();

        first.insert_pair(client_to_frontend(), nat_to_backend()).unwrap();
        assert_eq!(
            second.lookup_forward(&client_to_frontend()).unwrap(),
            Some(nat_to_backend()),
        );
    }

    #[test]
    fn registry_fixed_slot() {
        let store = MemStore::new();
        let registry = BackendRegistry::attach(&store).unwrap();
        let backend = Backend::new("198.51.100.7".parse().unwrap(), 9000);

        assert_eq!(
            registry.select(DEFAULT_BACKEND_SLOT, 0xDEAD).unwrap(),
            None
        );

        registry.set(DEFAULT_BACKEND_SLOT, backend).unwrap();

        // Selection ignores the hint: same slot, same answer.
        assert_eq!(
            registry.select(DEFAULT_BACKEND_SLOT, 0xDEAD).unwrap(),
            Some(backend)
        );
        assert_eq!(
            registry.select(DEFAULT_BACKEND_SLOT, 0xBEEF).unwrap(),
            Some(backend)
        );

        registry.clear(DEFAULT_BACKEND_SLOT).unwrap();
        assert_eq!(registry.select(DEFAULT_BACKEND_SLOT, 0).unwrap(), None);
    }
}
