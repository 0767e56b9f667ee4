// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! An in-process table store.
//!
//! One mutex per table: a single call is atomic for its key, and two
//! calls against two tables can interleave, which is exactly the
//! guarantee (and the only guarantee) the engine is written against.

use super::StoreError;
use super::TABLE_NAME_MAX;
use super::TableHandle;
use super::TableSpec;
use super::TableStore;
use super::UpdateMode;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use std::sync::Mutex;

struct Table {
    spec: TableSpec,
    entries: Mutex<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl Table {
    fn check_key(&self, key: &[u8]) -> Result<(), StoreError> {
        if key.len() != self.spec.key_size as usize {
            return Err(StoreError::Invalid(format!(
                "key size {} != {}",
                key.len(),
                self.spec.key_size,
            )));
        }

        Ok(())
    }

    fn check_value(&self, value: &[u8]) -> Result<(), StoreError> {
        if value.len() != self.spec.value_size as usize {
            return Err(StoreError::Invalid(format!(
                "value size {} != {}",
                value.len(),
                self.spec.value_size,
            )));
        }

        Ok(())
    }
}

#[derive(Default)]
struct Inner {
    tables: Mutex<Vec<Arc<Table>>>,
    paths: Mutex<BTreeMap<String, TableHandle>>,
}

/// The in-process [`TableStore`].
///
/// Clones share the same tables and namespace, playing the role of
/// independent openers of one shared store.
#[derive(Clone, Default)]
pub struct MemStore {
    inner: Arc<Inner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, handle: TableHandle) -> Result<Arc<Table>, StoreError> {
        let tables = self.inner.tables.lock().unwrap();
        tables
            .get(handle.0 as usize)
            .cloned()
            .ok_or_else(|| StoreError::Invalid(format!("bad handle {:?}", handle)))
    }
}

impl TableStore for MemStore {
    fn create(&self, spec: &TableSpec) -> Result<TableHandle, StoreError> {
        if spec.name.len() > TABLE_NAME_MAX {
            return Err(StoreError::NameTooLong(spec.name.clone()));
        }

        if spec.name.is_empty()
            || spec.key_size == 0
            || spec.value_size == 0
            || spec.max_entries == 0
        {
            return Err(StoreError::Invalid(format!("bad spec: {:?}", spec)));
        }

        let mut tables = self.inner.tables.lock().unwrap();
        let handle = TableHandle(tables.len() as u32);
        tables.push(Arc::new(Table {
            spec: spec.clone(),
            entries: Mutex::new(BTreeMap::new()),
        }));
        Ok(handle)
    }

    fn lookup(
        &self,
        handle: TableHandle,
        key: &[u8],
    ) -> Result<Option<Vec<u8>>, StoreError> {
        let table = self.table(handle)?;
        table.check_key(key)?;
        let entries = table.entries.lock().unwrap();
        Ok(entries.get(key).cloned())
    }

    fn update(
        &self,
        handle: TableHandle,
        key: &[u8],
        value: &[u8],
        mode: UpdateMode,
    ) -> Result<(), StoreError> {
        let table = self.table(handle)?;
        table.check_key(key)?;
        table.check_value(value)?;

        let mut entries = table.entries.lock().unwrap();
        let exists = entries.contains_key(key);

        match mode {
            UpdateMode::CreateOnly if exists => {
                return Err(StoreError::Invalid("entry exists".to_string()));
            }
            UpdateMode::UpdateOnly if !exists => {
                return Err(StoreError::NotFound);
            }
            _ => {}
        }

        if !exists && entries.len() as u32 >= table.spec.max_entries {
            return Err(StoreError::TooLarge(table.spec.max_entries));
        }

        entries.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(
        &self,
        handle: TableHandle,
        key: &[u8],
    ) -> Result<(), StoreError> {
        let table = self.table(handle)?;
        table.check_key(key)?;
        let mut entries = table.entries.lock().unwrap();
        entries.remove(key).map(|_| ()).ok_or(StoreError::NotFound)
    }

    fn next_key(
        &self,
        handle: TableHandle,
        key: Option<&[u8]>,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        let table = self.table(handle)?;
        let entries = table.entries.lock().unwrap();

        let next = match key {
            None => entries.keys().next().cloned(),
            Some(k) => {
                table.check_key(k)?;
                entries
                    .range::<Vec<u8>, _>((
                        Bound::Excluded(k.to_vec()),
                        Bound::Unbounded,
                    ))
                    .map(|(k, _)| k.clone())
                    .next()
            }
        };

        Ok(next)
    }

    fn open_by_path(&self, path: &str) -> Result<TableHandle, StoreError> {
        let paths = self.inner.paths.lock().unwrap();
        paths
            .get(path)
            .copied()
            .ok_or_else(|| StoreError::PathNotFound(path.to_string()))
    }

    fn publish_by_path(
        &self,
        handle: TableHandle,
        path: &str,
    ) -> Result<(), StoreError> {
        // Validate the handle before taking the namespace entry.
        let _ = self.table(handle)?;

        let mut paths = self.inner.paths.lock().unwrap();
        if paths.contains_key(path) {
            return Err(StoreError::PathBusy(path.to_string()));
        }

        paths.insert(path.to_string(), handle);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn small_table(store: &MemStore, max: u32) -> TableHandle {
        store.create(&TableSpec::new("t", 4, 2, max)).unwrap()
    }

    #[test]
    fn crud_round_trip() {
        let store = MemStore::new();
        let t = small_table(&store, 8);

        assert_eq!(store.lookup(t, &[0, 0, 0, 1]).unwrap(), None);

        store
            .update(t, &[0, 0, 0, 1], &[9, 9], UpdateMode::CreateOrUpdate)
            .unwrap();
        assert_eq!(store.lookup(t, &[0, 0, 0, 1]).unwrap(), Some(vec![9, 9]));

        store.delete(t, &[0, 0, 0, 1]).unwrap();
        assert_eq!(store.lookup(t, &[0, 0, 0, 1]).unwrap(), None);
        assert_eq!(
            store.delete(t, &[0, 0, 0, 1]).unwrap_err(),
            StoreError::NotFound
        );
    }

    #[test]
    fn update_modes() {
        let store = MemStore::new();
        let t = small_table(&store, 8);
        let k = [0, 0, 0, 7];

        assert_eq!(
            store.update(t, &k, &[1, 1], UpdateMode::UpdateOnly).unwrap_err(),
            StoreError::NotFound,
        );

        store.update(t, &k, &[1, 1], UpdateMode::CreateOnly).unwrap();
        assert!(
            store.update(t, &k, &[2, 2], UpdateMode::CreateOnly).is_err()
        );

        store.update(t, &k, &[3, 3], UpdateMode::UpdateOnly).unwrap();
        assert_eq!(store.lookup(t, &k).unwrap(), Some(vec![3, 3]));
    }

    #[test]
    fn capacity_is_enforced() {
        let store = MemStore::new();
        let t = small_table(&store, 2);

        store
            .update(t, &[0, 0, 0, 1], &[0, 0], UpdateMode::CreateOrUpdate)
            .unwrap();
        store
            .update(t, &[0, 0, 0, 2], &[0, 0], UpdateMode::CreateOrUpdate)
            .unwrap();
        assert_eq!(
            store
                .update(t, &[0, 0, 0, 3], &[0, 0], UpdateMode::CreateOrUpdate)
                .unwrap_err(),
            StoreError::TooLarge(2),
        );

        // Overwriting an existing key is not a capacity event.
        store
            .update(t, &[0, 0, 0, 2], &[4, 4], UpdateMode::CreateOrUpdate)
            .unwrap();
    }

    #[test]
    fn size_mismatches_are_invalid() {
        let store = MemStore::new();
        let t = small_table(&store, 8);

        assert!(matches!(
            store.lookup(t, &[1, 2, 3]).unwrap_err(),
            StoreError::Invalid(_),
        ));
        assert!(matches!(
            store
                .update(t, &[0, 0, 0, 1], &[1], UpdateMode::CreateOrUpdate)
                .unwrap_err(),
            StoreError::Invalid(_),
        ));
    }

    #[test]
    fn bad_specs() {
        let store = MemStore::new();
        assert!(matches!(
            store
                .create(&TableSpec::new("a-name-way-too-long", 4, 4, 4))
                .unwrap_err(),
            StoreError::NameTooLong(_),
        ));
        assert!(matches!(
            store.create(&TableSpec::new("t", 0, 4, 4)).unwrap_err(),
            StoreError::Invalid(_),
        ));
    }

    #[test]
    fn enumeration_visits_all_keys() {
        let store = MemStore::new();
        let t = small_table(&store, 8);

        for i in [5u8, 1, 3] {
            store
                .update(
                    t,
                    &[0, 0, 0, i],
                    &[i, i],
                    UpdateMode::CreateOrUpdate,
                )
                .unwrap();
        }

        let mut seen = Vec::new();
        let mut cursor: Option<Vec<u8>> = None;
        while let Some(k) = store.next_key(t, cursor.as_deref()).unwrap() {
            seen.push(k.clone());
            cursor = Some(k);
        }

        assert_eq!(
            seen,
            vec![vec![0, 0, 0, 1], vec![0, 0, 0, 3], vec![0, 0, 0, 5]],
        );
    }

    #[test]
    fn publish_and_open() {
        let store = MemStore::new();
        let t = small_table(&store, 8);

        assert_eq!(
            store.open_by_path("/t").unwrap_err(),
            StoreError::PathNotFound("/t".to_string()),
        );

        store.publish_by_path(t, "/t").unwrap();
        assert_eq!(store.open_by_path("/t").unwrap(), t);

        // Another opener of the same store sees the same table.
        let other = store.clone();
        let h = other.open_by_path("/t").unwrap();
        other
            .update(h, &[0, 0, 0, 1], &[7, 7], UpdateMode::CreateOrUpdate)
            .unwrap();
        assert_eq!(store.lookup(t, &[0, 0, 0, 1]).unwrap(), Some(vec![7, 7]));

        assert_eq!(
            store.publish_by_path(t, "/t").unwrap_err(),
            StoreError::PathBusy("/t".to_string()),
        );
    }
}
