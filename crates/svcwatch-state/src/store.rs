//! StateStore — redb-backed persistence of per-service runtime state.
//!
//! Values are JSON-serialized into redb's `&[u8]` value column. The store
//! supports both on-disk and in-memory backends (the latter for testing).
//! [`StateReader`] opens an existing file without ever starting a write
//! transaction.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadOnlyDatabase, ReadableDatabase, ReadableTable, TableError};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::SERVICE_STATE;
use crate::types::ServiceRuntimeState;

/// Build a `map_err` closure for a `StateError` variant. The two-argument
/// form names the service whose record was being touched.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
    ($variant:ident, $service:expr) => {
        |e| StateError::$variant {
            service: $service.to_string(),
            message: e.to_string(),
        }
    };
}

/// Key-value access to per-service runtime state.
///
/// `get` never fails for an unknown service: it yields the default record.
/// `put` replaces the whole record atomically.
pub trait RuntimeStore: Send + Sync {
    fn get(&self, service: &str) -> StateResult<ServiceRuntimeState>;

    fn put(&self, service: &str, state: &ServiceRuntimeState) -> StateResult<()>;

    /// All stored records in service-name order.
    fn list(&self) -> StateResult<Vec<(String, ServiceRuntimeState)>>;
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create the table if it doesn't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(SERVICE_STATE).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Get a service's stored record, if any.
    pub fn get_service_state(&self, service: &str) -> StateResult<Option<ServiceRuntimeState>> {
        read_record(self.db.as_ref(), service)
    }

    /// Insert or replace a service's record in one write transaction.
    pub fn put_service_state(&self, service: &str, state: &ServiceRuntimeState) -> StateResult<()> {
        let value = serde_json::to_vec(state).map_err(map_err!(Encode, service))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(SERVICE_STATE).map_err(map_err!(Table))?;
            table
                .insert(service, value.as_slice())
                .map_err(map_err!(Write, service))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%service, "service state stored");
        Ok(())
    }

    /// List all stored records.
    pub fn list_service_states(&self) -> StateResult<Vec<(String, ServiceRuntimeState)>> {
        read_all(self.db.as_ref())
    }
}

/// Read-only view of an existing state file, for inspection while no
/// watch cycle needs to write.
pub struct StateReader {
    db: ReadOnlyDatabase,
}

impl StateReader {
    /// Open an existing database. Fails if the file is missing.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = ReadOnlyDatabase::open(path).map_err(map_err!(Open))?;
        debug!(?path, "state store opened read-only");
        Ok(Self { db })
    }

    /// A service's record, or the default record when none is stored.
    pub fn get(&self, service: &str) -> StateResult<ServiceRuntimeState> {
        Ok(read_record(&self.db, service)?.unwrap_or_default())
    }

    /// All stored records in service-name order.
    pub fn list(&self) -> StateResult<Vec<(String, ServiceRuntimeState)>> {
        read_all(&self.db)
    }
}

/// A file that no cycle has written to yet has no table; that reads as empty.
fn read_record<D: ReadableDatabase>(
    db: &D,
    service: &str,
) -> StateResult<Option<ServiceRuntimeState>> {
    let txn = db.begin_read().map_err(map_err!(Transaction))?;
    let table = match txn.open_table(SERVICE_STATE) {
        Ok(table) => table,
        Err(TableError::TableDoesNotExist(_)) => return Ok(None),
        Err(e) => return Err(StateError::Table(e.to_string())),
    };
    let Some(guard) = table.get(service).map_err(map_err!(Read, service))? else {
        return Ok(None);
    };
    serde_json::from_slice(guard.value())
        .map(Some)
        .map_err(map_err!(Corrupt, service))
}

fn read_all<D: ReadableDatabase>(db: &D) -> StateResult<Vec<(String, ServiceRuntimeState)>> {
    let txn = db.begin_read().map_err(map_err!(Transaction))?;
    let table = match txn.open_table(SERVICE_STATE) {
        Ok(table) => table,
        Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
        Err(e) => return Err(StateError::Table(e.to_string())),
    };
    table
        .iter()
        .map_err(map_err!(Read, "*"))?
        .map(|entry| -> StateResult<(String, ServiceRuntimeState)> {
            let (key, value) = entry.map_err(map_err!(Read, "*"))?;
            let service = key.value().to_string();
            let state =
                serde_json::from_slice(value.value()).map_err(map_err!(Corrupt, service))?;
            Ok((service, state))
        })
        .collect()
}

impl RuntimeStore for StateStore {
    fn get(&self, service: &str) -> StateResult<ServiceRuntimeState> {
        Ok(self.get_service_state(service)?.unwrap_or_default())
    }

    fn put(&self, service: &str, state: &ServiceRuntimeState) -> StateResult<()> {
        self.put_service_state(service, state)
    }

    fn list(&self) -> StateResult<Vec<(String, ServiceRuntimeState)>> {
        self.list_service_states()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> ServiceRuntimeState {
        let mut state = ServiceRuntimeState {
            health_failure_count: 2,
            cooldown_until: Some(5000),
            ..Default::default()
        };
        state.record_restart(1000);
        state.record_restart(1060);
        state
            .dependency_instance_ids
            .insert("db".to_string(), "3f2a".to_string());
        state
    }

    #[test]
    fn put_and_get() {
        let store = StateStore::open_in_memory().unwrap();
        let state = test_state();

        store.put("nginx", &state).unwrap();
        assert_eq!(store.get("nginx").unwrap(), state);
    }

    #[test]
    fn get_unknown_service_is_default() {
        let store = StateStore::open_in_memory().unwrap();
        assert_eq!(store.get("nope").unwrap(), ServiceRuntimeState::default());
        assert!(store.get_service_state("nope").unwrap().is_none());
    }

    #[test]
    fn put_replaces_whole_record() {
        let store = StateStore::open_in_memory().unwrap();
        store.put("api", &test_state()).unwrap();

        let replacement = ServiceRuntimeState {
            health_failure_count: 1,
            ..Default::default()
        };
        store.put("api", &replacement).unwrap();

        let stored = store.get("api").unwrap();
        assert_eq!(stored, replacement);
        assert!(stored.restart_ledger.is_empty());
        assert!(stored.dependency_instance_ids.is_empty());
    }

    #[test]
    fn records_are_independent() {
        let store = StateStore::open_in_memory().unwrap();
        store.put("a", &test_state()).unwrap();
        store.put("b", &ServiceRuntimeState::default()).unwrap();

        assert_eq!(store.get("a").unwrap().restart_ledger.len(), 2);
        assert!(store.get("b").unwrap().restart_ledger.is_empty());
    }

    #[test]
    fn list_is_name_ordered() {
        let store = StateStore::open_in_memory().unwrap();
        store.put("zeta", &ServiceRuntimeState::default()).unwrap();
        store.put("alpha", &test_state()).unwrap();

        let names: Vec<_> = store.list().unwrap().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("svcwatch.redb");

        {
            let store = StateStore::open(&db_path).unwrap();
            store.put("nginx", &test_state()).unwrap();
        }

        // Reopen the same database file.
        let store = StateStore::open(&db_path).unwrap();
        assert_eq!(store.get("nginx").unwrap(), test_state());
    }

    #[test]
    fn corrupt_record_names_service() {
        let store = StateStore::open_in_memory().unwrap();
        let txn = store.db.begin_write().unwrap();
        {
            let mut table = txn.open_table(SERVICE_STATE).unwrap();
            table.insert("web", b"not json".as_slice()).unwrap();
        }
        txn.commit().unwrap();

        match store.get("web").unwrap_err() {
            StateError::Corrupt { service, .. } => assert_eq!(service, "web"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(
            store.list().unwrap_err(),
            StateError::Corrupt { .. }
        ));
    }

    #[test]
    fn usable_as_trait_object() {
        let store: Box<dyn RuntimeStore> = Box::new(StateStore::open_in_memory().unwrap());
        store.put("x", &test_state()).unwrap();
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn reader_sees_records_written_by_store() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("svcwatch.redb");
        {
            let store = StateStore::open(&db_path).unwrap();
            store.put("nginx", &test_state()).unwrap();
            store.put("api", &ServiceRuntimeState::default()).unwrap();
        }

        let reader = StateReader::open(&db_path).unwrap();
        assert_eq!(reader.get("nginx").unwrap(), test_state());
        assert_eq!(reader.get("absent").unwrap(), ServiceRuntimeState::default());
        let names: Vec<_> = reader.list().unwrap().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["api", "nginx"]);
    }

    #[test]
    fn reader_treats_missing_table_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("svcwatch.redb");
        drop(Database::create(&db_path).unwrap());

        let reader = StateReader::open(&db_path).unwrap();
        assert!(reader.list().unwrap().is_empty());
        assert_eq!(reader.get("web").unwrap(), ServiceRuntimeState::default());
    }

    #[test]
    fn reader_does_not_create_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("svcwatch.redb");

        assert!(matches!(
            StateReader::open(&db_path),
            Err(StateError::Open(_))
        ));
        assert!(!db_path.exists());
    }
}
