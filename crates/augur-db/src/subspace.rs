//! SQLite-backed parameter subspace.

use std::sync::{Arc, Mutex};

use augur_params::{ParamSubspace, ParamsError};
use rusqlite::Connection;

use crate::queries;

/// [`ParamSubspace`] writing through to the `params` table.
///
/// Shares its connection with the rest of the node.
#[derive(Clone)]
pub struct SqliteSubspace {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSubspace {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> crate::Result<T>,
    ) -> augur_params::Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| ParamsError::Backend("database lock poisoned".to_string()))?;
        f(&conn).map_err(|e| ParamsError::Backend(e.to_string()))
    }
}

impl std::fmt::Debug for SqliteSubspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSubspace").finish_non_exhaustive()
    }
}

impl ParamSubspace for SqliteSubspace {
    fn get(&self, key: &str) -> augur_params::Result<Option<Vec<u8>>> {
        self.with_conn(|conn| queries::params::get(conn, key))
    }

    fn set(&mut self, key: &str, value: &[u8]) -> augur_params::Result<()> {
        self.with_conn(|conn| queries::params::set(conn, key, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use augur_params::ParameterStore;
    use augur_types::params::{TaskParams, KEY_TASK_PARAMS};

    fn shared() -> Arc<Mutex<Connection>> {
        Arc::new(Mutex::new(crate::open_memory().expect("open test db")))
    }

    #[test]
    fn test_store_seeds_genesis_rows() {
        let conn = shared();
        let store = ParameterStore::open(Box::new(SqliteSubspace::new(conn.clone())))
            .expect("open store");
        assert_eq!(store.versioned_task_params().version, 0);
        let guard = conn.lock().expect("lock");
        assert!(queries::params::get(&guard, KEY_TASK_PARAMS)
            .expect("get")
            .is_some());
    }

    #[test]
    fn test_updates_survive_reopen() {
        let conn = shared();
        let mut store = ParameterStore::open(Box::new(SqliteSubspace::new(conn.clone())))
            .expect("open store");
        let updated = TaskParams {
            threshold_score: 200,
            ..TaskParams::default()
        };
        assert_eq!(store.set_task_params(updated.clone()).expect("update"), 1);
        drop(store);

        let reopened = ParameterStore::open(Box::new(SqliteSubspace::new(conn)))
            .expect("reopen store");
        assert_eq!(reopened.versioned_task_params().version, 1);
        assert_eq!(reopened.task_params(), updated);
    }
}
