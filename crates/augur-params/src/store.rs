//! Typed parameter store.
//!
//! Reads are served from the last committed snapshot and never fail. An
//! update is validated as a whole, written through to the backend, and only
//! then becomes visible; any failure along the way leaves the previous
//! snapshot in place.

use augur_types::params::{
    LockedPoolParams, ParamViolation, TaskParams, Versioned, KEY_POOL_PARAMS, KEY_TASK_PARAMS,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::subspace::{MemorySubspace, ParamSubspace};
use crate::{ParamsError, Result};

/// Global task and pool parameters.
pub struct ParameterStore {
    backend: Box<dyn ParamSubspace>,
    task: Versioned<TaskParams>,
    pool: Versioned<LockedPoolParams>,
}

impl std::fmt::Debug for ParameterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterStore")
            .field("task", &self.task)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl ParameterStore {
    /// Store with default parameters and no durable backend.
    pub fn in_memory() -> Self {
        Self {
            backend: Box::new(MemorySubspace::new()),
            task: Versioned {
                version: 0,
                params: TaskParams::default(),
            },
            pool: Versioned {
                version: 0,
                params: LockedPoolParams::default(),
            },
        }
    }

    /// Open a store over `backend`, seeding absent keys with the defaults.
    ///
    /// # Errors
    ///
    /// See [`open_with_genesis`](Self::open_with_genesis).
    pub fn open(backend: Box<dyn ParamSubspace>) -> Result<Self> {
        Self::open_with_genesis(backend, TaskParams::default(), LockedPoolParams::default())
    }

    /// Open a store over `backend`, seeding absent keys with the given
    /// genesis values.
    ///
    /// # Errors
    ///
    /// - [`ParamsError::InvalidParams`] if a stored or genesis value violates an invariant
    /// - [`ParamsError::Backend`] / [`ParamsError::Serialization`] on storage failure
    pub fn open_with_genesis(
        mut backend: Box<dyn ParamSubspace>,
        genesis_task: TaskParams,
        genesis_pool: LockedPoolParams,
    ) -> Result<Self> {
        let task = load_or_seed(
            backend.as_mut(),
            KEY_TASK_PARAMS,
            genesis_task,
            TaskParams::validate,
        )?;
        let pool = load_or_seed(
            backend.as_mut(),
            KEY_POOL_PARAMS,
            genesis_pool,
            LockedPoolParams::validate,
        )?;

        tracing::info!(
            task_version = task.version,
            pool_version = pool.version,
            "parameter store opened"
        );

        Ok(Self {
            backend,
            task,
            pool,
        })
    }

    /// Current task parameters.
    pub fn task_params(&self) -> TaskParams {
        self.task.params.clone()
    }

    /// Current pool parameters.
    pub fn pool_params(&self) -> LockedPoolParams {
        self.pool.params.clone()
    }

    pub fn versioned_task_params(&self) -> &Versioned<TaskParams> {
        &self.task
    }

    pub fn versioned_pool_params(&self) -> &Versioned<LockedPoolParams> {
        &self.pool
    }

    /// Replace the task parameters, returning the new version.
    ///
    /// # Errors
    ///
    /// - [`ParamsError::InvalidParams`] if any field violates its bound; nothing changes
    /// - [`ParamsError::Backend`] if the write fails; nothing changes
    pub fn set_task_params(&mut self, candidate: TaskParams) -> Result<u64> {
        candidate
            .validate()
            .map_err(|v| invalid(KEY_TASK_PARAMS, v))?;
        let next = Versioned {
            version: self.task.version + 1,
            params: candidate,
        };
        persist(self.backend.as_mut(), KEY_TASK_PARAMS, &next)?;
        tracing::info!(version = next.version, params = ?next.params, "task params updated");
        self.task = next;
        Ok(self.task.version)
    }

    /// Replace the pool parameters, returning the new version.
    ///
    /// # Errors
    ///
    /// - [`ParamsError::InvalidParams`] if either field is negative; nothing changes
    /// - [`ParamsError::Backend`] if the write fails; nothing changes
    pub fn set_pool_params(&mut self, candidate: LockedPoolParams) -> Result<u64> {
        candidate
            .validate()
            .map_err(|v| invalid(KEY_POOL_PARAMS, v))?;
        let next = Versioned {
            version: self.pool.version + 1,
            params: candidate,
        };
        persist(self.backend.as_mut(), KEY_POOL_PARAMS, &next)?;
        tracing::info!(version = next.version, params = ?next.params, "pool params updated");
        self.pool = next;
        Ok(self.pool.version)
    }
}

fn invalid(key: &'static str, violation: ParamViolation) -> ParamsError {
    ParamsError::InvalidParams {
        key,
        field: violation.field,
        reason: violation.reason,
    }
}

fn persist<T: Serialize>(
    backend: &mut dyn ParamSubspace,
    key: &str,
    value: &Versioned<T>,
) -> Result<()> {
    let bytes =
        serde_json::to_vec(value).map_err(|e| ParamsError::Serialization(e.to_string()))?;
    backend.set(key, &bytes)
}

fn load_or_seed<T, F>(
    backend: &mut dyn ParamSubspace,
    key: &'static str,
    genesis: T,
    validate: F,
) -> Result<Versioned<T>>
where
    T: Serialize + DeserializeOwned,
    F: Fn(&T) -> std::result::Result<(), ParamViolation>,
{
    match backend.get(key)? {
        Some(bytes) => {
            let stored: Versioned<T> = serde_json::from_slice(&bytes)
                .map_err(|e| ParamsError::Serialization(format!("{key}: {e}")))?;
            if let Err(violation) = validate(&stored.params) {
                tracing::warn!(key, %violation, "stored parameters rejected");
                return Err(invalid(key, violation));
            }
            Ok(stored)
        }
        None => {
            validate(&genesis).map_err(|v| invalid(key, v))?;
            let seeded = Versioned {
                version: 0,
                params: genesis,
            };
            persist(backend, key, &seeded)?;
            Ok(seeded)
        }
    }
}
