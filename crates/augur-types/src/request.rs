//! Requests accepted by the engine.
//!
//! The set is closed: the codec decodes every signed transaction into one
//! [`Request`] variant before it reaches the core. The sender of a request
//! travels beside it (it is the transaction signer), never inside it.

use serde::{Deserialize, Serialize};

use crate::params::{LockedPoolParams, TaskParams};
use crate::TaskId;

/// Open a new task.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgCreateTask {
    /// Free-form description of the requested observation.
    #[serde(default)]
    pub description: String,
}

/// Report a value for an open task.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgSubmitData {
    pub task_id: TaskId,
    pub value: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgLockCollateral {
    pub amount: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgRequestUnlock {}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgWithdraw {}

/// Re-invocable aggregation trigger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgFinalize {
    pub task_id: TaskId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgUpdateTaskParams {
    pub params: TaskParams,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgUpdatePoolParams {
    pub params: LockedPoolParams,
}

/// Every request the engine understands, tagged by its registered name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Request {
    #[serde(rename = "oracle/MsgCreateTask")]
    CreateTask(MsgCreateTask),
    #[serde(rename = "oracle/MsgSubmitData")]
    SubmitData(MsgSubmitData),
    #[serde(rename = "oracle/MsgLockCollateral")]
    LockCollateral(MsgLockCollateral),
    #[serde(rename = "oracle/MsgRequestUnlock")]
    RequestUnlock(MsgRequestUnlock),
    #[serde(rename = "oracle/MsgWithdraw")]
    Withdraw(MsgWithdraw),
    #[serde(rename = "oracle/MsgFinalize")]
    Finalize(MsgFinalize),
    #[serde(rename = "oracle/MsgUpdateTaskParams")]
    UpdateTaskParams(MsgUpdateTaskParams),
    #[serde(rename = "oracle/MsgUpdatePoolParams")]
    UpdatePoolParams(MsgUpdatePoolParams),
}

impl Request {
    /// Registered type name, identical to the serialized tag.
    pub fn type_name(&self) -> &'static str {
        match self {
            Request::CreateTask(_) => "oracle/MsgCreateTask",
            Request::SubmitData(_) => "oracle/MsgSubmitData",
            Request::LockCollateral(_) => "oracle/MsgLockCollateral",
            Request::RequestUnlock(_) => "oracle/MsgRequestUnlock",
            Request::Withdraw(_) => "oracle/MsgWithdraw",
            Request::Finalize(_) => "oracle/MsgFinalize",
            Request::UpdateTaskParams(_) => "oracle/MsgUpdateTaskParams",
            Request::UpdatePoolParams(_) => "oracle/MsgUpdatePoolParams",
        }
    }
}
