//! Immutable batches of programmable ledger calls.
//!
//! A batch is an ordered list of Move calls submitted as one atomic
//! transaction. Calls can consume the results of earlier calls in the same
//! batch through [`Argument::Result`] and [`Argument::NestedResult`]. Those
//! indices are local to the batch, so [`OperationBatch::append`] rebases the
//! appended half; independent steps can each build their own batch and the
//! scheduler joins them without sharing a mutable builder.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{ObjectId, TypeTag};

/// Versioned reference to an owned object, used for receiving transfers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRef {
    pub object_id: ObjectId,
    pub version: u64,
    pub digest: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Argument {
    /// A shared or owned object passed by id.
    Object(ObjectId),
    /// A pure value, serialized as JSON.
    Pure(serde_json::Value),
    /// The single result of call `i`.
    Result(u16),
    /// Result `j` of call `i` when the call returns a tuple.
    NestedResult(u16, u16),
    /// An object sent to an address-owned object that the call will receive.
    Receiving(ObjectRef),
}

impl Argument {
    #[must_use]
    fn rebased(self, offset: u16) -> Self {
        match self {
            Argument::Result(i) => Argument::Result(i.saturating_add(offset)),
            Argument::NestedResult(i, j) => Argument::NestedResult(i.saturating_add(offset), j),
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveTarget {
    pub package: ObjectId,
    pub module: String,
    pub function: String,
}

impl MoveTarget {
    #[must_use]
    pub fn new(package: &ObjectId, module: &str, function: &str) -> Self {
        Self {
            package: package.clone(),
            module: module.to_string(),
            function: function.to_string(),
        }
    }
}

impl fmt::Display for MoveTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}::{}", self.package, self.module, self.function)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveCall {
    pub target: MoveTarget,
    pub type_arguments: Vec<TypeTag>,
    pub arguments: Vec<Argument>,
}

impl MoveCall {
    #[must_use]
    pub fn new(target: MoveTarget, type_arguments: Vec<TypeTag>, arguments: Vec<Argument>) -> Self {
        Self {
            target,
            type_arguments,
            arguments,
        }
    }

    #[must_use]
    fn rebased(self, offset: u16) -> Self {
        Self {
            arguments: self
                .arguments
                .into_iter()
                .map(|a| a.rebased(offset))
                .collect(),
            ..self
        }
    }
}

/// Appending would take a batch past [`OperationBatch::MAX_CALLS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("batch of {calls} calls has no room for {adding} more (limit {})", OperationBatch::MAX_CALLS)]
pub struct BatchFull {
    pub calls: usize,
    pub adding: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationBatch {
    calls: Vec<MoveCall>,
}

impl OperationBatch {
    /// Most calls one transaction may carry.
    pub const MAX_CALLS: usize = 1024;

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a batch from calls whose result indices are already local to it.
    #[must_use]
    pub fn from_calls(calls: Vec<MoveCall>) -> Self {
        Self { calls }
    }

    #[must_use]
    pub fn single(call: MoveCall) -> Self {
        Self { calls: vec![call] }
    }

    /// Append `other`, shifting its result references past this batch's calls.
    ///
    /// Leaves `self` untouched when the result would exceed [`Self::MAX_CALLS`].
    pub fn append(&mut self, other: OperationBatch) -> Result<(), BatchFull> {
        let full = BatchFull {
            calls: self.calls.len(),
            adding: other.calls.len(),
        };
        if self.calls.len() + other.calls.len() > Self::MAX_CALLS {
            return Err(full);
        }
        let offset = u16::try_from(self.calls.len()).map_err(|_| full)?;
        self.calls
            .extend(other.calls.into_iter().map(|c| c.rebased(offset)));
        Ok(())
    }

    #[must_use]
    pub fn calls(&self) -> &[MoveCall] {
        &self.calls
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}
