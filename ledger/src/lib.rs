//! Ledger access for Dominion.
//!
//! Reads and submission sit behind two object-safe traits so the crank can run
//! against the JSON-RPC node ([`RpcLedger`]) or entirely in process
//! ([`MemoryLedger`]). Both traits return boxed futures.

mod error;
mod memory;
mod retry;
mod rpc;
mod wire;

use std::future::Future;
use std::pin::Pin;

use dominion_types::{Address, ObjectId, ObjectRef, OperationBatch, Timestamp, TypeTag};
use serde_json::Value;

pub use error::LedgerError;
pub use memory::MemoryLedger;
pub use retry::{RetryConfig, RetryOutcome, calculate_retry_delay, parse_retry_after, send_with_retry, should_retry};
pub use rpc::{RpcLedger, RpcSettings};
pub use wire::U64;

pub type LedgerFut<'a, T> = Pin<Box<dyn Future<Output = Result<T, LedgerError>> + Send + 'a>>;

/// Decoded object as the ledger returns it: identity plus raw Move content.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectData {
    pub object_id: ObjectId,
    pub version: u64,
    pub digest: String,
    /// Full struct tag of the object's Move type.
    pub type_: TypeTag,
    /// The `fields` map of the object's Move content.
    pub fields: Value,
}

/// Key of a dynamic field attached to a parent object.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DynamicFieldName {
    #[serde(rename = "type")]
    pub type_: String,
    pub value: Value,
}

impl DynamicFieldName {
    /// The `u8`-keyed fields commanders use for their payloads.
    #[must_use]
    pub fn u8(value: u8) -> Self {
        Self {
            type_: "u8".to_string(),
            value: Value::from(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coin {
    pub coin_type: TypeTag,
    pub object_ref: ObjectRef,
    pub balance: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitStatus {
    Success,
    Failure { error: String },
}

/// Result of submitting one batch.
///
/// A batch can be accepted (it has a digest) and still fail during execution;
/// callers must check [`is_success`](Self::is_success).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub digest: String,
    pub status: SubmitStatus,
    pub errors: Vec<String>,
}

impl SubmitOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.status, SubmitStatus::Success) && self.errors.is_empty()
    }

    /// First error reported for the batch, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match &self.status {
            SubmitStatus::Failure { error } => Some(error),
            SubmitStatus::Success => self.errors.first().map(String::as_str),
        }
    }
}

pub trait LedgerRead: Send + Sync {
    fn get_object<'a>(&'a self, id: &'a ObjectId) -> LedgerFut<'a, ObjectData>;

    /// Fetch many objects in one logical call.
    ///
    /// Results are in request order; a missing object fails only its own slot.
    fn multi_get_objects<'a>(
        &'a self,
        ids: &'a [ObjectId],
    ) -> LedgerFut<'a, Vec<Result<ObjectData, LedgerError>>>;

    fn get_dynamic_field_object<'a>(
        &'a self,
        parent: &'a ObjectId,
        name: &'a DynamicFieldName,
    ) -> LedgerFut<'a, ObjectData>;

    /// Every coin of `coin_type` owned by `owner`.
    fn get_coins<'a>(&'a self, owner: &'a Address, coin_type: &'a TypeTag)
    -> LedgerFut<'a, Vec<Coin>>;

    /// Current ledger time, read from the shared clock object.
    fn get_clock(&self) -> LedgerFut<'_, Timestamp> {
        Box::pin(async move {
            let clock = self.get_object(&ObjectId::clock()).await?;
            clock
                .fields
                .get("timestamp_ms")
                .cloned()
                .ok_or_else(|| LedgerError::decode("clock", "missing timestamp_ms"))
                .and_then(|v| {
                    serde_json::from_value::<U64>(v)
                        .map(|t| t.0)
                        .map_err(|e| LedgerError::decode("clock", e))
                })
        })
    }
}

pub trait LedgerSubmit: Send + Sync {
    /// Submit one batch as a single atomic transaction. Never retried.
    fn submit<'a>(
        &'a self,
        batch: &'a OperationBatch,
        sender: &'a Address,
        gas_budget: u64,
    ) -> LedgerFut<'a, SubmitOutcome>;
}
