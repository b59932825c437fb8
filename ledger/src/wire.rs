//! JSON shapes of the node's read and submit responses.

use std::fmt;

use dominion_types::{ObjectId, ObjectRef, TypeTag};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Coin, LedgerError, ObjectData, SubmitOutcome, SubmitStatus};

/// A `u64` the node may render either as a JSON number or a decimal string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct U64(pub u64);

impl<'de> Deserialize<'de> for U64 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct U64Visitor;

        impl Visitor<'_> for U64Visitor {
            type Value = U64;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a u64 as a number or decimal string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<U64, E> {
                Ok(U64(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<U64, E> {
                u64::try_from(v).map(U64).map_err(E::custom)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<U64, E> {
                v.trim().parse().map(U64).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(U64Visitor)
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcResponse<T> {
    pub result: Option<T>,
    pub error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcErrorBody {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ObjectResponse {
    pub data: Option<RawObject>,
    pub error: Option<ObjectResponseError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawObject {
    pub object_id: ObjectId,
    pub version: U64,
    pub digest: String,
    #[serde(rename = "type")]
    pub type_: Option<String>,
    pub content: Option<RawContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawContent {
    pub data_type: String,
    #[serde(rename = "type")]
    pub type_: Option<String>,
    #[serde(default)]
    pub fields: Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ObjectResponseError {
    pub code: String,
    #[serde(default)]
    pub error: Option<String>,
}

impl ObjectResponse {
    pub fn into_object(self, requested: &ObjectId) -> Result<ObjectData, LedgerError> {
        if let Some(err) = self.error {
            return Err(match err.code.as_str() {
                "notExists" | "deleted" | "dynamicFieldNotFound" => LedgerError::ObjectNotFound {
                    id: requested.clone(),
                },
                _ => LedgerError::decode(
                    format!("object {requested}"),
                    err.error.unwrap_or(err.code),
                ),
            });
        }
        let Some(data) = self.data else {
            return Err(LedgerError::ObjectNotFound {
                id: requested.clone(),
            });
        };
        let context = || format!("object {}", data.object_id);
        let content = data
            .content
            .ok_or_else(|| LedgerError::decode(context(), "response has no content"))?;
        if content.data_type != "moveObject" {
            return Err(LedgerError::decode(
                context(),
                format!("expected a Move object, got {}", content.data_type),
            ));
        }
        let type_ = content
            .type_
            .or(data.type_)
            .ok_or_else(|| LedgerError::decode(context(), "response has no type"))?;
        Ok(ObjectData {
            object_id: data.object_id,
            version: data.version.0,
            digest: data.digest,
            type_: TypeTag::new(&type_),
            fields: content.fields,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CoinPage {
    pub data: Vec<RawCoin>,
    pub next_cursor: Option<String>,
    pub has_next_page: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawCoin {
    pub coin_type: String,
    pub coin_object_id: ObjectId,
    pub version: U64,
    pub digest: String,
    pub balance: U64,
}

impl From<RawCoin> for Coin {
    fn from(raw: RawCoin) -> Self {
        Coin {
            coin_type: TypeTag::new(&raw.coin_type),
            object_ref: ObjectRef {
                object_id: raw.coin_object_id,
                version: raw.version.0,
                digest: raw.digest,
            },
            balance: raw.balance.0,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitResponse {
    pub digest: String,
    pub effects: Option<Effects>,
    #[serde(default)]
    pub errors: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Effects {
    pub status: ExecutionStatus,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExecutionStatus {
    pub status: String,
    pub error: Option<String>,
}

impl From<SubmitResponse> for SubmitOutcome {
    fn from(raw: SubmitResponse) -> Self {
        let status = match raw.effects {
            Some(Effects { status }) if status.status == "success" => SubmitStatus::Success,
            Some(Effects { status }) => SubmitStatus::Failure {
                error: status
                    .error
                    .unwrap_or_else(|| format!("execution status {}", status.status)),
            },
            None => SubmitStatus::Failure {
                error: "no effects returned".to_string(),
            },
        };
        SubmitOutcome {
            digest: raw.digest,
            status,
            errors: raw.errors,
        }
    }
}
