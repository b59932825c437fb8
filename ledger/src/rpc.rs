//! JSON-RPC ledger client.
//!
//! Reads go to the full node with retry/backoff. Batches go to a signing
//! gateway (`dominion_submitBatch`) that holds the operator key; submission is
//! sent exactly once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dominion_types::{Address, ObjectId, OperationBatch, TypeTag};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::retry::{RetryConfig, RetryOutcome, send_with_retry};
use crate::wire::{CoinPage, ObjectResponse, RpcRequest, RpcResponse, SubmitResponse};
use crate::{
    Coin, DynamicFieldName, LedgerError, LedgerFut, LedgerRead, LedgerSubmit, ObjectData,
    SubmitOutcome,
};

const TCP_KEEPALIVE_SECS: u64 = 60;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;
const POOL_MAX_IDLE_PER_HOST: usize = 4;

/// Connection settings for [`RpcLedger`].
#[derive(Debug, Clone)]
pub struct RpcSettings {
    pub rpc_url: String,
    /// Signing gateway; falls back to `rpc_url`.
    pub submit_url: Option<String>,
    pub request_timeout: Duration,
    pub max_retries: u32,
    /// Maximum ids per multi-get request.
    pub page_size: usize,
    /// Permit plain `http://` endpoints (local nodes, tests).
    pub allow_http: bool,
}

impl RpcSettings {
    #[must_use]
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            submit_url: None,
            request_timeout: Duration::from_secs(30),
            max_retries: 2,
            page_size: 50,
            allow_http: false,
        }
    }
}

pub struct RpcLedger {
    client: reqwest::Client,
    rpc_url: String,
    submit_url: String,
    retry: RetryConfig,
    page_size: usize,
    next_id: AtomicU64,
}

impl RpcLedger {
    pub fn new(settings: RpcSettings) -> Result<Self, LedgerError> {
        Self::with_retry(
            settings.clone(),
            RetryConfig::with_max_retries(settings.max_retries),
        )
    }

    pub fn with_retry(settings: RpcSettings, retry: RetryConfig) -> Result<Self, LedgerError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            reqwest::header::USER_AGENT,
            HeaderValue::from_static(concat!("dominion/", env!("CARGO_PKG_VERSION"))),
        );
        let client = reqwest::Client::builder()
            .https_only(!settings.allow_http)
            .timeout(settings.request_timeout)
            .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
            .default_headers(default_headers)
            .build()
            .map_err(|e| LedgerError::Transport {
                attempts: 0,
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            submit_url: settings
                .submit_url
                .unwrap_or_else(|| settings.rpc_url.clone()),
            rpc_url: settings.rpc_url,
            retry,
            page_size: settings.page_size.max(1),
            next_id: AtomicU64::new(1),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        url: &str,
        method: &str,
        params: Value,
        retry: bool,
    ) -> Result<T, LedgerError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        let config = if retry {
            self.retry.clone()
        } else {
            RetryConfig {
                max_retries: 0,
                ..self.retry.clone()
            }
        };

        tracing::trace!(method, id = request.id, "ledger request");
        let response = match send_with_retry(|| self.client.post(url).json(&request), &config).await
        {
            RetryOutcome::Success(response) => response,
            RetryOutcome::HttpError(response) => {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                return Err(LedgerError::Http { status, body });
            }
            RetryOutcome::ConnectionError { attempts, source } => {
                return Err(LedgerError::Transport {
                    attempts,
                    message: source.to_string(),
                });
            }
            RetryOutcome::NonRetryable(source) => {
                return Err(LedgerError::Transport {
                    attempts: 1,
                    message: source.to_string(),
                });
            }
        };

        let envelope: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| LedgerError::decode(method, e))?;
        match envelope {
            RpcResponse {
                error: Some(err), ..
            } => Err(LedgerError::Rpc {
                code: err.code,
                message: err.message,
            }),
            RpcResponse {
                result: Some(result),
                ..
            } => Ok(result),
            RpcResponse { result: None, .. } => {
                Err(LedgerError::decode(method, "response has neither result nor error"))
            }
        }
    }

    async fn read<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, LedgerError> {
        self.call(&self.rpc_url, method, params, true).await
    }
}

fn object_options() -> Value {
    json!({ "showContent": true, "showType": true })
}

impl LedgerRead for RpcLedger {
    fn get_object<'a>(&'a self, id: &'a ObjectId) -> LedgerFut<'a, ObjectData> {
        Box::pin(async move {
            let response: ObjectResponse = self
                .read("sui_getObject", json!([id, object_options()]))
                .await?;
            response.into_object(id)
        })
    }

    fn multi_get_objects<'a>(
        &'a self,
        ids: &'a [ObjectId],
    ) -> LedgerFut<'a, Vec<Result<ObjectData, LedgerError>>> {
        Box::pin(async move {
            let mut objects = Vec::with_capacity(ids.len());
            for chunk in ids.chunks(self.page_size) {
                let responses: Vec<ObjectResponse> = self
                    .read("sui_multiGetObjects", json!([chunk, object_options()]))
                    .await?;
                if responses.len() != chunk.len() {
                    return Err(LedgerError::decode(
                        "sui_multiGetObjects",
                        format!("asked for {} objects, got {}", chunk.len(), responses.len()),
                    ));
                }
                objects.extend(
                    responses
                        .into_iter()
                        .zip(chunk)
                        .map(|(response, id)| response.into_object(id)),
                );
            }
            Ok(objects)
        })
    }

    fn get_dynamic_field_object<'a>(
        &'a self,
        parent: &'a ObjectId,
        name: &'a DynamicFieldName,
    ) -> LedgerFut<'a, ObjectData> {
        Box::pin(async move {
            let response: ObjectResponse = self
                .read("suix_getDynamicFieldObject", json!([parent, name]))
                .await?;
            response.into_object(parent).map_err(|e| match e {
                LedgerError::ObjectNotFound { .. } => LedgerError::decode(
                    format!("dynamic field {} of {parent}", name.value),
                    "field does not exist",
                ),
                other => other,
            })
        })
    }

    fn get_coins<'a>(
        &'a self,
        owner: &'a Address,
        coin_type: &'a TypeTag,
    ) -> LedgerFut<'a, Vec<Coin>> {
        Box::pin(async move {
            let mut coins = Vec::new();
            let mut cursor: Option<String> = None;
            loop {
                let page: CoinPage = self
                    .read(
                        "suix_getCoins",
                        json!([owner, coin_type, cursor, self.page_size]),
                    )
                    .await?;
                coins.extend(page.data.into_iter().map(Coin::from));
                match page.next_cursor {
                    Some(next) if page.has_next_page => cursor = Some(next),
                    _ => break,
                }
            }
            Ok(coins)
        })
    }
}

impl LedgerSubmit for RpcLedger {
    fn submit<'a>(
        &'a self,
        batch: &'a OperationBatch,
        sender: &'a Address,
        gas_budget: u64,
    ) -> LedgerFut<'a, SubmitOutcome> {
        Box::pin(async move {
            let response: SubmitResponse = self
                .call(
                    &self.submit_url,
                    "dominion_submitBatch",
                    json!([sender, batch, gas_budget.to_string()]),
                    false,
                )
                .await?;
            Ok(response.into())
        })
    }
}
