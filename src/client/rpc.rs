//! Sui JSON-RPC transport and the [`ChainClient`] built on it.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use anyhow::{Context, anyhow, bail};
use async_trait::async_trait;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::{
    accounts::ObjectId,
    client::{ChainClient, CreatedObject, EmittedEvent, TransactionRequest, TxOutcome},
};

const PAGE_LIMIT: usize = 50;
const TX_LOOKUP_ATTEMPTS: u32 = 5;
const TX_LOOKUP_DELAY: Duration = Duration::from_millis(500);

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

/// Minimal JSON-RPC 2.0 client.
pub struct JsonRpc {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl JsonRpc {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        }
    }

    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> anyhow::Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        debug!(method, id, "RPC request");
        let response: RpcResponse<T> = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("{method} request failed"))?
            .error_for_status()?
            .json()
            .await
            .with_context(|| format!("{method} returned malformed response"))?;

        if let Some(err) = response.error {
            bail!("{method} failed ({}): {}", err.code, err.message);
        }
        response
            .result
            .ok_or_else(|| anyhow!("{method} returned no result"))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalanceResponse {
    total_balance: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page<T> {
    data: Vec<T>,
    next_cursor: Option<Value>,
    #[serde(default)]
    has_next_page: bool,
}

#[derive(Deserialize)]
struct OwnedObject {
    data: Option<OwnedObjectData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OwnedObjectData {
    object_id: ObjectId,
}

#[derive(Deserialize)]
struct ExecutorResponse {
    digest: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionBlock {
    digest: String,
    effects: Option<Effects>,
    #[serde(default)]
    object_changes: Vec<ObjectChange>,
    #[serde(default)]
    events: Vec<EmittedEvent>,
}

#[derive(Deserialize)]
struct Effects {
    status: ExecutionStatus,
}

#[derive(Deserialize)]
struct ExecutionStatus {
    status: String,
    error: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectChange {
    #[serde(rename = "type")]
    change_type: String,
    object_id: Option<ObjectId>,
    object_type: Option<String>,
}

impl TransactionBlock {
    fn into_outcome(self) -> anyhow::Result<TxOutcome> {
        let status = self
            .effects
            .ok_or_else(|| anyhow!("transaction {} has no effects", self.digest))?
            .status;
        if status.status != "success" {
            bail!(
                "transaction {} failed: {}",
                self.digest,
                status.error.unwrap_or(status.status)
            );
        }

        let created = self
            .object_changes
            .into_iter()
            .filter(|change| change.change_type == "created")
            .filter_map(|change| {
                Some(CreatedObject {
                    object_id: change.object_id?,
                    object_type: change.object_type?,
                })
            })
            .collect();

        Ok(TxOutcome {
            digest: self.digest,
            created,
            events: self.events,
        })
    }
}

/// Chain access over Sui JSON-RPC. Transactions are signed and submitted by
/// an executor service that holds the key for the owner address.
pub struct SuiRpcClient {
    rpc: JsonRpc,
    http: reqwest::Client,
    executor_url: String,
}

impl SuiRpcClient {
    pub fn new(http: reqwest::Client, rpc_url: &str, executor_url: &str) -> Self {
        Self {
            rpc: JsonRpc::new(http.clone(), rpc_url),
            http,
            executor_url: executor_url.to_string(),
        }
    }

    async fn submit(&self, request: &TransactionRequest) -> anyhow::Result<String> {
        let response: ExecutorResponse = self
            .http
            .post(&self.executor_url)
            .json(request)
            .send()
            .await
            .context("executor request failed")?
            .error_for_status()?
            .json()
            .await
            .context("executor returned malformed response")?;

        Ok(response.digest)
    }

    async fn transaction_block(&self, digest: &str) -> anyhow::Result<TransactionBlock> {
        let params = json!([
            digest,
            { "showEffects": true, "showObjectChanges": true, "showEvents": true }
        ]);

        let mut attempt = 1;
        loop {
            match self.rpc.call("sui_getTransactionBlock", params.clone()).await {
                Ok(block) => return Ok(block),
                Err(e) if attempt < TX_LOOKUP_ATTEMPTS => {
                    debug!(digest, attempt, error = %e, "Transaction not indexed yet");
                    attempt += 1;
                    tokio::time::sleep(TX_LOOKUP_DELAY).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl ChainClient for SuiRpcClient {
    async fn get_balance(&self, owner: &str, coin_type: &str) -> anyhow::Result<u64> {
        let response: BalanceResponse = self
            .rpc
            .call("suix_getBalance", json!([owner, coin_type]))
            .await?;

        response
            .total_balance
            .parse()
            .with_context(|| format!("invalid balance {:?} for {coin_type}", response.total_balance))
    }

    async fn get_owned_objects(
        &self,
        owner: &str,
        struct_type: &str,
    ) -> anyhow::Result<Vec<ObjectId>> {
        let query = json!({
            "filter": { "StructType": struct_type },
            "options": { "showType": true },
        });

        let mut ids = Vec::new();
        let mut cursor = Value::Null;
        loop {
            let page: Page<OwnedObject> = self
                .rpc
                .call(
                    "suix_getOwnedObjects",
                    json!([owner, query, cursor, PAGE_LIMIT]),
                )
                .await?;

            ids.extend(page.data.into_iter().filter_map(|o| o.data).map(|d| d.object_id));

            match page.next_cursor {
                Some(next) if page.has_next_page && !next.is_null() => cursor = next,
                _ => break,
            }
        }

        Ok(ids)
    }

    async fn execute(&self, request: &TransactionRequest) -> anyhow::Result<TxOutcome> {
        let action = request.payload.name();
        let digest = self
            .submit(request)
            .await
            .with_context(|| format!("{action} submission failed"))?;

        let outcome = self.transaction_block(&digest).await?.into_outcome()?;
        if outcome.created.is_empty() && action == "open_position" {
            warn!(digest = %outcome.digest, "Open position created no objects");
        }

        Ok(outcome)
    }
}
