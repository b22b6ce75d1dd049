//! Network fee/nonce oracle and broadcaster.
//!
//! The signer never talks to a node directly; every chain read it needs during
//! field inference, and the final broadcast, goes through [`NetworkOracle`].
//! Calls are single round-trips with no retry.

use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider, ProviderError, RpcError};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, H256, U256};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::errors::OracleError;
use crate::prelude::Result;
use crate::Error;

/// Current EIP-1559 fee suggestions. Either field may be missing on chains
/// that do not report it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeeSuggestions {
    pub max_fee_per_gas: Option<U256>,
    pub max_priority_fee_per_gas: Option<U256>,
}

/// Pending transaction returned by a broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionHandle {
    pub hash: H256,
}

#[async_trait]
pub trait NetworkOracle: Send + Sync {
    async fn chain_id(&self) -> std::result::Result<u64, OracleError>;

    async fn transaction_count(&self, address: Address) -> std::result::Result<U256, OracleError>;

    /// `request.to()` is `None` for contract creation; implementations must
    /// forward that as an omitted field.
    async fn estimate_gas(&self, request: &TypedTransaction) -> std::result::Result<U256, OracleError>;

    async fn fee_suggestions(&self) -> std::result::Result<FeeSuggestions, OracleError>;

    async fn broadcast_raw(&self, raw: Bytes) -> std::result::Result<TransactionHandle, OracleError>;
}

/// JSON-RPC backed oracle
#[derive(Debug, Clone)]
pub struct RpcOracle {
    provider: Provider<Http>,
}

impl RpcOracle {
    pub fn new(rpc_url: &str) -> Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| Error::Config(format!("invalid RPC_URL {rpc_url}: {e}")))?;
        Ok(Self { provider })
    }

    /// Underlying provider, for contract state reads outside the signer.
    pub fn provider(&self) -> &Provider<Http> {
        &self.provider
    }
}

fn classify(e: ProviderError) -> OracleError {
    match e.as_error_response() {
        Some(response) => OracleError::Rejected(response.message.clone()),
        None => OracleError::Unavailable(e.to_string()),
    }
}

#[async_trait]
impl NetworkOracle for RpcOracle {
    async fn chain_id(&self) -> std::result::Result<u64, OracleError> {
        let chain_id = self.provider.get_chainid().await.map_err(classify)?;
        Ok(chain_id.as_u64())
    }

    async fn transaction_count(&self, address: Address) -> std::result::Result<U256, OracleError> {
        self.provider
            .get_transaction_count(address, None)
            .await
            .map_err(classify)
    }

    async fn estimate_gas(&self, request: &TypedTransaction) -> std::result::Result<U256, OracleError> {
        self.provider
            .estimate_gas(request, None)
            .await
            .map_err(classify)
    }

    async fn fee_suggestions(&self) -> std::result::Result<FeeSuggestions, OracleError> {
        let (max_fee_per_gas, max_priority_fee_per_gas) = self
            .provider
            .estimate_eip1559_fees(None)
            .await
            .map_err(classify)?;
        Ok(FeeSuggestions {
            max_fee_per_gas: Some(max_fee_per_gas),
            max_priority_fee_per_gas: Some(max_priority_fee_per_gas),
        })
    }

    async fn broadcast_raw(&self, raw: Bytes) -> std::result::Result<TransactionHandle, OracleError> {
        let pending = self
            .provider
            .send_raw_transaction(raw)
            .await
            .map_err(classify)?;
        let hash = pending.tx_hash();
        debug!("Broadcast accepted: 0x{:x}", hash);
        Ok(TransactionHandle { hash })
    }
}
