use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, Eip1559TransactionRequest, U256};
use log::debug;

use crate::errors::Backend;
use crate::oracle::NetworkOracle;
use crate::prelude::Result;
use crate::unsigned::components::is_usable_nonce;
use crate::unsigned::{NonceSource, TransactionIntent, UnsignedTransactionComponents};
use crate::Error;

/// Fills in everything a [`TransactionIntent`] leaves open and produces the
/// canonical unsigned type-2 record. Shared by every custody backend.
pub struct UnsignedTransactionBuilder<'a, O: ?Sized> {
    oracle: &'a O,
    backend: Backend,
}

impl<'a, O> UnsignedTransactionBuilder<'a, O>
where
    O: NetworkOracle + ?Sized,
{
    pub fn new(oracle: &'a O, backend: Backend) -> Self {
        Self { oracle, backend }
    }

    pub async fn build(
        &self,
        from: Address,
        intent: &TransactionIntent,
        tracked_nonce: Option<U256>,
    ) -> Result<UnsignedTransactionComponents> {
        intent.validate()?;

        let chain_id = match intent.chain_id {
            Some(chain_id) => chain_id,
            None => self
                .oracle
                .chain_id()
                .await
                .map_err(|e| e.into_error(self.backend, "chain_id"))?,
        };

        let (nonce, nonce_source) = match (intent.nonce, tracked_nonce) {
            (Some(nonce), _) => (nonce, NonceSource::Explicit),
            (None, Some(nonce)) => (nonce, NonceSource::Tracked),
            (None, None) => {
                let nonce = self
                    .oracle
                    .transaction_count(from)
                    .await
                    .map_err(|e| e.into_error(self.backend, "transaction_count"))?;
                (nonce, NonceSource::Network)
            }
        };
        if !is_usable_nonce(nonce) {
            return Err(Error::ArithmeticOverflow("nonce"));
        }
        debug!("Using nonce {} ({:?}) for {:?}", nonce, nonce_source, from);

        let gas_limit = match intent.gas_limit {
            Some(gas_limit) => gas_limit,
            None => {
                let request = estimate_request(from, intent);
                self.oracle
                    .estimate_gas(&request)
                    .await
                    .map_err(|e| e.into_error(self.backend, "estimate_gas"))?
            }
        };

        let (max_fee_per_gas, max_priority_fee_per_gas) = self.resolve_fees(intent).await?;

        let mut request = Eip1559TransactionRequest::new()
            .from(from)
            .chain_id(chain_id)
            .nonce(nonce)
            .gas(gas_limit)
            .max_fee_per_gas(max_fee_per_gas)
            .max_priority_fee_per_gas(max_priority_fee_per_gas)
            .value(intent.value.unwrap_or_default())
            .data(intent.data.clone().unwrap_or_default());
        if let Some(to) = intent.to {
            request = request.to(to);
        }

        let tx = TypedTransaction::Eip1559(request);
        let serialized = tx.rlp();

        Ok(UnsignedTransactionComponents {
            tx,
            nonce,
            nonce_source,
            serialized,
        })
    }

    async fn resolve_fees(&self, intent: &TransactionIntent) -> Result<(U256, U256)> {
        if let (Some(max_fee), Some(priority_fee)) =
            (intent.max_fee_per_gas, intent.max_priority_fee_per_gas)
        {
            return Ok((max_fee, priority_fee));
        }

        let suggestions = self
            .oracle
            .fee_suggestions()
            .await
            .map_err(|e| e.into_error(self.backend, "fee_suggestions"))?;

        let max_fee = intent
            .max_fee_per_gas
            .or(suggestions.max_fee_per_gas)
            .ok_or_else(|| self.missing_fee("maxFeePerGas"))?;
        let priority_fee = intent
            .max_priority_fee_per_gas
            .or(suggestions.max_priority_fee_per_gas)
            .ok_or_else(|| self.missing_fee("maxPriorityFeePerGas"))?;

        Ok((max_fee, priority_fee))
    }

    fn missing_fee(&self, field: &str) -> Error {
        Error::NetworkUnavailable {
            backend: self.backend,
            operation: "fee_suggestions",
            message: format!("oracle returned no {field}"),
        }
    }
}

/// Gas estimation request. The recipient is left out entirely for contract
/// creation rather than sent as a null placeholder.
fn estimate_request(from: Address, intent: &TransactionIntent) -> TypedTransaction {
    let mut request = Eip1559TransactionRequest::new().from(from);
    if let Some(to) = intent.to {
        request = request.to(to);
    }
    if let Some(value) = intent.value {
        request = request.value(value);
    }
    if let Some(data) = &intent.data {
        request = request.data::<Bytes>(data.clone());
    }
    TypedTransaction::Eip1559(request)
}
