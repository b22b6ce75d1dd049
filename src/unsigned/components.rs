use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, Signature, H256, U256};
use ethers::utils::keccak256;
use serde::{Deserialize, Serialize};

use crate::prelude::Result;
use crate::Error;

/// What the caller wants done. Every field except the recipient/payload pair
/// is optional and filled in by field inference before signing.
///
/// `to: None` means contract creation. It is never the same thing as
/// `Some(Address::zero())`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionIntent {
    pub to: Option<Address>,
    pub value: Option<U256>,
    pub data: Option<Bytes>,
    pub nonce: Option<U256>,
    pub gas_limit: Option<U256>,
    pub max_fee_per_gas: Option<U256>,
    pub max_priority_fee_per_gas: Option<U256>,
    pub chain_id: Option<u64>,
}

impl TransactionIntent {
    /// Contract call (or plain send when `data` is empty)
    pub fn call(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            to: Some(to),
            data: Some(data.into()),
            ..Default::default()
        }
    }

    pub fn transfer(to: Address, value: U256) -> Self {
        Self {
            to: Some(to),
            value: Some(value),
            ..Default::default()
        }
    }

    pub fn deploy(init_code: impl Into<Bytes>) -> Self {
        Self {
            data: Some(init_code.into()),
            ..Default::default()
        }
    }

    pub fn value(mut self, value: U256) -> Self {
        self.value = Some(value);
        self
    }

    pub fn nonce(mut self, nonce: impl Into<U256>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    pub fn gas_limit(mut self, gas_limit: impl Into<U256>) -> Self {
        self.gas_limit = Some(gas_limit.into());
        self
    }

    pub fn max_fee_per_gas(mut self, fee: impl Into<U256>) -> Self {
        self.max_fee_per_gas = Some(fee.into());
        self
    }

    pub fn max_priority_fee_per_gas(mut self, fee: impl Into<U256>) -> Self {
        self.max_priority_fee_per_gas = Some(fee.into());
        self
    }

    pub fn chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    pub fn is_contract_creation(&self) -> bool {
        self.to.is_none()
    }

    fn has_payload(&self) -> bool {
        self.data.as_ref().map_or(false, |data| !data.is_empty())
    }

    /// Reject requests that cannot mean anything on chain.
    pub fn validate(&self) -> Result<()> {
        if self.is_contract_creation() && !self.has_payload() {
            return Err(Error::InvalidIntent {
                field: "to",
                reason: "contract creation requires init code in `data`".to_string(),
            });
        }
        if let Some(nonce) = self.nonce {
            if !is_usable_nonce(nonce) {
                return Err(Error::InvalidIntent {
                    field: "nonce",
                    reason: format!("{nonce} is not below 2^64 - 1"),
                });
            }
        }
        Ok(())
    }
}

/// Account nonces stop at 2^64 - 2 (EIP-2681).
pub(crate) fn is_usable_nonce(nonce: U256) -> bool {
    nonce < U256::from(u64::MAX)
}

/// Where the nonce of a built transaction came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceSource {
    Explicit,
    Tracked,
    Network,
}

/// Fully inferred, not yet signed, type-2 transaction.
#[derive(Debug, Clone)]
pub struct UnsignedTransactionComponents {
    pub tx: TypedTransaction,
    pub nonce: U256,
    pub nonce_source: NonceSource,
    /// Canonical unsigned encoding, leading type byte included
    pub serialized: Bytes,
}

impl UnsignedTransactionComponents {
    /// Unsigned encoding without its leading type byte, hex without `0x`.
    /// This is what the hardware Ethereum app expects.
    pub fn device_payload_hex(&self) -> String {
        hex::encode(self.serialized.get(1..).unwrap_or_default())
    }

    /// Keccak of the unsigned encoding
    pub fn sighash(&self) -> H256 {
        self.tx.sighash()
    }
}

/// Broadcast-ready transaction and its content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedTransaction {
    pub raw_transaction: Bytes,
    pub hash: H256,
}

impl SignedTransaction {
    pub fn new(tx: &TypedTransaction, signature: &Signature) -> Self {
        let raw_transaction = tx.rlp_signed(signature);
        let hash = H256::from(keccak256(&raw_transaction));
        Self {
            raw_transaction,
            hash,
        }
    }

    /// Recompute the hash from the serialized bytes alone.
    pub fn verify_hash(&self) -> bool {
        H256::from(keccak256(&self.raw_transaction)) == self.hash
    }
}
