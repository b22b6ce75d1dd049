//! One signing contract over two custody backends.
//!
//! [`Signer`] owns the session state and the shared field inference
//! ([`UnsignedTransactionBuilder`]); a [`Custody`] backend only resolves the
//! account address and produces a signature over the canonical unsigned
//! record.
//!
//! A signer is single-writer: every operation takes `&mut self` and callers
//! that share one must serialize access themselves.

mod device;
mod local;

pub use device::{
    DeviceAddress, DeviceConnector, DeviceCustody, DeviceSignature, DeviceTransport, EthApp,
    ResolutionConfig,
};
pub use local::{GeneratedWallet, LocalCustody};

use async_trait::async_trait;
use ethers::types::{Address, Signature, U256};
use log::{info, warn};

use crate::errors::Backend;
use crate::Error;
use crate::oracle::{NetworkOracle, RpcOracle, TransactionHandle};
use crate::prelude::Result;
use crate::unsigned::{
    SignedTransaction, TransactionIntent, UnsignedTransactionBuilder, UnsignedTransactionComponents,
};

#[async_trait]
pub trait Custody: Send {
    fn backend(&self) -> Backend;

    async fn address(&mut self) -> Result<Address>;

    async fn sign(&mut self, unsigned: &UnsignedTransactionComponents) -> Result<Signature>;
}

/// Per-signer mutable state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignerSession {
    address: Option<Address>,
    next_nonce: Option<U256>,
}

impl SignerSession {
    pub fn address(&self) -> Option<Address> {
        self.address
    }

    pub fn next_nonce(&self) -> Option<U256> {
        self.next_nonce
    }

    fn cache_address(&mut self, address: Address) -> Address {
        *self.address.get_or_insert(address)
    }

    /// Continue the sequence from the nonce actually used, whatever its source.
    fn record_signed_nonce(&mut self, used: U256) -> Result<()> {
        let next = used
            .checked_add(U256::one())
            .ok_or(Error::ArithmeticOverflow("nonce"))?;
        self.next_nonce = Some(next);
        Ok(())
    }
}

pub struct Signer<C, O> {
    custody: C,
    oracle: O,
    session: SignerSession,
}

pub type LocalSigner<O = RpcOracle> = Signer<LocalCustody, O>;
pub type DeviceSigner<D, O = RpcOracle> = Signer<DeviceCustody<D>, O>;

impl<C, O> Signer<C, O>
where
    C: Custody,
    O: NetworkOracle,
{
    pub fn new(custody: C, oracle: O) -> Self {
        Self {
            custody,
            oracle,
            session: SignerSession::default(),
        }
    }

    /// Account controlled by this signer, resolved once per session.
    pub async fn get_address(&mut self) -> Result<Address> {
        if let Some(address) = self.session.address() {
            return Ok(address);
        }
        let address = self.custody.address().await?;
        Ok(self.session.cache_address(address))
    }

    /// Infer missing fields, sign, and advance the tracked nonce.
    ///
    /// Session state is untouched when any step fails.
    pub async fn sign_transaction(&mut self, intent: &TransactionIntent) -> Result<SignedTransaction> {
        intent.validate()?;
        let from = self.get_address().await?;

        let unsigned = UnsignedTransactionBuilder::new(&self.oracle, self.custody.backend())
            .build(from, intent, self.session.next_nonce())
            .await?;

        let signature = self.custody.sign(&unsigned).await?;
        let signed = SignedTransaction::new(&unsigned.tx, &signature);

        self.session.record_signed_nonce(unsigned.nonce)?;
        info!(
            "Signed transaction 0x{:x} with nonce {} ({} signer)",
            signed.hash,
            unsigned.nonce,
            self.custody.backend()
        );
        Ok(signed)
    }

    /// Sign, then broadcast. Broadcast refusals are surfaced verbatim.
    pub async fn send_transaction(&mut self, intent: &TransactionIntent) -> Result<TransactionHandle> {
        let signed = self.sign_transaction(intent).await?;
        let backend = self.custody.backend();
        let handle = self
            .oracle
            .broadcast_raw(signed.raw_transaction.clone())
            .await
            .map_err(|e| e.into_broadcast_error(backend))?;
        if handle.hash != signed.hash {
            warn!(
                "Network reported hash 0x{:x}, locally computed 0x{:x}",
                handle.hash, signed.hash
            );
        }
        info!("Broadcast transaction 0x{:x}", handle.hash);
        Ok(handle)
    }

    /// Network connection, for callers that need to read chain state.
    pub fn get_provider(&self) -> &O {
        &self.oracle
    }

    pub fn session(&self) -> &SignerSession {
        &self.session
    }

    pub fn custody(&self) -> &C {
        &self.custody
    }
}

impl<D, O> Signer<DeviceCustody<D>, O>
where
    D: DeviceConnector,
    O: NetworkOracle,
{
    pub async fn connect(&mut self) -> Result<()> {
        self.custody.connect().await
    }

    /// Release the device. Safe to call any number of times.
    pub async fn disconnect(&mut self) -> Result<()> {
        self.custody.disconnect().await
    }
}
