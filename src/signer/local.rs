use std::str::FromStr;

use async_trait::async_trait;
use ethers::signers::{LocalWallet, Signer as _};
use ethers::types::{Address, Signature};
use serde::Serialize;

use crate::errors::Backend;
use crate::prelude::Result;
use crate::signer::Custody;
use crate::unsigned::UnsignedTransactionComponents;
use crate::Error;

/// In-process private key
#[derive(Debug, Clone)]
pub struct LocalCustody {
    wallet: LocalWallet,
}

/// Freshly generated key pair
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedWallet {
    pub address: Address,
    pub private_key: String,
}

impl LocalCustody {
    pub fn new(wallet: LocalWallet) -> Self {
        Self { wallet }
    }

    pub fn from_private_key(private_key: &str) -> Result<Self> {
        let key = private_key.trim();
        let key = key.strip_prefix("0x").unwrap_or(key);
        let wallet = LocalWallet::from_str(key).map_err(|e| Error::PrivateKeyParse(e.to_string()))?;
        Ok(Self { wallet })
    }

    /// Random key pair from the thread RNG
    pub fn generate() -> (Self, GeneratedWallet) {
        let wallet = LocalWallet::new(&mut rand::thread_rng());
        let generated = GeneratedWallet {
            address: wallet.address(),
            private_key: format!("0x{}", hex::encode(wallet.signer().to_bytes())),
        };
        (Self { wallet }, generated)
    }

    pub fn wallet_address(&self) -> Address {
        self.wallet.address()
    }
}

#[async_trait]
impl Custody for LocalCustody {
    fn backend(&self) -> Backend {
        Backend::Local
    }

    async fn address(&mut self) -> Result<Address> {
        Ok(self.wallet.address())
    }

    async fn sign(&mut self, unsigned: &UnsignedTransactionComponents) -> Result<Signature> {
        self.wallet
            .sign_transaction_sync(&unsigned.tx)
            .map_err(|e| Error::SignatureFailure(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Key was randomly generated for testing and shouldn't be used with any real funds
    const TEST_KEY: &str = "e908f86dbb4d55ac876378565aafeabc187f6690f046459397b17d9b9a19688e";

    #[test]
    fn test_private_key_with_and_without_prefix() {
        let bare = LocalCustody::from_private_key(TEST_KEY).unwrap();
        let prefixed = LocalCustody::from_private_key(&format!("0x{TEST_KEY}")).unwrap();
        assert_eq!(bare.wallet_address(), prefixed.wallet_address());
    }

    #[test]
    fn test_invalid_private_key() {
        assert!(matches!(
            LocalCustody::from_private_key("not-a-key"),
            Err(Error::PrivateKeyParse(_))
        ));
    }

    #[test]
    fn test_generated_wallet_round_trips() {
        let (custody, generated) = LocalCustody::generate();
        assert_eq!(custody.wallet_address(), generated.address);
        assert_eq!(generated.private_key.len(), 66);

        let restored = LocalCustody::from_private_key(&generated.private_key).unwrap();
        assert_eq!(restored.wallet_address(), generated.address);
    }
}
