//! Signer selection from the process environment.
//!
//! | variable          | meaning                                   |
//! |-------------------|-------------------------------------------|
//! | `SIGNER_TYPE`     | `local` or `ledger` (required)            |
//! | `RPC_URL`         | JSON-RPC endpoint, defaults to Base       |
//! | `PRIVATE_KEY`     | hex key, required for `local`             |
//! | `DERIVATION_PATH` | device account path, `44'/60'/0'/0/0`    |

use std::fmt;
use std::str::FromStr;

use log::info;

use crate::consts::{DEFAULT_DERIVATION_PATH, DEFAULT_RPC_URL};
use crate::oracle::RpcOracle;
use crate::prelude::Result;
use crate::signer::{DeviceConnector, DeviceCustody, DeviceSigner, LocalCustody, LocalSigner, Signer};
use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignerKind {
    Local,
    Ledger,
}

impl FromStr for SignerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(SignerKind::Local),
            "ledger" => Ok(SignerKind::Ledger),
            other => Err(Error::Config(format!(
                "SIGNER_TYPE must be `local` or `ledger`, got `{other}`"
            ))),
        }
    }
}

impl fmt::Display for SignerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignerKind::Local => write!(f, "local"),
            SignerKind::Ledger => write!(f, "ledger"),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct SignerConfig {
    pub kind: SignerKind,
    pub rpc_url: String,
    pub private_key: Option<String>,
    pub derivation_path: String,
}

// Keeps the private key out of logs
impl fmt::Debug for SignerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignerConfig")
            .field("kind", &self.kind)
            .field("rpc_url", &self.rpc_url)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("derivation_path", &self.derivation_path)
            .finish()
    }
}

impl SignerConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let kind: SignerKind = non_empty("SIGNER_TYPE")
            .ok_or_else(|| Error::Config("SIGNER_TYPE is not set".to_string()))?
            .parse()?;
        let private_key = non_empty("PRIVATE_KEY");
        if kind == SignerKind::Local && private_key.is_none() {
            return Err(Error::Config(
                "PRIVATE_KEY is required when SIGNER_TYPE=local".to_string(),
            ));
        }

        Ok(Self {
            kind,
            rpc_url: non_empty("RPC_URL").unwrap_or_else(|| DEFAULT_RPC_URL.to_string()),
            private_key,
            derivation_path: non_empty("DERIVATION_PATH")
                .unwrap_or_else(|| DEFAULT_DERIVATION_PATH.to_string()),
        })
    }

    pub fn oracle(&self) -> Result<RpcOracle> {
        RpcOracle::new(&self.rpc_url)
    }

    pub fn local_signer(&self) -> Result<LocalSigner> {
        if self.kind != SignerKind::Local {
            return Err(Error::Config(format!(
                "SIGNER_TYPE is {}, not local",
                self.kind
            )));
        }
        let key = self
            .private_key
            .as_deref()
            .ok_or_else(|| Error::Config("PRIVATE_KEY is not set".to_string()))?;
        info!("Using local signer via {}", self.rpc_url);
        Ok(Signer::new(LocalCustody::from_private_key(key)?, self.oracle()?))
    }

    /// `connector` is the HID (or other) driver for the hardware device.
    pub fn device_signer<D: DeviceConnector>(&self, connector: D) -> Result<DeviceSigner<D>> {
        if self.kind != SignerKind::Ledger {
            return Err(Error::Config(format!(
                "SIGNER_TYPE is {}, not ledger",
                self.kind
            )));
        }
        info!(
            "Using ledger signer at {} via {}",
            self.derivation_path, self.rpc_url
        );
        Ok(Signer::new(
            DeviceCustody::new(connector, self.derivation_path.clone()),
            self.oracle()?,
        ))
    }
}
