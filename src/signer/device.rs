use async_trait::async_trait;
use ethers::types::{Address, Signature, U256};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::errors::{Backend, DeviceError};
use crate::prelude::Result;
use crate::signer::Custody;
use crate::unsigned::UnsignedTransactionComponents;
use crate::Error;

/// Optional metadata resolution the Ethereum app can perform before display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionConfig {
    pub erc20: bool,
    pub external_plugins: bool,
    pub nft: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceAddress {
    pub public_key: String,
    pub address: String,
}

/// Signature components as hex strings, without `0x`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSignature {
    pub v: String,
    pub r: String,
    pub s: String,
}

impl DeviceSignature {
    /// Signature with `v` reduced to the y-parity used by type-2 transactions.
    pub fn to_signature(&self) -> Result<Signature> {
        let r = parse_word(&self.r, "r")?;
        let s = parse_word(&self.s, "s")?;
        let v = u64::from_str_radix(strip_hex_prefix(&self.v), 16)
            .map_err(|e| Error::DeviceProtocol(format!("invalid v {:?}: {e}", self.v)))?;
        Ok(Signature {
            r,
            s,
            v: y_parity(v)?,
        })
    }
}

fn strip_hex_prefix(value: &str) -> &str {
    value.strip_prefix("0x").unwrap_or(value)
}

fn parse_word(value: &str, name: &str) -> Result<U256> {
    let bytes = hex::decode(strip_hex_prefix(value))
        .map_err(|e| Error::DeviceProtocol(format!("invalid {name} {value:?}: {e}")))?;
    if bytes.len() > 32 {
        return Err(Error::DeviceProtocol(format!(
            "{name} is {} bytes long",
            bytes.len()
        )));
    }
    Ok(U256::from_big_endian(&bytes))
}

fn y_parity(v: u64) -> Result<u64> {
    match v {
        0 | 1 => Ok(v),
        27 | 28 => Ok(v - 27),
        v if v >= 35 => Ok((v - 35) % 2),
        v => Err(Error::DeviceProtocol(format!("unexpected v value {v}"))),
    }
}

/// Ethereum application session running over an open transport.
#[async_trait]
pub trait EthApp: Send {
    async fn get_address(&mut self, path: &str) -> std::result::Result<DeviceAddress, DeviceError>;

    /// Blocks until the operator approves or rejects on the device.
    async fn sign_transaction(
        &mut self,
        path: &str,
        unsigned_hex: &str,
        resolution: Option<&ResolutionConfig>,
    ) -> std::result::Result<DeviceSignature, DeviceError>;
}

#[async_trait]
pub trait DeviceTransport: Send {
    async fn close(&mut self) -> std::result::Result<(), DeviceError>;
}

/// Opens transports to a hardware device and binds the Ethereum app to them.
#[async_trait]
pub trait DeviceConnector: Send + Sync {
    type Transport: DeviceTransport;
    type App: EthApp;

    async fn open(&self) -> std::result::Result<Self::Transport, DeviceError>;

    fn app(&self, transport: &Self::Transport) -> Self::App;
}

/// Hardware device custody. The transport and app session are opened on
/// first use and kept until [`DeviceCustody::disconnect`].
pub struct DeviceCustody<D: DeviceConnector> {
    connector: D,
    derivation_path: String,
    resolution: Option<ResolutionConfig>,
    transport: Option<D::Transport>,
    app: Option<D::App>,
}

impl<D: DeviceConnector> DeviceCustody<D> {
    pub fn new(connector: D, derivation_path: impl Into<String>) -> Self {
        Self {
            connector,
            derivation_path: derivation_path.into(),
            resolution: None,
            transport: None,
            app: None,
        }
    }

    /// Ask the device to resolve token or plugin metadata before display.
    pub fn with_resolution(mut self, resolution: ResolutionConfig) -> Self {
        self.resolution = Some(resolution);
        self
    }

    pub fn resolution(&self) -> Option<&ResolutionConfig> {
        self.resolution.as_ref()
    }

    pub fn derivation_path(&self) -> &str {
        &self.derivation_path
    }

    pub fn is_connected(&self) -> bool {
        self.app.is_some()
    }

    pub async fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }
        debug!("Opening hardware device transport");
        let transport = self.connector.open().await?;
        self.app = Some(self.connector.app(&transport));
        self.transport = Some(transport);
        info!("Connected to hardware device");
        Ok(())
    }

    /// Drop the app session and close the transport. A no-op when already
    /// disconnected.
    pub async fn disconnect(&mut self) -> Result<()> {
        self.app = None;
        if let Some(mut transport) = self.transport.take() {
            transport.close().await?;
            info!("Disconnected from hardware device");
        }
        Ok(())
    }

    async fn session(&mut self) -> Result<&mut D::App> {
        self.connect().await?;
        self.app
            .as_mut()
            .ok_or_else(|| Error::DeviceUnavailable("device session is not open".to_string()))
    }
}

#[async_trait]
impl<D: DeviceConnector> Custody for DeviceCustody<D> {
    fn backend(&self) -> Backend {
        Backend::Device
    }

    async fn address(&mut self) -> Result<Address> {
        let path = self.derivation_path.clone();
        let reply = self.session().await?.get_address(&path).await?;
        reply
            .address
            .parse()
            .map_err(|e| Error::DeviceProtocol(format!("invalid address {:?}: {e}", reply.address)))
    }

    async fn sign(&mut self, unsigned: &UnsignedTransactionComponents) -> Result<Signature> {
        let path = self.derivation_path.clone();
        let payload = unsigned.device_payload_hex();
        let resolution = self.resolution;
        debug!("Requesting device signature over 0x{:x}", unsigned.sighash());
        info!("Please confirm the transaction on your device...");
        let reply = self
            .session()
            .await?
            .sign_transaction(&path, &payload, resolution.as_ref())
            .await?;
        reply.to_signature()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_signature_parses_parity() {
        let sig = DeviceSignature {
            v: "01".to_string(),
            r: "11".repeat(32),
            s: "0x22".to_string(),
        }
        .to_signature()
        .unwrap();
        assert_eq!(sig.v, 1);
        assert_eq!(sig.r, U256::from_big_endian(&[0x11; 32]));
        assert_eq!(sig.s, U256::from(0x22u64));
    }

    #[test]
    fn test_y_parity_normalization() {
        assert_eq!(y_parity(0).unwrap(), 0);
        assert_eq!(y_parity(28).unwrap(), 1);
        // eip-155 style v for chain 8453: 8453 * 2 + 35 + 1
        assert_eq!(y_parity(16942).unwrap(), 1);
        assert!(y_parity(5).is_err());
    }

    #[test]
    fn test_device_signature_rejects_garbage() {
        let bad = DeviceSignature {
            v: "zz".to_string(),
            r: "11".to_string(),
            s: "22".to_string(),
        };
        assert!(matches!(bad.to_signature(), Err(Error::DeviceProtocol(_))));

        let too_long = DeviceSignature {
            v: "00".to_string(),
            r: "11".repeat(33),
            s: "22".to_string(),
        };
        assert!(matches!(too_long.to_signature(), Err(Error::DeviceProtocol(_))));
    }
}
