//! Transaction signing over interchangeable custody backends, plus the
//! concentrated-liquidity math needed to size a single-sided position.
//!
//! ```no_run
//! use custody_lp::{SignerConfig, TransactionIntent};
//! use ethers::types::U256;
//!
//! # async fn run() -> custody_lp::prelude::Result<()> {
//! let config = SignerConfig::from_env()?;
//! let mut signer = config.local_signer()?;
//! let to = custody_lp::consts::usdc_address()?;
//! let handle = signer
//!     .send_transaction(&TransactionIntent::transfer(to, U256::zero()))
//!     .await?;
//! println!("sent 0x{:x}", handle.hash);
//! # Ok(())
//! # }
//! ```

pub mod amm;
mod config;
pub mod consts;
mod errors;
pub mod oracle;
pub mod prelude;
pub mod signer;
mod unsigned;

pub use amm::{
    derive_single_sided_range, plan_single_sided_position, LiquidityPosition, PoolKey,
    PositionSide, PriceBand, SingleSidedRangeParams, TickRange,
};
pub use config::{SignerConfig, SignerKind};
pub use errors::{Backend, DeviceError, Error, OracleError};
pub use oracle::{FeeSuggestions, NetworkOracle, RpcOracle, TransactionHandle};
pub use signer::{
    Custody, DeviceAddress, DeviceConnector, DeviceCustody, DeviceSignature, DeviceSigner,
    DeviceTransport, EthApp, GeneratedWallet, LocalCustody, LocalSigner, ResolutionConfig, Signer,
    SignerSession,
};
pub use unsigned::{
    NonceSource, SignedTransaction, TransactionIntent, UnsignedTransactionBuilder,
    UnsignedTransactionComponents,
};
