//! Base mainnet address book and signer defaults

use ethers::abi::{self, Token};
use ethers::types::{Address, Bytes, U256};

use crate::prelude::Result;
use crate::Error;

/// Base chain id
pub const BASE_CHAIN_ID: u64 = 8453;

pub const DEFAULT_RPC_URL: &str = "https://mainnet.base.org";

/// First account of the standard Ethereum derivation tree
pub const DEFAULT_DERIVATION_PATH: &str = "44'/60'/0'/0/0";

/// Uniswap V4 contracts on Base
pub const POOL_MANAGER: &str = "0x498581ff718922c3f8e6a244956af099b2652b2b";
pub const POSITION_MANAGER: &str = "0x7c5f5a4bbd8fd63184577525326123b519429bdc";
pub const STATE_VIEW: &str = "0xa3c0c9b65bad0b08107aa264b0f3db444b867a71";
pub const PERMIT2: &str = "0x000000000022D473030F116dDEE9F6B43aC78BA3";

/// USDC contract address (6 decimals)
pub const USDC: &str = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913";
pub const USDC_DECIMALS: u8 = 6;

/// ERC-20 `transfer(address,uint256)` selector
const TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];

/// Parse one of the address constants above (or any `0x` address string)
pub fn parse_address(value: &str) -> Result<Address> {
    value
        .parse()
        .map_err(|e| Error::Config(format!("invalid address {value}: {e}")))
}

pub fn usdc_address() -> Result<Address> {
    parse_address(USDC)
}

pub fn position_manager_address() -> Result<Address> {
    parse_address(POSITION_MANAGER)
}

pub fn permit2_address() -> Result<Address> {
    parse_address(PERMIT2)
}

/// Create ERC-20 transfer calldata
pub fn erc20_transfer_data(to: Address, amount: U256) -> Bytes {
    let mut data = TRANSFER_SELECTOR.to_vec();
    data.extend(abi::encode(&[Token::Address(to), Token::Uint(amount)]));
    data.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_book_parses() {
        assert!(usdc_address().is_ok());
        assert!(position_manager_address().is_ok());
        assert!(permit2_address().is_ok());
        assert!(parse_address(POOL_MANAGER).is_ok());
        assert!(parse_address(STATE_VIEW).is_ok());
        assert!(matches!(parse_address("0x1234"), Err(Error::Config(_))));
    }

    #[test]
    fn test_erc20_transfer_data_layout() {
        let to: Address = "0x1234567890123456789012345678901234567890".parse().unwrap();
        let data = erc20_transfer_data(to, U256::from(1_000_000u64));
        assert_eq!(data.len(), 4 + 32 + 32);
        assert_eq!(&data[..4], &TRANSFER_SELECTOR);
        assert_eq!(&data[16..36], to.as_bytes());
        assert_eq!(U256::from_big_endian(&data[36..68]), U256::from(1_000_000u64));
    }
}
