//! Sign a USDC transfer with the local signer from `.env`, and broadcast it
//! when `--broadcast` is passed.
//!
//! Usage: send_usdc <recipient> <amount in USDC base units> [--broadcast]

use custody_lp::consts::{erc20_transfer_data, parse_address, usdc_address};
use custody_lp::prelude::Result;
use custody_lp::{Error, SignerConfig, TransactionIntent};
use ethers::types::U256;
use log::{error, info};

async fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 2 {
        return Err(Error::Config(
            "usage: send_usdc <recipient> <amount> [--broadcast]".to_string(),
        ));
    }
    let recipient = parse_address(&args[0])?;
    let amount = U256::from_dec_str(&args[1])
        .map_err(|e| Error::Config(format!("invalid amount {:?}: {e}", args[1])))?;
    let broadcast = args.iter().skip(2).any(|arg| arg == "--broadcast");

    let config = SignerConfig::from_env()?;
    let mut signer = config.local_signer()?;
    info!("Signer address: {:?}", signer.get_address().await?);

    let intent = TransactionIntent::call(usdc_address()?, erc20_transfer_data(recipient, amount));

    if broadcast {
        let handle = signer.send_transaction(&intent).await?;
        println!("0x{:x}", handle.hash);
    } else {
        let signed = signer.sign_transaction(&intent).await?;
        let json = serde_json::to_string_pretty(&signed)
            .map_err(|e| Error::SignatureFailure(e.to_string()))?;
        println!("{json}");
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::init();

    if let Err(e) = run().await {
        error!("send_usdc failed: {e}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
