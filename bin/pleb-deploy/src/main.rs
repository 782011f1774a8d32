/* This file is part of DePlebs DAO
 *
 * Copyright (C) 2022-2025 DePlebs developers
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use std::{path::Path, process::exit, sync::Arc};

use ethers::{
    prelude::*,
    solc::{CompilerInput, Solc},
    utils::parse_ether,
};
use eyre::{ensure, eyre, Result, WrapErr as _};
use log::info;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "pleb-deploy", about = "One-shot deployer for the DePlebs DAO contracts")]
struct Args {
    #[structopt(short, long, default_value = "http://127.0.0.1:8545")]
    /// Ethereum JSON-RPC endpoint
    endpoint: String,

    #[structopt(long)]
    /// Hex private key of the deploying account
    private_key: String,

    #[structopt(long)]
    /// Address of the existing DePlebs NFT contract
    nft: String,

    #[structopt(long, default_value = "0.2")]
    /// Initial DAO treasury funding, in ether
    funding: f64,
}

/// Compile a single Solidity source and return the named contract's
/// ABI and creation bytecode.
fn compile(source: &Path, name: &str) -> Result<(ethers::abi::Abi, Bytes)> {
    let input = CompilerInput::new(source)
        .wrap_err_with(|| format!("could not load contract source {}", source.display()))?
        .first()
        .ok_or_else(|| eyre!("empty compiler input for {}", source.display()))?
        .clone();

    let compiled = Solc::default()
        .compile(&input)
        .wrap_err_with(|| format!("could not compile {name}"))?;
    ensure!(!compiled.has_error(), "compiler errors in {name}: {:?}", compiled.errors);

    let (abi, bytecode, _) = compiled
        .find(name)
        .ok_or_else(|| eyre!("could not find contract {name} in compiler output"))?
        .into_parts_or_default();

    Ok((abi, bytecode))
}

async fn realmain(args: Args) -> Result<()> {
    let nft_address: Address = args
        .nft
        .trim_start_matches("0x")
        .parse()
        .wrap_err("invalid NFT contract address")?;

    let provider = Provider::<Http>::try_from(args.endpoint.as_str())?;
    let chain_id = provider.get_chainid().await.wrap_err("failed to reach the endpoint")?;
    let wallet: LocalWallet = args
        .private_key
        .trim_start_matches("0x")
        .parse()
        .wrap_err("invalid private key")?;
    let wallet = wallet.with_chain_id(chain_id.as_u64());
    let client = Arc::new(SignerMiddleware::new(provider, wallet));

    // Deploy the mock marketplace first, the DAO constructor needs
    // its address.
    info!("Compiling FakeNFTMarketplace");
    let source = Path::new(env!("CARGO_MANIFEST_DIR")).join("contracts/FakeNFTMarketplace.sol");
    let (abi, bytecode) = compile(&source, "FakeNFTMarketplace")?;

    info!("Deploying FakeNFTMarketplace");
    let factory = ContractFactory::new(abi, bytecode, client.clone());
    let marketplace = factory
        .deploy(())?
        .send()
        .await
        .wrap_err("failed to deploy FakeNFTMarketplace")?;
    println!("FakeNFTMarketplace deployed to: {:?}", marketplace.address());

    // Now the DAO itself
    info!("Compiling DePlebsDAO");
    let source = Path::new(env!("CARGO_MANIFEST_DIR")).join("contracts/DePlebsDAO.sol");
    let (abi, bytecode) = compile(&source, "DePlebsDAO")?;

    info!("Deploying DePlebsDAO");
    let factory = ContractFactory::new(abi, bytecode, client.clone());
    let dao = factory
        .deploy((marketplace.address(), nft_address))?
        .send()
        .await
        .wrap_err("failed to deploy DePlebsDAO")?;
    println!("DePlebsDAO deployed to: {:?}", dao.address());

    // Seed the DAO treasury so passed proposals can actually purchase
    let funding = parse_ether(args.funding).wrap_err("invalid funding amount")?;
    if !funding.is_zero() {
        info!("Funding DAO treasury with {} ETH", args.funding);
        let receipt = client
            .send_transaction(TransactionRequest::pay(dao.address(), funding), None)
            .await
            .wrap_err("failed to submit the funding transaction")?
            .await
            .wrap_err("failed awaiting the funding transaction")?
            .ok_or_else(|| eyre!("no receipt for the funding transaction"))?;
        ensure!(receipt.status == Some(U64::from(1)), "funding transaction failed: {receipt:?}");
        println!("DAO treasury funded with {} ETH", args.funding);
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::from_args();

    if let Err(e) = TermLogger::init(
        LevelFilter::Info,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ) {
        eprintln!("Failed initializing logger: {e}");
    }

    if let Err(e) = realmain(args).await {
        eprintln!("Deployment failed: {e:#}");
        exit(1);
    }
}
