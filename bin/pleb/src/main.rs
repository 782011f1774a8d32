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

use std::{
    fs,
    process::exit,
    sync::atomic::AtomicU8,
};

use ethers::prelude::{Address, LocalWallet, U256};
use serde::Deserialize;
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, LevelFilter, SharedLogger, TermLogger,
    TerminalMode, WriteLogger,
};
use structopt::StructOpt;
use tokio::sync::Mutex;
use url::Url;

/// Client error types
mod error;
use error::{Error, Result};

/// CLI utility functions
mod cli_util;
use cli_util::{expand_path, get_config_path, spawn_config};

/// Ethereum JSON-RPC provider handling
mod rpc;

/// Wallet keystore handling
mod wallet;

/// ABI bindings for the external contracts
mod contract;
use contract::parse_address;

/// Session state synchronization for the DAO
mod dao;
use dao::{DaoSnapshot, VoteChoice};

/// On-chain DAO actions
mod rpc_dao;
use rpc_dao::ActionState;

/// Interactive session shell
mod interactive;

const CONFIG_FILE: &str = "pleb_config.toml";
const CONFIG_FILE_CONTENTS: &str = include_str!("../pleb_config.toml");

#[derive(Clone, Debug, StructOpt)]
#[structopt(name = "pleb", about = "Command-line client for the DePlebs DAO")]
struct Args {
    #[structopt(short, long)]
    /// Configuration file to use
    config: Option<String>,

    #[structopt(short, long)]
    /// Ethereum JSON-RPC endpoint
    endpoint: Option<String>,

    #[structopt(long)]
    /// Accepted chain ID (all other networks are rejected)
    chain_id: Option<u64>,

    #[structopt(long)]
    /// DePlebs DAO contract address
    dao: Option<String>,

    #[structopt(long)]
    /// DePlebs NFT contract address
    nft: Option<String>,

    #[structopt(long)]
    /// Path to the wallet keystore
    wallet_path: Option<String>,

    #[structopt(long)]
    /// Password to unlock the wallet keystore
    wallet_pass: Option<String>,

    #[structopt(short, long)]
    /// Answer yes to transaction confirmation prompts
    yes: bool,

    #[structopt(subcommand)]
    /// Sub command to execute
    command: Subcmd,

    #[structopt(short, long)]
    /// Set log file to output into
    log: Option<String>,

    #[structopt(short, parse(from_occurrences))]
    /// Increase verbosity (-vvv supported)
    verbose: u8,
}

#[derive(Clone, Debug, StructOpt)]
enum Subcmd {
    /// Send a ping request to the configured endpoint
    Ping,

    /// Wallet operations
    Wallet {
        #[structopt(long)]
        /// Generate a new wallet keystore
        keygen: bool,

        #[structopt(long)]
        /// Print the wallet address
        address: bool,

        #[structopt(long)]
        /// Print the wallet's native token balance
        balance: bool,
    },

    /// Show DAO membership, treasury and proposal count
    Info,

    /// List proposals, or show a single one in detail
    Proposals {
        /// Optional proposal ID to show
        id: Option<u64>,
    },

    /// Create a proposal to purchase the given marketplace NFT
    Propose {
        /// Marketplace token ID the DAO should purchase
        nft_token_id: u64,
    },

    /// Vote on an active proposal
    Vote {
        /// Proposal ID to vote on
        proposal_id: u64,

        /// Vote choice (yay/nay)
        choice: String,
    },

    /// Execute a proposal whose deadline has passed
    Exec {
        /// Proposal ID to execute
        proposal_id: u64,
    },

    /// Start an interactive session shell
    Interactive,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
/// Client configuration, read from the TOML config file.
struct Config {
    /// Ethereum JSON-RPC endpoint
    endpoint: String,
    /// Accepted chain ID
    chain_id: u64,
    /// DePlebs DAO contract address
    dao: Option<String>,
    /// DePlebs NFT contract address
    nft: Option<String>,
    /// Path to the wallet keystore
    wallet_path: String,
    /// Password to unlock the wallet keystore
    wallet_pass: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8545".to_string(),
            chain_id: 31337,
            dao: None,
            nft: None,
            wallet_path: "~/.local/deplebs/wallet.json".to_string(),
            wallet_pass: "changeme".to_string(),
        }
    }
}

impl Config {
    /// Command-line flags take precedence over the config file.
    fn merge(mut self, args: &Args) -> Self {
        if let Some(endpoint) = &args.endpoint {
            self.endpoint = endpoint.clone();
        }
        if let Some(chain_id) = args.chain_id {
            self.chain_id = chain_id;
        }
        if args.dao.is_some() {
            self.dao = args.dao.clone();
        }
        if args.nft.is_some() {
            self.nft = args.nft.clone();
        }
        if let Some(wallet_path) = &args.wallet_path {
            self.wallet_path = wallet_path.clone();
        }
        if let Some(wallet_pass) = &args.wallet_pass {
            self.wallet_pass = wallet_pass.clone();
        }
        self
    }
}

/// Session context. Owns the parsed configuration, the lazily unlocked
/// wallet, the cached DAO state snapshot and the single in-flight
/// write action slot. Everything lives and dies with the process.
pub struct Pleb {
    /// Ethereum JSON-RPC endpoint
    endpoint: Url,
    /// The single accepted chain ID for this session
    chain_id: u64,
    /// DePlebs DAO contract address
    dao: Option<Address>,
    /// DePlebs NFT contract address
    nft: Option<Address>,
    /// Path to the wallet keystore
    wallet_path: String,
    /// Password to unlock the wallet keystore
    wallet_pass: String,
    /// Answer yes to transaction confirmation prompts
    assume_yes: bool,
    /// Unlocked signing key, populated on first connect
    wallet: Mutex<Option<LocalWallet>>,
    /// Cached snapshot of on-chain DAO state
    snapshot: Mutex<DaoSnapshot>,
    /// State of the single in-flight write action
    action: AtomicU8,
}

impl Pleb {
    fn new(config: &Config, assume_yes: bool) -> Result<Self> {
        Ok(Self {
            endpoint: Url::parse(&config.endpoint)?,
            chain_id: config.chain_id,
            dao: config.dao.as_deref().map(parse_address).transpose()?,
            nft: config.nft.as_deref().map(parse_address).transpose()?,
            wallet_path: config.wallet_path.clone(),
            wallet_pass: config.wallet_pass.clone(),
            assume_yes,
            wallet: Mutex::new(None),
            snapshot: Mutex::new(DaoSnapshot::default()),
            action: AtomicU8::new(ActionState::Idle as u8),
        })
    }
}

async fn realmain(args: Args, config: Config) -> Result<()> {
    let pleb = Pleb::new(&config, args.yes)?;

    match args.command {
        Subcmd::Ping => pleb.ping().await,

        Subcmd::Wallet { keygen, address, balance } => {
            if !keygen && !address && !balance {
                eprintln!("Error: You must use at least one flag for this subcommand");
                eprintln!("Run with \"wallet -h\" to see the subcommand usage.");
                exit(2);
            }

            if keygen {
                return pleb.wallet_keygen().await
            }

            if address {
                println!("Wallet address: {:?}", pleb.wallet_address().await?);
                return Ok(())
            }

            pleb.wallet_balance().await
        }

        Subcmd::Info => {
            pleb.connect().await?;
            pleb.show_dashboard().await
        }

        Subcmd::Proposals { id } => match id {
            Some(id) => pleb.show_proposal(id).await,
            None => {
                pleb.refresh_proposal_count().await;
                pleb.refresh_proposals().await;
                pleb.show_proposals().await
            }
        },

        Subcmd::Propose { nft_token_id } => {
            pleb.connect().await?;
            pleb.dao_propose(U256::from(nft_token_id)).await
        }

        Subcmd::Vote { proposal_id, choice } => {
            let choice: VoteChoice = choice.parse()?;
            pleb.connect().await?;
            pleb.dao_vote(proposal_id, choice).await
        }

        Subcmd::Exec { proposal_id } => {
            pleb.connect().await?;
            pleb.dao_exec(proposal_id).await
        }

        Subcmd::Interactive => {
            pleb.connect().await?;
            interactive::interactive(&pleb).await
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::from_args();

    // Logger setup
    let log_level = match args.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let log_config = ConfigBuilder::new()
        .add_filter_ignore_str("hyper")
        .add_filter_ignore_str("reqwest")
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> =
        vec![TermLogger::new(log_level, log_config.clone(), TerminalMode::Mixed, ColorChoice::Auto)];
    if let Some(ref log_path) = args.log {
        let log_path = expand_path(log_path)?;
        if let Some(parent) = log_path.parent() {
            fs::create_dir_all(parent)?;
        }
        loggers.push(WriteLogger::new(log_level, log_config, fs::File::create(log_path)?));
    }
    CombinedLogger::init(loggers)?;

    // Spawn the config file if it's not in place already, then load it.
    let config_path = get_config_path(args.config.clone(), CONFIG_FILE)?;
    spawn_config(&config_path, CONFIG_FILE_CONTENTS)?;
    let config: Config = toml::from_str(&fs::read_to_string(&config_path)?)
        .map_err(|e| Error::ConfigError(format!("Failed parsing {}: {e}", config_path.display())))?;
    let config = config.merge(&args);

    realmain(args, config).await
}

#[cfg(test)]
pub(crate) mod test_harness {
    use super::*;

    /// A session context pointing at an unreachable endpoint, with no
    /// keystore on disk. Good enough for everything that must fail or
    /// gate before the network is reached.
    pub(crate) fn test_pleb() -> Pleb {
        let config = Config {
            endpoint: "http://127.0.0.1:1".to_string(),
            chain_id: 31337,
            dao: Some("0x5FC8d32690cc91D4c39d9d3abcBD16989F875707".to_string()),
            nft: Some("0x5FbDB2315678afecb367f032d93F642f64180aa3".to_string()),
            wallet_path: "/nonexistent/deplebs/wallet.json".to_string(),
            wallet_pass: "changeme".to_string(),
        };

        Pleb::new(&config, true).unwrap()
    }
}
