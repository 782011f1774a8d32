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

use ethers::{prelude::U256, providers::ProviderError, signers::WalletError};

/// Result type used throughout the client
pub type Result<T> = std::result::Result<T, Error>;

/// Custom errors available for the client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // ==============
    // Session errors
    // ==============
    #[error("Wrong network: endpoint reports chain ID {actual}, session accepts only {expected}")]
    WrongNetwork { actual: U256, expected: u64 },

    #[error("Rejected by user: {0}")]
    UserRejected(&'static str),

    #[error("Another write action is already in flight")]
    ActionInFlight,

    #[error("Not eligible: no governance NFTs held by this wallet")]
    NotEligible,

    // ===============
    // On-chain errors
    // ===============
    #[error("Contract reverted: {0}")]
    ContractRevert(String),

    #[error("Transaction failed: {0}")]
    TxFailed(String),

    #[error("Query failed: {0}")]
    QueryFailure(String),

    // =============================
    // Parse and configuration errors
    // =============================
    #[error("Parse failed: {0}")]
    ParseFailed(&'static str),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    ParseIntError(#[from] std::num::ParseIntError),

    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),

    // ================
    // Wrapped externals
    // ================
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    ProviderError(#[from] ProviderError),

    #[error(transparent)]
    WalletError(#[from] WalletError),

    #[error(transparent)]
    SetLoggerError(#[from] log::SetLoggerError),
}
