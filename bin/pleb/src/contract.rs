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

use std::sync::Arc;

use ethers::prelude::*;

use crate::{
    error::{Error, Result},
    Pleb,
};

// The fixed ABI surfaces of the external contracts. Everything the
// client knows about the DAO goes through these bindings; the contract
// internals are not our concern.
abigen!(
    DePlebsDao,
    r#"[
        function numProposals() external view returns (uint256)
        function proposals(uint256) external view returns (uint256 nftTokenId, uint256 deadline, uint256 yayVotes, uint256 nayVotes, bool executed)
        function createProposal(uint256 _nftTokenId) external returns (uint256)
        function voteOnProposal(uint256 proposalIndex, uint8 vote) external
        function executeProposal(uint256 proposalIndex) external
    ]"#
);

abigen!(
    DePlebsNft,
    r#"[
        function balanceOf(address owner) external view returns (uint256)
    ]"#
);

/// Auxiliary function to parse a contract address from a hex string,
/// with or without the "0x" prefix.
pub fn parse_address(address: &str) -> Result<Address> {
    address
        .trim_start_matches("0x")
        .parse()
        .map_err(|_| Error::ParseFailed("Invalid contract address"))
}

/// Auxiliary function to narrow a contract-returned word into a `u64`.
pub fn u256_to_u64(value: U256) -> Result<u64> {
    if value > U256::from(u64::MAX) {
        return Err(Error::ParseFailed("Value does not fit into u64"))
    }

    Ok(value.as_u64())
}

impl Pleb {
    /// The configured DAO contract address.
    pub fn dao_address(&self) -> Result<Address> {
        self.dao.ok_or_else(|| {
            Error::ConfigError("DAO contract address not set (--dao or config file)".to_string())
        })
    }

    /// The configured NFT contract address.
    pub fn nft_address(&self) -> Result<Address> {
        self.nft.ok_or_else(|| {
            Error::ConfigError("NFT contract address not set (--nft or config file)".to_string())
        })
    }

    /// Auxiliary function to return a DAO contract instance given a handle.
    pub(crate) fn dao_contract<M: Middleware>(&self, handle: Arc<M>) -> Result<DePlebsDao<M>> {
        Ok(DePlebsDao::new(self.dao_address()?, handle))
    }

    /// Auxiliary function to return an NFT contract instance given a handle.
    pub(crate) fn nft_contract<M: Middleware>(&self, handle: Arc<M>) -> Result<DePlebsNft<M>> {
        Ok(DePlebsNft::new(self.nft_address()?, handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        let plain = "5FbDB2315678afecb367f032d93F642f64180aa3";
        let prefixed = format!("0x{plain}");
        assert_eq!(parse_address(plain).unwrap(), parse_address(&prefixed).unwrap());
        assert!(parse_address("not an address").is_err());
        assert!(parse_address("0x1234").is_err());
    }

    #[test]
    fn test_u256_to_u64() {
        assert_eq!(u256_to_u64(U256::zero()).unwrap(), 0);
        assert_eq!(u256_to_u64(U256::from(u64::MAX)).unwrap(), u64::MAX);
        assert!(u256_to_u64(U256::from(u64::MAX) + U256::one()).is_err());
    }
}
