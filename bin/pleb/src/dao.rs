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

use std::{fmt, future::Future, str::FromStr, sync::Arc};

use chrono::{DateTime, Utc};
use ethers::{prelude::*, utils::format_ether};
use log::warn;
use prettytable::{format, row, Table};

use crate::{
    contract::u256_to_u64,
    error::{Error, Result},
    Pleb,
};

/// A vote on a DAO proposal. The numeric encoding is a fixed contract
/// surface: YAY is 0 and NAY is 1, never anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteChoice {
    Yay,
    Nay,
}

impl VoteChoice {
    /// The contract's binary vote encoding.
    pub fn encoding(self) -> u8 {
        match self {
            Self::Yay => 0,
            Self::Nay => 1,
        }
    }
}

impl FromStr for VoteChoice {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "yay" => Ok(Self::Yay),
            "nay" => Ok(Self::Nay),
            _ => Err(Error::ParseFailed("Vote choice must be \"yay\" or \"nay\"")),
        }
    }
}

impl fmt::Display for VoteChoice {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Yay => write!(f, "YAY"),
            Self::Nay => write!(f, "NAY"),
        }
    }
}

#[derive(Debug, Clone)]
/// A proposal record fetched from the DAO contract. The client never
/// constructs or edits one of these from local guesses; every field
/// comes from the contract's proposal-by-id accessor.
pub struct Proposal {
    /// Numeric identifier for the proposal, assigned by the contract
    pub id: u64,
    /// Marketplace token ID the proposal wants to purchase
    pub nft_token_id: U256,
    /// Voting deadline
    pub deadline: DateTime<Utc>,
    /// Number of YAY votes
    pub yay_votes: u64,
    /// Number of NAY votes
    pub nay_votes: u64,
    /// Whether the proposal has been executed
    pub executed: bool,
}

/// Raw proposal tuple as returned by the contract accessor.
pub type RawProposal = (U256, U256, U256, U256, bool);

impl Proposal {
    /// Map the contract's raw proposal tuple into a `Proposal`,
    /// converting the deadline from epoch seconds into a calendar
    /// timestamp.
    pub fn from_raw(id: u64, raw: RawProposal) -> Result<Self> {
        let (nft_token_id, deadline, yay_votes, nay_votes, executed) = raw;

        let deadline = u256_to_u64(deadline)?;
        let Some(deadline) = DateTime::from_timestamp(deadline as i64, 0) else {
            return Err(Error::ParseFailed("Proposal deadline is out of range"))
        };

        Ok(Self {
            id,
            nft_token_id,
            deadline,
            yay_votes: u256_to_u64(yay_votes)?,
            nay_votes: u256_to_u64(nay_votes)?,
            executed,
        })
    }

    /// Derive what can be done with this proposal at the given time.
    pub fn status(&self, now: DateTime<Utc>) -> ProposalStatus {
        if self.executed {
            let outcome =
                if self.yay_votes > self.nay_votes { VoteChoice::Yay } else { VoteChoice::Nay };
            return ProposalStatus::Executed(outcome)
        }

        if now < self.deadline {
            return ProposalStatus::Voting
        }

        ProposalStatus::Executable
    }
}

impl fmt::Display for Proposal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = format!(
            concat!(
                "Proposal {}\n",
                "===========\n",
                "Marketplace NFT token ID: {}\n",
                "Deadline: {}\n",
                "YAY votes: {}\n",
                "NAY votes: {}\n",
                "Executed: {}",
            ),
            self.id,
            self.nft_token_id,
            self.deadline.format("%Y-%m-%d %H:%M:%S UTC"),
            self.yay_votes,
            self.nay_votes,
            self.executed,
        );

        write!(f, "{s}")
    }
}

/// What the presentation layer may offer for a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalStatus {
    /// The deadline has not passed, votes can be cast
    Voting,
    /// The deadline has passed and the proposal awaits execution
    Executable,
    /// The proposal has been executed with the given outcome
    Executed(VoteChoice),
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Voting => write!(f, "Voting"),
            Self::Executable => write!(f, "Executable"),
            Self::Executed(outcome) => write!(f, "Executed ({outcome})"),
        }
    }
}

#[derive(Debug, Clone, Default)]
/// Local snapshot of on-chain DAO state. This is a cache with no
/// independent authority; the contracts remain the source of truth.
pub struct DaoSnapshot {
    /// Governance NFTs held by the session wallet
    pub nft_balance: u64,
    /// Native balance held by the DAO contract, in wei
    pub treasury: U256,
    /// Number of proposals ever created
    pub proposal_count: u64,
    /// All proposals, ordered by ascending ID
    pub proposals: Vec<Proposal>,
}

/// Fetch proposals `0..count` strictly sequentially in ascending ID
/// order, collecting the successful results. Failed fetches are logged
/// and omitted; the caller treats them as unknown, not as missing
/// proposals.
pub(crate) async fn collect_proposals<F, Fut>(count: u64, mut fetch: F) -> Vec<Proposal>
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = Result<Proposal>>,
{
    let mut proposals = Vec::with_capacity(count as usize);

    for id in 0..count {
        match fetch(id).await {
            Ok(proposal) => proposals.push(proposal),
            Err(e) => warn!("Failed to fetch proposal {id}, omitting it from the view: {e}"),
        }
    }

    proposals
}

impl Pleb {
    /// A clone of the current state snapshot.
    pub async fn snapshot(&self) -> DaoSnapshot {
        self.snapshot.lock().await.clone()
    }

    /// Refresh the governance NFT balance of the session wallet.
    /// The balance query is scoped to the signer address, so this needs
    /// a signing handle. On failure the previous value is kept.
    pub async fn refresh_nft_balance(&self) {
        match self.query_nft_balance().await {
            Ok(balance) => self.snapshot.lock().await.nft_balance = balance,
            Err(e) => warn!("Failed to refresh NFT balance, keeping previous value: {e}"),
        }
    }

    async fn query_nft_balance(&self) -> Result<u64> {
        let signer = self.signer().await?;
        let address = signer.address();
        let nft = self.nft_contract(signer)?;
        let balance = nft
            .balance_of(address)
            .call()
            .await
            .map_err(|e| Error::QueryFailure(format!("balanceOf call failed: {e}")))?;

        u256_to_u64(balance)
    }

    /// Refresh the DAO treasury balance. On failure the previous value
    /// is kept.
    pub async fn refresh_treasury(&self) {
        match self.query_treasury().await {
            Ok(treasury) => self.snapshot.lock().await.treasury = treasury,
            Err(e) => warn!("Failed to refresh treasury balance, keeping previous value: {e}"),
        }
    }

    async fn query_treasury(&self) -> Result<U256> {
        let provider = self.provider().await?;
        provider
            .get_balance(self.dao_address()?, None)
            .await
            .map_err(|e| Error::QueryFailure(format!("Treasury balance query failed: {e}")))
    }

    /// Refresh the proposal counter. On failure the previous value is
    /// kept.
    pub async fn refresh_proposal_count(&self) {
        match self.query_proposal_count().await {
            Ok(count) => self.snapshot.lock().await.proposal_count = count,
            Err(e) => warn!("Failed to refresh proposal count, keeping previous value: {e}"),
        }
    }

    async fn query_proposal_count(&self) -> Result<u64> {
        let provider = Arc::new(self.provider().await?);
        let dao = self.dao_contract(provider)?;
        let count = dao
            .num_proposals()
            .call()
            .await
            .map_err(|e| Error::QueryFailure(format!("numProposals call failed: {e}")))?;

        u256_to_u64(count)
    }

    /// Fetch a single proposal from the contract. An `Err` here means
    /// the proposal state is unknown, not that it does not exist.
    pub async fn fetch_proposal(&self, id: u64) -> Result<Proposal> {
        let provider = Arc::new(self.provider().await?);
        let dao = self.dao_contract(provider)?;
        let raw = dao
            .proposals(U256::from(id))
            .call()
            .await
            .map_err(|e| Error::QueryFailure(format!("proposals({id}) call failed: {e}")))?;

        Proposal::from_raw(id, raw)
    }

    /// Rebuild the full proposal collection. The proposal counter must
    /// be current. The new collection replaces the old one only once
    /// fully built, so the rendering side never sees a partial mix of
    /// old and new records.
    pub async fn refresh_proposals(&self) {
        let count = self.snapshot.lock().await.proposal_count;
        let fresh = collect_proposals(count, |id| self.fetch_proposal(id)).await;
        self.snapshot.lock().await.proposals = fresh;
    }

    /// Refresh the dashboard slices: NFT balance, treasury and
    /// proposal count.
    pub async fn refresh_dashboard(&self) {
        self.refresh_nft_balance().await;
        self.refresh_treasury().await;
        self.refresh_proposal_count().await;
    }

    /// Print the DAO dashboard from the current snapshot.
    pub async fn show_dashboard(&self) -> Result<()> {
        let snapshot = self.snapshot().await;

        println!("DePlebs DAO");
        println!("===========");
        if let Some(wallet) = self.wallet.lock().await.as_ref() {
            println!("Wallet address: {:?}", wallet.address());
        }
        println!("Your DePlebs NFT balance (voting power): {}", snapshot.nft_balance);
        println!(
            "Treasury balance: {} ETH ({} wei)",
            format_ether(snapshot.treasury),
            snapshot.treasury,
        );
        println!("Total number of proposals: {}", snapshot.proposal_count);

        Ok(())
    }

    /// Print all proposals in the current snapshot.
    pub async fn show_proposals(&self) -> Result<()> {
        let snapshot = self.snapshot().await;
        let now = Utc::now();

        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
        table.set_titles(row!["ID", "NFT Token", "Deadline", "YAY", "NAY", "Status"]);
        for proposal in &snapshot.proposals {
            table.add_row(row![
                proposal.id,
                proposal.nft_token_id,
                proposal.deadline.format("%Y-%m-%d %H:%M:%S UTC"),
                proposal.yay_votes,
                proposal.nay_votes,
                proposal.status(now),
            ]);
        }

        if table.is_empty() {
            println!("No proposals found");
        } else {
            println!("{table}");
        }

        Ok(())
    }

    /// Fetch and print a single proposal.
    pub async fn show_proposal(&self, id: u64) -> Result<()> {
        let proposal = self.fetch_proposal(id).await?;
        println!("{proposal}");
        println!("Status: {}", proposal.status(Utc::now()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn sample_proposal(id: u64) -> Proposal {
        Proposal {
            id,
            nft_token_id: U256::from(5),
            deadline: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            yay_votes: 0,
            nay_votes: 0,
            executed: false,
        }
    }

    #[test]
    fn test_vote_choice_encoding() {
        // Fixed contract surface, not a client choice
        assert_eq!(VoteChoice::Yay.encoding(), 0);
        assert_eq!(VoteChoice::Nay.encoding(), 1);
    }

    #[test]
    fn test_vote_choice_parsing() {
        assert_eq!("yay".parse::<VoteChoice>().unwrap(), VoteChoice::Yay);
        assert_eq!("NAY".parse::<VoteChoice>().unwrap(), VoteChoice::Nay);
        assert!("maybe".parse::<VoteChoice>().is_err());
        assert!("".parse::<VoteChoice>().is_err());
    }

    #[test]
    fn test_proposal_from_raw() {
        let raw = (U256::from(5), U256::from(1_700_000_000u64), U256::from(7), U256::from(3), false);
        let proposal = Proposal::from_raw(2, raw).unwrap();

        assert_eq!(proposal.id, 2);
        assert_eq!(proposal.nft_token_id, U256::from(5));
        assert_eq!(proposal.deadline.timestamp(), 1_700_000_000);
        assert_eq!(proposal.yay_votes, 7);
        assert_eq!(proposal.nay_votes, 3);
        assert!(!proposal.executed);
    }

    #[test]
    fn test_proposal_status() {
        let mut proposal = sample_proposal(2);
        proposal.yay_votes = 7;
        proposal.nay_votes = 3;

        let before = proposal.deadline - TimeDelta::seconds(60);
        let after = proposal.deadline + TimeDelta::seconds(60);

        // Voting stays open until the deadline, then execution is offered
        assert_eq!(proposal.status(before), ProposalStatus::Voting);
        assert_eq!(proposal.status(after), ProposalStatus::Executable);

        // Once executed, the outcome follows the tallies
        proposal.executed = true;
        assert_eq!(proposal.status(after), ProposalStatus::Executed(VoteChoice::Yay));
        assert_eq!(proposal.status(after).to_string(), "Executed (YAY)");

        proposal.yay_votes = 1;
        proposal.nay_votes = 2;
        assert_eq!(proposal.status(after), ProposalStatus::Executed(VoteChoice::Nay));
    }

    #[tokio::test]
    async fn test_collect_proposals_orders_by_id() {
        let proposals = collect_proposals(4, |id| async move { Ok(sample_proposal(id)) }).await;
        let ids: Vec<u64> = proposals.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_collect_proposals_empty() {
        let proposals =
            collect_proposals(0, |id| async move { Ok(sample_proposal(id)) }).await;
        assert!(proposals.is_empty());
    }

    #[tokio::test]
    async fn test_collect_proposals_skips_failures() {
        let proposals = collect_proposals(3, |id| async move {
            if id == 1 {
                return Err(Error::QueryFailure("gone".to_string()))
            }
            Ok(sample_proposal(id))
        })
        .await;

        let ids: Vec<u64> = proposals.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![0, 2]);
    }
}
