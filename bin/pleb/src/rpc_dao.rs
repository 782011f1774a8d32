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

use std::sync::atomic::Ordering;

use ethers::{
    abi::Detokenize,
    contract::{ContractCall, ContractError},
    prelude::*,
};
use log::info;

use crate::{
    cli_util,
    dao::VoteChoice,
    error::{Error, Result},
    Pleb,
};

/// Message surfaced for a revert that carries no structured reason.
/// Not every node returns one, so the client never assumes it.
pub(crate) const REVERT_FALLBACK: &str = "transaction reverted without a reason string";

/// State of the session's write action. At most one write transaction
/// is in flight at any time to avoid nonce and ordering conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ActionState {
    Idle = 0,
    Submitting = 1,
    Pending = 2,
    Confirmed = 3,
    Reverted = 4,
}

impl ActionState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Submitting,
            2 => Self::Pending,
            3 => Self::Confirmed,
            4 => Self::Reverted,
            _ => Self::Idle,
        }
    }
}

/// Holder of the single in-flight action slot. Records the state
/// machine transitions and releases the slot back to `Idle` when
/// dropped, on success and failure paths alike.
pub(crate) struct ActionGuard<'a> {
    pleb: &'a Pleb,
}

impl std::fmt::Debug for ActionGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("ActionGuard").finish_non_exhaustive()
    }
}

impl ActionGuard<'_> {
    pub fn pending(&self) {
        self.pleb.action.store(ActionState::Pending as u8, Ordering::SeqCst);
    }

    pub fn confirmed(&self) {
        self.pleb.action.store(ActionState::Confirmed as u8, Ordering::SeqCst);
    }

    pub fn reverted(&self) {
        self.pleb.action.store(ActionState::Reverted as u8, Ordering::SeqCst);
    }
}

impl Drop for ActionGuard<'_> {
    fn drop(&mut self) {
        self.pleb.action.store(ActionState::Idle as u8, Ordering::SeqCst);
    }
}

/// Map a failed contract write into a client error. Reverts surface
/// the contract-provided reason when one is present.
fn write_error<M: Middleware>(e: ContractError<M>) -> Error {
    if e.is_revert() {
        let reason = e.decode_revert::<String>().unwrap_or_else(|| REVERT_FALLBACK.to_string());
        return Error::ContractRevert(reason)
    }

    Error::TxFailed(e.to_string())
}

impl Pleb {
    /// The current write action state.
    pub fn action_state(&self) -> ActionState {
        ActionState::from_u8(self.action.load(Ordering::SeqCst))
    }

    /// Claim the single in-flight action slot, entering `Submitting`.
    /// Fails if another write is already in flight.
    fn begin_action(&self) -> Result<ActionGuard<'_>> {
        if self
            .action
            .compare_exchange(
                ActionState::Idle as u8,
                ActionState::Submitting as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            return Err(Error::ActionInFlight)
        }

        Ok(ActionGuard { pleb: self })
    }

    /// Auxiliary function to ask for transaction confirmation, unless
    /// the session runs with `--yes`.
    fn confirm(&self, prompt: &str) -> Result<()> {
        if self.assume_yes || cli_util::confirm(prompt)? {
            return Ok(())
        }

        Err(Error::UserRejected("transaction not confirmed"))
    }

    /// Submit a write call and suspend until the network confirms it.
    /// The session is `Pending` from submission until the confirmation
    /// resolves; there is deliberately no local timeout on that wait.
    async fn submit<M, D>(
        &self,
        call: ContractCall<M, D>,
        guard: &ActionGuard<'_>,
    ) -> Result<TransactionReceipt>
    where
        M: Middleware,
        D: Detokenize,
    {
        let pending = match call.send().await {
            Ok(pending) => pending,
            Err(e) => {
                let e = write_error(e);
                if matches!(e, Error::ContractRevert(_)) {
                    guard.reverted();
                }
                return Err(e)
            }
        };

        let tx_hash = *pending;
        guard.pending();
        info!("Transaction {tx_hash:?} submitted, awaiting confirmation");

        let receipt = pending
            .await
            .map_err(|e| Error::TxFailed(e.to_string()))?
            .ok_or_else(|| Error::TxFailed("transaction dropped from the mempool".to_string()))?;

        // A receipt with status 0 is a revert that surfaced only after
        // inclusion; no reason string is available on this path.
        if receipt.status != Some(U64::from(1)) {
            guard.reverted();
            return Err(Error::ContractRevert(REVERT_FALLBACK.to_string()))
        }

        Ok(receipt)
    }

    /// Create a proposal to purchase the given marketplace NFT.
    /// Only wallets holding at least one governance NFT may propose;
    /// the check runs client-side before any transaction is built.
    pub async fn dao_propose(&self, nft_token_id: U256) -> Result<()> {
        self.refresh_nft_balance().await;
        if self.snapshot().await.nft_balance == 0 {
            return Err(Error::NotEligible)
        }

        let signer = self.signer().await?;
        let dao = self.dao_contract(signer)?;

        self.confirm(&format!("Create proposal to purchase marketplace NFT {nft_token_id}?"))?;

        let guard = self.begin_action()?;
        let receipt = self.submit(dao.create_proposal(nft_token_id), &guard).await?;
        guard.confirmed();

        println!(
            "Proposal created (tx {:?}, block {})",
            receipt.transaction_hash,
            receipt.block_number.unwrap_or_default(),
        );

        self.refresh_proposal_count().await;
        println!("Total number of proposals: {}", self.snapshot().await.proposal_count);

        Ok(())
    }

    /// Cast a vote on an active proposal.
    pub async fn dao_vote(&self, proposal_id: u64, choice: VoteChoice) -> Result<()> {
        let signer = self.signer().await?;
        let dao = self.dao_contract(signer)?;

        self.confirm(&format!("Vote {choice} on proposal {proposal_id}?"))?;

        let guard = self.begin_action()?;
        let receipt = self
            .submit(dao.vote_on_proposal(U256::from(proposal_id), choice.encoding()), &guard)
            .await?;
        guard.confirmed();

        println!("Vote {choice} cast on proposal {proposal_id} (tx {:?})", receipt.transaction_hash);

        // The tallies changed under us; rebuild the whole collection
        // rather than patching the single record.
        self.refresh_proposal_count().await;
        self.refresh_proposals().await;

        Ok(())
    }

    /// Execute a proposal whose deadline has passed.
    pub async fn dao_exec(&self, proposal_id: u64) -> Result<()> {
        let signer = self.signer().await?;
        let dao = self.dao_contract(signer)?;

        self.confirm(&format!("Execute proposal {proposal_id}?"))?;

        let guard = self.begin_action()?;
        let receipt = self.submit(dao.execute_proposal(U256::from(proposal_id)), &guard).await?;
        guard.confirmed();

        println!("Proposal {proposal_id} executed (tx {:?})", receipt.transaction_hash);

        // Execution may have moved treasury funds as well.
        self.refresh_proposal_count().await;
        self.refresh_proposals().await;
        self.refresh_treasury().await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_harness::test_pleb;

    #[test]
    fn test_action_gate_blocks_second_write() {
        let pleb = test_pleb();
        assert_eq!(pleb.action_state(), ActionState::Idle);

        let guard = pleb.begin_action().unwrap();
        assert_eq!(pleb.action_state(), ActionState::Submitting);
        assert!(matches!(pleb.begin_action().unwrap_err(), Error::ActionInFlight));

        guard.pending();
        assert_eq!(pleb.action_state(), ActionState::Pending);
        assert!(matches!(pleb.begin_action().unwrap_err(), Error::ActionInFlight));

        // Releasing the guard returns the session to Idle
        drop(guard);
        assert_eq!(pleb.action_state(), ActionState::Idle);
        assert!(pleb.begin_action().is_ok());
    }

    #[test]
    fn test_revert_reason_fallback() {
        let e: ContractError<Provider<Http>> = ContractError::Revert(Bytes::new());
        match write_error(e) {
            Error::ContractRevert(reason) => assert_eq!(reason, REVERT_FALLBACK),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_propose_requires_membership() {
        // Unreachable endpoint and no keystore: the lenient balance
        // refresh keeps the zero default, and the eligibility gate
        // must block before any transaction is attempted.
        let pleb = test_pleb();
        let err = pleb.dao_propose(U256::from(5)).await.unwrap_err();
        assert!(matches!(err, Error::NotEligible));
        assert_eq!(pleb.action_state(), ActionState::Idle);
    }
}
