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

use std::{sync::Arc, time::Instant};

use ethers::prelude::*;
use log::{error, info};

use crate::{
    error::{Error, Result},
    Pleb,
};

/// A signing-capable handle bound to the wallet address.
pub type SigningHandle = SignerMiddleware<Provider<Http>, LocalWallet>;

impl Pleb {
    /// Verify that the endpoint serves the single accepted network.
    /// The node behind the endpoint can change mid-session, so this
    /// runs on every handle acquisition, not just the first.
    pub(crate) async fn check_network<M: Middleware>(&self, handle: &M) -> Result<()> {
        let actual = handle
            .get_chainid()
            .await
            .map_err(|e| Error::QueryFailure(format!("Failed to fetch chain ID: {e}")))?;

        if actual != U256::from(self.chain_id) {
            error!("Endpoint reports chain ID {actual}, session accepts only {}", self.chain_id);
            return Err(Error::WrongNetwork { actual, expected: self.chain_id })
        }

        Ok(())
    }

    /// Acquire a read-only handle to the accepted network.
    pub async fn provider(&self) -> Result<Provider<Http>> {
        let provider = Provider::new(Http::new(self.endpoint.clone()));
        self.check_network(&provider).await?;
        Ok(provider)
    }

    /// Acquire a signing handle bound to the wallet address. Unlocks
    /// the wallet if this session has not done so yet.
    pub async fn signer(&self) -> Result<Arc<SigningHandle>> {
        let provider = self.provider().await?;
        let wallet = self.unlocked_wallet().await?.with_chain_id(self.chain_id);
        Ok(Arc::new(SignerMiddleware::new(provider, wallet)))
    }

    /// Establish the session: unlock the wallet, validate the network
    /// and populate the initial state snapshot.
    pub async fn connect(&self) -> Result<()> {
        self.unlocked_wallet().await?;
        self.provider().await?;
        info!("Connected to chain {} via {}", self.chain_id, self.endpoint);
        self.refresh_dashboard().await;
        Ok(())
    }

    /// Auxiliary function to ping the configured endpoint for liveness.
    pub async fn ping(&self) -> Result<()> {
        eprintln!("Executing ping request to {}", self.endpoint);
        let latency = Instant::now();
        let provider = self.provider().await?;
        let block = provider.get_block_number().await?;
        let latency = latency.elapsed();
        eprintln!("Connected to chain {} (head block {block})", self.chain_id);
        eprintln!("Latency: {latency:?}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_harness::test_pleb;

    #[tokio::test]
    async fn test_wrong_network_is_rejected() {
        let pleb = test_pleb();
        let (provider, mock) = Provider::mocked();

        // Any chain ID other than the accepted one must fail the call
        // before a read or write is issued.
        mock.push(U64::from(1)).unwrap();
        let err = pleb.check_network(&provider).await.unwrap_err();
        assert!(matches!(err, Error::WrongNetwork { expected: 31337, .. }));

        mock.push(U64::from(31337)).unwrap();
        assert!(pleb.check_network(&provider).await.is_ok());
    }
}
