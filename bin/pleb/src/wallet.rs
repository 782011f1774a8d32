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

use std::fs;

use ethers::{prelude::*, utils::format_ether};
use log::{error, info};
use rand::rngs::OsRng;

use crate::{
    cli_util::expand_path,
    error::{Error, Result},
    Pleb,
};

impl Pleb {
    /// Unlock the configured keystore, caching the signing key for the
    /// rest of the session. The keystore plays the role of the wallet
    /// authorization prompt: a failed decryption is a refusal, and the
    /// session stays disconnected.
    pub(crate) async fn unlocked_wallet(&self) -> Result<LocalWallet> {
        let mut wallet = self.wallet.lock().await;
        if let Some(wallet) = wallet.as_ref() {
            return Ok(wallet.clone())
        }

        let path = expand_path(&self.wallet_path)?;
        if !path.exists() {
            return Err(Error::ConfigError(format!(
                "No wallet keystore at {}. Run \"pleb wallet --keygen\" first.",
                path.display(),
            )))
        }

        let unlocked = match LocalWallet::decrypt_keystore(&path, &self.wallet_pass) {
            Ok(w) => w,
            Err(e) => {
                error!("Failed to unlock keystore {}: {e}", path.display());
                return Err(Error::UserRejected("wallet authorization refused"))
            }
        };

        info!("Unlocked wallet {:?}", unlocked.address());
        *wallet = Some(unlocked.clone());

        Ok(unlocked)
    }

    /// The address of the session wallet.
    pub async fn wallet_address(&self) -> Result<Address> {
        Ok(self.unlocked_wallet().await?.address())
    }

    /// Generate a new wallet keystore at the configured path.
    pub async fn wallet_keygen(&self) -> Result<()> {
        let path = expand_path(&self.wallet_path)?;
        if path.exists() {
            return Err(Error::ConfigError(format!(
                "Keystore {} already exists, refusing to overwrite it",
                path.display(),
            )))
        }

        let Some(parent) = path.parent() else {
            return Err(Error::ConfigError("Invalid wallet keystore path".to_string()))
        };
        fs::create_dir_all(parent)?;

        let name = path.file_name().and_then(|n| n.to_str());
        let (wallet, _) = LocalWallet::new_keystore(parent, &mut OsRng, &self.wallet_pass, name)?;

        println!("Generated new wallet keystore: {}", path.display());
        println!("Wallet address: {:?}", wallet.address());

        Ok(())
    }

    /// Print the wallet's native token balance.
    pub async fn wallet_balance(&self) -> Result<()> {
        let address = self.wallet_address().await?;
        let provider = self.provider().await?;
        let balance = provider
            .get_balance(address, None)
            .await
            .map_err(|e| Error::QueryFailure(format!("Failed to fetch wallet balance: {e}")))?;

        println!("Wallet balance: {} ETH ({balance} wei)", format_ether(balance));

        Ok(())
    }
}
